//! Media API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! The media host credentials have no default.

use std::env;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Default media host API base.
pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Media API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaApiConfig {
    /// Address to bind (default: 0.0.0.0)
    pub bind_address: String,

    /// HTTP port (default: 3000)
    pub port: u16,

    /// Media host account
    pub cloud_name: String,

    pub api_key: String,

    #[serde(skip_serializing)]
    pub api_secret: String,

    /// Media host API base URL
    pub api_base: String,
}

impl MediaApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingRequired(key.to_string()))
        };

        let config = MediaApiConfig {
            bind_address: lookup("MEDIA_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: lookup("MEDIA_API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MEDIA_API_PORT".to_string()))?,

            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,

            api_base: lookup("CLOUDINARY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };

        if !config.api_base.starts_with("http://") && !config.api_base.starts_with("https://") {
            return Err(ConfigError::InvalidValue("CLOUDINARY_API_BASE".to_string()));
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MEDIA_API_BIND".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("CLOUDINARY_CLOUD_NAME", "demo"),
        ("CLOUDINARY_API_KEY", "123"),
        ("CLOUDINARY_API_SECRET", "shh"),
    ];

    #[test]
    fn test_defaults() {
        let config = MediaApiConfig::from_lookup(lookup(&CREDENTIALS)).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_secret() {
        let err = MediaApiConfig::from_lookup(lookup(&CREDENTIALS[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(k) if k == "CLOUDINARY_API_SECRET"));
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("MEDIA_API_PORT", "web"));
        let err = MediaApiConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(k) if k == "MEDIA_API_PORT"));
    }

    #[test]
    fn test_secret_not_serialized() {
        let config = MediaApiConfig::from_lookup(lookup(&CREDENTIALS)).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("api_secret").is_none());
    }
}
