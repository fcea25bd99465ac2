//! # Inventory Configuration
//!
//! Per-device settings for the coordinator, the local database and the media
//! host.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PUESTO_LOCATION=B                                                  │
//! │     PUESTO_DB_PATH=/data/puesto.db                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/inventory.toml (Linux)                               │
//! │     ~/Library/Application Support/com.puesto.pos/inventory.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no location, preset "product", 5s exhausted alert                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # inventory.toml
//! [device]
//! location = "A"
//! name = "Caja principal"
//!
//! [storage]
//! db_path = "/var/lib/puesto/puesto.db"
//!
//! [media]
//! cloud_name = "puesto"
//! upload_preset = "product"
//! delete_endpoint = "https://puesto.example.com/api/deleteImage"
//!
//! [alerts]
//! exhausted_notice_delay_secs = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use puesto_core::Location;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{InventoryError, InventoryResult};

const CONFIG_FILE_NAME: &str = "inventory.toml";
const DB_FILE_NAME: &str = "puesto.db";

// =============================================================================
// Device Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Sale point this device starts on. The cached choice wins when set.
    #[serde(default)]
    pub location: Option<Location>,

    /// Human-readable device name (e.g., "Caja principal").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Puesto".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            location: None,
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding documents and the local cache.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

// =============================================================================
// Media Configuration
// =============================================================================

/// Media host settings.
///
/// Uploads go straight to the host with an unsigned preset. Deletion needs the
/// account secret, so it goes through the deletion endpoint (`media-api`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub cloud_name: String,

    #[serde(default = "default_upload_preset")]
    pub upload_preset: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Full URL of `POST /api/deleteImage`.
    #[serde(default)]
    pub delete_endpoint: Option<String>,
}

fn default_upload_preset() -> String {
    "product".to_string()
}

fn default_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig {
            cloud_name: String::new(),
            upload_preset: default_upload_preset(),
            api_base: default_api_base(),
            delete_endpoint: None,
        }
    }
}

impl MediaConfig {
    /// True when uploads can be attempted.
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty()
    }
}

// =============================================================================
// Alert Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Delay before the "inventory exhausted" notice after closing a day
    /// with no stock left.
    #[serde(default = "default_exhausted_delay")]
    pub exhausted_notice_delay_secs: u64,
}

fn default_exhausted_delay() -> u64 {
    5
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            exhausted_notice_delay_secs: default_exhausted_delay(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub alerts: AlertSettings,
}

impl InventoryConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (inventory.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> InventoryResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading inventory config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load inventory config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> InventoryResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| InventoryError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InventoryError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| InventoryError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Inventory config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> InventoryResult<()> {
        if self.device.name.trim().is_empty() {
            return Err(InventoryError::InvalidConfig(
                "device.name must not be empty".into(),
            ));
        }

        let base = Url::parse(&self.media.api_base)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(InventoryError::InvalidUrl(format!(
                "media.api_base must be http(s), got: {}",
                self.media.api_base
            )));
        }

        if self.media.is_configured() && self.media.upload_preset.is_empty() {
            return Err(InventoryError::InvalidConfig(
                "media.upload_preset must not be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.media.delete_endpoint {
            let url = Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(InventoryError::InvalidUrl(format!(
                    "media.delete_endpoint must be http(s), got: {}",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// [`load`](Self::load)).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("PUESTO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.db_path = Some(PathBuf::from(path));
        }

        if let Some(location) = lookup("PUESTO_LOCATION") {
            match location.parse::<Location>() {
                Ok(loc) => {
                    debug!(location = %loc, "Overriding location from environment");
                    self.device.location = Some(loc);
                }
                Err(_) => warn!(location = %location, "Unknown location in environment"),
            }
        }

        if let Some(name) = lookup("PUESTO_CLOUD_NAME") {
            self.media.cloud_name = name;
        }

        if let Some(preset) = lookup("PUESTO_UPLOAD_PRESET") {
            self.media.upload_preset = preset;
        }

        if let Some(endpoint) = lookup("PUESTO_DELETE_ENDPOINT") {
            debug!(url = %endpoint, "Overriding delete endpoint from environment");
            self.media.delete_endpoint = Some(endpoint);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "puesto", "pos")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// SQLite file to open: the configured path or the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref path) = self.storage.db_path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "puesto", "pos")
            .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
    }

    pub fn exhausted_notice_delay(&self) -> Duration {
        Duration::from_secs(self.alerts.exhausted_notice_delay_secs)
    }
}
