//! # Inventory Error Types
//!
//! Error types for coordinator, store, media and config operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Inventory Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │     Remote      │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core           │  │  Database       │  │  InvalidConfig          │ │
//! │  │  (stock, qty,   │  │  Unavailable    │  │  InvalidUrl             │ │
//! │  │   same location)│  │  Media / Http   │  │  ConfigLoad/SaveFailed  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Validation errors happen before any write. Remote errors mean the     │
//! │  write may not have landed.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use puesto_core::{CoreError, ValidationError};
use puesto_db::DbError;
use thiserror::Error;

/// Result type alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    // =========================================================================
    // Validation
    // =========================================================================
    /// A stock or registry rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Remote store
    // =========================================================================
    /// The document store failed the read or write.
    #[error("Store error: {0}")]
    Database(#[from] DbError),

    /// The document store cannot be reached.
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// A document body could not be encoded or decoded.
    #[error("Document codec error: {0}")]
    Codec(String),

    // =========================================================================
    // Local cache
    // =========================================================================
    #[error("Local cache error: {0}")]
    Cache(String),

    // =========================================================================
    // Media host
    // =========================================================================
    /// The media host answered with an error.
    #[error("Media host error: {0}")]
    Media(String),

    /// The HTTP request itself failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Reading a local image failed.
    #[error("Image file error: {0}")]
    ImageFile(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal
    // =========================================================================
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for InventoryError {
    fn from(err: ValidationError) -> Self {
        InventoryError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::Codec(err.to_string())
    }
}

impl From<url::ParseError> for InventoryError {
    fn from(err: url::ParseError) -> Self {
        InventoryError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        InventoryError::Http(err.to_string())
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        InventoryError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for InventoryError {
    fn from(err: toml::de::Error) -> Self {
        InventoryError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for InventoryError {
    fn from(err: toml::ser::Error) -> Self {
        InventoryError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl InventoryError {
    /// True when the operation was rejected before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(self, InventoryError::Core(_))
    }

    /// True when a remote write or read failed.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            InventoryError::Database(_)
                | InventoryError::Unavailable(_)
                | InventoryError::Media(_)
                | InventoryError::Http(_)
        )
    }

    /// True when this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            InventoryError::InvalidConfig(_)
                | InventoryError::InvalidUrl(_)
                | InventoryError::ConfigLoadFailed(_)
                | InventoryError::ConfigSaveFailed(_)
        )
    }

    /// The underlying core error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            InventoryError::Core(e) => Some(e),
            _ => None,
        }
    }
}
