//! # Puesto Media API
//!
//! HTTP endpoint that deletes product images from the media host. Devices
//! only hold the unsigned upload preset; the API secret lives here.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Media API Service                               │
//! │                                                                         │
//! │  device ──► POST /api/deleteImage ──► ImageDestroyer ──► media host    │
//! │             GET  /health                (signed destroy)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `MEDIA_API_BIND` - Bind address (default: 0.0.0.0)
//! - `MEDIA_API_PORT` - HTTP port (default: 3000)
//! - `CLOUDINARY_CLOUD_NAME` - Media host account (required)
//! - `CLOUDINARY_API_KEY` - API key (required)
//! - `CLOUDINARY_API_SECRET` - API secret (required)
//! - `CLOUDINARY_API_BASE` - API base URL (default: https://api.cloudinary.com/v1_1)

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use puesto_inventory::ImageDestroyer;

// Re-exports
pub use config::{ConfigError, MediaApiConfig};
pub use error::ApiError;
pub use routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub destroyer: Arc<dyn ImageDestroyer>,
}
