//! # Media Host Client
//!
//! Product images live on a Cloudinary-compatible media host.
//!
//! ## Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPLOAD (device, unsigned preset)                                       │
//! │  POST {api_base}/{cloud}/image/upload                                   │
//! │       multipart: file, upload_preset                                    │
//! │       ◄── {secure_url, public_id} | {error: {message}}                 │
//! │                                                                         │
//! │  DESTROY (server only, needs the account secret)                       │
//! │  POST {api_base}/{cloud}/image/destroy                                  │
//! │       multipart: public_id, timestamp, api_key, signature,             │
//! │                  signature_algorithm=sha256                            │
//! │       signature = sha256_hex("public_id=..&timestamp=.." + secret)     │
//! │       ◄── {result: "ok" | "not found"} | {error: {message}}            │
//! │                                                                         │
//! │  DELETE VIA ENDPOINT (device)                                          │
//! │  POST {delete_endpoint}  {"publicId": ".."}                            │
//! │       ◄── {success: true, result} | {error}                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use puesto_core::{validation, ProductImage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::config::MediaConfig;
use crate::error::{InventoryError, InventoryResult};

// =============================================================================
// Types
// =============================================================================

/// A stored image on the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

impl From<UploadedImage> for ProductImage {
    fn from(image: UploadedImage) -> Self {
        ProductImage::Hosted {
            url: image.url,
            public_id: Some(image.public_id),
        }
    }
}

/// A local image to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes { file_name: String, bytes: Vec<u8> },
}

impl ImageSource {
    async fn into_part(self) -> InventoryResult<(String, Vec<u8>)> {
        match self {
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| InventoryError::ImageFile(format!("{}: {}", path.display(), e)))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image.jpg".to_string());
                Ok((file_name, bytes))
            }
            ImageSource::Bytes { file_name, bytes } => Ok((file_name, bytes)),
        }
    }
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: ImageSource) -> InventoryResult<UploadedImage>;
}

#[async_trait]
pub trait ImageDestroyer: Send + Sync {
    /// Deletes a hosted image. Returns the host's raw answer.
    async fn destroy(&self, public_id: &str) -> InventoryResult<Value>;
}

// =============================================================================
// Host responses
// =============================================================================

#[derive(Debug, Deserialize)]
struct HostError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<HostError>,
}

fn host_error(body: &Value) -> Option<String> {
    match body.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(err) => Some(
            err.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown media host error")
                .to_string(),
        ),
    }
}

fn parse_upload_response(success: bool, body: Value) -> InventoryResult<UploadedImage> {
    let parsed: UploadResponse = serde_json::from_value(body)?;
    if let Some(err) = parsed.error {
        return Err(InventoryError::Media(err.message));
    }
    match (success, parsed.secure_url, parsed.public_id) {
        (true, Some(url), Some(public_id)) => Ok(UploadedImage { url, public_id }),
        _ => Err(InventoryError::Media(
            "upload response is missing secure_url or public_id".into(),
        )),
    }
}

// =============================================================================
// Signing
// =============================================================================

/// `sha256_hex("k1=v1&k2=v2" + secret)` with keys sorted.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// Cloudinary client
// =============================================================================

/// Account credentials for signed calls.
#[derive(Debug, Clone)]
pub struct SigningCredentials {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
    credentials: Option<SigningCredentials>,
}

impl CloudinaryClient {
    pub fn new(
        api_base: impl Into<String>,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        CloudinaryClient {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            credentials: None,
        }
    }

    pub fn from_config(config: &MediaConfig) -> InventoryResult<Self> {
        if !config.is_configured() {
            return Err(InventoryError::InvalidConfig(
                "media.cloud_name is not set".into(),
            ));
        }
        Url::parse(&config.api_base)?;
        Ok(Self::new(
            config.api_base.clone(),
            config.cloud_name.clone(),
            config.upload_preset.clone(),
        ))
    }

    /// Enables signed calls (destroy).
    pub fn with_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.api_base, self.cloud_name, action)
    }
}

#[async_trait]
impl ImageUploader for CloudinaryClient {
    async fn upload(&self, image: ImageSource) -> InventoryResult<UploadedImage> {
        let (file_name, bytes) = image.into_part().await?;
        debug!(file_name = %file_name, size = bytes.len(), "Uploading image");

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let success = response.status().is_success();
        let body: Value = response.json().await?;

        let uploaded = parse_upload_response(success, body)?;
        info!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(uploaded)
    }
}

#[async_trait]
impl ImageDestroyer for CloudinaryClient {
    async fn destroy(&self, public_id: &str) -> InventoryResult<Value> {
        validation::validate_public_id(public_id)?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            InventoryError::InvalidConfig("destroy needs api_key and api_secret".into())
        })?;

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &credentials.api_secret,
        );

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("api_key", credentials.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await?;
        let success = response.status().is_success();
        let body: Value = response.json().await?;

        if let Some(message) = host_error(&body) {
            return Err(InventoryError::Media(message));
        }
        if !success {
            return Err(InventoryError::Media(format!("destroy failed: {}", body)));
        }

        info!(public_id = %public_id, result = %body, "Image destroyed");
        Ok(body)
    }
}

// =============================================================================
// Deletion endpoint client
// =============================================================================

/// Deletes images through the `media-api` service, which holds the secret.
#[derive(Debug, Clone)]
pub struct DeleteEndpointClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl DeleteEndpointClient {
    pub fn new(endpoint: &str) -> InventoryResult<Self> {
        Ok(DeleteEndpointClient {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
        })
    }

    /// `None` when no endpoint is configured.
    pub fn from_config(config: &MediaConfig) -> InventoryResult<Option<Self>> {
        config
            .delete_endpoint
            .as_deref()
            .map(Self::new)
            .transpose()
    }
}

#[async_trait]
impl ImageDestroyer for DeleteEndpointClient {
    async fn destroy(&self, public_id: &str) -> InventoryResult<Value> {
        validation::validate_public_id(public_id)?;

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "publicId": public_id }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if let Some(message) = host_error(&body) {
            return Err(InventoryError::Media(format!("{} ({})", message, status)));
        }
        if !status.is_success() {
            return Err(InventoryError::Media(format!("delete endpoint answered {}", status)));
        }

        debug!(public_id = %public_id, "Image deleted through endpoint");
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_params_sorts_keys() {
        let expected = "0d4fe14b2b4a3f68a97ccc5097c43908b623d24293c296826a9390c14d891509";
        assert_eq!(
            sign_params(&[("timestamp", "1315060510"), ("public_id", "sample")], "abcd"),
            expected
        );
        assert_eq!(
            sign_params(&[("public_id", "sample"), ("timestamp", "1315060510")], "abcd"),
            expected
        );
        assert_eq!(
            sign_params(
                &[("public_id", "puesto/chapata"), ("timestamp", "1700000000")],
                "secret"
            ),
            "cca6ec47eca0e8021137bc0f52c858d2a03b2f615700e005bc85e780fe26535b"
        );
    }

    #[test]
    fn test_parse_upload_response() {
        let ok = parse_upload_response(
            true,
            json!({"secure_url": "https://img/x.jpg", "public_id": "x", "width": 100}),
        )
        .unwrap();
        assert_eq!(ok.public_id, "x");

        let image: ProductImage = ok.into();
        assert_eq!(image.public_id(), Some("x"));

        let err = parse_upload_response(false, json!({"error": {"message": "Upload preset not found"}}))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Media(m) if m == "Upload preset not found"));

        assert!(parse_upload_response(true, json!({"secure_url": "https://img/x.jpg"})).is_err());
    }

    #[test]
    fn test_host_error_shapes() {
        assert_eq!(host_error(&json!({"error": "Falta el publicId"})).as_deref(), Some("Falta el publicId"));
        assert_eq!(host_error(&json!({"error": {"message": "boom"}})).as_deref(), Some("boom"));
        assert_eq!(host_error(&json!({"result": "ok"})), None);
    }

    #[test]
    fn test_endpoints_and_config() {
        let client = CloudinaryClient::new("https://api.cloudinary.com/v1_1/", "stall", "product");
        assert_eq!(
            client.endpoint("upload"),
            "https://api.cloudinary.com/v1_1/stall/image/upload"
        );

        let mut config = MediaConfig::default();
        assert!(CloudinaryClient::from_config(&config).is_err());
        config.cloud_name = "stall".into();
        assert!(CloudinaryClient::from_config(&config).is_ok());

        assert!(DeleteEndpointClient::from_config(&config).unwrap().is_none());
        config.delete_endpoint = Some("https://stall.example/api/deleteImage".into());
        assert!(DeleteEndpointClient::from_config(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_destroy_without_credentials_fails_before_network() {
        let client = CloudinaryClient::new("http://127.0.0.1:9", "stall", "product");
        let err = client.destroy("x").await.unwrap_err();
        assert!(err.is_config_error());

        let err = client.destroy("  ").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_image_source_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torta.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let (name, bytes) = ImageSource::Path(path).into_part().await.unwrap();
        assert_eq!(name, "torta.png");
        assert_eq!(bytes, b"png-bytes");

        let missing = ImageSource::Path(dir.path().join("nope.png")).into_part().await;
        assert!(matches!(missing, Err(InventoryError::ImageFile(_))));
    }
}
