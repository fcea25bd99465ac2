//! # Catalog Manager
//!
//! Product create/edit/delete as the product screen performs them, including
//! the hosted image lifecycle.
//!
//! ## Image Lifecycle
//! ```text
//! create   Upload(src) ──► uploader ──► Hosted{url, publicId} ──► add_product
//!          (add fails) ──► destroy the fresh upload
//!
//! edit     new image != old image, old has publicId
//!          ──► update_product ──► destroy old publicId
//!          (update fails) ──► destroy the fresh upload, keep the old one
//!
//! delete   old has publicId ──► destroy ──► remove_product
//!
//! Destroy failures are logged and never fail the operation.
//! ```

use std::sync::Arc;

use puesto_core::{validation, CoreError, NewProduct, ProductImage, ProductPatch};
use tracing::{debug, info, warn};

use crate::coordinator::InventoryCoordinator;
use crate::error::{InventoryError, InventoryResult};
use crate::media::{ImageDestroyer, ImageSource, ImageUploader};

/// Image picked in the product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChoice {
    /// Keep or assign an image that is already hosted or bundled.
    Existing(ProductImage),
    /// A local file that must be uploaded first.
    Upload(ImageSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub price_cents: i64,
    /// `None` on edit leaves the current image as it is.
    pub image: Option<ImageChoice>,
}

pub struct CatalogManager {
    coordinator: Arc<InventoryCoordinator>,
    uploader: Option<Arc<dyn ImageUploader>>,
    destroyer: Option<Arc<dyn ImageDestroyer>>,
}

impl CatalogManager {
    pub fn new(coordinator: Arc<InventoryCoordinator>) -> Self {
        CatalogManager {
            coordinator,
            uploader: None,
            destroyer: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_destroyer(mut self, destroyer: Arc<dyn ImageDestroyer>) -> Self {
        self.destroyer = Some(destroyer);
        self
    }

    /// Creates a product and returns its id.
    pub async fn create(&self, form: ProductForm) -> InventoryResult<String> {
        let name = validation::validate_product_name(&form.name)?;
        validation::validate_price_cents(form.price_cents)?;

        let (image, uploaded) = match form.image {
            Some(choice) => self.resolve_image(choice).await?,
            None => (None, false),
        };

        let result = self
            .coordinator
            .add_product(NewProduct {
                name,
                price_cents: form.price_cents,
                image: image.clone(),
            })
            .await;

        if result.is_err() && uploaded {
            if let Some(public_id) = image.as_ref().and_then(|i| i.public_id()) {
                self.destroy_quietly(public_id).await;
            }
        }
        result
    }

    /// Edits a product. A replaced hosted image is deleted afterwards.
    pub async fn edit(&self, product_id: &str, form: ProductForm) -> InventoryResult<()> {
        let current = self
            .coordinator
            .product(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let name = validation::validate_product_name(&form.name)?;
        validation::validate_price_cents(form.price_cents)?;

        let (new_image, uploaded) = match form.image {
            Some(choice) => self.resolve_image(choice).await?,
            None => (None, false),
        };

        let patch = ProductPatch {
            name: Some(name),
            price_cents: Some(form.price_cents),
            image: new_image.clone(),
        };
        if let Err(e) = self.coordinator.update_product(product_id, patch).await {
            if uploaded {
                if let Some(public_id) = new_image.as_ref().and_then(|i| i.public_id()) {
                    self.destroy_quietly(public_id).await;
                }
            }
            return Err(e);
        }

        if let (Some(new), Some(old)) = (new_image.as_ref(), current.image.as_ref()) {
            if new != old {
                if let Some(old_public_id) = old.public_id() {
                    self.destroy_quietly(old_public_id).await;
                }
            }
        }

        info!(product_id = %product_id, "Product edited");
        Ok(())
    }

    /// Deletes a product and its hosted image.
    pub async fn delete(&self, product_id: &str) -> InventoryResult<()> {
        let current = self
            .coordinator
            .product(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if let Some(public_id) = current.image.as_ref().and_then(|i| i.public_id()) {
            self.destroy_quietly(public_id).await;
        }

        self.coordinator.remove_product(product_id).await
    }

    /// Returns the image to store and whether it was uploaded just now.
    async fn resolve_image(
        &self,
        choice: ImageChoice,
    ) -> InventoryResult<(Option<ProductImage>, bool)> {
        match choice {
            ImageChoice::Existing(image) => Ok((Some(image), false)),
            ImageChoice::Upload(source) => {
                let uploader = self.uploader.as_ref().ok_or_else(|| {
                    InventoryError::InvalidConfig("no image uploader configured".into())
                })?;
                let uploaded = uploader.upload(source).await?;
                Ok((Some(uploaded.into()), true))
            }
        }
    }

    async fn destroy_quietly(&self, public_id: &str) {
        let Some(destroyer) = self.destroyer.as_ref() else {
            debug!(public_id = %public_id, "No image destroyer configured, keeping image");
            return;
        };
        match destroyer.destroy(public_id).await {
            Ok(result) => debug!(public_id = %public_id, %result, "Hosted image deleted"),
            Err(e) => warn!(public_id = %public_id, error = %e, "Failed to delete hosted image"),
        }
    }
}
