//! Product image source.
//!
//! Catalog data belongs to the catalog service; the pipeline only needs
//! the images and copy of one product at submission time.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_ref: String,
    pub project_ref: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Look up a product within a project. `None` when it does not exist.
    async fn product(&self, project_ref: &str, product_ref: &str)
        -> StoreResult<Option<ProductSnapshot>>;
}

/// `ImageSource` backed by a map, fed by the catalog sync or by tests.
#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<(String, String), ProductSnapshot>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, product: ProductSnapshot) {
        let key = (product.project_ref.clone(), product.product_ref.clone());
        self.products.write().await.insert(key, product);
    }
}

#[async_trait]
impl ImageSource for MemoryCatalog {
    async fn product(
        &self,
        project_ref: &str,
        product_ref: &str,
    ) -> StoreResult<Option<ProductSnapshot>> {
        let key = (project_ref.to_string(), product_ref.to_string());
        Ok(self.products.read().await.get(&key).cloned())
    }
}
