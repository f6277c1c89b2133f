pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod files;
pub mod messages;
pub mod models;
pub mod room;
pub mod server;
pub mod session;
pub mod store;
pub mod typing;

use std::sync::Arc;

use store::{ChatStore, MemoryStore, StoreError};

/// Opens the store the deployment asks for: SQL when a database URL is
/// given, memory otherwise.
pub async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn ChatStore>, StoreError> {
    match database_url {
        None => Ok(Arc::new(MemoryStore::new())),
        #[cfg(any(feature = "postgres", feature = "mysql"))]
        Some(url) => Ok(Arc::new(store::SqlStore::connect(url).await?)),
        #[cfg(not(any(feature = "postgres", feature = "mysql")))]
        Some(url) => Err(StoreError::UnsupportedUrl(url.to_string())),
    }
}
