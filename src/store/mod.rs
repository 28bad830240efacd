//! Remote chart store client.
//!
//! A stateless gateway over one table keyed by email. Each operation is a
//! single round trip: no retries, no caching.
//!
//! Modules:
//! - memory: in-process store with failure injection
//! - postgrest: Supabase/PostgREST HTTP gateway

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;

use crate::identity::Identity;
use crate::types::ChartData;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid stored values: {0}")]
    Invalid(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed record store for per-user chart values.
///
/// "No record" is an answer, not an error: `fetch` yields `Ok(None)` and
/// `exists` yields `Ok(false)`.
#[async_trait]
pub trait ChartStore: Send + Sync {
    async fn fetch(&self, key: &Identity) -> Result<Option<ChartData>, StoreError>;

    async fn exists(&self, key: &Identity) -> Result<bool, StoreError>;

    /// Insert or replace the whole record for `key`, stamping the current time.
    async fn upsert(&self, key: &Identity, value: &ChartData) -> Result<(), StoreError>;
}

/// Check for a saved record, degrading to `false` on failure.
pub async fn exists_or_false<S: ChartStore + ?Sized>(store: &S, key: &Identity) -> bool {
    match store.exists(key).await {
        Ok(found) => found,
        Err(e) => {
            log::error!("Error checking user {}: {}", key, e);
            false
        }
    }
}
