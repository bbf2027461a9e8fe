// src/database/mod.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::types::InventoryEntry;

pub mod file;
pub mod postgres;

pub use file::FileInventory;
pub use postgres::PostgresBackend;

/// Persistent asset inventory
///
/// Writes are per entry; implementations give at least last-write-wins per key.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Look up an entry by its composite key
    async fn find(
        &self,
        domain: &str,
        value_type: &str,
        value_name: &str,
    ) -> Result<Option<InventoryEntry>>;

    /// Insert the entry, or overwrite its expiry if the key already exists
    async fn upsert(&self, entry: &InventoryEntry) -> Result<()>;
}

/// Bookkeeping about previous runs
#[async_trait]
pub trait RunMetadataStore: Send + Sync {
    /// Whether any inventory entry for this domain came from `source_tag`
    async fn has_existing_data(&self, domain: &str, source_tag: &str) -> Result<bool>;

    /// Stamp the time of a successful run for (domain, category)
    async fn record_run_timestamp(&self, domain: &str, category: &str) -> Result<()>;
}
