// src/database/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{InventoryStore, RunMetadataStore};
use crate::types::InventoryEntry;

type EntryKey = (String, String, String);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunStamp {
    domain: String,
    category: String,
    last_run: DateTime<Utc>,
}

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    assets: Vec<InventoryEntry>,
    #[serde(default)]
    runs: Vec<RunStamp>,
}

#[derive(Default, Clone)]
struct Inventory {
    assets: BTreeMap<EntryKey, InventoryEntry>,
    runs: BTreeMap<(String, String), DateTime<Utc>>,
}

/// File-backed inventory and run metadata
///
/// Every committed write rewrites the TOML file through a temporary file
/// and rename, so a crash never leaves a half-written inventory.
pub struct FileInventory {
    path: PathBuf,
    state: Arc<Mutex<Inventory>>,
}

impl FileInventory {
    /// Open the inventory file, starting empty if it does not exist
    pub async fn open(path: PathBuf) -> Result<Self> {
        let mut inventory = Inventory::default();

        if path.exists() {
            info!("Loading inventory from {:?}", path);

            let contents = fs::read_to_string(&path)
                .await
                .context("Failed to read inventory file")?;

            let loaded: InventoryFile =
                toml::from_str(&contents).context("Failed to parse inventory file")?;

            for entry in loaded.assets {
                inventory.assets.insert(entry.key(), entry);
            }
            for stamp in loaded.runs {
                inventory
                    .runs
                    .insert((stamp.domain, stamp.category), stamp.last_run);
            }

            info!("Loaded {} inventory entries", inventory.assets.len());
        } else {
            info!("Inventory file {:?} does not exist, starting fresh", path);
        }

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(inventory)),
        })
    }

    /// Number of stored entries
    pub async fn count(&self) -> usize {
        self.state.lock().await.assets.len()
    }

    /// Last recorded run for (domain, category)
    pub async fn last_run(&self, domain: &str, category: &str) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state
            .runs
            .get(&(domain.to_string(), category.to_string()))
            .copied()
    }

    /// Write `candidate` to disk and only then make it the live state
    ///
    /// Caller holds the state lock, which also serializes file writes. On
    /// error the live state is left as it was.
    async fn commit(&self, state: &mut Inventory, candidate: Inventory) -> Result<()> {
        self.persist(&candidate).await?;
        *state = candidate;
        Ok(())
    }

    async fn persist(&self, inventory: &Inventory) -> Result<()> {
        let file = InventoryFile {
            assets: inventory.assets.values().cloned().collect(),
            runs: inventory
                .runs
                .iter()
                .map(|((domain, category), last_run)| RunStamp {
                    domain: domain.clone(),
                    category: category.clone(),
                    last_run: *last_run,
                })
                .collect(),
        };

        let toml_string =
            toml::to_string(&file).context("Failed to serialize inventory to TOML")?;

        let temp_path = self.path.with_extension("tmp");

        fs::write(&temp_path, toml_string)
            .await
            .context("Failed to write inventory to temporary file")?;

        fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to rename temporary inventory file")?;

        debug!("Inventory saved ({} entries)", file.assets.len());

        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FileInventory {
    async fn find(
        &self,
        domain: &str,
        value_type: &str,
        value_name: &str,
    ) -> Result<Option<InventoryEntry>> {
        let state = self.state.lock().await;
        let key = (
            domain.to_string(),
            value_type.to_string(),
            value_name.to_string(),
        );
        Ok(state.assets.get(&key).cloned())
    }

    async fn upsert(&self, entry: &InventoryEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut candidate = state.clone();

        match candidate.assets.get_mut(&entry.key()) {
            // Discovery metadata stays as first recorded
            Some(existing) => existing.expiry_date = entry.expiry_date,
            None => {
                candidate.assets.insert(entry.key(), entry.clone());
            }
        }

        self.commit(&mut state, candidate).await
    }
}

#[async_trait]
impl RunMetadataStore for FileInventory {
    async fn has_existing_data(&self, domain: &str, source_tag: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .assets
            .values()
            .any(|e| e.domain == domain && e.discovered_by == source_tag))
    }

    async fn record_run_timestamp(&self, domain: &str, category: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut candidate = state.clone();
        candidate
            .runs
            .insert((domain.to_string(), category.to_string()), Utc::now());
        self.commit(&mut state, candidate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SSL_CERTIFICATE;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(name: &str, expiry: (i32, u32, u32)) -> InventoryEntry {
        InventoryEntry {
            domain: "example.com".to_string(),
            value_type: SSL_CERTIFICATE.to_string(),
            value_name: name.to_string(),
            expiry_date: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
            discovered_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            discovered_by: "pycrtsh".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.toml");

        let store = FileInventory::open(path.clone()).await.unwrap();
        assert_eq!(store.count().await, 0);

        store.upsert(&entry("www.example.com", (2025, 1, 1))).await.unwrap();
        store.upsert(&entry("api.example.com", (2025, 2, 1))).await.unwrap();

        let reopened = FileInventory::open(path).await.unwrap();
        assert_eq!(reopened.count().await, 2);

        let found = reopened
            .find("example.com", SSL_CERTIFICATE, "api.example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.expiry_date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[tokio::test]
    async fn test_upsert_only_moves_expiry() {
        let dir = TempDir::new().unwrap();
        let store = FileInventory::open(dir.path().join("inventory.toml")).await.unwrap();

        store.upsert(&entry("www.example.com", (2025, 1, 1))).await.unwrap();

        let mut changed = entry("www.example.com", (2026, 1, 1));
        changed.discovered_date = NaiveDate::from_ymd_opt(2024, 9, 9).unwrap();
        store.upsert(&changed).await.unwrap();

        let found = store
            .find("example.com", SSL_CERTIFICATE, "www.example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(found.discovered_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_existing_data_by_source_tag() {
        let dir = TempDir::new().unwrap();
        let store = FileInventory::open(dir.path().join("inventory.toml")).await.unwrap();

        assert!(!store.has_existing_data("example.com", "pycrtsh").await.unwrap());

        store.upsert(&entry("www.example.com", (2025, 1, 1))).await.unwrap();

        assert!(store.has_existing_data("example.com", "pycrtsh").await.unwrap());
        assert!(!store.has_existing_data("example.com", "other-tool").await.unwrap());
        assert!(!store.has_existing_data("other.com", "pycrtsh").await.unwrap());
    }

    #[tokio::test]
    async fn test_run_timestamp_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.toml");

        let store = FileInventory::open(path.clone()).await.unwrap();
        assert!(store.last_run("example.com", "asset_discovery").await.is_none());

        store
            .record_run_timestamp("example.com", "asset_discovery")
            .await
            .unwrap();

        let reopened = FileInventory::open(path).await.unwrap();
        assert!(reopened.last_run("example.com", "asset_discovery").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let path = nested.join("inventory.toml");

        let store = FileInventory::open(path.clone()).await.unwrap();
        std::fs::remove_dir(&nested).unwrap();

        assert!(store.upsert(&entry("failed.example.com", (2025, 1, 1))).await.is_err());
        assert!(store
            .record_run_timestamp("example.com", "asset_discovery")
            .await
            .is_err());

        assert!(store
            .find("example.com", SSL_CERTIFICATE, "failed.example.com")
            .await
            .unwrap()
            .is_none());
        assert!(!store.has_existing_data("example.com", "pycrtsh").await.unwrap());
        assert!(store.last_run("example.com", "asset_discovery").await.is_none());

        // A later successful write does not resurrect the failed entry
        std::fs::create_dir(&nested).unwrap();
        store.upsert(&entry("www.example.com", (2025, 1, 1))).await.unwrap();

        let reopened = FileInventory::open(path).await.unwrap();
        assert_eq!(reopened.count().await, 1);
        assert!(reopened
            .find("example.com", SSL_CERTIFICATE, "failed.example.com")
            .await
            .unwrap()
            .is_none());
        assert!(reopened.last_run("example.com", "asset_discovery").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        assert!(FileInventory::open(path).await.is_err());
    }
}
