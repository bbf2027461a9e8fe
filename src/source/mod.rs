// src/source/mod.rs
//! Discovery sources that return historical CT entries for a domain

use anyhow::Result;
use async_trait::async_trait;

use crate::types::RawRecord;

pub mod crtsh;

pub use crtsh::CrtShClient;

/// Collaborator that returns every known CT entry for a domain
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch raw records; any error means the source is unavailable
    async fn search(&self, domain: &str) -> Result<Vec<RawRecord>>;
}
