// src/database/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use super::{InventoryStore, RunMetadataStore};
use crate::types::InventoryEntry;

/// PostgreSQL inventory backend
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create new PostgreSQL backend
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        // sqlx 0.8.x doesn't recognize 'channel_binding' parameter from Neon
        let cleaned_url = Self::clean_connection_string(database_url);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&cleaned_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        info!("Connected to PostgreSQL successfully");

        Ok(Self { pool })
    }

    /// Remove connection string parameters sqlx does not understand
    fn clean_connection_string(url_str: &str) -> String {
        use url::Url;

        let Ok(mut url) = Url::parse(url_str) else {
            return url_str.to_string();
        };

        let unsupported_params = ["channel_binding"];

        let cleaned_pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !unsupported_params.contains(&key.as_ref()))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if cleaned_pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(cleaned_pairs);
        }

        url.to_string()
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assets (
                domain TEXT NOT NULL,
                value_type TEXT NOT NULL,
                value_name TEXT NOT NULL,
                expiry_date DATE NOT NULL,
                discovered_date DATE NOT NULL,
                discovered_by TEXT NOT NULL,
                PRIMARY KEY (domain, value_type, value_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create assets table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_assets_domain_discovered_by
            ON assets(domain, discovered_by)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on assets(domain, discovered_by)")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_log (
                domain TEXT NOT NULL,
                category TEXT NOT NULL,
                last_run TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (domain, category)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create run_log table")?;

        info!("Database migrations completed successfully");

        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl InventoryStore for PostgresBackend {
    async fn find(
        &self,
        domain: &str,
        value_type: &str,
        value_name: &str,
    ) -> Result<Option<InventoryEntry>> {
        let row = sqlx::query(
            r#"
            SELECT domain, value_type, value_name, expiry_date, discovered_date, discovered_by
            FROM assets
            WHERE domain = $1 AND value_type = $2 AND value_name = $3
            "#,
        )
        .bind(domain)
        .bind(value_type)
        .bind(value_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch asset")?;

        Ok(row.map(|r| InventoryEntry {
            domain: r.get("domain"),
            value_type: r.get("value_type"),
            value_name: r.get("value_name"),
            expiry_date: r.get::<NaiveDate, _>("expiry_date"),
            discovered_date: r.get::<NaiveDate, _>("discovered_date"),
            discovered_by: r.get("discovered_by"),
        }))
    }

    async fn upsert(&self, entry: &InventoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assets (
                domain, value_type, value_name, expiry_date, discovered_date, discovered_by
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (domain, value_type, value_name)
            DO UPDATE SET expiry_date = EXCLUDED.expiry_date
            "#,
        )
        .bind(&entry.domain)
        .bind(&entry.value_type)
        .bind(&entry.value_name)
        .bind(entry.expiry_date)
        .bind(entry.discovered_date)
        .bind(&entry.discovered_by)
        .execute(&self.pool)
        .await
        .context("Failed to upsert asset")?;

        debug!("Upserted asset {} of {}", entry.value_name, entry.domain);

        Ok(())
    }
}

#[async_trait]
impl RunMetadataStore for PostgresBackend {
    async fn has_existing_data(&self, domain: &str, source_tag: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM assets WHERE domain = $1 AND discovered_by = $2 LIMIT 1
            "#,
        )
        .bind(domain)
        .bind(source_tag)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check for existing assets")?;

        Ok(row.is_some())
    }

    async fn record_run_timestamp(&self, domain: &str, category: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_log (domain, category, last_run)
            VALUES ($1, $2, NOW())
            ON CONFLICT (domain, category)
            DO UPDATE SET last_run = NOW()
            "#,
        )
        .bind(domain)
        .bind(category)
        .execute(&self.pool)
        .await
        .context("Failed to record run timestamp")?;

        Ok(())
    }
}
