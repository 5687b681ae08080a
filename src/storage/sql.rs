//! Designate schema reader over a sqlx `Any` pool.
//!
//! The driver (MySQL or SQLite) is picked from the URL scheme. Only three
//! statements are ever issued, all read-only.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use super::{RecordAction, ResourceRecordRow, Storage, Zone, ZoneTransferSet};
use crate::config::StorageConfig;
use crate::error::MdnsError;

const ZONE_QUERY: &str = r#"
    SELECT zones.id, zones.ttl
    FROM zones
    WHERE zones.name = ?
    AND zones.pool_id = ?
    AND zones.deleted = '0'"#;

const ZONE_RECORDS_QUERY: &str = r#"
    SELECT recordsets.id, CAST(recordsets.type AS CHAR) AS type, recordsets.ttl,
           recordsets.name, records.data, CAST(records.action AS CHAR) AS action
    FROM records
    INNER JOIN recordsets ON records.recordset_id = recordsets.id
    WHERE records.action != 'DELETE'
    AND recordsets.zone_id = ?
    ORDER BY recordsets.created_at"#;

const NAME_RECORDS_QUERY: &str = r#"
    SELECT recordsets.id, CAST(recordsets.type AS CHAR) AS type, recordsets.ttl,
           recordsets.name, records.data, CAST(records.action AS CHAR) AS action
    FROM records
    INNER JOIN recordsets ON records.recordset_id = recordsets.id
    WHERE records.action != 'DELETE'
    AND recordsets.name = ?"#;

pub struct SqlStorage {
    pool: AnyPool,
    pool_id: String,
    timeout: Duration,
}

impl SqlStorage {
    /// Open the pool and ping the database. Fails when it is unreachable.
    pub async fn connect(config: &StorageConfig) -> Result<Self, MdnsError> {
        sqlx::any::install_default_drivers();

        let timeout = Duration::from_secs(config.timeout_secs);
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect(&config.url)
            .await?;

        let storage = Self::from_pool(pool, config.pool_id.clone(), timeout);
        storage.ping().await?;
        info!("Connected to the zone database");
        Ok(storage)
    }

    /// Wrap an existing pool, e.g. one prepared by a test
    pub fn from_pool(pool: AnyPool, pool_id: String, timeout: Duration) -> Self {
        Self {
            pool,
            pool_id,
            timeout,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), MdnsError> {
        self.bounded(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, MdnsError>(())
        })
        .await
    }

    async fn fetch_zone(&self, zone_name: &str) -> Result<Zone, MdnsError> {
        let row = self
            .bounded(async {
                Ok::<_, MdnsError>(sqlx::query(ZONE_QUERY)
                    .bind(zone_name)
                    .bind(self.pool_id.as_str())
                    .fetch_optional(&self.pool)
                    .await?)
            })
            .await?
            .ok_or_else(|| MdnsError::ZoneNotFound(zone_name.to_string()))?;

        let id: String = row.try_get("id")?;
        let ttl: i64 = row.try_get("ttl")?;
        let default_ttl = u32::try_from(ttl)
            .map_err(|_| MdnsError::Storage(format!("zone {} has invalid TTL {}", zone_name, ttl)))?;

        Ok(Zone { id, default_ttl })
    }

    /// Apply the configured timeout to one storage call
    async fn bounded<T, F>(&self, fut: F) -> Result<T, MdnsError>
    where
        F: Future<Output = Result<T, MdnsError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| MdnsError::Storage(format!("query timed out after {:?}", self.timeout)))?
    }
}

fn record_row(row: &AnyRow) -> Result<ResourceRecordRow, MdnsError> {
    let action: Option<String> = row.try_get("action")?;
    Ok(ResourceRecordRow {
        id: row.try_get("id")?,
        rtype: row.try_get("type")?,
        ttl: row.try_get("ttl")?,
        name: row.try_get("name")?,
        data: row.try_get("data")?,
        action: action
            .as_deref()
            .map(RecordAction::from_db)
            .unwrap_or_default(),
    })
}

#[async_trait]
impl Storage for SqlStorage {
    async fn fetch_zone_transfer_set(
        &self,
        zone_name: &str,
    ) -> Result<ZoneTransferSet, MdnsError> {
        let zone = self.fetch_zone(zone_name).await?;

        let rows = self
            .bounded(async {
                Ok::<_, MdnsError>(sqlx::query(ZONE_RECORDS_QUERY)
                    .bind(zone.id.as_str())
                    .fetch_all(&self.pool)
                    .await?)
            })
            .await?;
        let rows = rows.iter().map(record_row).collect::<Result<Vec<_>, _>>()?;

        debug!("Fetched {} rows for zone {}", rows.len(), zone_name);
        Ok(ZoneTransferSet { zone, rows })
    }

    async fn fetch_records(
        &self,
        name: &str,
        rtype: &str,
    ) -> Result<Vec<ResourceRecordRow>, MdnsError> {
        let rows = self
            .bounded(async {
                let rows = if rtype == "ANY" {
                    sqlx::query(NAME_RECORDS_QUERY)
                        .bind(name)
                        .fetch_all(&self.pool)
                        .await?
                } else {
                    let statement = format!("{} AND recordsets.type = ?", NAME_RECORDS_QUERY);
                    sqlx::query(&statement)
                        .bind(name)
                        .bind(rtype)
                        .fetch_all(&self.pool)
                        .await?
                };
                Ok::<_, MdnsError>(rows)
            })
            .await?;

        let rows = rows.iter().map(record_row).collect::<Result<Vec<_>, _>>()?;
        debug!("Fetched {} rows for {} {}", rows.len(), name, rtype);
        Ok(rows)
    }
}
