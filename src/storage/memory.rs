use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ResourceRecordRow, Storage, Zone, ZoneTransferSet};
use crate::error::MdnsError;

#[derive(Debug, Clone)]
struct StoredZone {
    zone: Zone,
    rows: Vec<ResourceRecordRow>,
}

/// In-process zone store for tests and local runs.
///
/// Rows keep insertion order, which stands in for `created_at` ordering.
/// Names are matched case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    zones: RwLock<HashMap<String, StoredZone>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_zone(&self, name: &str, id: &str, default_ttl: u32) {
        self.zones.write().insert(
            name.to_ascii_lowercase(),
            StoredZone {
                zone: Zone {
                    id: id.to_string(),
                    default_ttl,
                },
                rows: Vec::new(),
            },
        );
    }

    /// Append a row to a zone added earlier. Returns false for unknown zones.
    pub fn add_row(&self, zone_name: &str, row: ResourceRecordRow) -> bool {
        match self.zones.write().get_mut(&zone_name.to_ascii_lowercase()) {
            Some(stored) => {
                stored.rows.push(row);
                true
            }
            None => false,
        }
    }

    /// Make every following call fail with a storage error
    pub fn fail_with(&self, reason: &str) {
        *self.failure.write() = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// Number of storage calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn begin_call(&self) -> Result<(), MdnsError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.failure.read().as_ref() {
            Some(reason) => Err(MdnsError::Storage(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_zone_transfer_set(
        &self,
        zone_name: &str,
    ) -> Result<ZoneTransferSet, MdnsError> {
        self.begin_call()?;
        let zones = self.zones.read();
        let stored = zones
            .get(&zone_name.to_ascii_lowercase())
            .ok_or_else(|| MdnsError::ZoneNotFound(zone_name.to_string()))?;

        Ok(ZoneTransferSet {
            zone: stored.zone.clone(),
            rows: stored
                .rows
                .iter()
                .filter(|row| !row.action.is_tombstone())
                .cloned()
                .collect(),
        })
    }

    async fn fetch_records(
        &self,
        name: &str,
        rtype: &str,
    ) -> Result<Vec<ResourceRecordRow>, MdnsError> {
        self.begin_call()?;
        let zones = self.zones.read();
        let rows = zones
            .values()
            .flat_map(|stored| stored.rows.iter())
            .filter(|row| !row.action.is_tombstone())
            .filter(|row| row.name.eq_ignore_ascii_case(name))
            .filter(|row| rtype == "ANY" || row.rtype.eq_ignore_ascii_case(rtype))
            .cloned()
            .collect();
        Ok(rows)
    }
}
