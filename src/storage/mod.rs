//! Read-only access to zone data.
//!
//! The dispatcher only ever sees the [`Storage`] trait; one implementation is
//! built at startup and shared behind an `Arc`.

pub mod memory;
pub mod sql;

use async_trait::async_trait;

use crate::error::MdnsError;

pub use memory::MemoryStorage;
pub use sql::SqlStorage;

/// Zone metadata needed to materialize a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub default_ttl: u32,
}

/// Lifecycle marker carried by every record row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordAction {
    Create,
    Update,
    Delete,
    #[default]
    None,
}

impl RecordAction {
    /// Unrecognised values are treated as live records
    pub fn from_db(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "CREATE" => RecordAction::Create,
            "UPDATE" => RecordAction::Update,
            "DELETE" => RecordAction::Delete,
            _ => RecordAction::None,
        }
    }

    pub fn is_tombstone(self) -> bool {
        self == RecordAction::Delete
    }
}

/// One raw record as stored, before materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordRow {
    pub id: String,
    /// Record type mnemonic ("A", "SOA", ...)
    pub rtype: String,
    /// Per-recordset TTL; `None` falls back to the zone default
    pub ttl: Option<i64>,
    pub name: String,
    /// RDATA in presentation format
    pub data: String,
    pub action: RecordAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTransferSet {
    pub zone: Zone,
    pub rows: Vec<ResourceRecordRow>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Zone metadata plus every live row of the zone, oldest recordset first
    async fn fetch_zone_transfer_set(&self, zone_name: &str)
    -> Result<ZoneTransferSet, MdnsError>;

    /// Rows whose owner is `name`; `rtype == "ANY"` matches every type
    async fn fetch_records(
        &self,
        name: &str,
        rtype: &str,
    ) -> Result<Vec<ResourceRecordRow>, MdnsError>;
}
