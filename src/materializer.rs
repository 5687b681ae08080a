//! Turns stored record rows into typed resource records.

use tracing::{debug, error, warn};

use crate::dns::{enums::DNSResourceType, presentation, resource::DNSResource};
use crate::error::MdnsError;
use crate::storage::ResourceRecordRow;

/// Largest TTL accepted from storage (RFC 2181 section 8)
pub const MAX_TTL: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// Rows kept in order, SOA treated like any other record
    Query,
    /// SOA moved to the first and last position
    Transfer,
}

/// Row TTL when present and within range, otherwise the zone default
pub fn resolve_ttl(row_ttl: Option<i64>, default_ttl: u32) -> u32 {
    match row_ttl {
        Some(ttl) if (0..=MAX_TTL).contains(&ttl) => ttl as u32,
        Some(ttl) => {
            warn!("Ignoring out of range TTL {}, using {}", ttl, default_ttl);
            default_ttl
        }
        None => default_ttl,
    }
}

/// Presentation line for a row: `name ttl IN type data`
pub fn render(row: &ResourceRecordRow, default_ttl: u32) -> String {
    format!(
        "{} {} IN {} {}",
        row.name,
        resolve_ttl(row.ttl, default_ttl),
        row.rtype,
        row.data
    )
}

pub fn materialize(
    rows: &[ResourceRecordRow],
    default_ttl: u32,
    mode: Materialization,
) -> Result<Vec<DNSResource>, MdnsError> {
    let mut records = Vec::with_capacity(rows.len() + 1);
    let mut soa: Option<DNSResource> = None;

    for row in rows.iter().filter(|row| !row.action.is_tombstone()) {
        let line = render(row, default_ttl);
        let record = presentation::parse_record(&line).map_err(|e| {
            error!("Error parsing record {}: {}", line, e);
            MdnsError::Validation {
                record: line.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!("Processed record {}", line);

        if mode == Materialization::Transfer && record.rtype == DNSResourceType::SOA {
            if soa.is_some() {
                warn!("Multiple SOA rows for {}, keeping the last", record.name());
            }
            soa = Some(record);
        } else {
            records.push(record);
        }
    }

    if mode == Materialization::Transfer {
        let soa = soa.ok_or(MdnsError::MissingSoa)?;
        records.insert(0, soa.clone());
        records.push(soa);
    }

    Ok(records)
}
