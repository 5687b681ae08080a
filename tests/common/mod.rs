//! Common test utilities for mdns tests

#![allow(dead_code)] // These functions are used by various test files

use std::sync::Arc;

use async_trait::async_trait;
use mdns::{
    DNSPacket, MdnsError,
    dns::{
        enums::{DNSResourceClass, DNSResourceType, ResponseCode},
        header::DNSHeader,
        question::DNSQuestion,
    },
    handler::MdnsHandler,
    storage::{MemoryStorage, RecordAction, ResourceRecordRow},
    transport::ResponseTransport,
};

pub const ZONE: &str = "example.com.";
pub const SOA_DATA: &str = "ns1.designate.com. admin.example.com. 1458672783 3600 600 86400 3600";

/// Create a basic test DNS query packet
pub fn create_test_query(domain: &str, qtype: DNSResourceType) -> DNSPacket {
    create_test_query_with_id(1234, domain, qtype)
}

/// Create a test DNS query packet with specific ID
pub fn create_test_query_with_id(id: u16, domain: &str, qtype: DNSResourceType) -> DNSPacket {
    let labels: Vec<String> = domain
        .trim_end_matches('.')
        .split('.')
        .map(|s| s.to_string())
        .collect();

    DNSPacket {
        header: DNSHeader {
            id,
            rd: true,
            qdcount: 1,
            ..Default::default()
        },
        questions: vec![DNSQuestion {
            labels,
            qtype,
            qclass: DNSResourceClass::IN,
        }],
        ..Default::default()
    }
}

/// Create a test DNS query packet with specific opcode
pub fn create_test_query_with_opcode(
    id: u16,
    opcode: u8,
    domain: &str,
    qtype: DNSResourceType,
) -> DNSPacket {
    let mut packet = create_test_query_with_id(id, domain, qtype);
    packet.header.opcode = opcode;
    packet
}

pub fn row(name: &str, rtype: &str, ttl: Option<i64>, data: &str) -> ResourceRecordRow {
    ResourceRecordRow {
        id: format!("{}-{}-{}", name, rtype, data),
        rtype: rtype.to_string(),
        ttl,
        name: name.to_string(),
        data: data.to_string(),
        action: RecordAction::Create,
    }
}

pub fn soa_row(zone: &str) -> ResourceRecordRow {
    row(zone, "SOA", None, SOA_DATA)
}

/// Zone rows: the SOA first, then `count - 1` A records
pub fn zone_rows(zone: &str, count: usize) -> Vec<ResourceRecordRow> {
    let mut rows = vec![soa_row(zone)];
    rows.extend((1..count).map(|i| {
        row(
            &format!("host{}.{}", i, zone),
            "A",
            Some(300),
            &format!("10.0.{}.{}", i / 256, i % 256),
        )
    }));
    rows
}

/// Memory storage holding `zone` with the given rows
pub fn storage_with(zone: &str, rows: Vec<ResourceRecordRow>) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.add_zone(zone, "zone-1", 3600);
    for row in rows {
        storage.add_row(zone, row);
    }
    storage
}

pub fn handler_for(storage: Arc<MemoryStorage>) -> MdnsHandler {
    MdnsHandler::new(storage, 3600)
}

/// Transport that records every message written to it
#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Vec<DNSPacket>,
    /// Fail every write after this many successful ones
    pub fail_after: Option<usize>,
}

impl RecordingTransport {
    pub fn failing_after(writes: usize) -> Self {
        Self {
            messages: Vec::new(),
            fail_after: Some(writes),
        }
    }

    pub fn only(&self) -> &DNSPacket {
        assert_eq!(self.messages.len(), 1, "expected exactly one reply");
        &self.messages[0]
    }

    pub fn rcode(&self) -> ResponseCode {
        ResponseCode::from_u8(self.only().header.rcode).expect("known rcode")
    }
}

#[async_trait]
impl ResponseTransport for RecordingTransport {
    async fn write_message(&mut self, message: &DNSPacket) -> Result<(), MdnsError> {
        if self.fail_after == Some(self.messages.len()) {
            return Err(MdnsError::Transport {
                envelopes_sent: 0,
                reason: "connection reset by peer".to_string(),
            });
        }
        // Every reply must survive the wire
        let bytes = message.serialize()?;
        self.messages.push(DNSPacket::parse(&bytes)?);
        Ok(())
    }

    fn peer_address(&self) -> String {
        "192.0.2.53:5353".to_string()
    }
}
