mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use mdns::{
    DNSPacket, HandleOutcome, MdnsError,
    dns::{
        enums::{DNSResourceClass, DNSResourceType, ResponseCode},
        question::DNSQuestion,
        resource::DNSResource,
    },
    handler::{MdnsHandler, QueryStrategy, StandardAxfr},
    storage::{RecordAction, Storage},
    transport::TcpTransport,
};

fn assert_authoritative_echo(request: &DNSPacket, reply: &DNSPacket) {
    assert!(reply.header.qr);
    assert!(reply.header.aa);
    assert!(!reply.header.ra);
    assert_eq!(reply.header.id, request.header.id);
    assert_eq!(reply.header.opcode, request.header.opcode);
    assert_eq!(reply.questions, request.questions);
}

#[tokio::test]
async fn soa_query_is_answered() {
    let storage = storage_with(ZONE, vec![soa_row(ZONE)]);
    let handler = handler_for(storage.clone());
    let request = create_test_query(ZONE, DNSResourceType::SOA);
    let mut transport = RecordingTransport::default();

    let outcome = handler.handle(&request, &mut transport).await;

    assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::NoError));
    let reply = transport.only();
    assert_authoritative_echo(&request, reply);
    assert_eq!(transport.rcode(), ResponseCode::NoError);
    assert_eq!(reply.answers.len(), 1);
    assert_eq!(reply.answers[0].rtype, DNSResourceType::SOA);
    assert_eq!(reply.answers[0].ttl, 3600);
}

#[tokio::test]
async fn query_without_rows_is_refused() {
    let storage = storage_with(ZONE, vec![soa_row(ZONE)]);
    let handler = handler_for(storage);
    let request = create_test_query("ghost.example.com.", DNSResourceType::A);
    let mut transport = RecordingTransport::default();

    let outcome = handler.handle(&request, &mut transport).await;

    assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::Refused));
    assert_eq!(transport.rcode(), ResponseCode::Refused);
    assert!(transport.only().answers.is_empty());
    assert_authoritative_echo(&request, transport.only());
}

#[tokio::test]
async fn tombstones_count_as_no_rows() {
    let mut deleted = row("gone.example.com.", "A", None, "192.0.2.7");
    deleted.action = RecordAction::Delete;
    let storage = storage_with(ZONE, vec![soa_row(ZONE), deleted]);
    let handler = handler_for(storage);
    let mut transport = RecordingTransport::default();

    handler
        .handle(
            &create_test_query("gone.example.com.", DNSResourceType::A),
            &mut transport,
        )
        .await;

    assert_eq!(transport.rcode(), ResponseCode::Refused);
}

#[tokio::test]
async fn any_query_returns_every_type_in_order() {
    let storage = storage_with(
        ZONE,
        vec![
            soa_row(ZONE),
            row("www.example.com.", "A", Some(60), "192.0.2.1"),
            row("www.example.com.", "AAAA", None, "2001:db8::1"),
            row("www.example.com.", "TXT", Some(60), "\"hello world\""),
        ],
    );
    let handler = handler_for(storage);
    let mut transport = RecordingTransport::default();

    handler
        .handle(
            &create_test_query("www.example.com.", DNSResourceType::ANY),
            &mut transport,
        )
        .await;

    let reply = transport.only();
    let types: Vec<_> = reply.answers.iter().map(|rr| rr.rtype).collect();
    assert_eq!(
        types,
        vec![
            DNSResourceType::A,
            DNSResourceType::AAAA,
            DNSResourceType::TXT
        ]
    );
    assert_eq!(reply.answers[1].ttl, 3600);
}

#[tokio::test]
async fn query_names_are_case_insensitive() {
    let storage = storage_with(
        ZONE,
        vec![row("www.example.com.", "A", Some(60), "192.0.2.1")],
    );
    let handler = handler_for(storage);
    let request = create_test_query("WWW.Example.COM.", DNSResourceType::A);
    let mut transport = RecordingTransport::default();

    handler.handle(&request, &mut transport).await;

    assert_eq!(transport.rcode(), ResponseCode::NoError);
    // The question is echoed exactly as asked
    assert_eq!(transport.only().questions[0].name(), "WWW.Example.COM.");
}

#[tokio::test]
async fn ixfr_is_refused_without_touching_storage() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 5));
    let handler = handler_for(storage.clone());
    let mut transport = RecordingTransport::default();

    let outcome = handler
        .handle(&create_test_query(ZONE, DNSResourceType::IXFR), &mut transport)
        .await;

    assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::Refused));
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn non_query_opcodes_are_refused() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 5));
    let handler = handler_for(storage.clone());

    for opcode in [1u8, 2, 4, 5, 6, 15] {
        let request = create_test_query_with_opcode(77, opcode, ZONE, DNSResourceType::SOA);
        let mut transport = RecordingTransport::default();

        let outcome = handler.handle(&request, &mut transport).await;

        assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::Refused));
        assert_authoritative_echo(&request, transport.only());
    }
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn missing_question_is_a_format_error() {
    let storage = storage_with(ZONE, Vec::new());
    let handler = handler_for(storage.clone());
    let mut request = create_test_query(ZONE, DNSResourceType::SOA);
    request.questions.clear();
    let mut transport = RecordingTransport::default();

    let outcome = handler.handle(&request, &mut transport).await;

    assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::FormatError));
    assert!(transport.only().questions.is_empty());
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn storage_failure_is_servfail() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 3));
    storage.fail_with("connection refused");
    let handler = handler_for(storage);

    let mut transport = RecordingTransport::default();
    handler
        .handle(&create_test_query(ZONE, DNSResourceType::SOA), &mut transport)
        .await;
    assert_eq!(transport.rcode(), ResponseCode::ServerFailure);

    let mut transport = RecordingTransport::default();
    handler
        .handle(&create_test_query(ZONE, DNSResourceType::AXFR), &mut transport)
        .await;
    assert_eq!(transport.rcode(), ResponseCode::ServerFailure);
}

#[tokio::test]
async fn unparseable_row_is_servfail() {
    let storage = storage_with(
        ZONE,
        vec![row("bad.example.com.", "A", None, "not-an-address")],
    );
    let handler = handler_for(storage);
    let mut transport = RecordingTransport::default();

    handler
        .handle(
            &create_test_query("bad.example.com.", DNSResourceType::A),
            &mut transport,
        )
        .await;

    assert_eq!(transport.rcode(), ResponseCode::ServerFailure);
}

#[tokio::test]
async fn axfr_streams_envelopes_of_one_hundred() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 250));
    let handler = handler_for(storage);
    let request = create_test_query(ZONE, DNSResourceType::AXFR);
    let mut transport = RecordingTransport::default();

    let outcome = handler.handle(&request, &mut transport).await;

    assert_eq!(
        outcome,
        HandleOutcome::Transferred {
            envelopes: 3,
            records: 251
        }
    );
    let sizes: Vec<_> = transport.messages.iter().map(|m| m.answers.len()).collect();
    assert_eq!(sizes, vec![100, 100, 51]);

    for envelope in &transport.messages {
        assert_authoritative_echo(&request, envelope);
        assert_eq!(envelope.header.rcode, ResponseCode::NoError.to_u8());
    }

    let records: Vec<DNSResource> = transport
        .messages
        .iter()
        .flat_map(|m| m.answers.clone())
        .collect();
    assert_eq!(records.first().map(|r| r.rtype), Some(DNSResourceType::SOA));
    assert_eq!(records.first(), records.last());
    assert_eq!(
        records
            .iter()
            .filter(|r| r.rtype == DNSResourceType::SOA)
            .count(),
        2
    );
    assert_eq!(records[1].name(), "host1.example.com.");
    assert_eq!(records[249].name(), "host249.example.com.");
}

#[tokio::test]
async fn axfr_without_soa_is_servfail() {
    let rows = zone_rows(ZONE, 4).into_iter().skip(1).collect();
    let storage = storage_with(ZONE, rows);
    let handler = handler_for(storage);
    let mut transport = RecordingTransport::default();

    handler
        .handle(&create_test_query(ZONE, DNSResourceType::AXFR), &mut transport)
        .await;

    assert_eq!(transport.rcode(), ResponseCode::ServerFailure);
    assert!(transport.only().answers.is_empty());
}

#[tokio::test]
async fn axfr_of_empty_or_unknown_zone_is_servfail() {
    let storage = storage_with(ZONE, Vec::new());
    let handler = handler_for(storage);

    for zone in [ZONE, "unknown.test."] {
        let mut transport = RecordingTransport::default();
        handler
            .handle(&create_test_query(zone, DNSResourceType::AXFR), &mut transport)
            .await;
        assert_eq!(transport.rcode(), ResponseCode::ServerFailure);
    }
}

#[tokio::test]
async fn axfr_stops_at_first_failed_write() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 250));
    let handler = handler_for(storage);
    let mut transport = RecordingTransport::failing_after(1);

    let outcome = handler
        .handle(&create_test_query(ZONE, DNSResourceType::AXFR), &mut transport)
        .await;

    assert_eq!(outcome, HandleOutcome::Aborted { envelopes_sent: 1 });
    assert_eq!(transport.messages.len(), 1);
}

#[tokio::test]
async fn unknown_question_type_is_echoed() {
    let storage = storage_with(ZONE, zone_rows(ZONE, 2));
    let handler = handler_for(storage);
    let mut request = create_test_query(ZONE, DNSResourceType::Unknown(65280));
    request.questions[0].qclass = DNSResourceClass::CH;
    let mut transport = RecordingTransport::default();

    handler.handle(&request, &mut transport).await;

    assert_eq!(transport.rcode(), ResponseCode::Refused);
    assert_eq!(transport.only().questions, request.questions);
}

struct FixedAnswer;

#[async_trait]
impl QueryStrategy for FixedAnswer {
    async fn answer(
        &self,
        _question: &DNSQuestion,
        _storage: &dyn Storage,
    ) -> Result<Vec<DNSResource>, MdnsError> {
        Ok(vec![mdns::dns::presentation::parse_record(
            "fixed.example. 10 IN A 192.0.2.99",
        )?])
    }
}

#[tokio::test]
async fn strategies_are_pluggable() {
    let storage = storage_with(ZONE, Vec::new());
    let handler =
        MdnsHandler::with_strategies(storage.clone(), Arc::new(FixedAnswer), Arc::new(StandardAxfr));
    let mut transport = RecordingTransport::default();

    handler
        .handle(&create_test_query("anything.test.", DNSResourceType::A), &mut transport)
        .await;

    assert_eq!(transport.rcode(), ResponseCode::NoError);
    assert_eq!(transport.only().answers[0].ttl, 10);
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn answer_too_large_for_a_tcp_frame_is_servfail() {
    let name = "big.example.com.";
    let rows = (0..300)
        .map(|i| row(name, "TXT", None, &format!("\"{:03}{}\"", i, "x".repeat(247))))
        .collect();
    let handler = handler_for(storage_with(ZONE, rows));
    let request = create_test_query(name, DNSResourceType::TXT);
    let mut transport = TcpTransport::new(Vec::new(), "192.0.2.53:5353".parse().unwrap());

    let outcome = handler.handle(&request, &mut transport).await;

    assert_eq!(outcome, HandleOutcome::Replied(ResponseCode::ServerFailure));
    let written = transport.into_inner();
    let len = u16::from_be_bytes([written[0], written[1]]) as usize;
    assert_eq!(written.len(), len + 2);
    let reply = DNSPacket::parse(&written[2..]).unwrap();
    assert_eq!(reply.rcode(), Some(ResponseCode::ServerFailure));
    assert!(reply.answers.is_empty());
    assert_authoritative_echo(&request, &reply);
}
