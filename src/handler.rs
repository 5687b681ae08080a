//! Request dispatch: classifies each request, drives storage and
//! materialization, and decides the RCODE of every reply.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::dns::{
    DNSPacket,
    enums::{DNSResourceType, Opcode, ResponseCode},
    question::DNSQuestion,
    resource::DNSResource,
};
use crate::error::MdnsError;
use crate::materializer::{Materialization, materialize};
use crate::storage::Storage;
use crate::transfer;
use crate::transport::ResponseTransport;

/// TTL given to query answers whose recordset has none
pub const DEFAULT_QUERY_FALLBACK_TTL: u32 = 3600;

/// What happened to a request, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A single reply was sent with this RCODE
    Replied(ResponseCode),
    /// A zone transfer completed
    Transferred { envelopes: usize, records: usize },
    /// The peer could not be written to
    Aborted { envelopes_sent: usize },
}

/// Envelope and record counts of a finished zone transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub envelopes: usize,
    pub records: usize,
}

/// Answers an ordinary (non-transfer) question
#[async_trait]
pub trait QueryStrategy: Send + Sync {
    async fn answer(
        &self,
        question: &DNSQuestion,
        storage: &dyn Storage,
    ) -> Result<Vec<DNSResource>, MdnsError>;
}

/// Performs a full zone transfer, writing envelopes itself
#[async_trait]
pub trait AxfrStrategy: Send + Sync {
    async fn transfer(
        &self,
        request: &DNSPacket,
        storage: &dyn Storage,
        transport: &mut dyn ResponseTransport,
    ) -> Result<TransferSummary, MdnsError>;
}

/// Name/type lookup with TTL fallback
#[derive(Debug, Clone)]
pub struct StandardQuery {
    pub fallback_ttl: u32,
}

impl Default for StandardQuery {
    fn default() -> Self {
        Self {
            fallback_ttl: DEFAULT_QUERY_FALLBACK_TTL,
        }
    }
}

#[async_trait]
impl QueryStrategy for StandardQuery {
    async fn answer(
        &self,
        question: &DNSQuestion,
        storage: &dyn Storage,
    ) -> Result<Vec<DNSResource>, MdnsError> {
        let name = question.name().to_lowercase();
        let rtype = question.qtype.to_string();
        debug!("Attempting {} query for {}", rtype, name);

        let rows = storage.fetch_records(&name, &rtype).await?;
        let records = materialize(&rows, self.fallback_ttl, Materialization::Query)?;
        info!("Completed {} query for {}", rtype, name);

        if records.is_empty() {
            return Err(MdnsError::EmptyResult { name, rtype });
        }
        Ok(records)
    }
}

/// Full transfer: SOA-bracketed zone contents in envelopes
#[derive(Debug, Clone, Default)]
pub struct StandardAxfr;

#[async_trait]
impl AxfrStrategy for StandardAxfr {
    async fn transfer(
        &self,
        request: &DNSPacket,
        storage: &dyn Storage,
        transport: &mut dyn ResponseTransport,
    ) -> Result<TransferSummary, MdnsError> {
        let zone_name = request
            .questions
            .first()
            .map(|q| q.name().to_lowercase())
            .ok_or_else(|| MdnsError::ZoneNotFound(".".to_string()))?;
        debug!("Attempting AXFR for {}", zone_name);

        let set = storage.fetch_zone_transfer_set(&zone_name).await?;
        let records = materialize(&set.rows, set.zone.default_ttl, Materialization::Transfer)?;
        let envelopes = transfer::stream(request, &records, transport).await?;

        info!("Completed AXFR for {}", zone_name);
        Ok(TransferSummary {
            envelopes,
            records: records.len(),
        })
    }
}

/// Stateless dispatcher shared by every listener task
pub struct MdnsHandler {
    storage: Arc<dyn Storage>,
    query: Arc<dyn QueryStrategy>,
    axfr: Arc<dyn AxfrStrategy>,
}

impl MdnsHandler {
    pub fn new(storage: Arc<dyn Storage>, query_fallback_ttl: u32) -> Self {
        Self::with_strategies(
            storage,
            Arc::new(StandardQuery {
                fallback_ttl: query_fallback_ttl,
            }),
            Arc::new(StandardAxfr),
        )
    }

    pub fn with_strategies(
        storage: Arc<dyn Storage>,
        query: Arc<dyn QueryStrategy>,
        axfr: Arc<dyn AxfrStrategy>,
    ) -> Self {
        Self {
            storage,
            query,
            axfr,
        }
    }

    pub async fn handle(
        &self,
        request: &DNSPacket,
        transport: &mut dyn ResponseTransport,
    ) -> HandleOutcome {
        let Some(question) = request.questions.first() else {
            debug!(
                "Query id={} from {} has no questions, returning FORMERR",
                request.header.id,
                transport.peer_address()
            );
            return reply(request, ResponseCode::FormatError, Vec::new(), transport).await;
        };

        debug!(
            "Received request from {} for {} opcode: {} rrtype: {} rrclass: {}",
            transport.peer_address(),
            question.name(),
            request.header.opcode,
            u16::from(question.qtype),
            u16::from(question.qclass)
        );

        match request.opcode() {
            Opcode::QUERY => match question.qtype {
                DNSResourceType::AXFR => self.handle_axfr(request, transport).await,
                DNSResourceType::IXFR => {
                    debug!("Refusing IXFR for {}", question.name());
                    reply(request, ResponseCode::Refused, Vec::new(), transport).await
                }
                _ => self.handle_query(request, question, transport).await,
            },
            _ => {
                info!(
                    "ERROR {} : unsupported opcode {}",
                    question.name(),
                    request.header.opcode
                );
                reply(request, ResponseCode::Refused, Vec::new(), transport).await
            }
        }
    }

    async fn handle_query(
        &self,
        request: &DNSPacket,
        question: &DNSQuestion,
        transport: &mut dyn ResponseTransport,
    ) -> HandleOutcome {
        match self.query.answer(question, self.storage.as_ref()).await {
            Ok(answers) => reply(request, ResponseCode::NoError, answers, transport).await,
            Err(e) => {
                let rcode = e.rcode().unwrap_or(ResponseCode::ServerFailure);
                if e.is_expected() {
                    info!("{} for {} {}", rcode, question.name(), question.qtype);
                } else {
                    error!(
                        "There was a problem querying {} for {}: {}",
                        question.qtype,
                        question.name(),
                        e
                    );
                }
                reply(request, rcode, Vec::new(), transport).await
            }
        }
    }

    async fn handle_axfr(
        &self,
        request: &DNSPacket,
        transport: &mut dyn ResponseTransport,
    ) -> HandleOutcome {
        let zone_name = request
            .questions
            .first()
            .map(|q| q.name())
            .unwrap_or_default();

        match self
            .axfr
            .transfer(request, self.storage.as_ref(), transport)
            .await
        {
            Ok(summary) => HandleOutcome::Transferred {
                envelopes: summary.envelopes,
                records: summary.records,
            },
            Err(e) => match e.rcode() {
                Some(rcode) => {
                    error!("Problem with AXFR for {}: {}", zone_name, e);
                    reply(request, rcode, Vec::new(), transport).await
                }
                None => {
                    let envelopes_sent = match e {
                        MdnsError::Transport { envelopes_sent, .. } => envelopes_sent,
                        _ => 0,
                    };
                    warn!("AXFR for {} aborted: {}", zone_name, e);
                    HandleOutcome::Aborted { envelopes_sent }
                }
            },
        }
    }
}

async fn reply(
    request: &DNSPacket,
    rcode: ResponseCode,
    answers: Vec<DNSResource>,
    transport: &mut dyn ResponseTransport,
) -> HandleOutcome {
    let mut message = request.authoritative_reply();
    message.set_rcode(rcode);
    message.answers = answers;

    match transport.write_message(&message).await {
        Ok(()) => HandleOutcome::Replied(rcode),
        Err(MdnsError::MessageTooLarge(size)) if !message.answers.is_empty() => {
            error!(
                "Reply to {} is {} bytes, answering SERVFAIL instead",
                transport.peer_address(),
                size
            );
            message.answers.clear();
            message.set_rcode(ResponseCode::ServerFailure);
            match transport.write_message(&message).await {
                Ok(()) => HandleOutcome::Replied(ResponseCode::ServerFailure),
                Err(e) => {
                    warn!("Failed to reply to {}: {}", transport.peer_address(), e);
                    HandleOutcome::Aborted { envelopes_sent: 0 }
                }
            }
        }
        Err(e) => {
            warn!("Failed to reply to {}: {}", transport.peer_address(), e);
            HandleOutcome::Aborted { envelopes_sent: 0 }
        }
    }
}
