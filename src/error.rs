use thiserror::Error;

use crate::dns::{ParseError, enums::ResponseCode};

#[derive(Error, Debug)]
pub enum MdnsError {
    /// Zone store unreachable, query failed or timed out
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Invalid record '{record}': {reason}")]
    Validation { record: String, reason: String },

    #[error("Zone has no SOA record")]
    MissingSoa,

    #[error("No records for {name} {rtype}")]
    EmptyResult { name: String, rtype: String },

    /// Reply does not fit in one TCP frame
    #[error("Message of {0} bytes exceeds the 65535 byte frame limit")]
    MessageTooLarge(usize),

    #[error("Transport error after {envelopes_sent} envelopes: {reason}")]
    Transport {
        envelopes_sent: usize,
        reason: String,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MdnsError {
    /// RCODE to answer with, or `None` when nothing can reach the peer
    pub fn rcode(&self) -> Option<ResponseCode> {
        match self {
            MdnsError::Transport { .. } => None,
            MdnsError::EmptyResult { .. } => Some(ResponseCode::Refused),
            _ => Some(ResponseCode::ServerFailure),
        }
    }

    /// Outcomes that are part of normal operation rather than faults
    pub fn is_expected(&self) -> bool {
        matches!(self, MdnsError::EmptyResult { .. })
    }
}

impl From<sqlx::Error> for MdnsError {
    fn from(err: sqlx::Error) -> Self {
        MdnsError::Storage(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MdnsError>;
