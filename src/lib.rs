pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod handler;
pub mod materializer;
pub mod server;
pub mod shutdown;
pub mod storage;
pub mod telemetry;
pub mod transfer;
pub mod transport;

pub use config::Config;
pub use dns::DNSPacket;
pub use error::MdnsError;
pub use handler::{HandleOutcome, MdnsHandler};
pub use server::DnsServer;
