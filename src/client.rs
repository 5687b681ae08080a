//! Minimal DNS client used by the load generator and end-to-end tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::dns::{
    DNSPacket,
    enums::{DNSResourceType, ResponseCode},
    header::DNSHeader,
    question::DNSQuestion,
    resource::DNSResource,
};
use crate::error::MdnsError;
use crate::transport::frame;

/// Standard query for `name`/`qtype` with a caller-chosen id
pub fn build_query(id: u16, name: &str, qtype: DNSResourceType) -> Result<DNSPacket, MdnsError> {
    Ok(DNSPacket {
        header: DNSHeader {
            id,
            rd: true,
            ..Default::default()
        },
        questions: vec![DNSQuestion::new(name, qtype)?],
        ..Default::default()
    })
}

/// Send one query over UDP and wait for the matching reply
pub async fn query_udp(
    server: SocketAddr,
    request: &DNSPacket,
    timeout: Duration,
) -> Result<DNSPacket, MdnsError> {
    let bind: SocketAddr = if server.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.send_to(&request.serialize()?, server).await?;

    let mut buf = vec![0u8; 65535];
    let exchange = async {
        loop {
            let (len, from) = socket.recv_from(&mut buf).await?;
            if from != server {
                continue;
            }
            let reply = DNSPacket::parse(&buf[..len])?;
            if reply.header.id == request.header.id {
                return Ok::<_, MdnsError>(reply);
            }
        }
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| timed_out(timeout))?
}

/// Open a TCP connection for one or more framed exchanges
pub struct TcpClient {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpClient {
    pub async fn connect(server: SocketAddr, timeout: Duration) -> Result<Self, MdnsError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(server))
            .await
            .map_err(|_| timed_out(timeout))??;
        Ok(Self { stream, timeout })
    }

    pub async fn send(&mut self, request: &DNSPacket) -> Result<(), MdnsError> {
        self.stream.write_all(&frame(request)?).await?;
        Ok(())
    }

    pub async fn receive(&mut self) -> Result<DNSPacket, MdnsError> {
        let timeout = self.timeout;
        let read = async {
            let mut len_buf = [0u8; 2];
            self.stream.read_exact(&mut len_buf).await?;
            let mut buf = vec![0u8; u16::from_be_bytes(len_buf) as usize];
            self.stream.read_exact(&mut buf).await?;
            Ok::<_, MdnsError>(DNSPacket::parse(&buf)?)
        };
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| timed_out(timeout))?
    }

    pub async fn exchange(&mut self, request: &DNSPacket) -> Result<DNSPacket, MdnsError> {
        self.send(request).await?;
        self.receive().await
    }

    /// Run a zone transfer and collect every envelope. Ends at the closing
    /// SOA, or after the first reply when it carries an error RCODE.
    pub async fn axfr(&mut self, request: &DNSPacket) -> Result<Vec<DNSPacket>, MdnsError> {
        self.send(request).await?;

        let mut envelopes = Vec::new();
        let mut soa_seen = 0;
        loop {
            let reply = self.receive().await?;
            let failed = reply.rcode() != Some(ResponseCode::NoError);
            soa_seen += reply
                .answers
                .iter()
                .filter(|rr| rr.rtype == DNSResourceType::SOA)
                .count();
            let empty = reply.answers.is_empty();
            envelopes.push(reply);
            if failed || empty || soa_seen >= 2 {
                return Ok(envelopes);
            }
        }
    }
}

/// All answer records of a transfer, in order
pub fn transfer_records(envelopes: &[DNSPacket]) -> Vec<DNSResource> {
    envelopes
        .iter()
        .flat_map(|envelope| envelope.answers.iter().cloned())
        .collect()
}

fn timed_out(timeout: Duration) -> MdnsError {
    MdnsError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("no reply within {:?}", timeout),
    ))
}
