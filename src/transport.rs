//! Reply delivery to a single peer.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::dns::DNSPacket;
use crate::error::MdnsError;

#[async_trait]
pub trait ResponseTransport: Send {
    async fn write_message(&mut self, message: &DNSPacket) -> Result<(), MdnsError>;

    fn peer_address(&self) -> String;
}

/// One datagram per message, truncated to the requester's payload limit
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    max_payload: usize,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr, max_payload: u16) -> Self {
        Self {
            socket,
            peer,
            max_payload: max_payload as usize,
        }
    }
}

#[async_trait]
impl ResponseTransport for UdpTransport {
    async fn write_message(&mut self, message: &DNSPacket) -> Result<(), MdnsError> {
        let mut bytes = message.serialize()?;
        if bytes.len() > self.max_payload {
            debug!(
                "Response too large for UDP ({}>{} bytes), sending truncated response",
                bytes.len(),
                self.max_payload
            );
            bytes = message.truncated().serialize()?;
        }

        self.socket
            .send_to(&bytes, self.peer)
            .await
            .map_err(|e| MdnsError::Transport {
                envelopes_sent: 0,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn peer_address(&self) -> String {
        self.peer.to_string()
    }
}

/// Length-prefixed frames over a stream (RFC 1035 section 4.2.2)
pub struct TcpTransport<W> {
    writer: W,
    peer: SocketAddr,
}

impl<W> TcpTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, peer: SocketAddr) -> Self {
        Self { writer, peer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Serialize `message` behind its 2-byte length prefix
pub fn frame(message: &DNSPacket) -> Result<Vec<u8>, MdnsError> {
    let bytes = message.serialize()?;
    let len = u16::try_from(bytes.len()).map_err(|_| MdnsError::MessageTooLarge(bytes.len()))?;

    let mut framed = Vec::with_capacity(bytes.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&bytes);
    Ok(framed)
}

#[async_trait]
impl<W> ResponseTransport for TcpTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_message(&mut self, message: &DNSPacket) -> Result<(), MdnsError> {
        let framed = frame(message)?;
        let result = match self.writer.write_all(&framed).await {
            Ok(()) => self.writer.flush().await,
            Err(e) => Err(e),
        };
        result.map_err(|e| MdnsError::Transport {
            envelopes_sent: 0,
            reason: e.to_string(),
        })
    }

    fn peer_address(&self) -> String {
        self.peer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{
        enums::{DNSResourceClass, DNSResourceType},
        question::DNSQuestion,
        resource::{DNSResource, DNSResourceData},
    };

    #[tokio::test]
    async fn tcp_frames_carry_length_prefix() {
        let message = DNSPacket {
            questions: vec![DNSQuestion::new("example.com.", DNSResourceType::SOA).unwrap()],
            ..Default::default()
        };
        let expected = message.serialize().unwrap();

        let mut transport = TcpTransport::new(Vec::new(), "127.0.0.1:53".parse().unwrap());
        transport.write_message(&message).await.unwrap();
        transport.write_message(&message).await.unwrap();
        let written = transport.into_inner();

        assert_eq!(written.len(), 2 * (expected.len() + 2));
        assert_eq!(
            u16::from_be_bytes([written[0], written[1]]) as usize,
            expected.len()
        );
        assert_eq!(&written[2..2 + expected.len()], expected.as_slice());
    }

    #[test]
    fn oversized_message_cannot_be_framed() {
        let record = DNSResource {
            labels: vec!["example".to_string(), "com".to_string()],
            rtype: DNSResourceType::TXT,
            rclass: DNSResourceClass::IN,
            ttl: 60,
            rdata: DNSResourceData::TXT(vec![vec![b'x'; 250]]),
        };
        let message = DNSPacket {
            answers: vec![record; 300],
            ..Default::default()
        };

        assert!(matches!(
            frame(&message),
            Err(MdnsError::MessageTooLarge(size)) if size > usize::from(u16::MAX)
        ));
    }
}
