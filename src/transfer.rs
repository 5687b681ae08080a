//! Zone-transfer streaming: one reply per envelope of at most
//! [`ENVELOPE_SIZE`] records.

use tracing::{debug, warn};

use crate::dns::{DNSPacket, resource::DNSResource};
use crate::error::MdnsError;
use crate::transport::ResponseTransport;

/// Records per AXFR reply message
pub const ENVELOPE_SIZE: usize = 100;

/// Reply carrying one envelope of a transfer
pub fn envelope(request: &DNSPacket, records: &[DNSResource]) -> DNSPacket {
    let mut reply = request.authoritative_reply();
    reply.answers = records.to_vec();
    reply
}

/// Send `answers` to the peer in order. Stops at the first failed write,
/// reporting how many envelopes had already gone out.
pub async fn stream(
    request: &DNSPacket,
    answers: &[DNSResource],
    transport: &mut dyn ResponseTransport,
) -> Result<usize, MdnsError> {
    let mut sent = 0;

    for chunk in answers.chunks(ENVELOPE_SIZE) {
        let reply = envelope(request, chunk);
        if let Err(e) = transport.write_message(&reply).await {
            warn!(
                "AXFR to {} failed after {} envelopes: {}",
                transport.peer_address(),
                sent,
                e
            );
            return Err(MdnsError::Transport {
                envelopes_sent: sent,
                reason: e.to_string(),
            });
        }
        sent += 1;
        debug!(
            "Sent AXFR envelope {} ({} records) to {}",
            sent,
            chunk.len(),
            transport.peer_address()
        );
    }

    Ok(sent)
}
