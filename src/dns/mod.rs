pub mod common;
pub mod edns;
pub mod enums;
pub mod header;
pub mod presentation;
pub mod question;
pub mod resource;

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use common::{PacketComponent, WireReader};
use edns::EdnsOpt;
use enums::{DNSResourceType, Opcode, ResponseCode};
use header::DNSHeader;
use question::DNSQuestion;
use resource::{DNSResource, DNSResourceData};
use tracing::{debug, trace};

/// Classic DNS payload limit for UDP without EDNS
pub const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 512;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    InvalidQuestionSection,
    InvalidAnswerSection,
    InvalidAuthoritySection,
    InvalidAdditionalSection,
    InvalidBitStream(String),
    UnexpectedEnd,
    InvalidRecord(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::InvalidQuestionSection => write!(f, "Invalid question section"),
            ParseError::InvalidAnswerSection => write!(f, "Invalid answer section"),
            ParseError::InvalidAuthoritySection => write!(f, "Invalid authority section"),
            ParseError::InvalidAdditionalSection => write!(f, "Invalid additional section"),
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
            ParseError::UnexpectedEnd => write!(f, "Unexpected end of message"),
            ParseError::InvalidRecord(e) => write!(f, "Invalid record: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl DNSPacket {
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = WireReader::new(buf);
        let header = DNSHeader::read(&mut reader)?;

        let mut packet = DNSPacket {
            header,
            ..Default::default()
        };

        for _ in 0..packet.header.qdcount {
            packet.questions.push(DNSQuestion::read(&mut reader)?);
        }
        for _ in 0..packet.header.ancount {
            let answer =
                DNSResource::read(&mut reader).map_err(|_| ParseError::InvalidAnswerSection)?;
            packet.answers.push(answer);
        }
        for _ in 0..packet.header.nscount {
            let authority =
                DNSResource::read(&mut reader).map_err(|_| ParseError::InvalidAuthoritySection)?;
            packet.authorities.push(authority);
        }
        for _ in 0..packet.header.arcount {
            let resource = DNSResource::read(&mut reader)
                .map_err(|_| ParseError::InvalidAdditionalSection)?;

            // The OPT pseudo-record is owned by the root name; its class
            // carries the requester's payload size.
            if resource.rtype == DNSResourceType::OPT && resource.labels.is_empty() {
                let options = match &resource.rdata {
                    DNSResourceData::Raw(bytes) => bytes.as_slice(),
                    _ => &[],
                };
                let edns =
                    EdnsOpt::parse_from_resource(resource.rclass.into(), resource.ttl, options)?;
                debug!("Parsed {}", edns);
                packet.edns = Some(edns);
                continue;
            }
            packet.resources.push(resource);
        }

        if reader.remaining() > 0 {
            trace!("Ignoring {} trailing bytes", reader.remaining());
        }
        Ok(packet)
    }

    /// Wire form of the message. Section counts in the header are derived
    /// from the sections themselves.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let count = |len: usize| u16::try_from(len).map_err(|_| ParseError::InvalidHeader);

        let mut header = self.header.clone();
        header.qdcount = count(self.questions.len())?;
        header.ancount = count(self.answers.len())?;
        header.nscount = count(self.authorities.len())?;
        header.arcount = count(self.resources.len() + usize::from(self.edns.is_some()))?;

        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        header.write(&mut writer)?;
        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for answer in &self.answers {
            answer.write(&mut writer)?;
        }
        for authority in &self.authorities {
            authority.write(&mut writer)?;
        }
        for resource in &self.resources {
            resource.write(&mut writer)?;
        }

        if let Some(edns) = &self.edns {
            let (udp_payload_size, ttl, rdata) = edns.to_resource_format()?;
            let rdlength =
                u16::try_from(rdata.len()).map_err(|_| ParseError::InvalidAdditionalSection)?;
            writer.write_var::<u8>(8, 0)?;
            writer.write_var::<u16>(16, DNSResourceType::OPT.into())?;
            writer.write_var::<u16>(16, udp_payload_size)?;
            writer.write_var::<u32>(32, ttl)?;
            writer.write_var::<u16>(16, rdlength)?;
            writer.write_bytes(&rdata)?;
        }

        Ok(buf)
    }

    pub fn opcode(&self) -> Opcode {
        Opcode::from(self.header.opcode)
    }

    pub fn rcode(&self) -> Option<ResponseCode> {
        ResponseCode::from_u8(self.header.rcode)
    }

    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode.to_u8();
    }

    /// Skeleton of an authoritative reply to this request: id, opcode, RD
    /// and the question section are echoed, QR and AA set, RA cleared.
    pub fn authoritative_reply(&self) -> Self {
        DNSPacket {
            header: DNSHeader {
                id: self.header.id,
                qr: true,
                opcode: self.header.opcode,
                aa: true,
                rd: self.header.rd,
                ..Default::default()
            },
            questions: self.questions.clone(),
            edns: self.edns.as_ref().map(|_| EdnsOpt::default()),
            ..Default::default()
        }
    }

    /// Copy of this reply with every record section dropped and TC set
    pub fn truncated(&self) -> Self {
        let mut packet = DNSPacket {
            header: self.header.clone(),
            questions: self.questions.clone(),
            edns: self.edns.clone(),
            ..Default::default()
        };
        packet.header.tc = true;
        packet
    }

    /// Largest UDP reply the requester accepts
    pub fn max_udp_payload_size(&self) -> u16 {
        self.edns
            .as_ref()
            .map(|edns| edns.payload_size())
            .unwrap_or(DEFAULT_UDP_PAYLOAD_SIZE)
    }
}
