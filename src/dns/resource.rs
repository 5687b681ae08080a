use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bitstream_io::{BigEndian, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader, labels_to_name, name_to_labels, write_name},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: DNSResourceData,
}

/// SOA RDATA fields (RFC 1035 section 3.3.13)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoaData {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Typed RDATA. Domain names are kept fully qualified ("ns1.example.com.").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceData {
    #[default]
    Empty,
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(String),
    CNAME(String),
    PTR(String),
    MX {
        preference: u16,
        exchange: String,
    },
    /// Character strings as raw octets; escapes are already decoded
    TXT(Vec<Vec<u8>>),
    SPF(Vec<Vec<u8>>),
    SOA(SoaData),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    CAA {
        flags: u8,
        tag: String,
        value: String,
    },
    SSHFP {
        algorithm: u8,
        fingerprint_type: u8,
        fingerprint: Vec<u8>,
    },
    NAPTR {
        order: u16,
        preference: u16,
        flags: Vec<u8>,
        services: Vec<u8>,
        regexp: Vec<u8>,
        replacement: String,
    },
    Raw(Vec<u8>),
}

impl DNSResource {
    /// Fully qualified owner name
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }

    pub fn soa(&self) -> Option<&SoaData> {
        match &self.rdata {
            DNSResourceData::SOA(soa) => Some(soa),
            _ => None,
        }
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name(),
            self.ttl,
            self.rclass,
            self.rtype,
            self.rdata
        )
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let rdata = self.rdata.encode()?;
        let rdlength =
            u16::try_from(rdata.len()).map_err(|_| ParseError::InvalidAnswerSection)?;

        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let labels = reader.read_labels()?;
        let rtype: DNSResourceType = reader.read_u16()?.into();
        let rclass = reader.read_u16()?.into();
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()? as usize;

        let start = reader.position();
        let end = start + rdlength;
        if end > reader.buffer().len() {
            return Err(ParseError::UnexpectedEnd);
        }
        let rdata = DNSResourceData::decode(rtype, reader.buffer(), start, end)?;
        reader.seek(end)?;

        Ok(DNSResource {
            labels,
            rtype,
            rclass,
            ttl,
            rdata,
        })
    }
}

impl DNSResourceData {
    /// Uncompressed wire form of the RDATA
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        match self {
            DNSResourceData::Empty => {}
            DNSResourceData::A(addr) => writer.write_bytes(&addr.octets())?,
            DNSResourceData::AAAA(addr) => writer.write_bytes(&addr.octets())?,
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::PTR(name) => write_name(&mut writer, &name_to_labels(name)?)?,
            DNSResourceData::MX {
                preference,
                exchange,
            } => {
                writer.write_var::<u16>(16, *preference)?;
                write_name(&mut writer, &name_to_labels(exchange)?)?;
            }
            DNSResourceData::TXT(strings) | DNSResourceData::SPF(strings) => {
                for text in strings {
                    if text.is_empty() {
                        writer.write_var::<u8>(8, 0)?;
                        continue;
                    }
                    // Character strings are limited to 255 octets
                    for chunk in text.chunks(255) {
                        write_character_string(&mut writer, chunk)?;
                    }
                }
            }
            DNSResourceData::SOA(soa) => {
                write_name(&mut writer, &name_to_labels(&soa.mname)?)?;
                write_name(&mut writer, &name_to_labels(&soa.rname)?)?;
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    writer.write_var::<u32>(32, value)?;
                }
            }
            DNSResourceData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                writer.write_var::<u16>(16, *priority)?;
                writer.write_var::<u16>(16, *weight)?;
                writer.write_var::<u16>(16, *port)?;
                write_name(&mut writer, &name_to_labels(target)?)?;
            }
            DNSResourceData::CAA { flags, tag, value } => {
                if tag.is_empty() || tag.len() > 255 {
                    return Err(ParseError::InvalidRecord(format!("invalid CAA tag: {}", tag)));
                }
                writer.write_var::<u8>(8, *flags)?;
                writer.write_var::<u8>(8, tag.len() as u8)?;
                writer.write_bytes(tag.as_bytes())?;
                writer.write_bytes(value.as_bytes())?;
            }
            DNSResourceData::SSHFP {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => {
                writer.write_var::<u8>(8, *algorithm)?;
                writer.write_var::<u8>(8, *fingerprint_type)?;
                writer.write_bytes(fingerprint)?;
            }
            DNSResourceData::NAPTR {
                order,
                preference,
                flags,
                services,
                regexp,
                replacement,
            } => {
                writer.write_var::<u16>(16, *order)?;
                writer.write_var::<u16>(16, *preference)?;
                write_character_string(&mut writer, flags)?;
                write_character_string(&mut writer, services)?;
                write_character_string(&mut writer, regexp)?;
                write_name(&mut writer, &name_to_labels(replacement)?)?;
            }
            DNSResourceData::Raw(bytes) => writer.write_bytes(bytes)?,
        }

        Ok(buf)
    }

    /// Decode RDATA occupying `buf[start..end]`. The whole message is passed
    /// so compressed names can be followed.
    pub fn decode(
        rtype: DNSResourceType,
        buf: &[u8],
        start: usize,
        end: usize,
    ) -> Result<Self, ParseError> {
        if start == end {
            return Ok(DNSResourceData::Empty);
        }

        let mut reader = WireReader::at(buf, start);
        let data = match rtype {
            DNSResourceType::A => {
                let b = reader.read_bytes(4)?;
                DNSResourceData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] = reader
                    .read_bytes(16)?
                    .try_into()
                    .map_err(|_| ParseError::InvalidAnswerSection)?;
                DNSResourceData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS => DNSResourceData::NS(labels_to_name(&reader.read_labels()?)),
            DNSResourceType::CNAME => {
                DNSResourceData::CNAME(labels_to_name(&reader.read_labels()?))
            }
            DNSResourceType::PTR => DNSResourceData::PTR(labels_to_name(&reader.read_labels()?)),
            DNSResourceType::MX => DNSResourceData::MX {
                preference: reader.read_u16()?,
                exchange: labels_to_name(&reader.read_labels()?),
            },
            DNSResourceType::TXT => DNSResourceData::TXT(read_character_strings(&mut reader, end)?),
            DNSResourceType::SPF => DNSResourceData::SPF(read_character_strings(&mut reader, end)?),
            DNSResourceType::SOA => DNSResourceData::SOA(SoaData {
                mname: labels_to_name(&reader.read_labels()?),
                rname: labels_to_name(&reader.read_labels()?),
                serial: reader.read_u32()?,
                refresh: reader.read_u32()?,
                retry: reader.read_u32()?,
                expire: reader.read_u32()?,
                minimum: reader.read_u32()?,
            }),
            DNSResourceType::SRV => DNSResourceData::SRV {
                priority: reader.read_u16()?,
                weight: reader.read_u16()?,
                port: reader.read_u16()?,
                target: labels_to_name(&reader.read_labels()?),
            },
            DNSResourceType::CAA => {
                let flags = reader.read_u8()?;
                let tag_len = reader.read_u8()? as usize;
                let tag = String::from_utf8_lossy(reader.read_bytes(tag_len)?).into_owned();
                let value_len = end
                    .checked_sub(reader.position())
                    .ok_or(ParseError::InvalidAnswerSection)?;
                let value = String::from_utf8_lossy(reader.read_bytes(value_len)?).into_owned();
                DNSResourceData::CAA { flags, tag, value }
            }
            DNSResourceType::SSHFP => {
                let algorithm = reader.read_u8()?;
                let fingerprint_type = reader.read_u8()?;
                let remaining = end
                    .checked_sub(reader.position())
                    .ok_or(ParseError::InvalidAnswerSection)?;
                DNSResourceData::SSHFP {
                    algorithm,
                    fingerprint_type,
                    fingerprint: reader.read_bytes(remaining)?.to_vec(),
                }
            }
            DNSResourceType::NAPTR => DNSResourceData::NAPTR {
                order: reader.read_u16()?,
                preference: reader.read_u16()?,
                flags: read_character_string(&mut reader)?,
                services: read_character_string(&mut reader)?,
                regexp: read_character_string(&mut reader)?,
                replacement: labels_to_name(&reader.read_labels()?),
            },
            _ => DNSResourceData::Raw(buf[start..end].to_vec()),
        };

        if reader.position() != end && !matches!(data, DNSResourceData::Raw(_)) {
            return Err(ParseError::InvalidAnswerSection);
        }
        Ok(data)
    }
}

fn write_character_string(
    writer: &mut BitWriter<&mut Vec<u8>, BigEndian>,
    bytes: &[u8],
) -> Result<(), ParseError> {
    let len = u8::try_from(bytes.len())
        .map_err(|_| ParseError::InvalidRecord("character string over 255 octets".to_string()))?;
    writer.write_var::<u8>(8, len)?;
    writer.write_bytes(bytes)?;
    Ok(())
}

fn read_character_string(reader: &mut WireReader<'_>) -> Result<Vec<u8>, ParseError> {
    let len = reader.read_u8()? as usize;
    Ok(reader.read_bytes(len)?.to_vec())
}

fn read_character_strings(
    reader: &mut WireReader<'_>,
    end: usize,
) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut strings = Vec::new();
    while reader.position() < end {
        strings.push(read_character_string(reader)?);
    }
    Ok(strings)
}

/// Quoted presentation form. Quotes and backslashes are escaped, and
/// octets outside printable ASCII are written as `\DDD`.
fn quote(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &byte in bytes {
        match byte {
            b'"' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03}", byte)),
        }
    }
    out.push('"');
    out
}

fn quote_all(strings: &[Vec<u8>]) -> String {
    strings
        .iter()
        .map(|s| quote(s))
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for DNSResourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceData::Empty => Ok(()),
            DNSResourceData::A(addr) => write!(f, "{}", addr),
            DNSResourceData::AAAA(addr) => write!(f, "{}", addr),
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::PTR(name) => f.write_str(name),
            DNSResourceData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            DNSResourceData::TXT(strings) | DNSResourceData::SPF(strings) => {
                f.write_str(&quote_all(strings))
            }
            DNSResourceData::SOA(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            DNSResourceData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            DNSResourceData::CAA { flags, tag, value } => {
                write!(f, "{} {} {}", flags, tag, quote(value.as_bytes()))
            }
            DNSResourceData::SSHFP {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => {
                write!(f, "{} {} ", algorithm, fingerprint_type)?;
                for byte in fingerprint {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            DNSResourceData::NAPTR {
                order,
                preference,
                flags,
                services,
                regexp,
                replacement,
            } => write!(
                f,
                "{} {} {} {} {} {}",
                order,
                preference,
                quote(flags),
                quote(services),
                quote(regexp),
                replacement
            ),
            DNSResourceData::Raw(bytes) => {
                write!(f, "\\# {}", bytes.len())?;
                if !bytes.is_empty() {
                    f.write_str(" ")?;
                    for byte in bytes {
                        write!(f, "{:02x}", byte)?;
                    }
                }
                Ok(())
            }
        }
    }
}
