use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::ParseError;

/// Longest single label allowed on the wire (RFC 1035 section 2.3.4)
pub const MAX_LABEL_LENGTH: usize = 63;
/// Longest encoded name allowed on the wire, root octet included
pub const MAX_NAME_LENGTH: usize = 255;
/// Upper bound on compression pointers followed for one name
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent: Sized {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError>;

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        write_name(writer, labels)
    }
}

/// Write an uncompressed name, terminating root label included.
pub fn write_name<E: Endianness>(
    writer: &mut BitWriter<&mut Vec<u8>, E>,
    labels: &[String],
) -> Result<(), ParseError> {
    for label in labels {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(ParseError::InvalidLabel);
        }
        writer.write_var::<u8>(8, label.len() as u8)?;
        writer.write_bytes(label.as_bytes())?;
    }
    writer.write_var::<u8>(8, 0)?;
    Ok(())
}

/// Render labels as a fully qualified name ("example.com.", "." for root).
pub fn labels_to_name(labels: &[String]) -> String {
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut name = labels.join(".");
    name.push('.');
    name
}

/// Split a textual name into validated labels. Relative names are taken as
/// fully qualified.
pub fn name_to_labels(name: &str) -> Result<Vec<String>, ParseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::InvalidLabel);
    }
    if name == "." {
        return Ok(Vec::new());
    }

    let mut labels = Vec::new();
    let mut encoded_len = 1;
    for label in name.strip_suffix('.').unwrap_or(name).split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(ParseError::InvalidLabel);
        }
        encoded_len += label.len() + 1;
        labels.push(label.to_string());
    }

    if encoded_len > MAX_NAME_LENGTH {
        return Err(ParseError::InvalidLabel);
    }
    Ok(labels)
}

/// Byte cursor over a whole message.
///
/// Name decoding needs the complete packet to follow compression pointers,
/// so sections are read through this cursor rather than a stream.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), ParseError> {
        if pos > self.buf.len() {
            return Err(ParseError::UnexpectedEnd);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(len).ok_or(ParseError::UnexpectedEnd)?;
        let bytes = self.buf.get(self.pos..end).ok_or(ParseError::UnexpectedEnd)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a possibly compressed name. The cursor ends up just after the
    /// name as it appears at the current position (after the first pointer,
    /// if any).
    pub fn read_labels(&mut self) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        let mut cursor = self.pos;
        let mut resume_at = None;
        let mut hops = 0;
        let mut encoded_len = 1;

        loop {
            let len = *self.buf.get(cursor).ok_or(ParseError::InvalidLabel)? as usize;
            match len & 0xC0 {
                0x00 if len == 0 => {
                    self.pos = resume_at.unwrap_or(cursor + 1);
                    return Ok(labels);
                }
                0x00 => {
                    let start = cursor + 1;
                    let bytes = self
                        .buf
                        .get(start..start + len)
                        .ok_or(ParseError::InvalidLabel)?;
                    encoded_len += len + 1;
                    if encoded_len > MAX_NAME_LENGTH {
                        return Err(ParseError::InvalidLabel);
                    }
                    let label =
                        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidLabel)?;
                    labels.push(label);
                    cursor = start + len;
                }
                0xC0 => {
                    let low = *self.buf.get(cursor + 1).ok_or(ParseError::InvalidLabel)? as usize;
                    if resume_at.is_none() {
                        resume_at = Some(cursor + 2);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(ParseError::InvalidLabel);
                    }
                    cursor = ((len & 0x3F) << 8) | low;
                }
                _ => return Err(ParseError::InvalidLabel),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_conversions() {
        let labels = name_to_labels("www.Example.com.").unwrap();
        assert_eq!(labels, vec!["www", "Example", "com"]);
        assert_eq!(labels_to_name(&labels), "www.Example.com.");
        assert_eq!(name_to_labels(".").unwrap(), Vec::<String>::new());
        assert_eq!(labels_to_name(&[]), ".");
    }

    #[test]
    fn rejects_bad_names() {
        assert!(name_to_labels("").is_err());
        assert!(name_to_labels("a..b").is_err());
        assert!(name_to_labels(&format!("{}.com.", "x".repeat(64))).is_err());
        let long = vec!["abcdefghij"; 26].join(".");
        assert!(name_to_labels(&long).is_err());
    }

    #[test]
    fn follows_compression_pointers() {
        // "example.com" at offset 0, then "www" + pointer to offset 0
        let buf = [
            7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0, 3, b'w', b'w',
            b'w', 0xC0, 0x00, 0xFF,
        ];
        let mut reader = WireReader::at(&buf, 13);
        let labels = reader.read_labels().unwrap();
        assert_eq!(labels, vec!["www", "example", "com"]);
        assert_eq!(reader.position(), 19);
    }

    #[test]
    fn pointer_loops_are_rejected() {
        let buf = [0xC0, 0x00];
        let mut reader = WireReader::new(&buf);
        assert!(reader.read_labels().is_err());
    }
}
