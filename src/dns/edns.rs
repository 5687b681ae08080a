use super::ParseError;

/// Payload size advertised in replies to EDNS requests
pub const DEFAULT_EDNS_PAYLOAD_SIZE: u16 = 4096;

/// EDNS0 OPT pseudo-record
/// RFC 6891: https://tools.ietf.org/html/rfc6891
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOpt {
    /// UDP payload size that can be handled by the requestor
    pub udp_payload_size: u16,
    /// Extended RCODE (high 8 bits)
    pub extended_rcode: u8,
    pub version: u8,
    pub flags: u16,
    pub options: Vec<EdnsOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl Default for EdnsOpt {
    fn default() -> Self {
        Self::with_payload_size(DEFAULT_EDNS_PAYLOAD_SIZE)
    }
}

impl EdnsOpt {
    pub fn with_payload_size(payload_size: u16) -> Self {
        Self {
            udp_payload_size: payload_size,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    /// Payload size to honour for UDP replies. Values below 512 are
    /// treated as 512 (RFC 6891 section 6.2.5).
    pub fn payload_size(&self) -> u16 {
        self.udp_payload_size.max(512)
    }

    /// DNSSEC OK bit
    pub fn do_flag(&self) -> bool {
        (self.flags & 0x8000) != 0
    }

    /// Build from the fields of an OPT resource record:
    /// - CLASS: UDP payload size
    /// - TTL: extended RCODE (8 bits) | version (8 bits) | flags (16 bits)
    /// - RDATA: sequence of {code, length, data} options
    pub fn parse_from_resource(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self, ParseError> {
        let mut options = Vec::new();
        let mut pos = 0;

        while pos < rdata.len() {
            if pos + 4 > rdata.len() {
                return Err(ParseError::InvalidAdditionalSection);
            }
            let code = u16::from_be_bytes([rdata[pos], rdata[pos + 1]]);
            let length = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            pos += 4;

            let data = rdata
                .get(pos..pos + length)
                .ok_or(ParseError::InvalidAdditionalSection)?;
            pos += length;
            options.push(EdnsOption {
                code,
                data: data.to_vec(),
            });
        }

        Ok(EdnsOpt {
            udp_payload_size: class,
            extended_rcode: ((ttl >> 24) & 0xFF) as u8,
            version: ((ttl >> 16) & 0xFF) as u8,
            flags: (ttl & 0xFFFF) as u16,
            options,
        })
    }

    /// (class, ttl, rdata) of the equivalent OPT resource record
    pub fn to_resource_format(&self) -> Result<(u16, u32, Vec<u8>), ParseError> {
        let ttl = ((self.extended_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | (self.flags as u32);

        let mut rdata = Vec::new();
        for option in &self.options {
            let length = u16::try_from(option.data.len())
                .map_err(|_| ParseError::InvalidAdditionalSection)?;
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&length.to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        Ok((self.udp_payload_size, ttl, rdata))
    }
}

impl std::fmt::Display for EdnsOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EDNS0: payload_size={}, version={}, flags=0x{:04x}, options={}",
            self.udp_payload_size,
            self.version,
            self.flags,
            self.options.len()
        )
    }
}
