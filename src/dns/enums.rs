use std::fmt;
use std::str::FromStr;

/// Resource record types understood by the codec.
///
/// Types outside this list survive a parse/serialize cycle as `Unknown`, so a
/// question can always be echoed back exactly as it was asked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    NAPTR,
    SSHFP,
    SPF,
    OPT,
    IXFR,
    AXFR,
    ANY,
    CAA,
    Unknown(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    ANY,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            255 => DNSResourceClass::ANY,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::ANY => 255,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::IN => write!(f, "IN"),
            DNSResourceClass::CS => write!(f, "CS"),
            DNSResourceClass::CH => write!(f, "CH"),
            DNSResourceClass::HS => write!(f, "HS"),
            DNSResourceClass::ANY => write!(f, "ANY"),
            DNSResourceClass::Unknown(x) => write!(f, "CLASS{}", x),
        }
    }
}

impl FromStr for DNSResourceClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IN" => Ok(DNSResourceClass::IN),
            "CS" => Ok(DNSResourceClass::CS),
            "CH" => Ok(DNSResourceClass::CH),
            "HS" => Ok(DNSResourceClass::HS),
            "ANY" => Ok(DNSResourceClass::ANY),
            _ => Err(()),
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            35 => DNSResourceType::NAPTR,
            44 => DNSResourceType::SSHFP,
            99 => DNSResourceType::SPF,
            41 => DNSResourceType::OPT,
            251 => DNSResourceType::IXFR,
            252 => DNSResourceType::AXFR,
            255 => DNSResourceType::ANY,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::NAPTR => 35,
            DNSResourceType::SSHFP => 44,
            DNSResourceType::SPF => 99,
            DNSResourceType::OPT => 41,
            DNSResourceType::IXFR => 251,
            DNSResourceType::AXFR => 252,
            DNSResourceType::ANY => 255,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DNSResourceType::A => "A",
            DNSResourceType::NS => "NS",
            DNSResourceType::CNAME => "CNAME",
            DNSResourceType::SOA => "SOA",
            DNSResourceType::PTR => "PTR",
            DNSResourceType::MX => "MX",
            DNSResourceType::TXT => "TXT",
            DNSResourceType::AAAA => "AAAA",
            DNSResourceType::SRV => "SRV",
            DNSResourceType::NAPTR => "NAPTR",
            DNSResourceType::SSHFP => "SSHFP",
            DNSResourceType::SPF => "SPF",
            DNSResourceType::OPT => "OPT",
            DNSResourceType::IXFR => "IXFR",
            DNSResourceType::AXFR => "AXFR",
            DNSResourceType::ANY => "ANY",
            DNSResourceType::CAA => "CAA",
            DNSResourceType::Unknown(x) => return write!(f, "TYPE{}", x),
        };
        f.write_str(name)
    }
}

impl FromStr for DNSResourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        let rtype = match upper.as_str() {
            "A" => DNSResourceType::A,
            "NS" => DNSResourceType::NS,
            "CNAME" => DNSResourceType::CNAME,
            "SOA" => DNSResourceType::SOA,
            "PTR" => DNSResourceType::PTR,
            "MX" => DNSResourceType::MX,
            "TXT" => DNSResourceType::TXT,
            "AAAA" => DNSResourceType::AAAA,
            "SRV" => DNSResourceType::SRV,
            "NAPTR" => DNSResourceType::NAPTR,
            "SSHFP" => DNSResourceType::SSHFP,
            "SPF" => DNSResourceType::SPF,
            "OPT" => DNSResourceType::OPT,
            "IXFR" => DNSResourceType::IXFR,
            "AXFR" => DNSResourceType::AXFR,
            "ANY" => DNSResourceType::ANY,
            "CAA" => DNSResourceType::CAA,
            // RFC 3597 generic form
            _ => match upper.strip_prefix("TYPE").map(str::parse::<u16>) {
                Some(Ok(num)) => DNSResourceType::from(num),
                _ => return Err(()),
            },
        };
        Ok(rtype)
    }
}

/// DNS response codes (RFC 1035 section 4.1.1)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl ResponseCode {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ResponseCode::NoError),
            1 => Some(ResponseCode::FormatError),
            2 => Some(ResponseCode::ServerFailure),
            3 => Some(ResponseCode::NameError),
            4 => Some(ResponseCode::NotImplemented),
            5 => Some(ResponseCode::Refused),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::FormatError => "FORMERR",
            ResponseCode::ServerFailure => "SERVFAIL",
            ResponseCode::NameError => "NXDOMAIN",
            ResponseCode::NotImplemented => "NOTIMP",
            ResponseCode::Refused => "REFUSED",
        };
        f.write_str(name)
    }
}

/// DNS Opcode constants from RFC 1035
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    QUERY,
    IQUERY,
    STATUS,
    NOTIFY,
    UPDATE,
    DSO,
    Unassigned(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Opcode::QUERY,
            1 => Opcode::IQUERY,
            2 => Opcode::STATUS,
            4 => Opcode::NOTIFY,
            5 => Opcode::UPDATE,
            6 => Opcode::DSO,
            x => Opcode::Unassigned(x),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::QUERY => 0,
            Opcode::IQUERY => 1,
            Opcode::STATUS => 2,
            Opcode::NOTIFY => 4,
            Opcode::UPDATE => 5,
            Opcode::DSO => 6,
            Opcode::Unassigned(x) => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_keep_their_number() {
        let rtype = DNSResourceType::from(65280);
        assert_eq!(rtype, DNSResourceType::Unknown(65280));
        assert_eq!(u16::from(rtype), 65280);
        assert_eq!(rtype.to_string(), "TYPE65280");
        assert_eq!("type65280".parse::<DNSResourceType>(), Ok(rtype));
    }

    #[test]
    fn transfer_types() {
        assert_eq!(DNSResourceType::from(251), DNSResourceType::IXFR);
        assert_eq!(DNSResourceType::from(252), DNSResourceType::AXFR);
        assert_eq!("soa".parse::<DNSResourceType>(), Ok(DNSResourceType::SOA));
    }

    #[test]
    fn designate_extra_types() {
        for (name, number) in [("NAPTR", 35u16), ("SSHFP", 44), ("SPF", 99)] {
            let rtype: DNSResourceType = name.parse().unwrap();
            assert_eq!(u16::from(rtype), number);
            assert_eq!(DNSResourceType::from(number), rtype);
            assert_eq!(rtype.to_string(), name);
        }
    }

    #[test]
    fn opcode_round_trip() {
        assert_eq!(Opcode::from(5), Opcode::UPDATE);
        assert_eq!(u8::from(Opcode::from(3)), 3);
    }
}
