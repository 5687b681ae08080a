//! Presentation-format (zone file) parsing of single resource records.
//!
//! Accepts one record per call in the form `name [ttl] [class] type rdata`.
//! Owner and RDATA names are taken as fully qualified whether or not they
//! carry the trailing dot, since there is no `$ORIGIN` to resolve against.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::{
    ParseError,
    common::{labels_to_name, name_to_labels},
    enums::{DNSResourceClass, DNSResourceType},
    resource::{DNSResource, DNSResourceData, SoaData},
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    /// Decoded octets, with `\X` and `\DDD` escapes resolved
    bytes: Vec<u8>,
    /// `bytes` as text, lossily
    text: String,
    /// The token as written
    raw: String,
}

impl Token {
    fn new(bytes: Vec<u8>, raw: String) -> Self {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Self { bytes, text, raw }
    }
}

/// Parse one presentation-format record
pub fn parse_record(line: &str) -> Result<DNSResource, ParseError> {
    let tokens = tokenize(line)?;
    let mut fields = tokens.iter();

    let owner = fields
        .next()
        .ok_or_else(|| invalid("empty record line"))?;
    let labels = name_to_labels(&owner.text)
        .map_err(|_| invalid(format!("invalid owner name: {}", owner.text)))?;

    let mut ttl = None;
    let mut rclass = DNSResourceClass::IN;
    let rtype = loop {
        let field = fields.next().ok_or_else(|| invalid("missing record type"))?;
        if ttl.is_none() && field.text.starts_with(|c: char| c.is_ascii_digit()) {
            ttl = Some(parse_ttl(&field.text)?);
            continue;
        }
        if let Ok(parsed) = DNSResourceClass::from_str(&field.text) {
            rclass = parsed;
            continue;
        }
        match DNSResourceType::from_str(&field.text) {
            Ok(parsed) => break parsed,
            Err(()) => return Err(invalid(format!("invalid field: {}", field.text))),
        }
    };

    let rdata_tokens: Vec<&Token> = fields.collect();
    if rdata_tokens.is_empty() {
        return Err(invalid("missing RDATA"));
    }
    let rdata = parse_rdata(rtype, &rdata_tokens)?;

    Ok(DNSResource {
        labels,
        rtype,
        rclass,
        ttl: ttl.unwrap_or(0),
        rdata,
    })
}

/// TTL with optional unit suffix (s, m, h, d, w)
pub fn parse_ttl(s: &str) -> Result<u32, ParseError> {
    let lower = s.to_lowercase();
    let (digits, multiplier) = match lower.char_indices().last() {
        Some((idx, 's')) => (&lower[..idx], 1),
        Some((idx, 'm')) => (&lower[..idx], 60),
        Some((idx, 'h')) => (&lower[..idx], 3600),
        Some((idx, 'd')) => (&lower[..idx], 86400),
        Some((idx, 'w')) => (&lower[..idx], 604800),
        _ => (lower.as_str(), 1),
    };

    digits
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| invalid(format!("invalid TTL: {}", s)))
}

fn parse_rdata(rtype: DNSResourceType, tokens: &[&Token]) -> Result<DNSResourceData, ParseError> {
    let data = match rtype {
        DNSResourceType::A => {
            let [addr] = expect_fields::<1>(rtype, tokens)?;
            DNSResourceData::A(
                Ipv4Addr::from_str(&addr.text)
                    .map_err(|_| invalid(format!("invalid IPv4 address: {}", addr.text)))?,
            )
        }
        DNSResourceType::AAAA => {
            let [addr] = expect_fields::<1>(rtype, tokens)?;
            DNSResourceData::AAAA(
                Ipv6Addr::from_str(&addr.text)
                    .map_err(|_| invalid(format!("invalid IPv6 address: {}", addr.text)))?,
            )
        }
        DNSResourceType::NS => {
            let [target] = expect_fields::<1>(rtype, tokens)?;
            DNSResourceData::NS(domain_name(target)?)
        }
        DNSResourceType::CNAME => {
            let [target] = expect_fields::<1>(rtype, tokens)?;
            DNSResourceData::CNAME(domain_name(target)?)
        }
        DNSResourceType::PTR => {
            let [target] = expect_fields::<1>(rtype, tokens)?;
            DNSResourceData::PTR(domain_name(target)?)
        }
        DNSResourceType::MX => {
            let [preference, exchange] = expect_fields::<2>(rtype, tokens)?;
            DNSResourceData::MX {
                preference: number(preference)?,
                exchange: domain_name(exchange)?,
            }
        }
        DNSResourceType::TXT => DNSResourceData::TXT(character_strings(tokens)),
        DNSResourceType::SPF => DNSResourceData::SPF(character_strings(tokens)),
        DNSResourceType::SOA => {
            let [mname, rname, serial, refresh, retry, expire, minimum] =
                expect_fields::<7>(rtype, tokens)?;
            DNSResourceData::SOA(SoaData {
                mname: domain_name(mname)?,
                rname: domain_name(rname)?,
                serial: number(serial)?,
                refresh: parse_ttl(&refresh.text)?,
                retry: parse_ttl(&retry.text)?,
                expire: parse_ttl(&expire.text)?,
                minimum: parse_ttl(&minimum.text)?,
            })
        }
        DNSResourceType::SRV => {
            let [priority, weight, port, target] = expect_fields::<4>(rtype, tokens)?;
            DNSResourceData::SRV {
                priority: number(priority)?,
                weight: number(weight)?,
                port: number(port)?,
                target: domain_name(target)?,
            }
        }
        DNSResourceType::CAA => {
            let [flags, tag, value] = expect_fields::<3>(rtype, tokens)?;
            if tag.text.is_empty() || !tag.text.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid(format!("invalid CAA tag: {}", tag.text)));
            }
            DNSResourceData::CAA {
                flags: number(flags)?,
                tag: tag.text.to_lowercase(),
                value: value.text.clone(),
            }
        }
        DNSResourceType::SSHFP => {
            let [algorithm, fingerprint_type, hex @ ..] = tokens else {
                return Err(invalid("SSHFP expects algorithm, type and fingerprint"));
            };
            if hex.is_empty() {
                return Err(invalid("SSHFP fingerprint is missing"));
            }
            DNSResourceData::SSHFP {
                algorithm: number(algorithm)?,
                fingerprint_type: number(fingerprint_type)?,
                fingerprint: decode_hex(hex)?,
            }
        }
        DNSResourceType::NAPTR => {
            let [order, preference, flags, services, regexp, replacement] =
                expect_fields::<6>(rtype, tokens)?;
            DNSResourceData::NAPTR {
                order: number(order)?,
                preference: number(preference)?,
                flags: character_string(flags)?,
                services: character_string(services)?,
                regexp: character_string(regexp)?,
                replacement: domain_name(replacement)?,
            }
        }
        DNSResourceType::Unknown(_) => generic_rdata(tokens)?,
        other => return Err(invalid(format!("unsupported record type: {}", other))),
    };
    Ok(data)
}

/// RFC 3597 `\# <length> <hex>` form
fn generic_rdata(tokens: &[&Token]) -> Result<DNSResourceData, ParseError> {
    let (marker, rest) = tokens
        .split_first()
        .ok_or_else(|| invalid("missing RDATA"))?;
    if marker.raw != "\\#" || rest.is_empty() {
        return Err(invalid("unknown types require \\# RDATA"));
    }

    let length: usize = number(rest[0])?;
    let bytes = decode_hex(&rest[1..])?;

    if bytes.len() != length {
        return Err(invalid(format!(
            "RDATA length {} does not match declared {}",
            bytes.len(),
            length
        )));
    }
    Ok(DNSResourceData::Raw(bytes))
}

/// Hex digits, possibly split over several tokens
fn decode_hex(tokens: &[&Token]) -> Result<Vec<u8>, ParseError> {
    let hex: String = tokens.iter().map(|t| t.raw.as_str()).collect();
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(invalid(format!("invalid hex RDATA: {}", hex)));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| invalid(format!("invalid hex RDATA: {}", hex)))
}

fn character_strings(tokens: &[&Token]) -> Vec<Vec<u8>> {
    tokens.iter().map(|token| token.bytes.clone()).collect()
}

/// A single character string, at most 255 octets
fn character_string(token: &Token) -> Result<Vec<u8>, ParseError> {
    if token.bytes.len() > 255 {
        return Err(invalid(format!(
            "character string of {} octets is too long",
            token.bytes.len()
        )));
    }
    Ok(token.bytes.clone())
}

fn expect_fields<'a, const N: usize>(
    rtype: DNSResourceType,
    tokens: &[&'a Token],
) -> Result<[&'a Token; N], ParseError> {
    <[&Token; N]>::try_from(tokens).map_err(|_| {
        invalid(format!(
            "{} expects {} RDATA fields, found {}",
            rtype,
            N,
            tokens.len()
        ))
    })
}

fn domain_name(token: &Token) -> Result<String, ParseError> {
    name_to_labels(&token.text)
        .map(|labels| labels_to_name(&labels))
        .map_err(|_| invalid(format!("invalid domain name: {}", token.text)))
}

fn number<T: FromStr>(token: &Token) -> Result<T, ParseError> {
    token
        .text
        .parse()
        .map_err(|_| invalid(format!("invalid number: {}", token.text)))
}

fn invalid(reason: impl Into<String>) -> ParseError {
    ParseError::InvalidRecord(reason.into())
}

/// Split on whitespace, keeping quoted strings together. Parentheses are
/// dropped and `;` starts a comment outside quotes. `\X` stands for `X` and
/// `\DDD` for the octet with decimal value DDD, inside quotes or not.
fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut bytes = Vec::new();
    let mut raw = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                raw.push(ch);
                let escaped = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                raw.push(escaped);
                if escaped.is_ascii_digit() {
                    let mut digits = String::from(escaped);
                    for _ in 0..2 {
                        match chars.next() {
                            Some(d) if d.is_ascii_digit() => {
                                raw.push(d);
                                digits.push(d);
                            }
                            _ => return Err(invalid("\\DDD escape needs three digits")),
                        }
                    }
                    let value: u8 = digits
                        .parse()
                        .map_err(|_| invalid(format!("escape \\{} is out of range", digits)))?;
                    bytes.push(value);
                } else {
                    let mut utf8 = [0u8; 4];
                    bytes.extend_from_slice(escaped.encode_utf8(&mut utf8).as_bytes());
                }
            }
            '"' if in_quotes => {
                tokens.push(Token::new(
                    std::mem::take(&mut bytes),
                    std::mem::take(&mut raw),
                ));
                in_quotes = false;
            }
            '"' => {
                if !raw.is_empty() {
                    tokens.push(Token::new(
                        std::mem::take(&mut bytes),
                        std::mem::take(&mut raw),
                    ));
                }
                in_quotes = true;
            }
            ';' if !in_quotes => break,
            '(' | ')' if !in_quotes => {}
            c if c.is_whitespace() && !in_quotes => {
                if !raw.is_empty() {
                    tokens.push(Token::new(
                        std::mem::take(&mut bytes),
                        std::mem::take(&mut raw),
                    ));
                }
            }
            c => {
                raw.push(c);
                let mut utf8 = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }

    if in_quotes {
        return Err(invalid("unterminated quoted string"));
    }
    if !raw.is_empty() {
        tokens.push(Token::new(bytes, raw));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_soa() {
        let record = parse_record(
            "example.com. 3600 IN SOA ns1.designate.com. admin.example.com. 1458672783 3600 600 86400 3600",
        )
        .unwrap();
        assert_eq!(record.rtype, DNSResourceType::SOA);
        assert_eq!(record.ttl, 3600);
        assert_eq!(record.name(), "example.com.");
        let soa = record.soa().unwrap();
        assert_eq!(soa.mname, "ns1.designate.com.");
        assert_eq!(soa.serial, 1458672783);
        assert_eq!(soa.retry, 600);
    }

    #[test]
    fn ttl_and_class_are_optional() {
        let record = parse_record("www.example.com A 192.0.2.1").unwrap();
        assert_eq!(record.ttl, 0);
        assert_eq!(record.rclass, DNSResourceClass::IN);
        assert_eq!(record.rdata, DNSResourceData::A(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn ttl_suffixes() {
        assert_eq!(parse_ttl("300").unwrap(), 300);
        assert_eq!(parse_ttl("30s").unwrap(), 30);
        assert_eq!(parse_ttl("5m").unwrap(), 300);
        assert_eq!(parse_ttl("1H").unwrap(), 3600);
        assert_eq!(parse_ttl("2d").unwrap(), 172800);
        assert_eq!(parse_ttl("1w").unwrap(), 604800);
        assert!(parse_ttl("99999999w").is_err());
        assert!(parse_ttl("abc").is_err());
    }

    #[test]
    fn quoted_txt_strings() {
        let record =
            parse_record(r#"txt.example.com. 300 IN TXT "v=spf1 include:example.net -all" "second \"part\"""#)
                .unwrap();
        assert_eq!(
            record.rdata,
            DNSResourceData::TXT(vec![
                b"v=spf1 include:example.net -all".to_vec(),
                b"second \"part\"".to_vec(),
            ])
        );
    }

    #[test]
    fn escapes_are_decoded() {
        let record =
            parse_record(r#"example.com. 300 IN TXT "v=DKIM1\; k=rsa\; p=abc" "a\059b" bare\"q \255"#)
                .unwrap();
        assert_eq!(
            record.rdata,
            DNSResourceData::TXT(vec![
                b"v=DKIM1; k=rsa; p=abc".to_vec(),
                b"a;b".to_vec(),
                b"bare\"q".to_vec(),
                vec![0xff],
            ])
        );

        // An escaped semicolon outside quotes is data, not a comment
        let record = parse_record(r"example.com. 300 IN TXT a\;b").unwrap();
        assert_eq!(record.rdata, DNSResourceData::TXT(vec![b"a;b".to_vec()]));

        assert!(parse_record(r#"example.com. 300 IN TXT "\256""#).is_err());
        assert!(parse_record(r#"example.com. 300 IN TXT "\05""#).is_err());
    }

    #[test]
    fn spf_sshfp_naptr() {
        let spf = parse_record(r#"example.com. 300 IN SPF "v=spf1 -all""#).unwrap();
        assert_eq!(spf.rtype, DNSResourceType::SPF);
        assert_eq!(spf.rdata, DNSResourceData::SPF(vec![b"v=spf1 -all".to_vec()]));

        let sshfp = parse_record("host.example.com. 300 IN SSHFP 4 2 0123abcd 4567EF").unwrap();
        assert_eq!(
            sshfp.rdata,
            DNSResourceData::SSHFP {
                algorithm: 4,
                fingerprint_type: 2,
                fingerprint: vec![0x01, 0x23, 0xab, 0xcd, 0x45, 0x67, 0xef],
            }
        );

        let naptr = parse_record(
            r#"example.com. 300 IN NAPTR 100 10 "S" "SIP+D2U" "!^.*$!sip:info@example.com!" _sip._udp.example.com."#,
        )
        .unwrap();
        assert_eq!(
            naptr.rdata,
            DNSResourceData::NAPTR {
                order: 100,
                preference: 10,
                flags: b"S".to_vec(),
                services: b"SIP+D2U".to_vec(),
                regexp: b"!^.*$!sip:info@example.com!".to_vec(),
                replacement: "_sip._udp.example.com.".to_string(),
            }
        );

        assert!(parse_record("host.example.com. 300 IN SSHFP 4 2").is_err());
        assert!(parse_record("host.example.com. 300 IN SSHFP 4 2 abc").is_err());
        assert!(parse_record(r#"example.com. 300 IN NAPTR 100 10 "S" "SIP+D2U" """#).is_err());
    }

    #[test]
    fn mx_srv_caa() {
        let mx = parse_record("example.com. 300 IN MX 10 mail.example.com.").unwrap();
        assert_eq!(
            mx.rdata,
            DNSResourceData::MX {
                preference: 10,
                exchange: "mail.example.com.".to_string()
            }
        );

        let srv = parse_record("_sip._tcp.example.com. 300 IN SRV 10 60 5060 sip.example.com.").unwrap();
        assert!(matches!(srv.rdata, DNSResourceData::SRV { port: 5060, .. }));

        let caa = parse_record(r#"example.com. 300 IN CAA 0 issue "letsencrypt.org""#).unwrap();
        assert_eq!(
            caa.rdata,
            DNSResourceData::CAA {
                flags: 0,
                tag: "issue".to_string(),
                value: "letsencrypt.org".to_string()
            }
        );
    }

    #[test]
    fn generic_rdata_for_unknown_types() {
        let record = parse_record(r"example.com. 300 IN TYPE65280 \# 3 abcdef").unwrap();
        assert_eq!(record.rtype, DNSResourceType::Unknown(65280));
        assert_eq!(record.rdata, DNSResourceData::Raw(vec![0xab, 0xcd, 0xef]));
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(parse_record("").is_err());
        assert!(parse_record("example.com. 300 IN A").is_err());
        assert!(parse_record("example.com. 300 IN A not-an-address").is_err());
        assert!(parse_record("example.com. 300 IN MX mail.example.com.").is_err());
        assert!(parse_record("example.com. 300 IN BOGUS data").is_err());
        assert!(parse_record("example.com. 300 IN AXFR data").is_err());
        assert!(parse_record(r#"example.com. 300 IN TXT "open"#).is_err());
    }
}
