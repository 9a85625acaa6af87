//! DNS message parsing and construction.
//!
//! Just enough of RFC 1035 for a forwarding proxy: one-question queries,
//! upstream responses with name compression, and the two responses the proxy
//! synthesizes (blocked and merged).

use crate::error::DecodeError;
use crate::forwarder::UpstreamResult;

const HEADER_LEN: usize = 12;
const MAX_POINTER_JUMPS: usize = 32;

pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_MX: u16 = 15;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_DNAME: u16 = 39;
pub const CLASS_IN: u16 = 1;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_NXDOMAIN: u8 = 3;

/// Largest response sent back to clients. Queries are not answered with EDNS,
/// so the classic UDP limit applies.
pub const MAX_UDP_RESPONSE: usize = 512;

const FLAG_QR: u16 = 0x8000;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const OPCODE_MASK: u16 = 0x7800;
const RCODE_MASK: u16 = 0x000F;

/// A parsed DNS query.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub id: u16,
    pub flags: u16,
    /// Queried name as received, without the trailing dot.
    pub name: String,
    /// Lowercased `name`, used for blacklist matching.
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl DnsQuery {
    /// Build a recursive IN query for `name`.
    pub fn new(id: u16, name: &str, qtype: u16) -> Self {
        let name = name.trim_end_matches('.').to_string();
        Self {
            id,
            flags: FLAG_RD,
            domain: name.to_lowercase(),
            name,
            qtype,
            qclass: CLASS_IN,
        }
    }

    /// Parse a DNS query from raw bytes. Only the first question is kept.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let id = reader.u16()?;
        let flags = reader.u16()?;
        let qdcount = reader.u16()?;
        reader.skip(6)?;

        if qdcount == 0 {
            return Err(DecodeError::NoQuestion);
        }

        let name = reader.name()?;
        let qtype = reader.u16()?;
        let qclass = reader.u16()?;

        Ok(Self {
            id,
            flags,
            domain: name.to_lowercase(),
            name,
            qtype,
            qclass,
        })
    }

    /// The same question with another id and record type, for upstream.
    pub fn for_upstream(&self, id: u16, qtype: u16) -> DnsQuery {
        DnsQuery {
            id,
            flags: FLAG_RD,
            name: self.name.clone(),
            domain: self.domain.clone(),
            qtype,
            qclass: CLASS_IN,
        }
    }

    pub fn question(&self) -> DnsQuestion {
        DnsQuestion {
            name: self.name.clone(),
            qtype: self.qtype,
            qclass: self.qclass,
        }
    }

    /// Encode the query to wire format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.name.len() + 6);
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        encode_name(&mut data, &self.name);
        data.extend_from_slice(&self.qtype.to_be_bytes());
        data.extend_from_slice(&self.qclass.to_be_bytes());
        data
    }
}

/// A DNS response.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
}

/// A DNS question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// A DNS resource record.
///
/// `rdata` is stored uncompressed, so records taken from one message can be
/// written into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DnsResponse {
    /// Create the response for a blacklisted query: NXDOMAIN, no answers.
    pub fn blocked(query: &DnsQuery) -> Self {
        Self {
            id: query.id,
            flags: response_flags(query, RCODE_NXDOMAIN),
            questions: vec![query.question()],
            answers: Vec::new(),
        }
    }

    /// Create the response for a forwarded query: the A answers followed by
    /// the AAAA answers, as received.
    ///
    /// The rcode is NXDOMAIN only when both upstream lookups said so.
    pub fn merged(query: &DnsQuery, a: &UpstreamResult, aaaa: &UpstreamResult) -> Self {
        let rcode = if a.rcode == RCODE_NXDOMAIN && aaaa.rcode == RCODE_NXDOMAIN {
            RCODE_NXDOMAIN
        } else {
            RCODE_NOERROR
        };

        Self {
            id: query.id,
            flags: response_flags(query, rcode),
            questions: vec![query.question()],
            answers: a.records.iter().chain(&aaaa.records).cloned().collect(),
        }
    }

    /// Parse a DNS response. Authority and additional sections are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let id = reader.u16()?;
        let flags = reader.u16()?;
        if flags & FLAG_QR == 0 {
            return Err(DecodeError::NotAResponse);
        }
        let qdcount = reader.u16()?;
        let ancount = reader.u16()?;
        reader.skip(4)?;

        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            questions.push(DnsQuestion {
                name: reader.name()?,
                qtype: reader.u16()?,
                qclass: reader.u16()?,
            });
        }

        let mut answers = Vec::with_capacity(ancount as usize);
        for _ in 0..ancount {
            answers.push(reader.record()?);
        }

        Ok(Self {
            id,
            flags,
            questions,
            answers,
        })
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    /// Encode the response to wire format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(usize::MAX)
    }

    /// Encode the response within `max_len` bytes.
    ///
    /// Answers that do not fit are left out and the TC bit is set.
    pub fn encode(&self, max_len: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(512);

        // Header, ANCOUNT and flags patched below
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00]); // ANCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        for q in &self.questions {
            encode_name(&mut data, &q.name);
            data.extend_from_slice(&q.qtype.to_be_bytes());
            data.extend_from_slice(&q.qclass.to_be_bytes());
        }

        let mut written: u16 = 0;
        let mut truncated = false;
        let mut record = Vec::with_capacity(64);

        for a in &self.answers {
            record.clear();
            // Use compression pointer if this is the first question's name
            if self
                .questions
                .first()
                .is_some_and(|q| q.name.eq_ignore_ascii_case(&a.name))
            {
                record.extend_from_slice(&[0xC0, 0x0C]); // Pointer to offset 12
            } else {
                encode_name(&mut record, &a.name);
            }
            record.extend_from_slice(&a.rtype.to_be_bytes());
            record.extend_from_slice(&a.class.to_be_bytes());
            record.extend_from_slice(&a.ttl.to_be_bytes());
            record.extend_from_slice(&(a.rdata.len() as u16).to_be_bytes());
            record.extend_from_slice(&a.rdata);

            if data.len() + record.len() > max_len {
                truncated = true;
                break;
            }
            data.extend_from_slice(&record);
            written += 1;
        }

        data[6..8].copy_from_slice(&written.to_be_bytes());
        if truncated {
            let flags = self.flags | FLAG_TC;
            data[2..4].copy_from_slice(&flags.to_be_bytes());
        }

        data
    }
}

/// Header flags for a response to `query`: opcode and RD are copied, RA is set.
fn response_flags(query: &DnsQuery, rcode: u8) -> u16 {
    FLAG_QR | (query.flags & (OPCODE_MASK | FLAG_RD)) | FLAG_RA | (rcode as u16 & RCODE_MASK)
}

fn encode_name(buf: &mut Vec<u8>, name: &str) {
    if !name.is_empty() {
        for label in name.split('.') {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
    }
    buf.push(0);
}

/// Cursor over a DNS message.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let slice = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(DecodeError::Truncated(self.pos))?;
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.bytes(len).map(|_| ())
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn name(&mut self) -> Result<String, DecodeError> {
        let (name, end) = read_name_at(self.data, self.pos)?;
        self.pos = end;
        Ok(name)
    }

    fn record(&mut self) -> Result<DnsRecord, DecodeError> {
        let name = self.name()?;
        let rtype = self.u16()?;
        let class = self.u16()?;
        let ttl = self.u32()?;
        let rdlength = self.u16()? as usize;
        let start = self.pos;
        let raw = self.bytes(rdlength)?;

        // Names inside rdata may point elsewhere in this message
        let rdata = match rtype {
            TYPE_NS | TYPE_CNAME | TYPE_PTR | TYPE_DNAME => {
                let (target, _) = read_name_at(self.data, start)?;
                let mut rdata = Vec::with_capacity(target.len() + 2);
                encode_name(&mut rdata, &target);
                rdata
            }
            TYPE_MX if rdlength >= 2 => {
                let (exchange, _) = read_name_at(self.data, start + 2)?;
                let mut rdata = raw[..2].to_vec();
                encode_name(&mut rdata, &exchange);
                rdata
            }
            _ => raw.to_vec(),
        };

        Ok(DnsRecord {
            name,
            rtype,
            class,
            ttl,
            rdata,
        })
    }
}

/// Read a possibly compressed name starting at `start`.
///
/// Returns the dotted name and the offset just past it in the original
/// (uncompressed) position.
fn read_name_at(data: &[u8], start: usize) -> Result<(String, usize), DecodeError> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *data.get(pos).ok_or(DecodeError::Truncated(pos))? as usize;
        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = data
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(DecodeError::Truncated(pos))?;
                let label = std::str::from_utf8(label).map_err(|_| DecodeError::BadLabel(pos))?;
                if label.contains('.') {
                    return Err(DecodeError::BadLabel(pos));
                }
                labels.push(label);
                pos += 1 + len;
            }
            0xC0 => {
                let low = *data.get(pos + 1).ok_or(DecodeError::Truncated(pos + 1))? as usize;
                end.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(DecodeError::PointerLoop(pos));
                }
                pos = ((len & 0x3F) << 8) | low;
            }
            _ => return Err(DecodeError::BadLabel(pos)),
        }
    }

    Ok((labels.join("."), end.unwrap_or(pos)))
}
