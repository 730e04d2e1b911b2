//! DNS Messages — RFC 1035
//!
//! Structured DNS queries and responses. Names are plain strings (no label
//! compression); the message rides inside UDP as an opaque postcard-encoded
//! payload, mirroring the DHCP boundary.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::{CodecError, Ipv4Addr};

/// Internet class.
pub const CLASS_IN: u16 = 1;

// ── Record types and response codes ─────────────────────────

/// DNS record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsRecordType {
    /// 1
    A,
    /// 2
    Ns,
    /// 5
    Cname,
    /// 12
    Ptr,
    /// 15
    Mx,
    /// 16
    Txt,
}

impl DnsRecordType {
    /// Wire value of the record type.
    pub fn value(&self) -> u16 {
        match self {
            DnsRecordType::A => 1,
            DnsRecordType::Ns => 2,
            DnsRecordType::Cname => 5,
            DnsRecordType::Ptr => 12,
            DnsRecordType::Mx => 15,
            DnsRecordType::Txt => 16,
        }
    }
}

/// DNS response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsRcode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
}

impl DnsRcode {
    /// Conventional name of the response code, used in resolver errors.
    pub fn name(&self) -> &'static str {
        match self {
            DnsRcode::NoError => "NOERROR",
            DnsRcode::FormErr => "FORMERR",
            DnsRcode::ServFail => "SERVFAIL",
            DnsRcode::NxDomain => "NXDOMAIN",
            DnsRcode::NotImp => "NOTIMP",
            DnsRcode::Refused => "REFUSED",
        }
    }
}

// ── Header, question, record ────────────────────────────────

/// DNS message header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsHeader {
    pub id: u16,
    /// True for responses.
    pub qr: bool,
    pub opcode: u8,
    /// Authoritative answer.
    pub aa: bool,
    /// Truncated (never set here).
    pub tc: bool,
    /// Recursion desired.
    pub rd: bool,
    /// Recursion available.
    pub ra: bool,
    pub rcode: DnsRcode,
}

impl DnsHeader {
    /// Header for a standard recursive query.
    pub fn query(id: u16) -> Self {
        DnsHeader {
            id,
            qr: false,
            opcode: 0,
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            rcode: DnsRcode::NoError,
        }
    }
}

/// A question entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: DnsRecordType,
    pub qclass: u16,
}

/// Typed record data for the supported record types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DnsRecordData {
    A(Ipv4Addr),
    Ns(String),
    Cname(String),
    Ptr(String),
    Mx { preference: u16, exchange: String },
    Txt(String),
}

impl DnsRecordData {
    /// The record type this data belongs to.
    pub fn record_type(&self) -> DnsRecordType {
        match self {
            DnsRecordData::A(_) => DnsRecordType::A,
            DnsRecordData::Ns(_) => DnsRecordType::Ns,
            DnsRecordData::Cname(_) => DnsRecordType::Cname,
            DnsRecordData::Ptr(_) => DnsRecordType::Ptr,
            DnsRecordData::Mx { .. } => DnsRecordType::Mx,
            DnsRecordData::Txt(_) => DnsRecordType::Txt,
        }
    }
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: DnsRecordType,
    pub rclass: u16,
    /// Seconds this record may be cached.
    pub ttl: u32,
    pub data: DnsRecordData,
}

impl DnsRecord {
    /// Build an A record.
    pub fn a(name: &str, addr: Ipv4Addr, ttl: u32) -> Self {
        DnsRecord {
            name: String::from(name),
            rtype: DnsRecordType::A,
            rclass: CLASS_IN,
            ttl,
            data: DnsRecordData::A(addr),
        }
    }

    /// The IPv4 address if this is an A record.
    pub fn as_a(&self) -> Option<Ipv4Addr> {
        match self.data {
            DnsRecordData::A(ip) => Some(ip),
            _ => None,
        }
    }
}

// ── Message ─────────────────────────────────────────────────

/// A DNS message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authority: Vec<DnsRecord>,
    pub additional: Vec<DnsRecord>,
}

impl DnsMessage {
    /// Build a single-question A query.
    pub fn query_a(id: u16, name: &str) -> Self {
        DnsMessage {
            header: DnsHeader::query(id),
            questions: alloc::vec![DnsQuestion {
                name: String::from(name),
                qtype: DnsRecordType::A,
                qclass: CLASS_IN,
            }],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Start a response mirroring a query's id and questions.
    pub fn response_to(query: &DnsMessage) -> Self {
        let mut header = query.header.clone();
        header.qr = true;
        header.ra = true;
        DnsMessage {
            header,
            questions: query.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// First A record among the answers.
    pub fn first_a(&self) -> Option<Ipv4Addr> {
        self.answers.iter().find_map(|r| r.as_a())
    }

    // ── Wire form ───────────────────────────────────────────

    /// Encode for the UDP payload boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|_| CodecError::Encode)
    }

    /// Decode from a UDP payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<DnsMessage, CodecError> {
        postcard::from_bytes(bytes).map_err(|_| CodecError::Decode)
    }
}

// ── Tests ───────────────────────────────────────────────────
