//! netlab Packet Model
//!
//! Structured (tagged-variant) representation of the frames exchanged inside
//! the netlab simulator. Frames are carried as values, not octet buffers:
//! an Ethernet frame holds its payload as the variant selected by its
//! EtherType, an IPv4 packet holds ICMP or UDP the same way.
//!
//! Layer overview (bottom → top):
//!   Ethernet → ARP / IPv4 → ICMP / UDP → DHCP / DNS
//!
//! Only the DHCP and DNS bodies cross a byte boundary (they ride inside UDP
//! as opaque payloads); those use a stable, reversible postcard encoding.

#![no_std]

extern crate alloc;

pub mod addr;
pub mod arp;
pub mod dhcp;
pub mod dns;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod udp;

use core::fmt;

pub use addr::{Ipv4Addr, MacAddr};
pub use arp::{ArpOperation, ArpPacket};
pub use dhcp::{DhcpFlags, DhcpMessage, DhcpMessageType, DhcpOp, DhcpOption};
pub use dns::{DnsMessage, DnsQuestion, DnsRcode, DnsRecord, DnsRecordData, DnsRecordType};
pub use ethernet::{EtherPayload, EtherType, EthernetFrame};
pub use icmp::{IcmpPacket, IcmpType};
pub use ipv4::{IpProtocol, Ipv4Packet, Ipv4Payload};
pub use udp::UdpPacket;

// ── Codec error ─────────────────────────────────────────────

/// Error converting a structured DHCP/DNS message to or from its
/// on-the-wire byte form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Serialization failed (message too large or unrepresentable).
    Encode,
    /// The byte payload did not decode back into a message.
    Decode,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode => write!(f, "message encoding failed"),
            CodecError::Decode => write!(f, "message decoding failed"),
        }
    }
}
