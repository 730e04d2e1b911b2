//! ARP — Address Resolution Protocol (RFC 826)
//!
//! Structured ARP requests and replies for IPv4 over Ethernet.
//! `build_request` / `build_reply` are the sanctioned constructors: a request
//! always goes out with a broadcast destination and an all-zero target MAC,
//! a reply is always unicast with every field filled in.

use serde::{Deserialize, Serialize};

use crate::ethernet::EthernetFrame;
use crate::{Ipv4Addr, MacAddr};

/// Hardware type: Ethernet.
pub const HTYPE_ETHERNET: u16 = 1;
/// Protocol type: IPv4.
pub const PTYPE_IPV4: u16 = 0x0800;

// ── ARP packet ──────────────────────────────────────────────

/// ARP operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArpOperation {
    Request,
    Reply,
}

/// An ARP packet (IPv4 over Ethernet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArpPacket {
    /// Hardware type, always 1 (Ethernet).
    pub hardware_type: u16,
    /// Protocol type, always 0x0800 (IPv4).
    pub protocol_type: u16,
    pub opcode: ArpOperation,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    fn new(
        opcode: ArpOperation,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpPacket {
            hardware_type: HTYPE_ETHERNET,
            protocol_type: PTYPE_IPV4,
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }
}

// ── Frame constructors ──────────────────────────────────────

/// Build an ARP request frame.
///
/// `sender_mac` / `sender_ip` — our addresses.
/// `target_ip` — the IP we want to resolve. The target MAC is all-zero and
/// the frame is broadcast.
pub fn build_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> EthernetFrame {
    let arp = ArpPacket::new(
        ArpOperation::Request,
        sender_mac,
        sender_ip,
        MacAddr::ZERO,
        target_ip,
    );
    EthernetFrame::arp(MacAddr::BROADCAST, sender_mac, arp)
}

/// Build an ARP reply frame, unicast to the requester.
pub fn build_reply(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> EthernetFrame {
    let arp = ArpPacket::new(
        ArpOperation::Reply,
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
    );
    EthernetFrame::arp(target_mac, sender_mac, arp)
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::EtherPayload;

    #[test]
    fn test_request_has_zero_target_and_broadcast_dst() {
        let frame = build_request(
            MacAddr::new([0x02, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        assert_eq!(frame.destination_mac, MacAddr::BROADCAST);
        let EtherPayload::Arp(arp) = &frame.payload else {
            panic!("not an ARP payload");
        };
        assert_eq!(arp.opcode, ArpOperation::Request);
        assert_eq!(arp.target_mac, MacAddr::ZERO);
        assert_eq!(arp.hardware_type, HTYPE_ETHERNET);
        assert_eq!(arp.protocol_type, PTYPE_IPV4);
    }

    #[test]
    fn test_reply_is_unicast_and_filled() {
        let requester = MacAddr::new([0x02, 0, 0, 0, 0, 9]);
        let frame = build_reply(
            MacAddr::new([0x02, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 0, 1),
            requester,
            Ipv4Addr::new(10, 0, 0, 2),
        );
        assert_eq!(frame.destination_mac, requester);
        let EtherPayload::Arp(arp) = &frame.payload else {
            panic!("not an ARP payload");
        };
        assert_eq!(arp.opcode, ArpOperation::Reply);
        assert_eq!(arp.target_mac, requester);
    }
}
