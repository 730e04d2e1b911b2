//! DHCP Messages — RFC 2131
//!
//! BOOTP-shaped DHCP messages with an ordered option list. The message
//! travels inside UDP as an opaque byte payload; `to_bytes` / `from_bytes`
//! provide the stable, reversible postcard encoding used on that boundary.

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{CodecError, Ipv4Addr, MacAddr};

// ── Message and option codes ────────────────────────────────

/// DHCP message type (option 53).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl DhcpMessageType {
    /// Wire value (1..=8).
    pub fn value(&self) -> u8 {
        match self {
            DhcpMessageType::Discover => 1,
            DhcpMessageType::Offer => 2,
            DhcpMessageType::Request => 3,
            DhcpMessageType::Decline => 4,
            DhcpMessageType::Ack => 5,
            DhcpMessageType::Nak => 6,
            DhcpMessageType::Release => 7,
            DhcpMessageType::Inform => 8,
        }
    }
}

/// BOOTP op code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DhcpOp {
    /// 1
    BootRequest,
    /// 2
    BootReply,
}

bitflags! {
    /// BOOTP flags word. Only the broadcast bit is defined.
    ///
    /// Serde support comes from the bitflags `serde` feature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DhcpFlags: u16 {
        const BROADCAST = 0x8000;
    }
}

/// A DHCP option: the tagged value together with its option code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DhcpOption {
    /// Option 53.
    MessageType(DhcpMessageType),
    /// Option 1.
    SubnetMask(Ipv4Addr),
    /// Option 3.
    Router(Vec<Ipv4Addr>),
    /// Option 6.
    DnsServer(Vec<Ipv4Addr>),
    /// Option 15.
    DomainName(String),
    /// Option 50.
    RequestedIp(Ipv4Addr),
    /// Option 51, seconds.
    LeaseTime(u32),
    /// Option 54.
    ServerIdentifier(Ipv4Addr),
    /// Option 55, requested option codes.
    ParameterRequestList(Vec<u8>),
    /// Option 58 (T1), seconds.
    RenewalTime(u32),
    /// Option 59 (T2), seconds.
    RebindingTime(u32),
    /// Option 255.
    End,
}

impl DhcpOption {
    /// The option's wire code.
    pub fn code(&self) -> u8 {
        match self {
            DhcpOption::SubnetMask(_) => 1,
            DhcpOption::Router(_) => 3,
            DhcpOption::DnsServer(_) => 6,
            DhcpOption::DomainName(_) => 15,
            DhcpOption::RequestedIp(_) => 50,
            DhcpOption::LeaseTime(_) => 51,
            DhcpOption::MessageType(_) => 53,
            DhcpOption::ServerIdentifier(_) => 54,
            DhcpOption::ParameterRequestList(_) => 55,
            DhcpOption::RenewalTime(_) => 58,
            DhcpOption::RebindingTime(_) => 59,
            DhcpOption::End => 255,
        }
    }
}

// ── Message ─────────────────────────────────────────────────

/// A DHCP message (BOOTP header + ordered options).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DhcpMessage {
    pub op: DhcpOp,
    /// Hardware type, always 1 (Ethernet).
    pub htype: u8,
    /// Hardware address length, always 6.
    pub hlen: u8,
    /// Transaction id tying replies to their request.
    pub xid: u32,
    pub flags: DhcpFlags,
    /// Client's current IP (renewals), else 0.0.0.0.
    pub ciaddr: Ipv4Addr,
    /// "Your" IP — the address offered/assigned by the server.
    pub yiaddr: Ipv4Addr,
    /// Server IP.
    pub siaddr: Ipv4Addr,
    /// Relay gateway IP (unused here).
    pub giaddr: Ipv4Addr,
    /// Client hardware address.
    pub chaddr: MacAddr,
    pub options: Vec<DhcpOption>,
}

impl DhcpMessage {
    /// Start a client-originated message (BOOTREQUEST).
    pub fn request(xid: u32, chaddr: MacAddr) -> Self {
        DhcpMessage::bare(DhcpOp::BootRequest, xid, chaddr)
    }

    /// Start a server-originated message (BOOTREPLY).
    pub fn reply(xid: u32, chaddr: MacAddr) -> Self {
        DhcpMessage::bare(DhcpOp::BootReply, xid, chaddr)
    }

    fn bare(op: DhcpOp, xid: u32, chaddr: MacAddr) -> Self {
        DhcpMessage {
            op,
            htype: 1,
            hlen: 6,
            xid,
            flags: DhcpFlags::empty(),
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            options: Vec::new(),
        }
    }

    /// True if the client asked for a broadcast reply.
    pub fn wants_broadcast(&self) -> bool {
        self.flags.contains(DhcpFlags::BROADCAST)
    }

    // ── Option accessors ────────────────────────────────────

    /// The message type carried in option 53, if any.
    pub fn message_type(&self) -> Option<DhcpMessageType> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::MessageType(t) => Some(*t),
            _ => None,
        })
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::SubnetMask(m) => Some(*m),
            _ => None,
        })
    }

    /// First router from option 3.
    pub fn router(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::Router(rs) => rs.first().copied(),
            _ => None,
        })
    }

    pub fn dns_servers(&self) -> Vec<Ipv4Addr> {
        self.options
            .iter()
            .find_map(|o| match o {
                DhcpOption::DnsServer(ds) => Some(ds.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::DomainName(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::RequestedIp(ip) => Some(*ip),
            _ => None,
        })
    }

    pub fn lease_time(&self) -> Option<u32> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::LeaseTime(t) => Some(*t),
            _ => None,
        })
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::ServerIdentifier(ip) => Some(*ip),
            _ => None,
        })
    }

    pub fn renewal_time(&self) -> Option<u32> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::RenewalTime(t) => Some(*t),
            _ => None,
        })
    }

    pub fn rebinding_time(&self) -> Option<u32> {
        self.options.iter().find_map(|o| match o {
            DhcpOption::RebindingTime(t) => Some(*t),
            _ => None,
        })
    }

    // ── Wire form ───────────────────────────────────────────

    /// Encode for the UDP payload boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|_| CodecError::Encode)
    }

    /// Decode from a UDP payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<DhcpMessage, CodecError> {
        postcard::from_bytes(bytes).map_err(|_| CodecError::Decode)
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample_offer() -> DhcpMessage {
        let mut msg = DhcpMessage::reply(0xDEAD_BEEF, MacAddr::new([0xCC; 6]));
        msg.yiaddr = Ipv4Addr::new(192, 168, 1, 2);
        msg.siaddr = Ipv4Addr::new(192, 168, 1, 1);
        msg.flags = DhcpFlags::BROADCAST;
        msg.options = vec![
            DhcpOption::MessageType(DhcpMessageType::Offer),
            DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)),
            DhcpOption::Router(vec![Ipv4Addr::new(192, 168, 1, 1)]),
            DhcpOption::LeaseTime(3600),
            DhcpOption::ServerIdentifier(Ipv4Addr::new(192, 168, 1, 1)),
            DhcpOption::End,
        ];
        msg
    }

    #[test]
    fn test_option_codes() {
        let msg = sample_offer();
        let codes: Vec<u8> = msg.options.iter().map(|o| o.code()).collect();
        assert_eq!(codes, vec![53, 1, 3, 51, 54, 255]);
    }

    #[test]
    fn test_accessors() {
        let msg = sample_offer();
        assert_eq!(msg.message_type(), Some(DhcpMessageType::Offer));
        assert_eq!(msg.subnet_mask(), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(msg.router(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(msg.lease_time(), Some(3600));
        assert!(msg.wants_broadcast());
        assert_eq!(msg.renewal_time(), None);
    }

    #[test]
    fn test_wire_round_trip() {
        let msg = sample_offer();
        let bytes = msg.to_bytes().unwrap();
        let back = DhcpMessage::from_bytes(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DhcpMessage::from_bytes(&[0xFF, 0xFF, 0xFF]).is_err());
    }
}
