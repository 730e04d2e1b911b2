//! ICMP — Internet Control Message Protocol
//!
//! Echo request/reply for ping plus the two error messages the forwarding
//! plane generates (time exceeded, destination unreachable).

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// Code 0 for destination unreachable: network unreachable.
pub const CODE_NET_UNREACHABLE: u8 = 0;
/// Code 1 for destination unreachable: host unreachable.
pub const CODE_HOST_UNREACHABLE: u8 = 1;
/// Code 0 for time exceeded: TTL expired in transit.
pub const CODE_TTL_EXPIRED: u8 = 0;

/// Number of pattern bytes carried by an echo request (Linux ping default).
pub const ECHO_DATA_LEN: usize = 56;

// ── ICMP packet ─────────────────────────────────────────────

/// ICMP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcmpType {
    /// Type 8.
    EchoRequest,
    /// Type 0.
    EchoReply,
    /// Type 3.
    DestinationUnreachable,
    /// Type 11.
    TimeExceeded,
}

/// An ICMP message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcmpPacket {
    pub icmp_type: IcmpType,
    pub code: u8,
    pub identifier: u16,
    pub sequence_number: u16,
    pub data: Vec<u8>,
}

// ── Constructors ────────────────────────────────────────────

/// Build an ICMP echo request with the standard pattern payload.
pub fn build_echo_request(identifier: u16, sequence_number: u16) -> IcmpPacket {
    let mut data = Vec::with_capacity(ECHO_DATA_LEN);
    for i in 0..ECHO_DATA_LEN {
        data.push(i as u8);
    }
    IcmpPacket {
        icmp_type: IcmpType::EchoRequest,
        code: 0,
        identifier,
        sequence_number,
        data,
    }
}

/// Build the echo reply for a received echo request (same id, seq and data).
pub fn build_echo_reply(request: &IcmpPacket) -> IcmpPacket {
    IcmpPacket {
        icmp_type: IcmpType::EchoReply,
        code: 0,
        identifier: request.identifier,
        sequence_number: request.sequence_number,
        data: request.data.clone(),
    }
}

/// Build a time-exceeded error (TTL expired in transit).
pub fn build_time_exceeded() -> IcmpPacket {
    IcmpPacket {
        icmp_type: IcmpType::TimeExceeded,
        code: CODE_TTL_EXPIRED,
        identifier: 0,
        sequence_number: 0,
        data: Vec::new(),
    }
}

/// Build a destination-unreachable error with the given code.
pub fn build_destination_unreachable(code: u8) -> IcmpPacket {
    IcmpPacket {
        icmp_type: IcmpType::DestinationUnreachable,
        code,
        identifier: 0,
        sequence_number: 0,
        data: Vec::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_reply_mirrors_request() {
        let req = build_echo_request(0x1234, 3);
        let reply = build_echo_reply(&req);
        assert_eq!(reply.icmp_type, IcmpType::EchoReply);
        assert_eq!(reply.identifier, 0x1234);
        assert_eq!(reply.sequence_number, 3);
        assert_eq!(reply.data, req.data);
        assert_eq!(req.data.len(), ECHO_DATA_LEN);
    }

    #[test]
    fn test_error_messages_carry_codes() {
        assert_eq!(build_time_exceeded().code, CODE_TTL_EXPIRED);
        let unreachable = build_destination_unreachable(CODE_NET_UNREACHABLE);
        assert_eq!(unreachable.icmp_type, IcmpType::DestinationUnreachable);
        assert_eq!(unreachable.code, 0);
    }
}
