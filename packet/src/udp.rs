//! UDP Layer
//!
//! Datagram framing for the two application protocols the simulator carries:
//! DHCP (67/68) and DNS (53). The payload is an opaque byte vector; the
//! checksum is always zero (not modelled).

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// UDP header size (for the length field).
pub const HEADER_SIZE: u16 = 8;

/// DHCP server port.
pub const DHCP_SERVER_PORT: u16 = 67;
/// DHCP client port.
pub const DHCP_CLIENT_PORT: u16 = 68;
/// DNS port.
pub const DNS_PORT: u16 = 53;

// ── Datagram ────────────────────────────────────────────────

/// A UDP datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpPacket {
    pub source_port: u16,
    pub destination_port: u16,
    /// Header + payload length in bytes.
    pub length: u16,
    /// Always zero (checksums are not modelled).
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl UdpPacket {
    /// Build a datagram; the length field is derived from the payload.
    pub fn new(source_port: u16, destination_port: u16, payload: Vec<u8>) -> Self {
        let length = HEADER_SIZE + payload.len() as u16;
        UdpPacket {
            source_port,
            destination_port,
            length,
            checksum: 0,
            payload,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_length_covers_header_and_payload() {
        let dgram = UdpPacket::new(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, vec![0u8; 100]);
        assert_eq!(dgram.length, 108);
        assert_eq!(dgram.checksum, 0);
    }
}
