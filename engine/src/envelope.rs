//! Packet Envelopes
//!
//! Every in-flight frame is wrapped in an envelope carrying a unique id,
//! the send timestamp and the trail of devices it has visited. The trail
//! is what path traces and loop checks in tests read.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use netlab_packet::EthernetFrame;

use crate::device::DeviceId;

/// Process-wide envelope id counter; ids stay unique across simulators.
static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);

/// Delivery state of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    InTransit,
    Delivered,
    Dropped,
}

/// An in-flight frame.
#[derive(Debug, Clone)]
pub struct PacketEnvelope {
    pub id: u64,
    pub timestamp: u64,
    pub frame: EthernetFrame,
    /// Devices already visited, in order.
    pub hops: Vec<DeviceId>,
    pub status: DeliveryStatus,
}

impl PacketEnvelope {
    /// Wrap a frame originated by `source` with a fresh id.
    pub fn new(frame: EthernetFrame, source: DeviceId, timestamp: u64) -> Self {
        PacketEnvelope {
            id: NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed),
            timestamp,
            frame,
            hops: alloc::vec![source],
            status: DeliveryStatus::InTransit,
        }
    }

    /// Duplicate for a flood fan-out: fresh id, cloned frame and trail.
    pub fn fork(&self) -> Self {
        PacketEnvelope {
            id: NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: self.timestamp,
            frame: self.frame.clone(),
            hops: self.hops.clone(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_packet::arp::build_request;
    use netlab_packet::{Ipv4Addr, MacAddr};

    fn frame() -> EthernetFrame {
        build_request(
            MacAddr::new([2, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        )
    }

    #[test]
    fn test_fork_gets_fresh_id_and_shared_trail() {
        let mut env = PacketEnvelope::new(frame(), DeviceId(1), 0);
        env.hops.push(DeviceId(2));

        let copy = env.fork();
        assert_ne!(copy.id, env.id);
        assert_eq!(copy.hops, env.hops);
        assert_eq!(copy.frame, env.frame);
    }
}
