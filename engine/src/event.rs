//! Simulation Events
//!
//! Observer stream emitted by the mediator: frame lifecycle, drops with a
//! reason, MAC learning and ARP traffic. Visualisations animate from these;
//! tests assert on them.

use alloc::vec::Vec;

use netlab_packet::{EthernetFrame, Ipv4Addr, MacAddr};
use netlab_stack::InterfaceId;

use crate::device::DeviceId;

/// Handle returned by `add_event_listener`, used to detach again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub u32);

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoConnection,
    InterfaceDown,
    DevicePoweredOff,
}

impl DropReason {
    /// Stable tag used in event details and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoConnection => "no_connection",
            DropReason::InterfaceDown => "interface_down",
            DropReason::DevicePoweredOff => "device_powered_off",
        }
    }
}

/// One observer event.
#[derive(Debug, Clone)]
pub struct SimEvent {
    pub timestamp: u64,
    pub kind: SimEventKind,
}

/// Event payloads.
#[derive(Debug, Clone)]
pub enum SimEventKind {
    FrameSent {
        source_device: DeviceId,
        source_interface: InterfaceId,
        packet_id: u64,
        /// Copy of the frame on the wire, for observers that inspect traffic.
        frame: EthernetFrame,
    },
    FrameReceived {
        destination_device: DeviceId,
        destination_interface: InterfaceId,
        packet_id: u64,
        /// Snapshot of the envelope trail at arrival.
        hops: Vec<DeviceId>,
    },
    FrameDropped {
        source_device: DeviceId,
        source_interface: Option<InterfaceId>,
        packet_id: u64,
        reason: DropReason,
    },
    MacLearned {
        device: DeviceId,
        mac: MacAddr,
        vlan: u16,
        interface: InterfaceId,
    },
    ArpRequest {
        device: DeviceId,
        interface: InterfaceId,
        target_ip: Ipv4Addr,
    },
    ArpReply {
        device: DeviceId,
        interface: InterfaceId,
        target_ip: Ipv4Addr,
    },
}
