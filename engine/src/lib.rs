//! netlab Simulation Engine
//!
//! The mediator half of the simulator: the topology (devices and the links
//! between their interfaces), synchronous hop-by-hop frame delivery, the
//! learning-switch plane, and the virtual clock that drives every timer in
//! the stack.
//!
//! A `Simulator` is an owned value; independent simulations coexist freely
//! (parallel tests each build their own). Devices never touch each other's
//! state; every interaction is a frame handed to the mediator.

#![no_std]

extern crate alloc;

pub mod conn;
pub mod device;
pub mod envelope;
pub mod event;
pub mod sim;
pub mod switch;

use core::fmt;

use netlab_stack::NetError;

pub use conn::{Connection, ConnectionId, ConnectionTable};
pub use device::{
    Device, DeviceFactory, DeviceId, DeviceKind, DeviceOutput, DeviceRole, HostState, Position,
    RouterState,
};
pub use envelope::{DeliveryStatus, PacketEnvelope};
pub use event::{DropReason, ListenerId, SimEvent, SimEventKind};
pub use sim::Simulator;
pub use switch::{MacEntryKind, MacTableEntry, SwitchState};

// ── Engine error ────────────────────────────────────────────

/// Error surfaced by topology-editing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// No device with that id is registered.
    UnknownDevice,
    /// The device has no such interface.
    UnknownInterface,
    /// The interface already has a link.
    EndpointInUse,
    /// Both endpoints of a link are the same interface.
    SelfLink,
    /// The operation needs a host (or router) role the device lacks.
    WrongRole,
    /// A stack configuration operation failed.
    Config(NetError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownDevice => write!(f, "unknown device"),
            SimError::UnknownInterface => write!(f, "unknown interface"),
            SimError::EndpointInUse => write!(f, "interface already linked"),
            SimError::SelfLink => write!(f, "cannot link an interface to itself"),
            SimError::WrongRole => write!(f, "operation not supported by this device role"),
            SimError::Config(err) => write!(f, "{}", err),
        }
    }
}

impl From<NetError> for SimError {
    fn from(err: NetError) -> Self {
        SimError::Config(err)
    }
}
