//! Connections
//!
//! Point-to-point links between two device interfaces. A link is a
//! bidirectional edge; lookups match either orientation, and an interface
//! carries at most one link.

use alloc::vec::Vec;

use netlab_stack::InterfaceId;

use crate::device::DeviceId;
use crate::SimError;

/// Identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u32);

/// A link between two interfaces.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_device: DeviceId,
    pub source_interface: InterfaceId,
    pub target_device: DeviceId,
    pub target_interface: InterfaceId,
    pub is_active: bool,
}

impl Connection {
    /// True if `(device, interface)` is one of the two endpoints.
    pub fn touches(&self, device: DeviceId, interface: InterfaceId) -> bool {
        (self.source_device == device && self.source_interface == interface)
            || (self.target_device == device && self.target_interface == interface)
    }

    /// The other endpoint, regardless of orientation.
    pub fn peer_of(&self, device: DeviceId, interface: InterfaceId) -> Option<(DeviceId, InterfaceId)> {
        if self.source_device == device && self.source_interface == interface {
            Some((self.target_device, self.target_interface))
        } else if self.target_device == device && self.target_interface == interface {
            Some((self.source_device, self.source_interface))
        } else {
            None
        }
    }
}

// ── Table ───────────────────────────────────────────────────

/// The mediator's set of links.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    connections: Vec<Connection>,
    next_id: u32,
}

impl ConnectionTable {
    pub fn new() -> Self {
        ConnectionTable::default()
    }

    /// Create a link. Each interface may carry at most one.
    pub fn add(
        &mut self,
        source_device: DeviceId,
        source_interface: InterfaceId,
        target_device: DeviceId,
        target_interface: InterfaceId,
    ) -> Result<ConnectionId, SimError> {
        if source_device == target_device && source_interface == target_interface {
            return Err(SimError::SelfLink);
        }
        if self.find(source_device, source_interface).is_some()
            || self.find(target_device, target_interface).is_some()
        {
            return Err(SimError::EndpointInUse);
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.push(Connection {
            id,
            source_device,
            source_interface,
            target_device,
            target_interface,
            is_active: true,
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let len = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != len
    }

    /// Drop every link touching `device`.
    pub fn remove_device(&mut self, device: DeviceId) {
        self.connections
            .retain(|c| c.source_device != device && c.target_device != device);
    }

    /// Replace the whole link set (topology editor hand-off).
    pub fn replace_all(&mut self, connections: Vec<Connection>) {
        self.next_id = connections.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        self.connections = connections;
    }

    /// The single link on `(device, interface)`, either orientation.
    pub fn find(&self, device: DeviceId, interface: InterfaceId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.touches(device, interface))
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────
