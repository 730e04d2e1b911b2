//! Network Interface Management
//!
//! Interface bookkeeping for a single device: addressing, link state, VLAN
//! membership and rx/tx counters. The interface table preserves insertion
//! order; broadcast fan-out and "first interface" semantics follow it.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use netlab_packet::addr::{is_contiguous_netmask, network_address};
use netlab_packet::{Ipv4Addr, MacAddr};

use crate::NetError;

// ── Interface ───────────────────────────────────────────────

/// Identifier of an interface within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// Physical flavour of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Ethernet,
    Loopback,
    Serial,
}

/// Switch port mode. Access ports belong to one VLAN; trunk ports carry all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    Access,
    Trunk,
}

/// A network interface.
#[derive(Debug, Clone)]
pub struct Interface {
    pub id: InterfaceId,
    pub name: String,
    pub kind: InterfaceKind,
    pub mac: MacAddr,
    pub ip: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub is_up: bool,
    pub vlan: u16,
    pub port_mode: PortMode,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

impl Interface {
    /// New Ethernet interface, up, in VLAN 1, unaddressed.
    pub fn ethernet(id: InterfaceId, name: &str, mac: MacAddr) -> Self {
        Interface {
            id,
            name: String::from(name),
            kind: InterfaceKind::Ethernet,
            mac,
            ip: None,
            netmask: None,
            is_up: true,
            vlan: 1,
            port_mode: PortMode::Access,
            rx_packets: 0,
            tx_packets: 0,
        }
    }

    /// New loopback interface (`lo`, 127.0.0.1/8).
    pub fn loopback(id: InterfaceId) -> Self {
        Interface {
            id,
            name: String::from("lo"),
            kind: InterfaceKind::Loopback,
            mac: MacAddr::ZERO,
            ip: Some(Ipv4Addr::LOCALHOST),
            netmask: Some(Ipv4Addr::new(255, 0, 0, 0)),
            is_up: true,
            vlan: 1,
            port_mode: PortMode::Access,
            rx_packets: 0,
            tx_packets: 0,
        }
    }

    /// True if the interface has both address and mask.
    pub fn is_configured(&self) -> bool {
        self.ip.is_some() && self.netmask.is_some()
    }

    /// Network address of the connected subnet, if configured.
    pub fn network(&self) -> Option<Ipv4Addr> {
        match (self.ip, self.netmask) {
            (Some(ip), Some(mask)) => Some(network_address(ip, mask)),
            _ => None,
        }
    }

    /// True if `ip` falls inside this interface's subnet.
    pub fn covers(&self, ip: Ipv4Addr) -> bool {
        match (self.ip, self.netmask) {
            (Some(local), Some(mask)) => network_address(ip, mask) == network_address(local, mask),
            _ => false,
        }
    }
}

// ── Interface table ─────────────────────────────────────────

/// Ordered interface table of one device.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    interfaces: Vec<Interface>,
    next_id: u32,
}

impl InterfaceTable {
    pub fn new() -> Self {
        InterfaceTable {
            interfaces: Vec::new(),
            next_id: 0,
        }
    }

    /// Append an Ethernet interface and return its id.
    pub fn add_ethernet(&mut self, name: &str, mac: MacAddr) -> InterfaceId {
        let id = InterfaceId(self.next_id);
        self.next_id += 1;
        self.interfaces.push(Interface::ethernet(id, name, mac));
        id
    }

    /// Append a loopback interface and return its id.
    pub fn add_loopback(&mut self) -> InterfaceId {
        let id = InterfaceId(self.next_id);
        self.next_id += 1;
        self.interfaces.push(Interface::loopback(id));
        id
    }

    pub fn get(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: InterfaceId) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.name == name)
    }

    /// Interfaces in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Interface> {
        self.interfaces.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// True if `ip` is one of this device's addresses.
    pub fn has_address(&self, ip: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|i| i.ip == Some(ip))
    }

    /// Interface whose subnet covers `ip`, if any (up interfaces only).
    pub fn covering(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.is_up && i.covers(ip))
    }

    /// Validate and apply an IP/netmask to an interface.
    ///
    /// Rejects unspecified or broadcast addresses and non-contiguous masks.
    /// Connected-route maintenance is the stack's job, not the table's.
    pub fn configure(
        &mut self,
        id: InterfaceId,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<(), NetError> {
        if ip.is_unspecified() || ip.is_broadcast() {
            return Err(NetError::InvalidAddress);
        }
        if !is_contiguous_netmask(netmask) || netmask.is_unspecified() {
            return Err(NetError::InvalidNetmask);
        }

        let iface = self.get_mut(id).ok_or(NetError::InterfaceNotFound)?;
        iface.ip = Some(ip);
        iface.netmask = Some(netmask);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_two() -> InterfaceTable {
        let mut t = InterfaceTable::new();
        t.add_ethernet("eth0", MacAddr::new([0x02, 0, 0, 0, 0, 1]));
        t.add_ethernet("eth1", MacAddr::new([0x02, 0, 0, 0, 0, 2]));
        t
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let t = table_with_two();
        let ids: Vec<u32> = t.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, [0, 1]);
        assert_eq!(t.by_name("eth1").unwrap().id, InterfaceId(1));
    }

    #[test]
    fn test_configure_validates() {
        let mut t = table_with_two();
        let id = InterfaceId(0);

        assert_eq!(
            t.configure(id, Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(255, 255, 255, 0)),
            Err(NetError::InvalidAddress)
        );
        assert_eq!(
            t.configure(id, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 0, 255, 0)),
            Err(NetError::InvalidNetmask)
        );
        assert!(t
            .configure(id, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
            .is_ok());
        assert!(t.has_address(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_covering_ignores_down_interfaces() {
        let mut t = table_with_two();
        t.configure(InterfaceId(0), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        assert!(t.covering(Ipv4Addr::new(10, 0, 0, 9)).is_some());

        t.get_mut(InterfaceId(0)).unwrap().is_up = false;
        assert!(t.covering(Ipv4Addr::new(10, 0, 0, 9)).is_none());
    }
}
