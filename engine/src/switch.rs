//! Learning Switch
//!
//! Per-VLAN MAC table and the flood/forward decision. A binding is scoped
//! to the VLAN it was learned in; lookups never cross VLANs. Aging and
//! flushing are caller-driven (CLI, tests), not time-driven.

use alloc::vec::Vec;

use log::trace;

use netlab_packet::MacAddr;
use netlab_stack::iface::{InterfaceKind, PortMode};
use netlab_stack::{InterfaceId, InterfaceTable};

// ── Table entries ───────────────────────────────────────────

/// Origin of a MAC-table binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEntryKind {
    Dynamic,
    Static,
}

/// One (MAC, VLAN) → port binding.
#[derive(Debug, Clone)]
pub struct MacTableEntry {
    pub mac: MacAddr,
    pub interface: InterfaceId,
    pub vlan: u16,
    pub learned_at: u64,
    pub kind: MacEntryKind,
}

/// What to do with a frame after the table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchDecision {
    /// Replicate to every eligible port except the ingress.
    Flood,
    /// Known unicast: send out one port only.
    Forward(InterfaceId),
}

// ── Switch state ────────────────────────────────────────────

/// The forwarding state of one switch.
#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    table: Vec<MacTableEntry>,
}

impl SwitchState {
    pub fn new() -> Self {
        SwitchState::default()
    }

    /// Learn (or refresh) a source binding. Returns `true` when the binding
    /// is new or moved ports; the caller announces those.
    pub fn learn(&mut self, mac: MacAddr, interface: InterfaceId, vlan: u16, now: u64) -> bool {
        if mac.is_broadcast() {
            return false;
        }

        match self.table.iter_mut().find(|e| e.mac == mac && e.vlan == vlan) {
            Some(entry) => {
                if entry.kind == MacEntryKind::Static {
                    return false;
                }
                entry.learned_at = now;
                if entry.interface != interface {
                    trace!("[switch] {} moved to {} (vlan {})", mac, interface, vlan);
                    entry.interface = interface;
                    true
                } else {
                    false
                }
            }
            None => {
                trace!("[switch] learned {} on {} (vlan {})", mac, interface, vlan);
                self.table.push(MacTableEntry {
                    mac,
                    interface,
                    vlan,
                    learned_at: now,
                    kind: MacEntryKind::Dynamic,
                });
                true
            }
        }
    }

    /// Pin a MAC to a port; never overwritten by learning.
    pub fn add_static(&mut self, mac: MacAddr, interface: InterfaceId, vlan: u16, now: u64) {
        self.table.retain(|e| !(e.mac == mac && e.vlan == vlan));
        self.table.push(MacTableEntry {
            mac,
            interface,
            vlan,
            learned_at: now,
            kind: MacEntryKind::Static,
        });
    }

    /// Port holding `mac` in `vlan`, if known.
    pub fn lookup(&self, mac: MacAddr, vlan: u16) -> Option<InterfaceId> {
        self.table
            .iter()
            .find(|e| e.mac == mac && e.vlan == vlan)
            .map(|e| e.interface)
    }

    /// Flood/forward decision for a destination within `vlan`. A hit on the
    /// ingress port itself degenerates to a flood.
    pub fn decide(&self, destination: MacAddr, vlan: u16, ingress: InterfaceId) -> SwitchDecision {
        if destination.is_broadcast() {
            return SwitchDecision::Flood;
        }
        match self.lookup(destination, vlan) {
            Some(port) if port != ingress => SwitchDecision::Forward(port),
            _ => SwitchDecision::Flood,
        }
    }

    /// Evict dynamic entries older than `max_age_ms`.
    pub fn age(&mut self, now: u64, max_age_ms: u64) {
        self.table.retain(|e| {
            e.kind == MacEntryKind::Static || now.saturating_sub(e.learned_at) < max_age_ms
        });
    }

    /// Drop every dynamic entry.
    pub fn flush(&mut self) {
        self.table.retain(|e| e.kind == MacEntryKind::Static);
    }

    /// Entries in learn order.
    pub fn entries(&self) -> &[MacTableEntry] {
        &self.table
    }
}

/// Egress ports for a flood out of `ingress` in `vlan`: every up,
/// non-loopback port in the same VLAN, plus trunks, in table order.
pub fn flood_targets(ifaces: &InterfaceTable, ingress: InterfaceId, vlan: u16) -> Vec<InterfaceId> {
    ifaces
        .iter()
        .filter(|i| {
            i.id != ingress
                && i.kind != InterfaceKind::Loopback
                && i.is_up
                && (i.vlan == vlan || i.port_mode == PortMode::Trunk)
        })
        .map(|i| i.id)
        .collect()
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const P1: InterfaceId = InterfaceId(0);
    const P2: InterfaceId = InterfaceId(1);

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn test_learn_then_forward() {
        let mut sw = SwitchState::new();
        assert!(sw.learn(mac(1), P1, 1, 0));
        // Refresh on the same port is not an announcement.
        assert!(!sw.learn(mac(1), P1, 1, 5));

        assert_eq!(sw.decide(mac(1), 1, P2), SwitchDecision::Forward(P1));
        assert_eq!(sw.decide(mac(9), 1, P2), SwitchDecision::Flood);
        assert_eq!(sw.decide(MacAddr::BROADCAST, 1, P2), SwitchDecision::Flood);
    }

    #[test]
    fn test_lookup_is_vlan_scoped() {
        let mut sw = SwitchState::new();
        sw.learn(mac(1), P1, 10, 0);

        assert_eq!(sw.lookup(mac(1), 10), Some(P1));
        assert_eq!(sw.lookup(mac(1), 20), None);
        assert_eq!(sw.decide(mac(1), 20, P2), SwitchDecision::Flood);
    }

    #[test]
    fn test_port_move_is_announced() {
        let mut sw = SwitchState::new();
        sw.learn(mac(1), P1, 1, 0);
        assert!(sw.learn(mac(1), P2, 1, 10));
        assert_eq!(sw.lookup(mac(1), 1), Some(P2));
    }

    #[test]
    fn test_static_entry_pins_port() {
        let mut sw = SwitchState::new();
        sw.add_static(mac(1), P1, 1, 0);
        assert!(!sw.learn(mac(1), P2, 1, 10));
        assert_eq!(sw.lookup(mac(1), 1), Some(P1));

        sw.flush();
        assert_eq!(sw.lookup(mac(1), 1), Some(P1));
    }

    #[test]
    fn test_broadcast_source_never_learned() {
        let mut sw = SwitchState::new();
        assert!(!sw.learn(MacAddr::BROADCAST, P1, 1, 0));
        assert!(sw.entries().is_empty());
    }

    #[test]
    fn test_aging_evicts_dynamic_only() {
        let mut sw = SwitchState::new();
        sw.learn(mac(1), P1, 1, 0);
        sw.add_static(mac(2), P2, 1, 0);

        sw.age(300_000, 300_000);
        assert_eq!(sw.lookup(mac(1), 1), None);
        assert_eq!(sw.lookup(mac(2), 1), Some(P2));
    }
}
