//! Routing Table
//!
//! Longest-prefix routing over a table kept sorted by descending prefix
//! length, so a linear scan returns the most specific match. Among routes
//! with the same prefix length the earliest inserted wins.

use alloc::vec::Vec;

use netlab_packet::addr::{is_in_network, netmask_to_prefix, network_address};
use netlab_packet::Ipv4Addr;

use crate::iface::InterfaceId;
use crate::NetError;

// ── Route ───────────────────────────────────────────────────

/// How a route entered the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProtocol {
    /// Auto-inserted when an interface was addressed.
    Connected,
    /// Explicitly configured.
    Static,
}

/// A routing table entry.
#[derive(Debug, Clone)]
pub struct Route {
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// 0.0.0.0 for directly connected networks.
    pub gateway: Ipv4Addr,
    pub interface: InterfaceId,
    pub metric: u32,
    pub protocol: RouteProtocol,
}

impl Route {
    /// Prefix length of this route's mask.
    pub fn prefix_len(&self) -> u8 {
        netmask_to_prefix(self.netmask).unwrap_or(0)
    }

    /// True if the route has no gateway (on-link delivery).
    pub fn is_directly_connected(&self) -> bool {
        self.gateway.is_unspecified()
    }
}

// ── Table ───────────────────────────────────────────────────

/// Routing table sorted by descending prefix length, insertion-stable
/// among equal prefixes.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable { routes: Vec::new() }
    }

    /// Insert a connected route for an interface's subnet.
    pub fn add_connected(
        &mut self,
        network: Ipv4Addr,
        netmask: Ipv4Addr,
        interface: InterfaceId,
    ) -> Result<(), NetError> {
        self.insert(Route {
            destination: network,
            netmask,
            gateway: Ipv4Addr::UNSPECIFIED,
            interface,
            metric: 0,
            protocol: RouteProtocol::Connected,
        })
    }

    /// Insert a static route.
    ///
    /// The destination is normalised to its network address. Rejects
    /// non-contiguous masks and duplicate (destination, netmask) pairs.
    pub fn add_static(
        &mut self,
        destination: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
        interface: InterfaceId,
        metric: u32,
    ) -> Result<(), NetError> {
        self.insert(Route {
            destination: network_address(destination, netmask),
            netmask,
            gateway,
            interface,
            metric,
            protocol: RouteProtocol::Static,
        })
    }

    fn insert(&mut self, route: Route) -> Result<(), NetError> {
        let prefix = match netmask_to_prefix(route.netmask) {
            Some(p) => p,
            None => return Err(NetError::InvalidNetmask),
        };

        if self
            .routes
            .iter()
            .any(|r| r.destination == route.destination && r.netmask == route.netmask)
        {
            return Err(NetError::DuplicateRoute);
        }

        // Insert after the last route with prefix >= ours, keeping the table
        // sorted longest-prefix-first and insertion-stable among ties.
        let pos = self
            .routes
            .iter()
            .position(|r| r.prefix_len() < prefix)
            .unwrap_or(self.routes.len());
        self.routes.insert(pos, route);
        Ok(())
    }

    /// Remove the route for exactly (destination, netmask).
    pub fn remove(&mut self, destination: Ipv4Addr, netmask: Ipv4Addr) -> Result<(), NetError> {
        let len = self.routes.len();
        self.routes
            .retain(|r| !(r.destination == destination && r.netmask == netmask));
        if self.routes.len() == len {
            Err(NetError::RouteNotFound)
        } else {
            Ok(())
        }
    }

    /// Drop every connected route that egresses `interface`.
    pub fn remove_connected(&mut self, interface: InterfaceId) {
        self.routes
            .retain(|r| !(r.protocol == RouteProtocol::Connected && r.interface == interface));
    }

    /// Longest-prefix match for `ip`.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| is_in_network(ip, r.destination, r.netmask))
    }

    /// Routes in match order (for introspection).
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const IF0: InterfaceId = InterfaceId(0);
    const IF1: InterfaceId = InterfaceId(1);

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = RoutingTable::new();
        table
            .add_static(
                Ipv4Addr::new(0, 0, 0, 0),
                Ipv4Addr::new(0, 0, 0, 0),
                Ipv4Addr::new(10, 0, 0, 254),
                IF0,
                1,
            )
            .unwrap();
        table
            .add_connected(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0), IF1)
            .unwrap();

        let hit = table.lookup(Ipv4Addr::new(10, 0, 0, 7)).unwrap();
        assert_eq!(hit.interface, IF1);
        assert!(hit.is_directly_connected());

        let default = table.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap();
        assert_eq!(default.interface, IF0);
    }

    #[test]
    fn test_tie_goes_to_earliest_inserted() {
        let mut table = RoutingTable::new();
        table
            .add_static(
                Ipv4Addr::new(10, 1, 0, 0),
                Ipv4Addr::new(255, 255, 0, 0),
                Ipv4Addr::new(10, 0, 0, 1),
                IF0,
                1,
            )
            .unwrap();
        table
            .add_static(
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(255, 0, 0, 0),
                Ipv4Addr::new(10, 0, 0, 2),
                IF1,
                1,
            )
            .unwrap();

        // /16 covers, so it wins over the /8 regardless of insertion order.
        assert_eq!(table.lookup(Ipv4Addr::new(10, 1, 2, 3)).unwrap().interface, IF0);
        // Outside the /16, the /8 matches.
        assert_eq!(table.lookup(Ipv4Addr::new(10, 9, 0, 1)).unwrap().interface, IF1);
    }

    #[test]
    fn test_duplicate_and_invalid_rejected() {
        let mut table = RoutingTable::new();
        table
            .add_connected(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0), IF0)
            .unwrap();
        assert_eq!(
            table.add_connected(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0), IF1),
            Err(NetError::DuplicateRoute)
        );
        assert_eq!(
            table.add_static(
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(255, 0, 255, 0),
                Ipv4Addr::UNSPECIFIED,
                IF0,
                1,
            ),
            Err(NetError::InvalidNetmask)
        );
    }

    #[test]
    fn test_remove_connected_only_touches_interface() {
        let mut table = RoutingTable::new();
        table
            .add_connected(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0), IF0)
            .unwrap();
        table
            .add_connected(Ipv4Addr::new(10, 0, 1, 0), Ipv4Addr::new(255, 255, 255, 0), IF1)
            .unwrap();
        table
            .add_static(
                Ipv4Addr::new(172, 16, 0, 0),
                Ipv4Addr::new(255, 255, 0, 0),
                Ipv4Addr::new(10, 0, 1, 254),
                IF0,
                1,
            )
            .unwrap();

        table.remove_connected(IF0);
        assert_eq!(table.len(), 2);
        assert!(table.lookup(Ipv4Addr::new(10, 0, 0, 5)).is_none());
        // The static route through IF0 survives.
        assert!(table.lookup(Ipv4Addr::new(172, 16, 3, 4)).is_some());
    }

    #[test]
    fn test_destination_normalised_to_network() {
        let mut table = RoutingTable::new();
        table
            .add_static(
                Ipv4Addr::new(192, 168, 1, 77),
                Ipv4Addr::new(255, 255, 255, 0),
                Ipv4Addr::new(10, 0, 0, 1),
                IF0,
                1,
            )
            .unwrap();
        let r = table.lookup(Ipv4Addr::new(192, 168, 1, 200)).unwrap();
        assert_eq!(r.destination, Ipv4Addr::new(192, 168, 1, 0));
    }
}
