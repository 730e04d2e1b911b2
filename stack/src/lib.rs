//! netlab Network Stack
//!
//! The per-device half of the simulator: every host and router owns one
//! instance of each of these subsystems, and all interaction with the rest
//! of the topology happens through frames handed to the mediator.
//!
//! - `iface`: interface table (addressing, VLAN, counters)
//! - `route`: routing table with longest-prefix lookup
//! - `arp`: ARP cache, pending-resolution queue and ager
//! - `stack`: glue for local delivery, ICMP, forwarding plane, egress
//! - `dhcp_client` / `dhcp_server`: RFC 2131 state machines over the
//!   simulator's virtual clock
//! - `dns_resolver` / `dns_server`: caching stub resolver and
//!   authoritative-plus-fallback server
//!
//! All timing is explicit: aging and timer APIs take `now_ms` and nothing
//! here reads a wall clock.

#![no_std]

extern crate alloc;

pub mod arp;
pub mod dhcp_client;
pub mod dhcp_server;
pub mod dns_resolver;
pub mod dns_server;
pub mod iface;
pub mod public_dns;
pub mod route;
pub mod stack;

use core::fmt;

pub use arp::{ArpConfig, ArpEntry, ArpEntryKind, ArpEntryState, ArpService};
pub use dhcp_client::{DhcpBinding, DhcpClient, DhcpClientEvent, DhcpClientState};
pub use dhcp_server::{DhcpLeaseRecord, DhcpPool, DhcpReply, DhcpServer, LeaseState, ReplyDestination};
pub use dns_resolver::{DnsCompletion, DnsFailure, DnsResolver, ResolveAction};
pub use dns_server::DnsServer;
pub use iface::{Interface, InterfaceId, InterfaceKind, InterfaceTable, PortMode};
pub use route::{Route, RouteProtocol, RoutingTable};
pub use stack::{EchoReply, Emission, IcmpNotice, NetStack, StackOutput, UdpDelivery};

// ── Stack error ─────────────────────────────────────────────

/// Error surfaced by user-initiated configuration operations.
///
/// Packet-path failures never raise these; they turn into dropped frames
/// and log lines instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Address failed validation (unspecified, broadcast, malformed).
    InvalidAddress,
    /// Netmask is not a contiguous run of ones.
    InvalidNetmask,
    /// No interface with that id or name.
    InterfaceNotFound,
    /// A route for this (destination, netmask) already exists.
    DuplicateRoute,
    /// No matching route to remove.
    RouteNotFound,
    /// A DHCP pool with this name already exists.
    DuplicatePool,
    /// No DHCP pool with that name.
    PoolNotFound,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::InvalidAddress => write!(f, "invalid address"),
            NetError::InvalidNetmask => write!(f, "invalid netmask"),
            NetError::InterfaceNotFound => write!(f, "interface not found"),
            NetError::DuplicateRoute => write!(f, "duplicate route"),
            NetError::RouteNotFound => write!(f, "route not found"),
            NetError::DuplicatePool => write!(f, "duplicate pool"),
            NetError::PoolNotFound => write!(f, "pool not found"),
        }
    }
}
