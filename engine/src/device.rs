//! Devices and Roles
//!
//! A device is identity plus interface bookkeeping plus a role payload:
//! hosts run the stack with a DHCP client and a DNS resolver, routers run
//! the forwarding stack with a DHCP server and a DNS server, switches run
//! the L2 table. The factory hands out deterministic MAC addresses so
//! topologies are reproducible.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace, warn};

use netlab_packet::dhcp::{DhcpMessage, DhcpOp};
use netlab_packet::dns::DnsMessage;
use netlab_packet::udp::{DHCP_CLIENT_PORT, DHCP_SERVER_PORT, DNS_PORT};
use netlab_packet::{EthernetFrame, Ipv4Addr, MacAddr};
use netlab_stack::stack::Emission;
use netlab_stack::{
    DhcpClient, DhcpClientEvent, DhcpClientState, DhcpPool, DhcpServer, DnsCompletion,
    DnsResolver, DnsServer, EchoReply, InterfaceId, InterfaceTable, NetStack, ReplyDestination,
    ResolveAction, UdpDelivery,
};

use crate::switch::{flood_targets, SwitchDecision, SwitchState};
use crate::SimError;

/// Ephemeral source port the resolver queries from.
const DNS_CLIENT_PORT: u16 = 49153;

// ── Identity ────────────────────────────────────────────────

/// Identifier of a device within the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Role of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Host,
    Switch,
    Router,
}

/// Canvas position (carried for the editor, unused by the engine).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// ── Role payloads ───────────────────────────────────────────

/// Host-role state: stack plus the client-side services.
pub struct HostState {
    pub stack: NetStack,
    pub dhcp: DhcpClient,
    pub dns: DnsResolver,
    /// Interface the DHCP client runs on.
    dhcp_interface: Option<InterfaceId>,
    /// MAC the last DHCP reply came from, for unicast renewals.
    dhcp_server_mac: Option<MacAddr>,
    /// Resolver target, configured manually or learned from DHCP.
    pub dns_server: Option<Ipv4Addr>,
    next_ping_id: u16,
}

/// Router-role state: forwarding stack plus the server-side services.
pub struct RouterState {
    pub stack: NetStack,
    pub dhcp: DhcpServer,
    pub dns: DnsServer,
}

/// Per-role state of a device.
pub enum DeviceRole {
    Host(HostState),
    Switch(SwitchState),
    Router(RouterState),
}

// ── Output ──────────────────────────────────────────────────

/// What processing one inbound frame produced.
#[derive(Default)]
pub struct DeviceOutput {
    /// Switch continuation: egress ports for the same packet.
    pub forwarded: Vec<InterfaceId>,
    /// True when `forwarded` is a flood fan-out (duplicated envelopes).
    pub flooded: bool,
    /// Frames newly originated by this device.
    pub emissions: Vec<Emission>,
    /// (mac, vlan, port) when the switch learned or moved a binding.
    pub learned: Option<(MacAddr, u16, InterfaceId)>,
}

// ── Device ──────────────────────────────────────────────────

/// One node of the topology.
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub hostname: String,
    pub kind: DeviceKind,
    pub powered_on: bool,
    pub position: Position,
    pub interfaces: InterfaceTable,
    pub role: DeviceRole,
}

impl Device {
    // ── Role accessors ──────────────────────────────────────

    pub fn host(&self) -> Option<&HostState> {
        match &self.role {
            DeviceRole::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn host_mut(&mut self) -> Option<&mut HostState> {
        match &mut self.role {
            DeviceRole::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn router(&self) -> Option<&RouterState> {
        match &self.role {
            DeviceRole::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn router_mut(&mut self) -> Option<&mut RouterState> {
        match &mut self.role {
            DeviceRole::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn switch_state(&self) -> Option<&SwitchState> {
        match &self.role {
            DeviceRole::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn switch_state_mut(&mut self) -> Option<&mut SwitchState> {
        match &mut self.role {
            DeviceRole::Switch(s) => Some(s),
            _ => None,
        }
    }

    fn stack_parts(&mut self) -> Result<(&mut NetStack, &mut InterfaceTable), SimError> {
        let Device {
            interfaces, role, ..
        } = self;
        match role {
            DeviceRole::Host(h) => Ok((&mut h.stack, interfaces)),
            DeviceRole::Router(r) => Ok((&mut r.stack, interfaces)),
            DeviceRole::Switch(_) => Err(SimError::WrongRole),
        }
    }

    // ── Configuration ───────────────────────────────────────

    /// Assign an address to an interface (hosts and routers).
    pub fn configure_interface(
        &mut self,
        id: InterfaceId,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<(), SimError> {
        let (stack, ifaces) = self.stack_parts()?;
        stack.configure_interface(ifaces, id, ip, netmask)?;
        Ok(())
    }

    /// Bring an interface up or down. On switches only the flag changes.
    pub fn set_interface_up(&mut self, id: InterfaceId, up: bool) -> Result<(), SimError> {
        match self.stack_parts() {
            Ok((stack, ifaces)) => {
                stack.set_interface_up(ifaces, id, up)?;
                Ok(())
            }
            Err(_) => {
                let iface = self
                    .interfaces
                    .get_mut(id)
                    .ok_or(SimError::UnknownInterface)?;
                iface.is_up = up;
                Ok(())
            }
        }
    }

    /// Install a static route (hosts and routers).
    pub fn add_static_route(
        &mut self,
        destination: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
        interface: InterfaceId,
        metric: u32,
    ) -> Result<(), SimError> {
        let (stack, _) = self.stack_parts()?;
        stack
            .routes
            .add_static(destination, netmask, gateway, interface, metric)?;
        Ok(())
    }

    /// Add an address pool to the router's DHCP server.
    pub fn add_dhcp_pool(&mut self, pool: DhcpPool) -> Result<(), SimError> {
        let router = self.router_mut().ok_or(SimError::WrongRole)?;
        router.dhcp.add_pool(pool)?;
        Ok(())
    }

    /// Add an authoritative A record to the router's DNS server.
    pub fn add_dns_record(&mut self, name: &str, addr: Ipv4Addr, ttl: u32) -> Result<(), SimError> {
        let router = self.router_mut().ok_or(SimError::WrongRole)?;
        router.dns.add_a_record(name, addr, ttl);
        Ok(())
    }

    /// Point the host's resolver at a DNS server.
    pub fn set_dns_server(&mut self, server: Ipv4Addr) -> Result<(), SimError> {
        let host = self.host_mut().ok_or(SimError::WrongRole)?;
        host.dns_server = Some(server);
        Ok(())
    }

    // ── Host operations ─────────────────────────────────────

    /// Start DHCP on `interface`. Returns the DISCOVER broadcast.
    pub fn start_dhcp(&mut self, interface: InterfaceId, now: u64) -> Result<Vec<Emission>, SimError> {
        if self.interfaces.get(interface).is_none() {
            return Err(SimError::UnknownInterface);
        }
        let Device {
            interfaces, role, ..
        } = self;
        let host = match role {
            DeviceRole::Host(h) => h,
            _ => return Err(SimError::WrongRole),
        };

        host.dhcp_interface = Some(interface);
        let discover = host.dhcp.discover(now);
        Ok(send_dhcp_message(host, interfaces, discover).into_iter().collect())
    }

    /// Release the DHCP lease and deconfigure the interface.
    pub fn release_dhcp(&mut self, _now: u64) -> Result<Vec<Emission>, SimError> {
        let Device {
            interfaces, role, ..
        } = self;
        let host = match role {
            DeviceRole::Host(h) => h,
            _ => return Err(SimError::WrongRole),
        };

        let mut out = Vec::new();
        if let Some(release) = host.dhcp.release() {
            if let Some(emission) = send_dhcp_message(host, interfaces, release) {
                out.push(emission);
            }
            deconfigure_dhcp_interface(host, interfaces);
        }
        Ok(out)
    }

    /// Originate a ping. Returns the echo identifier and the frames to send.
    pub fn ping(
        &mut self,
        destination: Ipv4Addr,
        sequence_number: u16,
        now: u64,
    ) -> Result<(u16, Vec<Emission>), SimError> {
        let Device {
            interfaces, role, ..
        } = self;
        let host = match role {
            DeviceRole::Host(h) => h,
            _ => return Err(SimError::WrongRole),
        };

        host.next_ping_id = host.next_ping_id.wrapping_add(1);
        let identifier = host.next_ping_id;
        let out = host
            .stack
            .ping(interfaces, destination, identifier, sequence_number, now);
        Ok((identifier, out.tx))
    }

    /// Dequeue the echo reply for a ping this host sent.
    pub fn take_ping_reply(&mut self, identifier: u16, sequence_number: u16) -> Option<EchoReply> {
        self.host_mut()?
            .stack
            .take_echo_reply(identifier, sequence_number)
    }

    /// Start resolving `name` through the configured DNS server.
    pub fn resolve_name(&mut self, name: &str, now: u64) -> Result<Vec<Emission>, SimError> {
        let Device {
            interfaces, role, ..
        } = self;
        let host = match role {
            DeviceRole::Host(h) => h,
            _ => return Err(SimError::WrongRole),
        };

        match host.dns.resolve(name, now) {
            ResolveAction::Immediate(_) => Ok(Vec::new()),
            ResolveAction::Query(query) => {
                let server = match host.dns_server {
                    Some(ip) => ip,
                    None => {
                        // The pending query will time out on its own.
                        warn!("[dns] no server configured, query will expire");
                        return Ok(Vec::new());
                    }
                };
                let payload = match query.to_bytes() {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("[dns] query encoding failed: {}", err);
                        return Ok(Vec::new());
                    }
                };
                let out = host.stack.udp_routed(
                    interfaces,
                    server,
                    DNS_CLIENT_PORT,
                    DNS_PORT,
                    payload,
                    now,
                );
                Ok(out.tx)
            }
        }
    }

    /// Pop the oldest finished DNS resolution.
    pub fn poll_dns(&mut self) -> Option<DnsCompletion> {
        self.host_mut()?.dns.poll_completion()
    }

    pub fn dhcp_state(&self) -> Option<DhcpClientState> {
        self.host().map(|h| h.dhcp.state())
    }

    // ── Packet processing ───────────────────────────────────

    /// Process a frame delivered on `ingress`. The mediator has already
    /// gated on power and interface state.
    pub fn process_frame(
        &mut self,
        frame: &EthernetFrame,
        ingress: InterfaceId,
        now: u64,
    ) -> DeviceOutput {
        let Device {
            interfaces, role, ..
        } = self;

        match role {
            DeviceRole::Switch(switch) => process_switch_frame(switch, interfaces, frame, ingress, now),
            DeviceRole::Host(host) => {
                let stack_out = host.stack.handle_frame(interfaces, ingress, frame, now);
                let mut out = DeviceOutput {
                    emissions: stack_out.tx,
                    ..DeviceOutput::default()
                };
                for delivery in stack_out.udp {
                    out.emissions
                        .append(&mut host_udp(host, interfaces, delivery, now));
                }
                out
            }
            DeviceRole::Router(router) => {
                let stack_out = router.stack.handle_frame(interfaces, ingress, frame, now);
                let mut out = DeviceOutput {
                    emissions: stack_out.tx,
                    ..DeviceOutput::default()
                };
                for delivery in stack_out.udp {
                    out.emissions
                        .append(&mut router_udp(router, interfaces, delivery, now));
                }
                out
            }
        }
    }

    /// Drive every timer this device owns. Returns frames to transmit.
    pub fn tick(&mut self, now: u64) -> Vec<Emission> {
        if !self.powered_on {
            return Vec::new();
        }
        let Device {
            interfaces, role, ..
        } = self;

        match role {
            DeviceRole::Switch(_) => Vec::new(),
            DeviceRole::Router(router) => {
                router.dhcp.tick(now);
                router.stack.tick(now)
            }
            DeviceRole::Host(host) => {
                let mut out = host.stack.tick(now);
                if let Some(msg) = host.dhcp.tick(now) {
                    if let Some(emission) = send_dhcp_message(host, interfaces, msg) {
                        out.push(emission);
                    }
                }
                apply_dhcp_events(host, interfaces);
                host.dns.tick(now);
                out
            }
        }
    }
}

// ── Switch processing ───────────────────────────────────────

fn process_switch_frame(
    switch: &mut SwitchState,
    interfaces: &InterfaceTable,
    frame: &EthernetFrame,
    ingress: InterfaceId,
    now: u64,
) -> DeviceOutput {
    let vlan = interfaces.get(ingress).map(|i| i.vlan).unwrap_or(1);
    let mut out = DeviceOutput::default();

    if switch.learn(frame.source_mac, ingress, vlan, now) {
        out.learned = Some((frame.source_mac, vlan, ingress));
    }

    match switch.decide(frame.destination_mac, vlan, ingress) {
        SwitchDecision::Forward(port) => {
            let usable = interfaces.get(port).map(|i| i.is_up).unwrap_or(false);
            if usable {
                out.forwarded.push(port);
            } else {
                trace!("[switch] egress {} unusable, dropping", port);
            }
        }
        SwitchDecision::Flood => {
            out.forwarded = flood_targets(interfaces, ingress, vlan);
            out.flooded = true;
        }
    }
    out
}

// ── Host UDP handling ───────────────────────────────────────

fn host_udp(
    host: &mut HostState,
    interfaces: &mut InterfaceTable,
    delivery: UdpDelivery,
    now: u64,
) -> Vec<Emission> {
    let mut out = Vec::new();

    if delivery.datagram.destination_port == DHCP_CLIENT_PORT {
        let msg = match DhcpMessage::from_bytes(&delivery.datagram.payload) {
            Ok(msg) => msg,
            Err(_) => return out,
        };
        if msg.op == DhcpOp::BootReply {
            host.dhcp_server_mac = Some(delivery.source_mac);
        }
        if let Some(reply) = host.dhcp.handle_message(&msg, now) {
            if let Some(emission) = send_dhcp_message(host, interfaces, reply) {
                out.push(emission);
            }
        }
        apply_dhcp_events(host, interfaces);
    } else if delivery.datagram.source_port == DNS_PORT {
        if let Ok(msg) = DnsMessage::from_bytes(&delivery.datagram.payload) {
            host.dns.handle_response(&msg, now);
        }
    } else {
        trace!(
            "[udp] no listener on port {}",
            delivery.datagram.destination_port
        );
    }

    out
}

/// Wrap a DHCP client message into a frame. Messages without a bound
/// address go out as broadcast from 0.0.0.0; renewals and releases are
/// unicast to the remembered server.
fn send_dhcp_message(
    host: &mut HostState,
    interfaces: &InterfaceTable,
    msg: DhcpMessage,
) -> Option<Emission> {
    let egress = host.dhcp_interface?;
    let server_ip = msg
        .server_identifier()
        .or(host.dhcp.binding().map(|b| b.server_id));

    let unicast = !msg.ciaddr.is_unspecified() && !msg.wants_broadcast();
    let source_ip = if msg.ciaddr.is_unspecified() {
        Ipv4Addr::UNSPECIFIED
    } else {
        msg.ciaddr
    };
    let payload = match msg.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("[dhcp] encoding failed: {}", err);
            return None;
        }
    };

    if unicast {
        if let (Some(ip), Some(mac)) = (server_ip, host.dhcp_server_mac) {
            return host.stack.udp_direct(
                interfaces,
                egress,
                mac,
                source_ip,
                ip,
                DHCP_CLIENT_PORT,
                DHCP_SERVER_PORT,
                payload,
            );
        }
        // Server unknown: fall back to broadcast.
    }
    host.stack.udp_broadcast(
        interfaces,
        egress,
        source_ip,
        DHCP_CLIENT_PORT,
        DHCP_SERVER_PORT,
        payload,
    )
}

/// React to latched DHCP client events: apply or tear down the binding.
fn apply_dhcp_events(host: &mut HostState, interfaces: &mut InterfaceTable) {
    while let Some(event) = host.dhcp.poll_event() {
        match event {
            DhcpClientEvent::LeaseObtained(binding) => {
                let egress = match host.dhcp_interface {
                    Some(id) => id,
                    None => continue,
                };
                debug!("[dhcp] applying lease {} to {}", binding.ip, egress);
                if let Err(err) =
                    host.stack
                        .configure_interface(interfaces, egress, binding.ip, binding.netmask)
                {
                    warn!("[dhcp] could not apply lease: {}", err);
                    continue;
                }
                let _ = host
                    .stack
                    .routes
                    .remove(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED);
                if let Some(gateway) = binding.gateway {
                    let _ = host.stack.routes.add_static(
                        Ipv4Addr::UNSPECIFIED,
                        Ipv4Addr::UNSPECIFIED,
                        gateway,
                        egress,
                        1,
                    );
                }
                if let Some(dns) = binding.dns_servers.first() {
                    host.dns_server = Some(*dns);
                }
            }
            DhcpClientEvent::LeaseExpired => {
                debug!("[dhcp] lease expired, deconfiguring");
                deconfigure_dhcp_interface(host, interfaces);
            }
        }
    }
}

fn deconfigure_dhcp_interface(host: &mut HostState, interfaces: &mut InterfaceTable) {
    let egress = match host.dhcp_interface {
        Some(id) => id,
        None => return,
    };
    if let Some(iface) = interfaces.get_mut(egress) {
        iface.ip = None;
        iface.netmask = None;
    }
    host.stack.routes.remove_connected(egress);
    let _ = host
        .stack
        .routes
        .remove(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED);
}

// ── Router UDP handling ─────────────────────────────────────

fn router_udp(
    router: &mut RouterState,
    interfaces: &mut InterfaceTable,
    delivery: UdpDelivery,
    now: u64,
) -> Vec<Emission> {
    let mut out = Vec::new();

    match delivery.datagram.destination_port {
        DHCP_SERVER_PORT => {
            let msg = match DhcpMessage::from_bytes(&delivery.datagram.payload) {
                Ok(msg) => msg,
                Err(_) => return out,
            };
            let server_ip = match interfaces.get(delivery.interface).and_then(|i| i.ip) {
                Some(ip) => ip,
                None => {
                    trace!("[dhcp] ingress interface unaddressed, ignoring");
                    return out;
                }
            };
            if let Some(reply) = router.dhcp.handle_message(&msg, server_ip, now) {
                let payload = match reply.message.to_bytes() {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("[dhcp] encoding failed: {}", err);
                        return out;
                    }
                };
                let emission = match reply.destination {
                    ReplyDestination::Broadcast => router.stack.udp_broadcast(
                        interfaces,
                        delivery.interface,
                        server_ip,
                        DHCP_SERVER_PORT,
                        DHCP_CLIENT_PORT,
                        payload,
                    ),
                    ReplyDestination::Unicast { ip, mac } => router.stack.udp_direct(
                        interfaces,
                        delivery.interface,
                        mac,
                        server_ip,
                        ip,
                        DHCP_SERVER_PORT,
                        DHCP_CLIENT_PORT,
                        payload,
                    ),
                };
                if let Some(emission) = emission {
                    out.push(emission);
                }
            }
        }
        DNS_PORT => {
            let query = match DnsMessage::from_bytes(&delivery.datagram.payload) {
                Ok(msg) => msg,
                Err(_) => return out,
            };
            if query.header.qr {
                return out;
            }
            let response = router.dns.handle_query(&query);
            let payload = match response.to_bytes() {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("[dns] encoding failed: {}", err);
                    return out;
                }
            };
            let source_ip = interfaces
                .get(delivery.interface)
                .and_then(|i| i.ip)
                .unwrap_or(delivery.destination_ip);
            if let Some(emission) = router.stack.udp_direct(
                interfaces,
                delivery.interface,
                delivery.source_mac,
                source_ip,
                delivery.source_ip,
                DNS_PORT,
                delivery.datagram.source_port,
                payload,
            ) {
                out.push(emission);
            }
        }
        _ => trace!(
            "[udp] no listener on port {}",
            delivery.datagram.destination_port
        ),
    }

    out
}

// ── Factory ─────────────────────────────────────────────────

/// Builds devices with sequential ids and deterministic MAC addresses.
pub struct DeviceFactory {
    next_device: u32,
    next_mac: u32,
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFactory {
    pub fn new() -> Self {
        DeviceFactory {
            next_device: 1,
            next_mac: 1,
        }
    }

    /// Locally administered MAC: 02:4E:4C:xx:xx:xx.
    fn allocate_mac(&mut self) -> MacAddr {
        let n = self.next_mac;
        self.next_mac += 1;
        MacAddr::new([0x02, 0x4E, 0x4C, (n >> 16) as u8, (n >> 8) as u8, n as u8])
    }

    fn allocate_id(&mut self) -> DeviceId {
        let id = DeviceId(self.next_device);
        self.next_device += 1;
        id
    }

    fn base(&mut self, name: &str, kind: DeviceKind, role: DeviceRole) -> Device {
        Device {
            id: self.allocate_id(),
            name: String::from(name),
            hostname: String::from(name),
            kind,
            powered_on: true,
            position: Position::default(),
            interfaces: InterfaceTable::new(),
            role,
        }
    }

    /// Host with `eth0` and a loopback.
    pub fn host(&mut self, name: &str) -> Device {
        let mac = self.allocate_mac();
        let mut device = self.base(
            name,
            DeviceKind::Host,
            DeviceRole::Host(HostState {
                stack: NetStack::host(),
                dhcp: DhcpClient::new(mac),
                dns: DnsResolver::new(),
                dhcp_interface: None,
                dhcp_server_mac: None,
                dns_server: None,
                next_ping_id: 0,
            }),
        );
        device.interfaces.add_ethernet("eth0", mac);
        device.interfaces.add_loopback();
        device
    }

    /// Switch with `ports` Ethernet ports, no addressing.
    pub fn switch(&mut self, name: &str, ports: usize) -> Device {
        let mut device = self.base(name, DeviceKind::Switch, DeviceRole::Switch(SwitchState::new()));
        for n in 0..ports {
            let mac = self.allocate_mac();
            let port_name = alloc::format!("eth{}", n);
            device.interfaces.add_ethernet(&port_name, mac);
        }
        device
    }

    /// Router with `ports` Ethernet interfaces and a loopback.
    pub fn router(&mut self, name: &str, ports: usize) -> Device {
        let mut device = self.base(
            name,
            DeviceKind::Router,
            DeviceRole::Router(RouterState {
                stack: NetStack::router(),
                dhcp: DhcpServer::new(),
                dns: DnsServer::new(),
            }),
        );
        for n in 0..ports {
            let mac = self.allocate_mac();
            let port_name = alloc::format!("eth{}", n);
            device.interfaces.add_ethernet(&port_name, mac);
        }
        device.interfaces.add_loopback();
        device
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_allocates_unique_macs() {
        let mut factory = DeviceFactory::new();
        let a = factory.host("a");
        let b = factory.host("b");

        let mac_a = a.interfaces.by_name("eth0").unwrap().mac;
        let mac_b = b.interfaces.by_name("eth0").unwrap().mac;
        assert_ne!(mac_a, mac_b);
        assert_ne!(a.id, b.id);
        assert_eq!(mac_a.0[0] & 0x02, 0x02);
    }

    #[test]
    fn test_role_gating() {
        let mut factory = DeviceFactory::new();
        let mut sw = factory.switch("sw", 4);
        assert_eq!(
            sw.configure_interface(
                InterfaceId(0),
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(255, 255, 255, 0)
            ),
            Err(SimError::WrongRole)
        );
        assert_eq!(
            sw.ping(Ipv4Addr::new(10, 0, 0, 2), 1, 0).unwrap_err(),
            SimError::WrongRole
        );
        assert!(sw.set_interface_up(InterfaceId(0), false).is_ok());
        assert!(!sw.interfaces.get(InterfaceId(0)).unwrap().is_up);
    }

    #[test]
    fn test_switch_counts_ports() {
        let mut factory = DeviceFactory::new();
        let sw = factory.switch("sw", 8);
        assert_eq!(sw.interfaces.len(), 8);
        assert_eq!(sw.kind, DeviceKind::Switch);
    }

    #[test]
    fn test_invalid_configuration_surfaces() {
        let mut factory = DeviceFactory::new();
        let mut host = factory.host("h");
        let err = host
            .configure_interface(
                InterfaceId(0),
                Ipv4Addr::UNSPECIFIED,
                Ipv4Addr::new(255, 255, 255, 0),
            )
            .unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }
}
