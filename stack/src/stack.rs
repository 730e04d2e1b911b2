//! Stack Glue
//!
//! Ties the interface table, routing table and ARP service of one device
//! together: local delivery (ICMP echo, UDP hand-off to the application
//! services), the router forwarding plane (TTL, longest-prefix lookup,
//! split horizon, ICMP errors) and ARP-mediated egress encapsulation.
//!
//! Nothing here transmits directly. Every method collects `(interface,
//! frame)` emissions which the owning device hands to the mediator.

use alloc::vec::Vec;

use log::{debug, trace};

use netlab_packet::ethernet::EtherPayload;
use netlab_packet::icmp::{self, IcmpType, CODE_NET_UNREACHABLE};
use netlab_packet::udp::UdpPacket;
use netlab_packet::{EthernetFrame, IcmpPacket, Ipv4Addr, Ipv4Packet, Ipv4Payload, MacAddr};

use crate::arp::{ArpResolution, ArpService};
use crate::iface::{InterfaceId, InterfaceTable};
use crate::route::RoutingTable;
use crate::NetError;

// ── Output types ────────────────────────────────────────────

/// A frame to transmit on one of the device's interfaces.
pub type Emission = (InterfaceId, EthernetFrame);

/// A UDP datagram that reached one of our addresses, handed to the
/// application services (DHCP, DNS) co-located on the device.
#[derive(Debug, Clone)]
pub struct UdpDelivery {
    pub interface: InterfaceId,
    /// MAC the datagram arrived from (used for direct unicast replies).
    pub source_mac: MacAddr,
    pub source_ip: Ipv4Addr,
    pub destination_ip: Ipv4Addr,
    pub datagram: UdpPacket,
}

/// Everything one inbound frame produced.
#[derive(Default)]
pub struct StackOutput {
    pub tx: Vec<Emission>,
    pub udp: Vec<UdpDelivery>,
}

/// A received ICMP echo reply, kept for the ping bookkeeping.
#[derive(Debug, Clone)]
pub struct EchoReply {
    pub source_ip: Ipv4Addr,
    pub identifier: u16,
    pub sequence_number: u16,
    pub ttl: u8,
    pub received_at: u64,
}

/// A received ICMP error (time exceeded, destination unreachable).
#[derive(Debug, Clone)]
pub struct IcmpNotice {
    pub source_ip: Ipv4Addr,
    pub icmp_type: IcmpType,
    pub code: u8,
    pub received_at: u64,
}

// ── Stack ───────────────────────────────────────────────────

/// The L3 half of a host or router.
pub struct NetStack {
    pub routes: RoutingTable,
    pub arp: ArpService,
    /// Routers forward packets that are not for them; hosts drop them.
    forwarding: bool,
    echo_replies: Vec<EchoReply>,
    notices: Vec<IcmpNotice>,
    next_ipv4_id: u16,
}

impl NetStack {
    /// Stack for a host (no forwarding).
    pub fn host() -> Self {
        Self::new(false)
    }

    /// Stack for a router (forwarding enabled).
    pub fn router() -> Self {
        Self::new(true)
    }

    fn new(forwarding: bool) -> Self {
        NetStack {
            routes: RoutingTable::new(),
            arp: ArpService::new(),
            forwarding,
            echo_replies: Vec::new(),
            notices: Vec::new(),
            next_ipv4_id: 1,
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }

    fn next_identification(&mut self) -> u16 {
        let id = self.next_ipv4_id;
        self.next_ipv4_id = self.next_ipv4_id.wrapping_add(1);
        id
    }

    // ── Interface configuration ─────────────────────────────

    /// Assign an address to an interface; while the interface is up this
    /// also installs the connected route for its subnet.
    pub fn configure_interface(
        &mut self,
        ifaces: &mut InterfaceTable,
        id: InterfaceId,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<(), NetError> {
        ifaces.configure(id, ip, netmask)?;
        self.routes.remove_connected(id);

        let iface = ifaces.get(id).ok_or(NetError::InterfaceNotFound)?;
        if iface.is_up {
            if let Some(network) = iface.network() {
                // Another interface may already cover the same subnet.
                let _ = self.routes.add_connected(network, netmask, id);
            }
        }
        Ok(())
    }

    /// Bring an interface up or down, maintaining its connected route.
    pub fn set_interface_up(
        &mut self,
        ifaces: &mut InterfaceTable,
        id: InterfaceId,
        up: bool,
    ) -> Result<(), NetError> {
        let iface = ifaces.get_mut(id).ok_or(NetError::InterfaceNotFound)?;
        iface.is_up = up;

        if up {
            if let (Some(network), Some(mask)) = (iface.network(), iface.netmask) {
                let _ = self.routes.add_connected(network, mask, id);
            }
        } else {
            self.routes.remove_connected(id);
        }
        Ok(())
    }

    /// True if `ip` is one of our addresses or the limited broadcast.
    pub fn is_local_address(&self, ifaces: &InterfaceTable, ip: Ipv4Addr) -> bool {
        ip.is_broadcast() || ifaces.has_address(ip)
    }

    // ── Inbound ─────────────────────────────────────────────

    /// Process a frame that arrived on `ingress`. The caller has already
    /// verified the device is powered and the interface is up.
    pub fn handle_frame(
        &mut self,
        ifaces: &mut InterfaceTable,
        ingress: InterfaceId,
        frame: &EthernetFrame,
        now: u64,
    ) -> StackOutput {
        let mut out = StackOutput::default();

        let (local_mac, local_ip) = match ifaces.get(ingress) {
            Some(iface) => (iface.mac, iface.ip),
            None => return out,
        };

        if !frame.is_for(&local_mac) {
            trace!("[stack] frame for {} ignored", frame.destination_mac);
            return out;
        }

        match &frame.payload {
            EtherPayload::Arp(arp) => {
                let ingress_result = self.arp.process_packet(arp, ingress, local_ip, local_mac, now);

                if let Some(reply) = ingress_result.reply {
                    out.tx.push((ingress, reply));
                } else if self.should_proxy(ifaces, ingress, arp) {
                    debug!("[arp] proxy reply for {}", arp.target_ip);
                    out.tx.push((ingress, self.arp.proxy_reply(arp, local_mac)));
                }

                if let Some(released) = ingress_result.released {
                    if let Some(egress) = ifaces.get(released.interface) {
                        let src_mac = egress.mac;
                        for packet in released.packets {
                            out.tx.push((
                                released.interface,
                                EthernetFrame::ipv4(released.mac, src_mac, packet),
                            ));
                        }
                    }
                }
            }
            EtherPayload::Ipv4(packet) => {
                if self.is_local_address(ifaces, packet.destination_ip) {
                    self.deliver_local(ifaces, ingress, frame.source_mac, packet, now, &mut out);
                } else if self.forwarding {
                    self.forward(ifaces, ingress, packet.clone(), now, &mut out);
                } else {
                    trace!("[stack] not for us, dropping {}", packet.destination_ip);
                }
            }
        }

        out
    }

    /// Proxy ARP: answer a request for an off-link target we can route to
    /// through a different interface.
    fn should_proxy(
        &self,
        ifaces: &InterfaceTable,
        ingress: InterfaceId,
        arp: &netlab_packet::ArpPacket,
    ) -> bool {
        if !self.arp.config.proxy_arp || !self.forwarding {
            return false;
        }
        if arp.opcode != netlab_packet::ArpOperation::Request {
            return false;
        }
        if ifaces.has_address(arp.target_ip) {
            return false;
        }
        match self.routes.lookup(arp.target_ip) {
            Some(route) => route.interface != ingress,
            None => false,
        }
    }

    fn deliver_local(
        &mut self,
        ifaces: &mut InterfaceTable,
        ingress: InterfaceId,
        source_mac: MacAddr,
        packet: &Ipv4Packet,
        now: u64,
        out: &mut StackOutput,
    ) {
        match &packet.payload {
            Ipv4Payload::Icmp(icmp_pkt) => match icmp_pkt.icmp_type {
                IcmpType::EchoRequest => {
                    // Answer from the address that was pinged, or from the
                    // ingress interface for broadcast pings.
                    let reply_src = if ifaces.has_address(packet.destination_ip) {
                        packet.destination_ip
                    } else {
                        match ifaces.get(ingress).and_then(|i| i.ip) {
                            Some(ip) => ip,
                            None => return,
                        }
                    };
                    let reply = Ipv4Packet::icmp(
                        reply_src,
                        packet.source_ip,
                        icmp::build_echo_reply(icmp_pkt),
                    )
                    .with_identification(self.next_identification());
                    self.send_ipv4(ifaces, reply, now, out);
                }
                IcmpType::EchoReply => {
                    trace!("[icmp] echo reply from {}", packet.source_ip);
                    self.echo_replies.push(EchoReply {
                        source_ip: packet.source_ip,
                        identifier: icmp_pkt.identifier,
                        sequence_number: icmp_pkt.sequence_number,
                        ttl: packet.ttl,
                        received_at: now,
                    });
                }
                IcmpType::TimeExceeded | IcmpType::DestinationUnreachable => {
                    debug!(
                        "[icmp] {:?} (code {}) from {}",
                        icmp_pkt.icmp_type, icmp_pkt.code, packet.source_ip
                    );
                    self.notices.push(IcmpNotice {
                        source_ip: packet.source_ip,
                        icmp_type: icmp_pkt.icmp_type,
                        code: icmp_pkt.code,
                        received_at: now,
                    });
                }
            },
            Ipv4Payload::Udp(udp) => {
                out.udp.push(UdpDelivery {
                    interface: ingress,
                    source_mac,
                    source_ip: packet.source_ip,
                    destination_ip: packet.destination_ip,
                    datagram: udp.clone(),
                });
            }
        }
    }

    // ── Forwarding plane ────────────────────────────────────

    fn forward(
        &mut self,
        ifaces: &mut InterfaceTable,
        ingress: InterfaceId,
        packet: Ipv4Packet,
        now: u64,
        out: &mut StackOutput,
    ) {
        if packet.ttl <= 1 {
            debug!("[route] ttl expired for {}", packet.destination_ip);
            self.icmp_error(ifaces, ingress, icmp::build_time_exceeded(), packet.source_ip, now, out);
            return;
        }

        let mut forwarded = packet;
        forwarded.decrement_ttl();

        let (egress_id, gateway) = match self.routes.lookup(forwarded.destination_ip) {
            Some(route) => (route.interface, route.gateway),
            None => {
                debug!("[route] no route to {}", forwarded.destination_ip);
                self.icmp_error(
                    ifaces,
                    ingress,
                    icmp::build_destination_unreachable(CODE_NET_UNREACHABLE),
                    forwarded.source_ip,
                    now,
                    out,
                );
                return;
            }
        };

        match ifaces.get(egress_id) {
            Some(iface) if iface.is_up => {}
            _ => {
                debug!("[route] egress {} down, dropping", egress_id);
                return;
            }
        }
        if egress_id == ingress {
            // Split horizon: never bounce a packet out the way it came in.
            trace!("[route] split horizon drop on {}", ingress);
            return;
        }

        let next_hop = if gateway.is_unspecified() {
            forwarded.destination_ip
        } else {
            gateway
        };
        self.resolve_and_emit(ifaces, egress_id, next_hop, forwarded, now, out);
    }

    /// Generate an ICMP error back to `destination` out of the ingress
    /// interface's address.
    fn icmp_error(
        &mut self,
        ifaces: &mut InterfaceTable,
        ingress: InterfaceId,
        icmp_pkt: IcmpPacket,
        destination: Ipv4Addr,
        now: u64,
        out: &mut StackOutput,
    ) {
        let source = match ifaces.get(ingress).and_then(|i| i.ip) {
            Some(ip) => ip,
            None => return,
        };
        let packet = Ipv4Packet::icmp(source, destination, icmp_pkt)
            .with_identification(self.next_identification());
        self.send_ipv4(ifaces, packet, now, out);
    }

    // ── Outbound ────────────────────────────────────────────

    /// Route and transmit a locally originated packet.
    pub fn send_ipv4(
        &mut self,
        ifaces: &mut InterfaceTable,
        packet: Ipv4Packet,
        now: u64,
        out: &mut StackOutput,
    ) {
        let (egress_id, gateway) = match self.routes.lookup(packet.destination_ip) {
            Some(route) => (route.interface, route.gateway),
            None => {
                debug!("[route] no route to {}, dropping", packet.destination_ip);
                return;
            }
        };
        match ifaces.get(egress_id) {
            Some(iface) if iface.is_up => {}
            _ => return,
        }

        let next_hop = if gateway.is_unspecified() {
            packet.destination_ip
        } else {
            gateway
        };
        self.resolve_and_emit(ifaces, egress_id, next_hop, packet, now, out);
    }

    fn resolve_and_emit(
        &mut self,
        ifaces: &InterfaceTable,
        egress: InterfaceId,
        next_hop: Ipv4Addr,
        packet: Ipv4Packet,
        now: u64,
        out: &mut StackOutput,
    ) {
        let iface = match ifaces.get(egress) {
            Some(i) => i,
            None => return,
        };
        let local_ip = match iface.ip {
            Some(ip) => ip,
            None => return,
        };

        if next_hop.is_broadcast() {
            out.tx
                .push((egress, EthernetFrame::ipv4(MacAddr::BROADCAST, iface.mac, packet)));
            return;
        }

        match self.arp.resolve(next_hop, egress, iface.mac, local_ip, packet, now) {
            ArpResolution::Cached(mac, packet) => {
                out.tx.push((egress, EthernetFrame::ipv4(mac, iface.mac, packet)));
            }
            ArpResolution::Pending(Some(request)) => out.tx.push((egress, request)),
            ArpResolution::Pending(None) => {}
        }
    }

    // ── Ping bookkeeping ────────────────────────────────────

    /// Originate an ICMP echo request towards `destination`.
    pub fn ping(
        &mut self,
        ifaces: &mut InterfaceTable,
        destination: Ipv4Addr,
        identifier: u16,
        sequence_number: u16,
        now: u64,
    ) -> StackOutput {
        let mut out = StackOutput::default();

        let source = match self
            .routes
            .lookup(destination)
            .and_then(|r| ifaces.get(r.interface))
            .and_then(|i| i.ip)
        {
            Some(ip) => ip,
            None => {
                debug!("[icmp] no route to ping {}", destination);
                return out;
            }
        };

        let packet = Ipv4Packet::icmp(
            source,
            destination,
            icmp::build_echo_request(identifier, sequence_number),
        )
        .with_identification(self.next_identification());
        self.send_ipv4(ifaces, packet, now, &mut out);
        out
    }

    /// Dequeue the echo reply matching `identifier`/`sequence_number`.
    pub fn take_echo_reply(&mut self, identifier: u16, sequence_number: u16) -> Option<EchoReply> {
        let pos = self
            .echo_replies
            .iter()
            .position(|r| r.identifier == identifier && r.sequence_number == sequence_number)?;
        Some(self.echo_replies.remove(pos))
    }

    /// Dequeue the oldest ICMP error notice.
    pub fn take_notice(&mut self) -> Option<IcmpNotice> {
        if self.notices.is_empty() {
            None
        } else {
            Some(self.notices.remove(0))
        }
    }

    // ── UDP egress helpers ──────────────────────────────────

    /// Broadcast a UDP payload on one interface (DHCP discovery traffic).
    pub fn udp_broadcast(
        &mut self,
        ifaces: &InterfaceTable,
        egress: InterfaceId,
        source_ip: Ipv4Addr,
        source_port: u16,
        destination_port: u16,
        payload: Vec<u8>,
    ) -> Option<Emission> {
        let iface = ifaces.get(egress)?;
        let datagram = UdpPacket::new(source_port, destination_port, payload);
        let packet = Ipv4Packet::udp(source_ip, Ipv4Addr::BROADCAST, datagram)
            .with_identification(self.next_identification());
        Some((egress, EthernetFrame::ipv4(MacAddr::BROADCAST, iface.mac, packet)))
    }

    /// Unicast a UDP payload to a known MAC without routing (server replies,
    /// renewals to a remembered server).
    pub fn udp_direct(
        &mut self,
        ifaces: &InterfaceTable,
        egress: InterfaceId,
        destination_mac: MacAddr,
        source_ip: Ipv4Addr,
        destination_ip: Ipv4Addr,
        source_port: u16,
        destination_port: u16,
        payload: Vec<u8>,
    ) -> Option<Emission> {
        let iface = ifaces.get(egress)?;
        let datagram = UdpPacket::new(source_port, destination_port, payload);
        let packet = Ipv4Packet::udp(source_ip, destination_ip, datagram)
            .with_identification(self.next_identification());
        Some((egress, EthernetFrame::ipv4(destination_mac, iface.mac, packet)))
    }

    /// Route a UDP payload to an arbitrary address (DNS queries).
    pub fn udp_routed(
        &mut self,
        ifaces: &mut InterfaceTable,
        destination_ip: Ipv4Addr,
        source_port: u16,
        destination_port: u16,
        payload: Vec<u8>,
        now: u64,
    ) -> StackOutput {
        let mut out = StackOutput::default();

        let source_ip = match self
            .routes
            .lookup(destination_ip)
            .and_then(|r| ifaces.get(r.interface))
            .and_then(|i| i.ip)
        {
            Some(ip) => ip,
            None => {
                debug!("[udp] no route to {}, dropping", destination_ip);
                return out;
            }
        };

        let datagram = UdpPacket::new(source_port, destination_port, payload);
        let packet = Ipv4Packet::udp(source_ip, destination_ip, datagram)
            .with_identification(self.next_identification());
        self.send_ipv4(ifaces, packet, now, &mut out);
        out
    }

    // ── Timers ──────────────────────────────────────────────

    /// Drive ARP retransmission and aging.
    pub fn tick(&mut self, now: u64) -> Vec<Emission> {
        self.arp.tick(now).requests
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_packet::arp::build_request;
    use netlab_packet::ethernet::EtherPayload;

    fn host() -> (NetStack, InterfaceTable) {
        let mut ifaces = InterfaceTable::new();
        let eth0 = ifaces.add_ethernet("eth0", MacAddr::parse("AA:BB:CC:DD:EE:FF").unwrap());
        let mut stack = NetStack::host();
        stack
            .configure_interface(
                &mut ifaces,
                eth0,
                Ipv4Addr::new(192, 168, 1, 100),
                Ipv4Addr::new(255, 255, 255, 0),
            )
            .unwrap();
        (stack, ifaces)
    }

    #[test]
    fn test_configure_inserts_connected_route() {
        let (stack, _) = host();
        let route = stack.routes.lookup(Ipv4Addr::new(192, 168, 1, 7)).unwrap();
        assert!(route.is_directly_connected());
    }

    #[test]
    fn test_interface_down_removes_connected_route() {
        let (mut stack, mut ifaces) = host();
        stack.set_interface_up(&mut ifaces, InterfaceId(0), false).unwrap();
        assert!(stack.routes.lookup(Ipv4Addr::new(192, 168, 1, 7)).is_none());

        stack.set_interface_up(&mut ifaces, InterfaceId(0), true).unwrap();
        assert!(stack.routes.lookup(Ipv4Addr::new(192, 168, 1, 7)).is_some());
    }

    #[test]
    fn test_arp_request_gets_learned_and_answered() {
        let (mut stack, mut ifaces) = host();
        let request = build_request(
            MacAddr::parse("00:11:22:33:44:55").unwrap(),
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 100),
        );

        let out = stack.handle_frame(&mut ifaces, InterfaceId(0), &request, 0);
        assert_eq!(out.tx.len(), 1);
        let (_, reply) = &out.tx[0];
        assert_eq!(reply.destination_mac, MacAddr::parse("00:11:22:33:44:55").unwrap());
        assert!(stack.arp.peek(Ipv4Addr::new(192, 168, 1, 1)).is_some());
    }

    #[test]
    fn test_echo_request_is_answered_after_arp() {
        let (mut stack, mut ifaces) = host();
        let peer_mac = MacAddr::parse("00:11:22:33:44:55").unwrap();
        stack.arp.add_static_entry(Ipv4Addr::new(192, 168, 1, 1), peer_mac, InterfaceId(0), 0);

        let ping = EthernetFrame::ipv4(
            MacAddr::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            peer_mac,
            Ipv4Packet::icmp(
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::new(192, 168, 1, 100),
                icmp::build_echo_request(9, 1),
            ),
        );

        let out = stack.handle_frame(&mut ifaces, InterfaceId(0), &ping, 0);
        assert_eq!(out.tx.len(), 1);
        let (_, frame) = &out.tx[0];
        assert_eq!(frame.destination_mac, peer_mac);
        let EtherPayload::Ipv4(reply) = &frame.payload else {
            panic!("expected IPv4 reply");
        };
        assert_eq!(reply.destination_ip, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(reply.source_ip, Ipv4Addr::new(192, 168, 1, 100));
        let Ipv4Payload::Icmp(icmp_reply) = &reply.payload else {
            panic!("expected ICMP");
        };
        assert_eq!(icmp_reply.icmp_type, IcmpType::EchoReply);
    }

    #[test]
    fn test_host_does_not_forward() {
        let (mut stack, mut ifaces) = host();
        let peer_mac = MacAddr::parse("00:11:22:33:44:55").unwrap();

        let transit = EthernetFrame::ipv4(
            MacAddr::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            peer_mac,
            Ipv4Packet::icmp(
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::new(10, 0, 0, 1),
                icmp::build_echo_request(9, 1),
            ),
        );

        let out = stack.handle_frame(&mut ifaces, InterfaceId(0), &transit, 0);
        assert!(out.tx.is_empty());
    }

    #[test]
    fn test_ping_parks_on_arp_miss_and_releases() {
        let (mut stack, mut ifaces) = host();

        let out = stack.ping(&mut ifaces, Ipv4Addr::new(192, 168, 1, 1), 7, 1, 0);
        // The only emission is the ARP request for the next hop.
        assert_eq!(out.tx.len(), 1);
        let (_, frame) = &out.tx[0];
        assert!(matches!(frame.payload, EtherPayload::Arp(_)));

        // The reply releases the parked echo request.
        let peer_mac = MacAddr::parse("00:11:22:33:44:55").unwrap();
        let reply = netlab_packet::arp::build_reply(
            peer_mac,
            Ipv4Addr::new(192, 168, 1, 1),
            MacAddr::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            Ipv4Addr::new(192, 168, 1, 100),
        );
        let out = stack.handle_frame(&mut ifaces, InterfaceId(0), &reply, 10);
        assert_eq!(out.tx.len(), 1);
        let (_, frame) = &out.tx[0];
        assert_eq!(frame.destination_mac, peer_mac);
        assert!(matches!(frame.payload, EtherPayload::Ipv4(_)));
    }

    #[test]
    fn test_udp_for_us_is_delivered_up() {
        let (mut stack, mut ifaces) = host();
        let peer_mac = MacAddr::parse("00:11:22:33:44:55").unwrap();

        let frame = EthernetFrame::ipv4(
            MacAddr::BROADCAST,
            peer_mac,
            Ipv4Packet::udp(
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::BROADCAST,
                UdpPacket::new(67, 68, alloc::vec![1, 2, 3]),
            ),
        );

        let out = stack.handle_frame(&mut ifaces, InterfaceId(0), &frame, 0);
        assert_eq!(out.udp.len(), 1);
        assert_eq!(out.udp[0].datagram.destination_port, 68);
        assert_eq!(out.udp[0].source_mac, peer_mac);
    }
}
