//! Router forwarding plane: ARP-mediated next-hop delivery, TTL handling
//! and ICMP error generation.

use std::cell::RefCell;
use std::rc::Rc;

use netlab_engine::{DeviceFactory, DeviceId, SimEvent, SimEventKind, Simulator};
use netlab_packet::ethernet::EtherPayload;
use netlab_packet::icmp::{self, IcmpType};
use netlab_packet::{EthernetFrame, Ipv4Addr, Ipv4Packet, Ipv4Payload};
use netlab_stack::InterfaceId;

const ETH0: InterfaceId = InterfaceId(0);
const ETH1: InterfaceId = InterfaceId(1);

/// A `10.0.0.0/24 ── router ── 192.168.1.0/24` topology.
struct TwoNets {
    sim: Simulator,
    a: DeviceId,
    b: DeviceId,
    r: DeviceId,
}

fn two_nets() -> TwoNets {
    let mut factory = DeviceFactory::new();

    let mut a = factory.host("a");
    a.configure_interface(ETH0, Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(255, 255, 255, 0))
        .unwrap();
    a.add_static_route(
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::new(10, 0, 0, 1),
        ETH0,
        1,
    )
    .unwrap();

    let mut b = factory.host("b");
    b.configure_interface(
        ETH0,
        Ipv4Addr::new(192, 168, 1, 10),
        Ipv4Addr::new(255, 255, 255, 0),
    )
    .unwrap();
    b.add_static_route(
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::new(192, 168, 1, 1),
        ETH0,
        1,
    )
    .unwrap();

    let mut r = factory.router("r", 2);
    r.configure_interface(ETH0, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
        .unwrap();
    r.configure_interface(
        ETH1,
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(255, 255, 255, 0),
    )
    .unwrap();

    let (ida, idb, idr) = (a.id, b.id, r.id);
    let mut sim = Simulator::new();
    sim.initialize(
        vec![a, b, r],
        vec![(ida, ETH0, idr, ETH0), (idb, ETH0, idr, ETH1)],
    )
    .unwrap();

    TwoNets {
        sim,
        a: ida,
        b: idb,
        r: idr,
    }
}

fn record_events(sim: &mut Simulator) -> Rc<RefCell<Vec<SimEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    sim.add_event_listener(move |event: &SimEvent| {
        sink.borrow_mut().push(event.clone());
    });
    log
}

/// IPv4 packets the router emitted on `interface`.
fn router_ipv4_frames(
    events: &[SimEvent],
    router: DeviceId,
    interface: InterfaceId,
) -> Vec<EthernetFrame> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            SimEventKind::FrameSent {
                source_device,
                source_interface,
                frame,
                ..
            } if *source_device == router
                && *source_interface == interface
                && matches!(frame.payload, EtherPayload::Ipv4(_)) =>
            {
                Some(frame.clone())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn test_cross_subnet_ping() {
    let mut t = two_nets();
    let ident = t.sim.ping(t.a, Ipv4Addr::new(192, 168, 1, 10), 1).unwrap();

    let reply = t
        .sim
        .device_mut(t.a)
        .unwrap()
        .take_ping_reply(ident, 1)
        .expect("echo reply should cross the router");
    assert_eq!(reply.source_ip, Ipv4Addr::new(192, 168, 1, 10));
}

#[test]
fn test_forwarded_frame_is_re_encapsulated_with_decremented_ttl() {
    let mut t = two_nets();

    // Pre-resolve the far host so the router forwards without parking.
    let mac_b = t.sim.device(t.b).unwrap().interfaces.get(ETH0).unwrap().mac;
    t.sim
        .device_mut(t.r)
        .unwrap()
        .router_mut()
        .unwrap()
        .stack
        .arp
        .add_static_entry(Ipv4Addr::new(192, 168, 1, 10), mac_b, ETH1, 0);

    let log = record_events(&mut t.sim);
    t.sim.ping(t.a, Ipv4Addr::new(192, 168, 1, 10), 1).unwrap();

    let events = log.borrow();
    let forwarded = router_ipv4_frames(&events, t.r, ETH1);
    let mac_r1 = t.sim.device(t.r).unwrap().interfaces.get(ETH1).unwrap().mac;

    let echo = forwarded
        .iter()
        .find_map(|frame| match &frame.payload {
            EtherPayload::Ipv4(pkt) if pkt.destination_ip == Ipv4Addr::new(192, 168, 1, 10) => {
                Some((frame, pkt))
            }
            _ => None,
        })
        .expect("router should emit the echo request on eth1");

    assert_eq!(echo.0.source_mac, mac_r1);
    assert_eq!(echo.0.destination_mac, mac_b);
    assert_eq!(echo.1.ttl, 63);
    assert_eq!(echo.1.source_ip, Ipv4Addr::new(10, 0, 0, 2));
}

#[test]
fn test_ttl_expiry_generates_time_exceeded() {
    let mut t = two_nets();
    let log = record_events(&mut t.sim);

    // Hand-craft an echo request with TTL 1 and inject it from a.
    let mac_a = t.sim.device(t.a).unwrap().interfaces.get(ETH0).unwrap().mac;
    let mac_r0 = t.sim.device(t.r).unwrap().interfaces.get(ETH0).unwrap().mac;
    let packet = Ipv4Packet::icmp(
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(192, 168, 1, 10),
        icmp::build_echo_request(77, 1),
    )
    .with_ttl(1);
    t.sim
        .send_frame(t.a, ETH0, EthernetFrame::ipv4(mac_r0, mac_a, packet))
        .unwrap();

    // Nothing was forwarded onto the far subnet.
    let events = log.borrow();
    assert!(router_ipv4_frames(&events, t.r, ETH1).is_empty());

    // The router answered a with a time-exceeded from its near address.
    let errors = router_ipv4_frames(&events, t.r, ETH0);
    let time_exceeded = errors
        .iter()
        .find_map(|frame| match &frame.payload {
            EtherPayload::Ipv4(pkt) => match &pkt.payload {
                Ipv4Payload::Icmp(icmp_pkt) if icmp_pkt.icmp_type == IcmpType::TimeExceeded => {
                    Some(pkt)
                }
                _ => None,
            },
            _ => None,
        })
        .expect("time exceeded should be emitted");
    assert_eq!(time_exceeded.source_ip, Ipv4Addr::new(10, 0, 0, 1));
    assert_eq!(time_exceeded.destination_ip, Ipv4Addr::new(10, 0, 0, 2));

    // The host saw the error.
    let notice = t
        .sim
        .device_mut(t.a)
        .unwrap()
        .host_mut()
        .unwrap()
        .stack
        .take_notice()
        .unwrap();
    assert_eq!(notice.icmp_type, IcmpType::TimeExceeded);
    assert_eq!(notice.code, 0);
}

#[test]
fn test_no_route_generates_destination_unreachable() {
    let mut t = two_nets();

    t.sim.ping(t.a, Ipv4Addr::new(8, 8, 8, 8), 1).unwrap();

    let notice = t
        .sim
        .device_mut(t.a)
        .unwrap()
        .host_mut()
        .unwrap()
        .stack
        .take_notice()
        .unwrap();
    assert_eq!(notice.icmp_type, IcmpType::DestinationUnreachable);
    assert_eq!(notice.code, 0);
    assert_eq!(notice.source_ip, Ipv4Addr::new(10, 0, 0, 1));
}

#[test]
fn test_router_answers_pings_to_both_addresses() {
    let mut t = two_nets();

    let near = t.sim.ping(t.a, Ipv4Addr::new(10, 0, 0, 1), 1).unwrap();
    assert!(t.sim.device_mut(t.a).unwrap().take_ping_reply(near, 1).is_some());

    let far = t.sim.ping(t.a, Ipv4Addr::new(192, 168, 1, 1), 2).unwrap();
    let reply = t.sim.device_mut(t.a).unwrap().take_ping_reply(far, 2).unwrap();
    assert_eq!(reply.source_ip, Ipv4Addr::new(192, 168, 1, 1));
}

#[test]
fn test_arp_miss_parks_and_forwards_after_resolution() {
    let mut t = two_nets();
    let log = record_events(&mut t.sim);

    // No pre-resolved ARP anywhere: the router must resolve b mid-flight.
    let ident = t.sim.ping(t.a, Ipv4Addr::new(192, 168, 1, 10), 3).unwrap();
    assert!(t.sim.device_mut(t.a).unwrap().take_ping_reply(ident, 3).is_some());

    // The router sent an ARP request out of eth1 while the echo waited.
    let events = log.borrow();
    assert!(events.iter().any(|e| matches!(
        e.kind,
        SimEventKind::ArpRequest { device, interface, .. }
            if device == t.r && interface == ETH1
    )));
}

#[test]
fn test_split_horizon_never_bounces_back() {
    let mut t = two_nets();
    let log = record_events(&mut t.sim);

    // a pings an unused address inside its own subnet via the router's MAC:
    // the route points back out the ingress interface, so the router drops.
    let mac_a = t.sim.device(t.a).unwrap().interfaces.get(ETH0).unwrap().mac;
    let mac_r0 = t.sim.device(t.r).unwrap().interfaces.get(ETH0).unwrap().mac;
    let packet = Ipv4Packet::icmp(
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(10, 0, 0, 99),
        icmp::build_echo_request(5, 1),
    );
    t.sim
        .send_frame(t.a, ETH0, EthernetFrame::ipv4(mac_r0, mac_a, packet))
        .unwrap();

    let events = log.borrow();
    let bounced = events.iter().any(|e| matches!(
        e.kind,
        SimEventKind::FrameSent { source_device, source_interface, .. }
            if source_device == t.r && source_interface == ETH0
    ));
    assert!(!bounced, "router must not emit the packet back out eth0");
}
