//! DNS resolution through the mediator: authoritative zones, public
//! fallback, NXDOMAIN and query timeout.

use netlab_engine::{DeviceFactory, DeviceId, Simulator};
use netlab_packet::Ipv4Addr;
use netlab_stack::{DnsFailure, InterfaceId};

const ETH0: InterfaceId = InterfaceId(0);

fn lab() -> (Simulator, DeviceId, DeviceId) {
    let mut factory = DeviceFactory::new();

    let mut host = factory.host("pc1");
    host.configure_interface(
        ETH0,
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(255, 255, 255, 0),
    )
    .unwrap();
    host.set_dns_server(Ipv4Addr::new(10, 0, 0, 1)).unwrap();

    let mut router = factory.router("gw", 1);
    router
        .configure_interface(ETH0, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
        .unwrap();
    router
        .add_dns_record("printer.lab.local", Ipv4Addr::new(10, 0, 0, 99), 600)
        .unwrap();

    let (idh, idr) = (host.id, router.id);
    let mut sim = Simulator::new();
    sim.initialize(vec![host, router], vec![(idh, ETH0, idr, ETH0)])
        .unwrap();
    (sim, idh, idr)
}

#[test]
fn test_authoritative_resolution() {
    let (mut sim, h, _) = lab();

    sim.resolve_name(h, "printer.lab.local").unwrap();

    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(done.name, "printer.lab.local");
    assert_eq!(done.result, Ok(Ipv4Addr::new(10, 0, 0, 99)));
}

#[test]
fn test_second_lookup_served_from_cache() {
    let (mut sim, h, r) = lab();

    sim.resolve_name(h, "printer.lab.local").unwrap();
    assert!(sim.device_mut(h).unwrap().poll_dns().unwrap().result.is_ok());

    // Unplug the server; the cached record still answers.
    sim.set_power(r, false).unwrap();
    sim.resolve_name(h, "printer.lab.local").unwrap();
    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(done.result, Ok(Ipv4Addr::new(10, 0, 0, 99)));
}

#[test]
fn test_well_known_names_answer_locally() {
    let (mut sim, h, _) = lab();

    // Well-known names answer from the public table before any packet
    // leaves the host.
    sim.resolve_name(h, "github.com").unwrap();
    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(done.result, Ok(Ipv4Addr::new(140, 82, 121, 3)));
}

#[test]
fn test_unknown_name_rejects_with_nxdomain() {
    let (mut sim, h, _) = lab();

    sim.resolve_name(h, "ghost.invalid").unwrap();

    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(
        done.result,
        Err(DnsFailure::Rcode(netlab_packet::DnsRcode::NxDomain))
    );
}

#[test]
fn test_unreachable_server_times_out() {
    let (mut sim, h, _) = lab();
    // Point the resolver somewhere no route covers.
    sim.device_mut(h)
        .unwrap()
        .set_dns_server(Ipv4Addr::new(10, 99, 99, 99))
        .unwrap();

    sim.resolve_name(h, "ghost.invalid").unwrap();
    assert!(sim.device_mut(h).unwrap().poll_dns().is_none());

    sim.advance(5_000);
    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(done.result, Err(DnsFailure::Timeout));
}

#[test]
fn test_resolution_works_after_dhcp_learns_the_server() {
    let (mut sim, h, r) = lab();

    // Even with the resolver target wiped, a DHCP lease restores it.
    {
        let host = sim.device_mut(h).unwrap();
        host.host_mut().unwrap().dns_server = None;
    }
    sim.device_mut(r)
        .unwrap()
        .add_dhcp_pool(netlab_stack::DhcpPool {
            name: String::from("lan"),
            network: Ipv4Addr::new(10, 0, 0, 0),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            default_router: Ipv4Addr::new(10, 0, 0, 1),
            dns_server: Ipv4Addr::new(10, 0, 0, 1),
            domain: String::from("lab.local"),
            lease_secs: 3600,
            excluded: vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)],
        })
        .unwrap();

    sim.start_dhcp(h, ETH0).unwrap();
    assert_eq!(
        sim.device(h).unwrap().host().unwrap().dns_server,
        Some(Ipv4Addr::new(10, 0, 0, 1))
    );

    sim.resolve_name(h, "printer.lab.local").unwrap();
    let done = sim.device_mut(h).unwrap().poll_dns().unwrap();
    assert_eq!(done.result, Ok(Ipv4Addr::new(10, 0, 0, 99)));
}
