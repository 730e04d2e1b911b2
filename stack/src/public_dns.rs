//! Built-in Public Host Table
//!
//! Fallback A records for a handful of well-known hostnames, shared by the
//! resolver (last-resort lookup) and the DNS server (non-authoritative
//! answers). Matching is case-insensitive.

use netlab_packet::Ipv4Addr;

/// (hostname, address) pairs served when no authoritative record exists.
pub const PUBLIC_HOSTS: &[(&str, Ipv4Addr)] = &[
    ("google.com", Ipv4Addr::new(142, 250, 80, 46)),
    ("www.google.com", Ipv4Addr::new(142, 250, 80, 46)),
    ("facebook.com", Ipv4Addr::new(157, 240, 1, 35)),
    ("www.facebook.com", Ipv4Addr::new(157, 240, 1, 35)),
    ("amazon.com", Ipv4Addr::new(54, 239, 28, 85)),
    ("www.amazon.com", Ipv4Addr::new(54, 239, 28, 85)),
    ("github.com", Ipv4Addr::new(140, 82, 121, 3)),
    ("www.github.com", Ipv4Addr::new(140, 82, 121, 3)),
    ("microsoft.com", Ipv4Addr::new(20, 112, 250, 133)),
    ("www.microsoft.com", Ipv4Addr::new(20, 112, 250, 133)),
    ("apple.com", Ipv4Addr::new(17, 253, 144, 10)),
    ("www.apple.com", Ipv4Addr::new(17, 253, 144, 10)),
    ("cloudflare.com", Ipv4Addr::new(104, 16, 132, 229)),
    ("dns.google", Ipv4Addr::new(8, 8, 8, 8)),
    ("localhost", Ipv4Addr::new(127, 0, 0, 1)),
];

/// Look up a hostname in the public table.
pub fn lookup_public(name: &str) -> Option<Ipv4Addr> {
    PUBLIC_HOSTS
        .iter()
        .find(|(host, _)| host.eq_ignore_ascii_case(name))
        .map(|(_, ip)| *ip)
}
