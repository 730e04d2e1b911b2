//! DNS Server
//!
//! Authoritative zone records plus the built-in public host table. Each
//! question is answered from the zone first and the public table second;
//! a response with no answers carries NXDOMAIN. The authoritative bit is
//! always set.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::debug;

use netlab_packet::dns::{DnsMessage, DnsRcode, DnsRecord, DnsRecordType};
use netlab_packet::Ipv4Addr;

use crate::public_dns::lookup_public;

/// TTL for answers synthesised from the public table.
const PUBLIC_TTL: u32 = 300;

// ── Server ──────────────────────────────────────────────────

/// The DNS server co-located on a router.
#[derive(Default)]
pub struct DnsServer {
    /// Authoritative records keyed by lowercased name.
    zones: HashMap<String, Vec<DnsRecord>>,
}

impl DnsServer {
    pub fn new() -> Self {
        DnsServer::default()
    }

    /// Add an authoritative A record.
    pub fn add_a_record(&mut self, name: &str, addr: Ipv4Addr, ttl: u32) {
        self.add_record(DnsRecord::a(name, addr, ttl));
    }

    /// Add an authoritative record of any supported type.
    pub fn add_record(&mut self, record: DnsRecord) {
        self.zones
            .entry(record.name.to_ascii_lowercase())
            .or_default()
            .push(record);
    }

    /// Remove every record for `name`.
    pub fn remove_records(&mut self, name: &str) -> bool {
        self.zones.remove(&name.to_ascii_lowercase()).is_some()
    }

    pub fn record_count(&self) -> usize {
        self.zones.values().map(|v| v.len()).sum()
    }

    fn authoritative(&self, name: &str, qtype: DnsRecordType) -> Vec<DnsRecord> {
        self.zones
            .get(&name.to_ascii_lowercase())
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.rtype == qtype)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Answer a query. Always returns a response; rcode is NOERROR when at
    /// least one question produced an answer, NXDOMAIN otherwise.
    pub fn handle_query(&self, query: &DnsMessage) -> DnsMessage {
        let mut response = DnsMessage::response_to(query);
        response.header.aa = true;

        for question in &query.questions {
            let mut answers = self.authoritative(&question.name, question.qtype);

            if answers.is_empty() && question.qtype == DnsRecordType::A {
                if let Some(ip) = lookup_public(&question.name) {
                    answers.push(DnsRecord::a(&question.name, ip, PUBLIC_TTL));
                }
            }

            response.answers.append(&mut answers);
        }

        response.header.rcode = if response.answers.is_empty() {
            DnsRcode::NxDomain
        } else {
            DnsRcode::NoError
        };
        debug!(
            "[dns] query {:#06x}: {} answer(s), {}",
            query.header.id,
            response.answers.len(),
            response.header.rcode.name()
        );
        response
    }

    /// Names with authoritative records (for introspection).
    pub fn zone_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.zones.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authoritative_record_wins_over_public() {
        let mut server = DnsServer::new();
        server.add_a_record("github.com", Ipv4Addr::new(10, 0, 0, 80), 600);

        let response = server.handle_query(&DnsMessage::query_a(1, "github.com"));
        assert_eq!(response.first_a(), Some(Ipv4Addr::new(10, 0, 0, 80)));
        assert!(response.header.aa);
        assert_eq!(response.header.rcode, DnsRcode::NoError);
    }

    #[test]
    fn test_public_fallback_answers() {
        let server = DnsServer::new();
        let response = server.handle_query(&DnsMessage::query_a(2, "dns.google"));
        assert_eq!(response.first_a(), Some(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(response.header.rcode, DnsRcode::NoError);
    }

    #[test]
    fn test_unknown_name_is_nxdomain() {
        let server = DnsServer::new();
        let response = server.handle_query(&DnsMessage::query_a(3, "ghost.example"));
        assert!(response.answers.is_empty());
        assert_eq!(response.header.rcode, DnsRcode::NxDomain);
        assert!(response.header.aa);
    }

    #[test]
    fn test_zone_names_are_lowercased() {
        let mut server = DnsServer::new();
        server.add_a_record("Printer.LAB.local", Ipv4Addr::new(10, 0, 0, 9), 60);
        assert_eq!(server.zone_names(), alloc::vec![String::from("printer.lab.local")]);

        let response = server.handle_query(&DnsMessage::query_a(4, "printer.lab.LOCAL"));
        assert_eq!(response.first_a(), Some(Ipv4Addr::new(10, 0, 0, 9)));
    }
}
