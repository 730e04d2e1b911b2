//! DNS Resolver
//!
//! Caching stub resolver. Cache entries are keyed by the lowercased name
//! and expire with the record TTL; synchronous `lookup` falls back to the
//! built-in public host table. Outstanding queries are matched on the
//! transaction id and abandoned after five seconds.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use log::{debug, warn};

use netlab_packet::dns::{DnsMessage, DnsRcode, DnsRecord};
use netlab_packet::Ipv4Addr;

use crate::public_dns::lookup_public;

/// Outstanding queries are abandoned after this long.
pub const QUERY_TIMEOUT_MS: u64 = 5000;

// ── Outcomes ────────────────────────────────────────────────

/// Why a resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsFailure {
    /// No response within `QUERY_TIMEOUT_MS`.
    Timeout,
    /// The server answered with a non-NOERROR code.
    Rcode(DnsRcode),
    /// NOERROR but no A record among the answers.
    NoRecord,
}

impl fmt::Display for DnsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsFailure::Timeout => write!(f, "DNS query timeout"),
            DnsFailure::Rcode(rcode) => write!(f, "{}", rcode.name()),
            DnsFailure::NoRecord => write!(f, "no A record"),
        }
    }
}

/// A finished resolution, pollable by the owning device.
#[derive(Debug, Clone)]
pub struct DnsCompletion {
    pub name: String,
    pub result: Result<Ipv4Addr, DnsFailure>,
}

/// What starting a resolution produced.
pub enum ResolveAction {
    /// Answered from cache or the public table; a completion was latched.
    Immediate(Ipv4Addr),
    /// Query message to transmit to the configured server.
    Query(DnsMessage),
}

// ── Resolver ────────────────────────────────────────────────

struct CacheEntry {
    answers: Vec<DnsRecord>,
    expires_at: u64,
}

struct PendingQuery {
    name: String,
    deadline: u64,
}

/// The per-device resolver.
pub struct DnsResolver {
    cache: HashMap<String, CacheEntry>,
    pending: HashMap<u16, PendingQuery>,
    completions: Vec<DnsCompletion>,
    next_id: u16,
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolver {
    pub fn new() -> Self {
        DnsResolver {
            cache: HashMap::new(),
            pending: HashMap::new(),
            completions: Vec::new(),
            next_id: 1,
        }
    }

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            self.next_id = 1;
        }
        id
    }

    /// Synchronous lookup: unexpired cached A record, else the public
    /// table, else nothing.
    pub fn lookup(&self, name: &str, now: u64) -> Option<Ipv4Addr> {
        let key = name.to_ascii_lowercase();
        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > now {
                if let Some(ip) = entry.answers.iter().find_map(|r| r.as_a()) {
                    return Some(ip);
                }
            }
        }
        lookup_public(name)
    }

    /// Start a resolution. A cache or public-table hit completes
    /// immediately; otherwise the returned query must be transmitted.
    pub fn resolve(&mut self, name: &str, now: u64) -> ResolveAction {
        if let Some(ip) = self.lookup(name, now) {
            self.completions.push(DnsCompletion {
                name: name.to_string(),
                result: Ok(ip),
            });
            return ResolveAction::Immediate(ip);
        }

        let id = self.next_transaction_id();
        debug!("[dns] query {:#06x} for {}", id, name);
        self.pending.insert(
            id,
            PendingQuery {
                name: name.to_string(),
                deadline: now + QUERY_TIMEOUT_MS,
            },
        );
        ResolveAction::Query(DnsMessage::query_a(id, name))
    }

    /// Ingest a response; matches on the transaction id. The first A record
    /// is cached for its TTL.
    pub fn handle_response(&mut self, msg: &DnsMessage, now: u64) {
        let pending = match self.pending.remove(&msg.header.id) {
            Some(p) => p,
            None => return,
        };

        if msg.header.rcode != DnsRcode::NoError {
            warn!("[dns] {} failed: {}", pending.name, msg.header.rcode.name());
            self.completions.push(DnsCompletion {
                name: pending.name,
                result: Err(DnsFailure::Rcode(msg.header.rcode)),
            });
            return;
        }

        match msg.first_a() {
            Some(ip) => {
                let ttl = msg
                    .answers
                    .iter()
                    .find(|r| r.as_a().is_some())
                    .map(|r| r.ttl)
                    .unwrap_or(0);
                self.cache.insert(
                    pending.name.to_ascii_lowercase(),
                    CacheEntry {
                        answers: msg.answers.clone(),
                        expires_at: now + ttl as u64 * 1000,
                    },
                );
                debug!("[dns] {} -> {} (ttl {}s)", pending.name, ip, ttl);
                self.completions.push(DnsCompletion {
                    name: pending.name,
                    result: Ok(ip),
                });
            }
            None => {
                self.completions.push(DnsCompletion {
                    name: pending.name,
                    result: Err(DnsFailure::NoRecord),
                });
            }
        }
    }

    /// Expire overdue queries.
    pub fn tick(&mut self, now: u64) {
        let overdue: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, q)| q.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in overdue {
            if let Some(q) = self.pending.remove(&id) {
                warn!("[dns] query for {} timed out", q.name);
                self.completions.push(DnsCompletion {
                    name: q.name,
                    result: Err(DnsFailure::Timeout),
                });
            }
        }
    }

    /// Pop the oldest finished resolution.
    pub fn poll_completion(&mut self) -> Option<DnsCompletion> {
        if self.completions.is_empty() {
            None
        } else {
            Some(self.completions.remove(0))
        }
    }

    pub fn flush_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_packet::dns::DnsRecord;

    #[test]
    fn test_public_fallback() {
        let resolver = DnsResolver::new();
        assert_eq!(
            resolver.lookup("www.google.com", 0),
            Some(Ipv4Addr::new(142, 250, 80, 46))
        );
        assert_eq!(resolver.lookup("intranet.example", 0), None);
    }

    #[test]
    fn test_cached_answer_expires() {
        let mut resolver = DnsResolver::new();
        let ResolveAction::Query(query) = resolver.resolve("intranet.example", 0) else {
            panic!("expected a query");
        };

        let mut response = DnsMessage::response_to(&query);
        response
            .answers
            .push(DnsRecord::a("intranet.example", Ipv4Addr::new(10, 0, 0, 53), 60));
        resolver.handle_response(&response, 100);

        assert!(matches!(
            resolver.poll_completion().unwrap().result,
            Ok(ip) if ip == Ipv4Addr::new(10, 0, 0, 53)
        ));

        // Cached while the TTL runs, case-insensitively.
        assert_eq!(
            resolver.lookup("INTRANET.example", 30_000),
            Some(Ipv4Addr::new(10, 0, 0, 53))
        );
        // Gone afterwards.
        assert_eq!(resolver.lookup("intranet.example", 60_100), None);
    }

    #[test]
    fn test_resolve_hits_cache_immediately() {
        let mut resolver = DnsResolver::new();
        match resolver.resolve("github.com", 0) {
            ResolveAction::Immediate(ip) => assert_eq!(ip, Ipv4Addr::new(140, 82, 121, 3)),
            ResolveAction::Query(_) => panic!("public name should not query"),
        }
        assert!(resolver.poll_completion().is_some());
    }

    #[test]
    fn test_timeout_rejects() {
        let mut resolver = DnsResolver::new();
        let ResolveAction::Query(_) = resolver.resolve("slow.example", 0) else {
            panic!("expected a query");
        };

        resolver.tick(4_999);
        assert!(resolver.poll_completion().is_none());

        resolver.tick(5_000);
        let done = resolver.poll_completion().unwrap();
        assert_eq!(done.result, Err(DnsFailure::Timeout));

        // A late response no longer matches anything.
        resolver.handle_response(&DnsMessage::query_a(1, "slow.example"), 6_000);
        assert!(resolver.poll_completion().is_none());
    }

    #[test]
    fn test_nxdomain_rejects_with_rcode_name() {
        let mut resolver = DnsResolver::new();
        let ResolveAction::Query(query) = resolver.resolve("missing.example", 0) else {
            panic!("expected a query");
        };

        let mut response = DnsMessage::response_to(&query);
        response.header.rcode = DnsRcode::NxDomain;
        resolver.handle_response(&response, 10);

        let done = resolver.poll_completion().unwrap();
        assert_eq!(done.result, Err(DnsFailure::Rcode(DnsRcode::NxDomain)));
        assert_eq!(alloc::format!("{}", DnsFailure::Rcode(DnsRcode::NxDomain)), "NXDOMAIN");
    }
}
