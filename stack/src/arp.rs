//! ARP Service
//!
//! Per-device ARP cache with aging, plus the pending-resolution queue that
//! parks IPv4 packets while a MAC is being resolved. Every received ARP
//! packet teaches us the sender's binding; requests for one of our addresses
//! produce a reply.
//!
//! Resolution never raises an error: when the retry budget is exhausted the
//! parked packets are dropped silently and the pending entry disappears.

use alloc::vec::Vec;

use hashbrown::HashMap;
use log::{debug, trace, warn};

use netlab_packet::arp::{build_reply, build_request};
use netlab_packet::{ArpOperation, ArpPacket, EthernetFrame, Ipv4Addr, Ipv4Packet, MacAddr};

use crate::iface::InterfaceId;

// ── Configuration ───────────────────────────────────────────

/// Tunables of the ARP service.
#[derive(Debug, Clone, Copy)]
pub struct ArpConfig {
    /// Dynamic entry lifetime in seconds.
    pub timeout_secs: u32,
    /// ARP requests sent per resolution before giving up.
    pub max_retries: u8,
    /// Delay between retransmissions, milliseconds.
    pub retry_interval_ms: u32,
    /// Answer requests for off-link targets we can route to.
    pub proxy_arp: bool,
}

impl Default for ArpConfig {
    fn default() -> Self {
        ArpConfig {
            timeout_secs: 300,
            max_retries: 3,
            retry_interval_ms: 1000,
            proxy_arp: false,
        }
    }
}

// ── Table entries ───────────────────────────────────────────

/// Origin of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpEntryKind {
    Static,
    Dynamic,
}

/// Reachability state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpEntryState {
    Incomplete,
    Reachable,
    Stale,
    Delay,
    Probe,
}

/// One cache binding.
#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub interface: InterfaceId,
    pub kind: ArpEntryKind,
    pub state: ArpEntryState,
    pub created_at: u64,
    pub last_used: u64,
}

// ── Pending resolution ──────────────────────────────────────

struct PendingResolve {
    interface: InterfaceId,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    /// Requests already transmitted.
    attempts: u8,
    next_retry_at: u64,
    /// Packets waiting for this resolution, in arrival order.
    parked: Vec<Ipv4Packet>,
}

/// Result of asking the service to resolve an address.
pub enum ArpResolution {
    /// The binding was cached; the packet comes straight back for
    /// encapsulation.
    Cached(MacAddr, Ipv4Packet),
    /// The packet was parked. `Some` carries the first request frame to
    /// transmit; `None` means a resolution was already in flight and the
    /// packet joined its queue.
    Pending(Option<EthernetFrame>),
}

/// Parked packets freed by a learned binding, with the egress interface
/// the resolution was started on.
pub struct Released {
    pub interface: InterfaceId,
    pub mac: MacAddr,
    pub packets: Vec<Ipv4Packet>,
}

/// What an incoming ARP packet produced.
pub struct ArpIngress {
    /// Reply frame to transmit, if the packet was a request for us.
    pub reply: Option<EthernetFrame>,
    /// Packets freed by learning the sender's binding.
    pub released: Option<Released>,
}

/// Request frames the retry timer wants transmitted.
pub struct ArpTick {
    pub requests: Vec<(InterfaceId, EthernetFrame)>,
}

// ── Service ─────────────────────────────────────────────────

/// The per-device ARP service.
pub struct ArpService {
    entries: HashMap<Ipv4Addr, ArpEntry>,
    pending: HashMap<Ipv4Addr, PendingResolve>,
    pub config: ArpConfig,
}

impl Default for ArpService {
    fn default() -> Self {
        Self::new()
    }
}

impl ArpService {
    pub fn new() -> Self {
        Self::with_config(ArpConfig::default())
    }

    pub fn with_config(config: ArpConfig) -> Self {
        ArpService {
            entries: HashMap::new(),
            pending: HashMap::new(),
            config,
        }
    }

    // ── Cache ───────────────────────────────────────────────

    /// Look up a binding, refreshing its last-used stamp.
    pub fn lookup(&mut self, ip: Ipv4Addr, now: u64) -> Option<MacAddr> {
        let entry = self.entries.get_mut(&ip)?;
        entry.last_used = now;
        Some(entry.mac)
    }

    /// Inspect a binding without touching its timestamps.
    pub fn peek(&self, ip: Ipv4Addr) -> Option<&ArpEntry> {
        self.entries.get(&ip)
    }

    /// Install a static binding. Overrides any dynamic entry and is never
    /// overwritten by later dynamic learning.
    pub fn add_static_entry(&mut self, ip: Ipv4Addr, mac: MacAddr, interface: InterfaceId, now: u64) {
        self.entries.insert(
            ip,
            ArpEntry {
                ip,
                mac,
                interface,
                kind: ArpEntryKind::Static,
                state: ArpEntryState::Reachable,
                created_at: now,
                last_used: now,
            },
        );
    }

    /// Learn a dynamic binding. No-op if a static entry exists; an update
    /// keeps the original creation stamp. Frees any packets parked on this
    /// address.
    pub fn add_dynamic_entry(
        &mut self,
        ip: Ipv4Addr,
        mac: MacAddr,
        interface: InterfaceId,
        now: u64,
    ) -> Option<Released> {
        match self.entries.get_mut(&ip) {
            Some(entry) if entry.kind == ArpEntryKind::Static => {}
            Some(entry) => {
                entry.mac = mac;
                entry.interface = interface;
                entry.state = ArpEntryState::Reachable;
                entry.last_used = now;
            }
            None => {
                trace!("[arp] learned {} -> {}", ip, mac);
                self.entries.insert(
                    ip,
                    ArpEntry {
                        ip,
                        mac,
                        interface,
                        kind: ArpEntryKind::Dynamic,
                        state: ArpEntryState::Reachable,
                        created_at: now,
                        last_used: now,
                    },
                );
            }
        }

        let pending = self.pending.remove(&ip)?;
        if pending.parked.is_empty() {
            return None;
        }
        debug!(
            "[arp] {} resolved, releasing {} parked packet(s)",
            ip,
            pending.parked.len()
        );
        Some(Released {
            interface: pending.interface,
            mac,
            packets: pending.parked,
        })
    }

    /// Drop the binding for `ip` (static or dynamic).
    pub fn remove(&mut self, ip: Ipv4Addr) -> bool {
        self.entries.remove(&ip).is_some()
    }

    /// Drop every dynamic binding.
    pub fn flush_dynamic(&mut self) {
        self.entries.retain(|_, e| e.kind == ArpEntryKind::Static);
    }

    /// All bindings, sorted by address for stable introspection output.
    pub fn entries(&self) -> Vec<&ArpEntry> {
        let mut all: Vec<&ArpEntry> = self.entries.values().collect();
        all.sort_by_key(|e| e.ip);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Resolution ──────────────────────────────────────────

    /// Resolve `target_ip`, parking `packet` if the binding is unknown.
    ///
    /// A fresh resolution transmits one request immediately and arms the
    /// retry timer; joining an in-flight resolution transmits nothing.
    pub fn resolve(
        &mut self,
        target_ip: Ipv4Addr,
        interface: InterfaceId,
        local_mac: MacAddr,
        local_ip: Ipv4Addr,
        packet: Ipv4Packet,
        now: u64,
    ) -> ArpResolution {
        if let Some(mac) = self.lookup(target_ip, now) {
            return ArpResolution::Cached(mac, packet);
        }

        if let Some(pending) = self.pending.get_mut(&target_ip) {
            pending.parked.push(packet);
            return ArpResolution::Pending(None);
        }

        debug!("[arp] resolving {} on {}", target_ip, interface);
        self.pending.insert(
            target_ip,
            PendingResolve {
                interface,
                local_mac,
                local_ip,
                attempts: 1,
                next_retry_at: now + self.config.retry_interval_ms as u64,
                parked: alloc::vec![packet],
            },
        );
        ArpResolution::Pending(Some(build_request(local_mac, local_ip, target_ip)))
    }

    /// Process an incoming ARP packet: learn the sender, answer requests
    /// addressed to `local_ip`.
    pub fn process_packet(
        &mut self,
        arp: &ArpPacket,
        interface: InterfaceId,
        local_ip: Option<Ipv4Addr>,
        local_mac: MacAddr,
        now: u64,
    ) -> ArpIngress {
        let released = self.add_dynamic_entry(arp.sender_ip, arp.sender_mac, interface, now);

        let reply = match (arp.opcode, local_ip) {
            (ArpOperation::Request, Some(ip)) if arp.target_ip == ip => {
                Some(build_reply(local_mac, ip, arp.sender_mac, arp.sender_ip))
            }
            _ => None,
        };

        ArpIngress { reply, released }
    }

    /// Answer a request for an address we are not, on behalf of a routed
    /// destination (proxy ARP). Caller has already checked the route.
    pub fn proxy_reply(
        &self,
        arp: &ArpPacket,
        local_mac: MacAddr,
    ) -> EthernetFrame {
        build_reply(local_mac, arp.target_ip, arp.sender_mac, arp.sender_ip)
    }

    // ── Timers ──────────────────────────────────────────────

    /// Drive retransmissions and aging. Returns request frames to transmit.
    pub fn tick(&mut self, now: u64) -> ArpTick {
        let mut requests = Vec::new();
        let max_retries = self.config.max_retries;
        let interval = self.config.retry_interval_ms as u64;

        // Retransmit or abandon pending resolutions.
        let mut exhausted: Vec<Ipv4Addr> = Vec::new();
        for (ip, pending) in self.pending.iter_mut() {
            while pending.next_retry_at <= now {
                if pending.attempts >= max_retries {
                    exhausted.push(*ip);
                    break;
                }
                pending.attempts += 1;
                pending.next_retry_at += interval;
                requests.push((
                    pending.interface,
                    build_request(pending.local_mac, pending.local_ip, *ip),
                ));
            }
        }
        for ip in exhausted {
            if let Some(pending) = self.pending.remove(&ip) {
                warn!(
                    "[arp] resolution of {} exhausted after {} attempts, dropping {} packet(s)",
                    ip,
                    pending.attempts,
                    pending.parked.len()
                );
            }
        }

        // Age dynamic entries: stale past 75 % of the timeout, gone at 100 %.
        let timeout_ms = self.config.timeout_secs as u64 * 1000;
        let stale_ms = timeout_ms / 4 * 3;
        self.entries.retain(|ip, entry| {
            if entry.kind == ArpEntryKind::Static {
                return true;
            }
            let age = now.saturating_sub(entry.last_used);
            if age >= timeout_ms {
                trace!("[arp] {} aged out", ip);
                false
            } else {
                if age >= stale_ms && entry.state == ArpEntryState::Reachable {
                    entry.state = ArpEntryState::Stale;
                }
                true
            }
        });

        ArpTick { requests }
    }
}

// ── Tests ───────────────────────────────────────────────────
