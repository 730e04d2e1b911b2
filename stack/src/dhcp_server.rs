//! DHCP Server — RFC 2131
//!
//! Address pools, lease bookkeeping and the DISCOVER/OFFER/REQUEST/ACK
//! exchange, driven by the simulator's virtual clock. An offer is pinned to
//! the transaction id it was made for; a REQUEST with a different xid gets a
//! NAK. Expired leases are never revived, but their addresses may be handed
//! out again.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::{debug, warn};

use netlab_packet::addr::{broadcast_address, is_contiguous_netmask, is_in_network};
use netlab_packet::dhcp::{DhcpFlags, DhcpMessage, DhcpMessageType, DhcpOption};
use netlab_packet::{Ipv4Addr, MacAddr};

use crate::NetError;

// ── Pools ───────────────────────────────────────────────────

/// One address pool served by the server.
#[derive(Debug, Clone)]
pub struct DhcpPool {
    pub name: String,
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub default_router: Ipv4Addr,
    pub dns_server: Ipv4Addr,
    pub domain: String,
    pub lease_secs: u32,
    pub excluded: Vec<Ipv4Addr>,
}

impl DhcpPool {
    /// True if `ip` is an assignable host address of this pool.
    fn contains(&self, ip: Ipv4Addr) -> bool {
        is_in_network(ip, self.network, self.netmask)
            && ip != self.network
            && ip != broadcast_address(self.network, self.netmask)
    }
}

// ── Leases ──────────────────────────────────────────────────

/// Lifecycle state of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Offered,
    Active,
    Expired,
    Released,
}

/// Server-side record of one address binding.
#[derive(Debug, Clone)]
pub struct DhcpLeaseRecord {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub lease_start: u64,
    pub lease_secs: u32,
    pub state: LeaseState,
    /// Transaction id of the offer, required to match on REQUEST.
    pub xid: Option<u32>,
}

impl DhcpLeaseRecord {
    /// True if the address may be handed to another client.
    fn is_free(&self) -> bool {
        matches!(self.state, LeaseState::Expired | LeaseState::Released)
    }
}

// ── Replies ─────────────────────────────────────────────────

/// Where a server reply must be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDestination {
    /// 255.255.255.255 / FF:FF:FF:FF:FF:FF (client set the broadcast flag).
    Broadcast,
    /// Unicast to the assigned address and the client's hardware address.
    Unicast { ip: Ipv4Addr, mac: MacAddr },
}

/// A reply message plus its delivery addressing.
#[derive(Debug, Clone)]
pub struct DhcpReply {
    pub message: DhcpMessage,
    pub destination: ReplyDestination,
}

// ── Server ──────────────────────────────────────────────────

/// The DHCP server co-located on a router.
#[derive(Default)]
pub struct DhcpServer {
    pools: Vec<DhcpPool>,
    leases: HashMap<Ipv4Addr, DhcpLeaseRecord>,
    by_mac: HashMap<MacAddr, Ipv4Addr>,
}

impl DhcpServer {
    pub fn new() -> Self {
        DhcpServer::default()
    }

    /// Add an address pool. Non-contiguous masks are rejected here, not
    /// discovered later during allocation.
    pub fn add_pool(&mut self, pool: DhcpPool) -> Result<(), NetError> {
        if !is_contiguous_netmask(pool.netmask) || pool.netmask.is_unspecified() {
            return Err(NetError::InvalidNetmask);
        }
        if self.pools.iter().any(|p| p.name == pool.name) {
            return Err(NetError::DuplicatePool);
        }
        self.pools.push(pool);
        Ok(())
    }

    pub fn remove_pool(&mut self, name: &str) -> Result<(), NetError> {
        let len = self.pools.len();
        self.pools.retain(|p| p.name != name);
        if self.pools.len() == len {
            Err(NetError::PoolNotFound)
        } else {
            Ok(())
        }
    }

    /// Lease records, sorted by address (for introspection).
    pub fn leases(&self) -> Vec<&DhcpLeaseRecord> {
        let mut all: Vec<&DhcpLeaseRecord> = self.leases.values().collect();
        all.sort_by_key(|l| l.ip);
        all
    }

    pub fn lease_for(&self, ip: Ipv4Addr) -> Option<&DhcpLeaseRecord> {
        self.leases.get(&ip)
    }

    fn pool_for(&self, ip: Ipv4Addr) -> Option<&DhcpPool> {
        self.pools.iter().find(|p| p.contains(ip))
    }

    /// Walk a pool from network+1 to broadcast−1, skipping exclusions and
    /// addresses with a live lease.
    fn find_free_ip(&self, pool: &DhcpPool) -> Option<Ipv4Addr> {
        let first = pool.network.to_u32() + 1;
        let last = broadcast_address(pool.network, pool.netmask).to_u32();

        for n in first..last {
            let candidate = Ipv4Addr::from_u32(n);
            if pool.excluded.contains(&candidate) {
                continue;
            }
            match self.leases.get(&candidate) {
                Some(lease) if !lease.is_free() => continue,
                _ => return Some(candidate),
            }
        }
        None
    }

    // ── Message handling ────────────────────────────────────

    /// Handle a client message addressed to port 67. `server_ip` is the
    /// address of the interface the message arrived on.
    pub fn handle_message(
        &mut self,
        msg: &DhcpMessage,
        server_ip: Ipv4Addr,
        now: u64,
    ) -> Option<DhcpReply> {
        match msg.message_type()? {
            DhcpMessageType::Discover => self.handle_discover(msg, server_ip, now),
            DhcpMessageType::Request => self.handle_request(msg, server_ip, now),
            DhcpMessageType::Release => {
                self.handle_release(msg);
                None
            }
            DhcpMessageType::Decline => {
                self.handle_decline(msg, now);
                None
            }
            _ => None,
        }
    }

    fn handle_discover(
        &mut self,
        msg: &DhcpMessage,
        server_ip: Ipv4Addr,
        now: u64,
    ) -> Option<DhcpReply> {
        // Prefer the client's previous binding if we still know it.
        let reuse = self
            .by_mac
            .get(&msg.chaddr)
            .copied()
            .filter(|ip| self.pool_for(*ip).is_some());

        let ip = match reuse {
            Some(ip) => ip,
            None => {
                let pools: Vec<&DhcpPool> = self.pools.iter().collect();
                let mut found = None;
                for pool in pools {
                    if let Some(ip) = self.find_free_ip(pool) {
                        found = Some(ip);
                        break;
                    }
                }
                match found {
                    Some(ip) => ip,
                    None => {
                        warn!("[dhcp] no free address for {}", msg.chaddr);
                        return None;
                    }
                }
            }
        };

        let pool = self.pool_for(ip)?.clone();
        debug!("[dhcp] offering {} to {} (xid {:#010x})", ip, msg.chaddr, msg.xid);

        self.leases.insert(
            ip,
            DhcpLeaseRecord {
                ip,
                mac: msg.chaddr,
                lease_start: now,
                lease_secs: pool.lease_secs,
                state: LeaseState::Offered,
                xid: Some(msg.xid),
            },
        );
        self.by_mac.insert(msg.chaddr, ip);

        Some(self.build_reply(msg, DhcpMessageType::Offer, ip, &pool, server_ip))
    }

    fn handle_request(
        &mut self,
        msg: &DhcpMessage,
        server_ip: Ipv4Addr,
        now: u64,
    ) -> Option<DhcpReply> {
        let requested = msg
            .requested_ip()
            .or(if msg.ciaddr.is_unspecified() { None } else { Some(msg.ciaddr) })
            .or(self.by_mac.get(&msg.chaddr).copied());

        let ip = match requested {
            Some(ip) => ip,
            None => return Some(self.build_nak(msg, server_ip)),
        };

        if let Some(lease) = self.leases.get(&ip) {
            if lease.mac != msg.chaddr && !lease.is_free() {
                warn!("[dhcp] {} requested {} held by {}", msg.chaddr, ip, lease.mac);
                return Some(self.build_nak(msg, server_ip));
            }
            if lease.state == LeaseState::Offered {
                if let Some(xid) = lease.xid {
                    if xid != msg.xid {
                        return Some(self.build_nak(msg, server_ip));
                    }
                }
            }
        }

        let pool = match self.pool_for(ip) {
            Some(p) => p.clone(),
            None => return Some(self.build_nak(msg, server_ip)),
        };

        debug!("[dhcp] ack {} for {} (lease {}s)", ip, msg.chaddr, pool.lease_secs);
        self.leases.insert(
            ip,
            DhcpLeaseRecord {
                ip,
                mac: msg.chaddr,
                lease_start: now,
                lease_secs: pool.lease_secs,
                state: LeaseState::Active,
                xid: None,
            },
        );
        self.by_mac.insert(msg.chaddr, ip);

        Some(self.build_reply(msg, DhcpMessageType::Ack, ip, &pool, server_ip))
    }

    fn handle_release(&mut self, msg: &DhcpMessage) {
        let ip = msg.ciaddr;
        if let Some(lease) = self.leases.get(&ip) {
            if lease.mac == msg.chaddr {
                debug!("[dhcp] {} released {}", msg.chaddr, ip);
                self.leases.remove(&ip);
                self.by_mac.remove(&msg.chaddr);
            }
        }
    }

    fn handle_decline(&mut self, msg: &DhcpMessage, now: u64) {
        if let Some(ip) = msg.requested_ip() {
            warn!("[dhcp] {} declined {}", msg.chaddr, ip);
            self.leases.insert(
                ip,
                DhcpLeaseRecord {
                    ip,
                    mac: msg.chaddr,
                    lease_start: now,
                    lease_secs: 0,
                    state: LeaseState::Expired,
                    xid: None,
                },
            );
        }
    }

    // ── Timers ──────────────────────────────────────────────

    /// Expire active leases whose time ran out. Expired records keep their
    /// slot (so the address can be reused) but are never re-activated.
    pub fn tick(&mut self, now: u64) {
        for lease in self.leases.values_mut() {
            if lease.state == LeaseState::Active
                && now.saturating_sub(lease.lease_start) >= lease.lease_secs as u64 * 1000
            {
                debug!("[dhcp] lease {} for {} expired", lease.ip, lease.mac);
                lease.state = LeaseState::Expired;
            }
        }
    }

    // ── Reply construction ──────────────────────────────────

    fn build_reply(
        &self,
        request: &DhcpMessage,
        kind: DhcpMessageType,
        ip: Ipv4Addr,
        pool: &DhcpPool,
        server_ip: Ipv4Addr,
    ) -> DhcpReply {
        let mut reply = DhcpMessage::reply(request.xid, request.chaddr);
        reply.yiaddr = ip;
        reply.siaddr = server_ip;
        reply.flags = request.flags;
        reply.options = alloc::vec![
            DhcpOption::MessageType(kind),
            DhcpOption::SubnetMask(pool.netmask),
            DhcpOption::Router(alloc::vec![pool.default_router]),
            DhcpOption::DnsServer(alloc::vec![pool.dns_server]),
            DhcpOption::DomainName(pool.domain.clone()),
            DhcpOption::LeaseTime(pool.lease_secs),
            DhcpOption::RenewalTime(pool.lease_secs / 2),
            DhcpOption::RebindingTime(pool.lease_secs / 8 * 7),
            DhcpOption::ServerIdentifier(server_ip),
            DhcpOption::End,
        ];

        DhcpReply {
            destination: reply_destination(request, ip),
            message: reply,
        }
    }

    fn build_nak(&self, request: &DhcpMessage, server_ip: Ipv4Addr) -> DhcpReply {
        let mut nak = DhcpMessage::reply(request.xid, request.chaddr);
        nak.flags = request.flags;
        nak.options = alloc::vec![
            DhcpOption::MessageType(DhcpMessageType::Nak),
            DhcpOption::ServerIdentifier(server_ip),
            DhcpOption::End,
        ];

        DhcpReply {
            // NAKs always go out as broadcast: the client has no address.
            destination: ReplyDestination::Broadcast,
            message: nak,
        }
    }
}

fn reply_destination(request: &DhcpMessage, ip: Ipv4Addr) -> ReplyDestination {
    if request.flags.contains(DhcpFlags::BROADCAST) {
        ReplyDestination::Broadcast
    } else {
        ReplyDestination::Unicast {
            ip,
            mac: request.chaddr,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────
