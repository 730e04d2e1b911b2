//! DHCP Client — RFC 2131
//!
//! State machine over Init → Selecting → Requesting → Bound, with renewal
//! (T1), rebinding (T2) and expiry driven by the virtual clock. State-change
//! notifications are latched as events for the owning device to pop, the
//! messages to transmit are returned to the caller.
//!
//! Messages that don't fit the current state (an OFFER while Requesting, a
//! stray xid) are silently ignored.

use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use netlab_packet::dhcp::{DhcpFlags, DhcpMessage, DhcpMessageType, DhcpOption};
use netlab_packet::{Ipv4Addr, MacAddr};

// ── States and events ───────────────────────────────────────

/// DHCP client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpClientState {
    Init,
    Selecting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
}

/// A confirmed lease as seen by the client.
#[derive(Debug, Clone)]
pub struct DhcpBinding {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub domain: Option<String>,
    pub server_id: Ipv4Addr,
    pub lease_secs: u32,
    pub t1_secs: u32,
    pub t2_secs: u32,
    pub obtained_at: u64,
}

/// Latched state-change notification for the owning device.
#[derive(Debug, Clone)]
pub enum DhcpClientEvent {
    LeaseObtained(DhcpBinding),
    LeaseExpired,
}

// ── Client ──────────────────────────────────────────────────

/// The DHCP client state machine.
pub struct DhcpClient {
    mac: MacAddr,
    state: DhcpClientState,
    xid: u32,
    binding: Option<DhcpBinding>,
    t1_at: Option<u64>,
    t2_at: Option<u64>,
    expiry_at: Option<u64>,
    events: Vec<DhcpClientEvent>,
}

impl DhcpClient {
    pub fn new(mac: MacAddr) -> Self {
        DhcpClient {
            mac,
            state: DhcpClientState::Init,
            xid: 0,
            binding: None,
            t1_at: None,
            t2_at: None,
            expiry_at: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> DhcpClientState {
        self.state
    }

    pub fn binding(&self) -> Option<&DhcpBinding> {
        self.binding.as_ref()
    }

    /// Pop the oldest latched state-change event.
    pub fn poll_event(&mut self) -> Option<DhcpClientEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    /// Fresh transaction id from an LCG mixed with the MAC.
    fn new_xid(&mut self) -> u32 {
        self.xid = self.xid.wrapping_mul(1103515245).wrapping_add(12345);
        self.xid ^= u32::from_be_bytes([self.mac.0[2], self.mac.0[3], self.mac.0[4], self.mac.0[5]]);
        self.xid
    }

    fn stop_timers(&mut self) {
        self.t1_at = None;
        self.t2_at = None;
        self.expiry_at = None;
    }

    fn clear_binding(&mut self) {
        self.stop_timers();
        self.binding = None;
    }

    // ── Transitions ─────────────────────────────────────────

    /// Start (or restart) discovery. Returns the DISCOVER to broadcast.
    pub fn discover(&mut self, _now: u64) -> DhcpMessage {
        self.clear_binding();
        let xid = self.new_xid();
        self.state = DhcpClientState::Selecting;
        debug!("[dhcp] {} discover (xid {:#010x})", self.mac, xid);

        let mut msg = DhcpMessage::request(xid, self.mac);
        msg.flags = DhcpFlags::BROADCAST;
        msg.options = alloc::vec![
            DhcpOption::MessageType(DhcpMessageType::Discover),
            DhcpOption::ParameterRequestList(alloc::vec![1, 3, 6, 15]),
            DhcpOption::End,
        ];
        msg
    }

    /// Handle a server message. May return a follow-up message to transmit
    /// (REQUEST after an OFFER, a fresh DISCOVER after a NAK).
    pub fn handle_message(&mut self, msg: &DhcpMessage, now: u64) -> Option<DhcpMessage> {
        if msg.chaddr != self.mac {
            return None;
        }
        if self.state != DhcpClientState::Init && msg.xid != self.xid {
            return None;
        }

        match msg.message_type()? {
            DhcpMessageType::Offer => self.handle_offer(msg),
            DhcpMessageType::Ack => {
                self.handle_ack(msg, now);
                None
            }
            DhcpMessageType::Nak => {
                debug!("[dhcp] {} got NAK, restarting discovery", self.mac);
                self.clear_binding();
                self.state = DhcpClientState::Init;
                Some(self.discover(now))
            }
            _ => None,
        }
    }

    fn handle_offer(&mut self, offer: &DhcpMessage) -> Option<DhcpMessage> {
        if self.state != DhcpClientState::Selecting {
            return None;
        }
        let server_id = offer.server_identifier().unwrap_or(offer.siaddr);
        debug!("[dhcp] {} offered {} by {}", self.mac, offer.yiaddr, server_id);

        self.state = DhcpClientState::Requesting;
        let mut request = DhcpMessage::request(self.xid, self.mac);
        request.flags = DhcpFlags::BROADCAST;
        request.options = alloc::vec![
            DhcpOption::MessageType(DhcpMessageType::Request),
            DhcpOption::RequestedIp(offer.yiaddr),
            DhcpOption::ServerIdentifier(server_id),
            DhcpOption::ParameterRequestList(alloc::vec![1, 3, 6, 15]),
            DhcpOption::End,
        ];
        Some(request)
    }

    fn handle_ack(&mut self, ack: &DhcpMessage, now: u64) {
        if !matches!(
            self.state,
            DhcpClientState::Requesting | DhcpClientState::Renewing | DhcpClientState::Rebinding
        ) {
            return;
        }

        let prior = self.binding.as_ref();
        let ip = if ack.yiaddr.is_unspecified() {
            match prior {
                Some(b) => b.ip,
                None => return,
            }
        } else {
            ack.yiaddr
        };
        let server_id = ack
            .server_identifier()
            .or(if ack.siaddr.is_unspecified() { None } else { Some(ack.siaddr) })
            .or(prior.map(|b| b.server_id))
            .unwrap_or(Ipv4Addr::UNSPECIFIED);

        let lease_secs = ack.lease_time().unwrap_or(86400);
        let t1_secs = ack.renewal_time().unwrap_or(lease_secs / 2);
        let t2_secs = ack.rebinding_time().unwrap_or(lease_secs / 8 * 7);

        let binding = DhcpBinding {
            ip,
            netmask: ack.subnet_mask().unwrap_or(Ipv4Addr::new(255, 255, 255, 0)),
            gateway: ack.router(),
            dns_servers: ack.dns_servers(),
            domain: ack.domain_name().map(String::from),
            server_id,
            lease_secs,
            t1_secs,
            t2_secs,
            obtained_at: now,
        };
        debug!(
            "[dhcp] {} bound to {} (lease {}s, t1 {}s, t2 {}s)",
            self.mac, binding.ip, lease_secs, t1_secs, t2_secs
        );

        self.state = DhcpClientState::Bound;
        self.t1_at = Some(now + t1_secs as u64 * 1000);
        self.t2_at = Some(now + t2_secs as u64 * 1000);
        self.expiry_at = Some(now + lease_secs as u64 * 1000);
        self.binding = Some(binding.clone());
        self.events.push(DhcpClientEvent::LeaseObtained(binding));
    }

    /// Give the lease back. Valid while Bound/Renewing/Rebinding; returns
    /// the RELEASE to send (unicast to the server).
    pub fn release(&mut self) -> Option<DhcpMessage> {
        if !matches!(
            self.state,
            DhcpClientState::Bound | DhcpClientState::Renewing | DhcpClientState::Rebinding
        ) {
            return None;
        }
        let binding = self.binding.take()?;
        debug!("[dhcp] {} releasing {}", self.mac, binding.ip);

        let mut msg = DhcpMessage::request(self.xid, self.mac);
        msg.ciaddr = binding.ip;
        msg.options = alloc::vec![
            DhcpOption::MessageType(DhcpMessageType::Release),
            DhcpOption::ServerIdentifier(binding.server_id),
            DhcpOption::End,
        ];

        self.stop_timers();
        self.state = DhcpClientState::Init;
        Some(msg)
    }

    // ── Timers ──────────────────────────────────────────────

    /// Drive T1/T2/expiry. Returns a renewal or rebind REQUEST when a timer
    /// fires; expiry latches `LeaseExpired` and returns nothing.
    pub fn tick(&mut self, now: u64) -> Option<DhcpMessage> {
        if let Some(expiry) = self.expiry_at {
            if expiry <= now {
                debug!("[dhcp] {} lease expired", self.mac);
                self.clear_binding();
                self.state = DhcpClientState::Init;
                self.events.push(DhcpClientEvent::LeaseExpired);
                return None;
            }
        }

        if let Some(t2) = self.t2_at {
            if t2 <= now
                && matches!(self.state, DhcpClientState::Bound | DhcpClientState::Renewing)
            {
                self.t2_at = None;
                self.t1_at = None;
                self.state = DhcpClientState::Rebinding;
                debug!("[dhcp] {} rebinding", self.mac);
                return self.build_refresh_request(DhcpFlags::BROADCAST);
            }
        }

        if let Some(t1) = self.t1_at {
            if t1 <= now && self.state == DhcpClientState::Bound {
                self.t1_at = None;
                self.state = DhcpClientState::Renewing;
                debug!("[dhcp] {} renewing", self.mac);
                return self.build_refresh_request(DhcpFlags::empty());
            }
        }

        None
    }

    /// REQUEST refreshing the current lease: ciaddr set, no option 50/54.
    fn build_refresh_request(&self, flags: DhcpFlags) -> Option<DhcpMessage> {
        let binding = self.binding.as_ref()?;
        let mut msg = DhcpMessage::request(self.xid, self.mac);
        msg.ciaddr = binding.ip;
        msg.flags = flags;
        msg.options = alloc::vec![
            DhcpOption::MessageType(DhcpMessageType::Request),
            DhcpOption::ParameterRequestList(alloc::vec![1, 3, 6, 15]),
            DhcpOption::End,
        ];
        Some(msg)
    }
}

// ── Tests ───────────────────────────────────────────────────
