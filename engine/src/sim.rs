//! Simulator (Mediator)
//!
//! Owns the device registry, the link table, the observer list and the
//! virtual clock. All frame delivery is synchronous: one `send_frame` (or
//! timer tick) drives the causal chain of reactions (ARP replies, ICMP
//! echoes, switch fan-out) to quiescence before returning.
//!
//! The simulator is an owned value; independent instances never share
//! state, so parallel tests each build their own.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::trace;

use netlab_packet::ethernet::EtherPayload;
use netlab_packet::{ArpOperation, EthernetFrame, Ipv4Addr};
use netlab_stack::stack::Emission;
use netlab_stack::InterfaceId;

use crate::conn::{Connection, ConnectionId, ConnectionTable};
use crate::device::{Device, DeviceId, DeviceKind};
use crate::envelope::{DeliveryStatus, PacketEnvelope};
use crate::event::{DropReason, ListenerId, SimEvent, SimEventKind};
use crate::switch::MacTableEntry;
use crate::SimError;

/// Granularity of the virtual clock while advancing.
const TICK_SLICE_MS: u64 = 100;

/// A frame queued to leave a device on one of its interfaces.
struct Transit {
    from_device: DeviceId,
    from_interface: InterfaceId,
    envelope: PacketEnvelope,
}

type Listener = Box<dyn FnMut(&SimEvent)>;

// ── Simulator ───────────────────────────────────────────────

/// The mediator owning the whole topology.
#[derive(Default)]
pub struct Simulator {
    devices: HashMap<DeviceId, Device>,
    /// Registration order; timer ticks follow it deterministically.
    order: Vec<DeviceId>,
    connections: ConnectionTable,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
    now_ms: u64,
}

impl Simulator {
    pub fn new() -> Self {
        Simulator::default()
    }

    /// Register a topology in one call: all devices, then all links.
    pub fn initialize(
        &mut self,
        devices: Vec<Device>,
        links: Vec<(DeviceId, InterfaceId, DeviceId, InterfaceId)>,
    ) -> Result<(), SimError> {
        for device in devices {
            self.register_device(device);
        }
        for (da, ia, db, ib) in links {
            self.connect(da, ia, db, ib)?;
        }
        Ok(())
    }

    /// True once at least one device is registered.
    pub fn is_ready(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    // ── Registry ────────────────────────────────────────────

    pub fn register_device(&mut self, device: Device) -> DeviceId {
        let id = device.id;
        trace!("[sim] register {} ({:?})", id, device.kind);
        self.order.push(id);
        self.devices.insert(id, device);
        id
    }

    /// Remove a device and every link touching it.
    pub fn unregister_device(&mut self, id: DeviceId) -> Option<Device> {
        self.order.retain(|d| *d != id);
        self.connections.remove_device(id);
        self.devices.remove(&id)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    /// Flip a device's power state.
    pub fn set_power(&mut self, id: DeviceId, on: bool) -> Result<(), SimError> {
        let device = self.devices.get_mut(&id).ok_or(SimError::UnknownDevice)?;
        device.powered_on = on;
        Ok(())
    }

    // ── Links ───────────────────────────────────────────────

    /// Link two interfaces. Both must exist and be unlinked.
    pub fn connect(
        &mut self,
        device_a: DeviceId,
        interface_a: InterfaceId,
        device_b: DeviceId,
        interface_b: InterfaceId,
    ) -> Result<ConnectionId, SimError> {
        for (dev, ifc) in [(device_a, interface_a), (device_b, interface_b)] {
            let device = self.devices.get(&dev).ok_or(SimError::UnknownDevice)?;
            if device.interfaces.get(ifc).is_none() {
                return Err(SimError::UnknownInterface);
            }
        }
        self.connections
            .add(device_a, interface_a, device_b, interface_b)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(id)
    }

    /// Replace the whole link set (topology editor hand-off).
    pub fn update_connections(&mut self, connections: Vec<Connection>) {
        self.connections.replace_all(connections);
    }

    /// Snapshot of the current links.
    pub fn connection_info(&self) -> Vec<Connection> {
        self.connections.iter().cloned().collect()
    }

    // ── Observers ───────────────────────────────────────────

    pub fn add_event_listener(&mut self, listener: impl FnMut(&SimEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != len
    }

    fn dispatch(&mut self, events: Vec<SimEvent>) {
        for event in &events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }
    }

    // ── Introspection ───────────────────────────────────────

    /// MAC table of a switch, in learn order.
    pub fn mac_table(&self, id: DeviceId) -> Option<Vec<MacTableEntry>> {
        self.devices
            .get(&id)?
            .switch_state()
            .map(|s| s.entries().to_vec())
    }

    // ── Frame injection ─────────────────────────────────────

    /// Emit a frame from a device interface and run delivery to quiescence.
    pub fn send_frame(
        &mut self,
        device: DeviceId,
        interface: InterfaceId,
        frame: EthernetFrame,
    ) -> Result<(), SimError> {
        let dev = self.devices.get(&device).ok_or(SimError::UnknownDevice)?;
        if dev.interfaces.get(interface).is_none() {
            return Err(SimError::UnknownInterface);
        }
        self.emit_from(device, alloc::vec![(interface, frame)]);
        Ok(())
    }

    /// Queue a batch of device emissions and run the delivery loop.
    fn emit_from(&mut self, source: DeviceId, emissions: Vec<Emission>) {
        if emissions.is_empty() {
            return;
        }
        let now = self.now_ms;
        let mut queue: VecDeque<Transit> = VecDeque::new();

        if let Some(device) = self.devices.get_mut(&source) {
            for (interface, frame) in emissions {
                if let Some(iface) = device.interfaces.get_mut(interface) {
                    iface.tx_packets += 1;
                }
                queue.push_back(Transit {
                    from_device: source,
                    from_interface: interface,
                    envelope: PacketEnvelope::new(frame, source, now),
                });
            }
        }
        self.run_queue(queue);
    }

    /// The delivery loop: hop frames across links until nothing is left.
    fn run_queue(&mut self, mut queue: VecDeque<Transit>) {
        let mut events: Vec<SimEvent> = Vec::new();
        let now = self.now_ms;

        while let Some(transit) = queue.pop_front() {
            let Transit {
                from_device,
                from_interface,
                mut envelope,
            } = transit;

            events.push(SimEvent {
                timestamp: now,
                kind: SimEventKind::FrameSent {
                    source_device: from_device,
                    source_interface: from_interface,
                    packet_id: envelope.id,
                    frame: envelope.frame.clone(),
                },
            });
            if let EtherPayload::Arp(arp) = &envelope.frame.payload {
                let kind = match arp.opcode {
                    ArpOperation::Request => SimEventKind::ArpRequest {
                        device: from_device,
                        interface: from_interface,
                        target_ip: arp.target_ip,
                    },
                    ArpOperation::Reply => SimEventKind::ArpReply {
                        device: from_device,
                        interface: from_interface,
                        target_ip: arp.target_ip,
                    },
                };
                events.push(SimEvent {
                    timestamp: now,
                    kind,
                });
            }

            // A switch flood skips unlinked ports silently; anyone else
            // sending into the void is a reportable drop.
            let peer = self
                .connections
                .find(from_device, from_interface)
                .filter(|c| c.is_active)
                .and_then(|c| c.peer_of(from_device, from_interface));
            let (peer_device, peer_interface) = match peer {
                Some(p) => p,
                None => {
                    let from_switch = self
                        .devices
                        .get(&from_device)
                        .map(|d| d.kind == DeviceKind::Switch)
                        .unwrap_or(false);
                    envelope.status = DeliveryStatus::Dropped;
                    if !from_switch {
                        events.push(SimEvent {
                            timestamp: now,
                            kind: SimEventKind::FrameDropped {
                                source_device: from_device,
                                source_interface: Some(from_interface),
                                packet_id: envelope.id,
                                reason: DropReason::NoConnection,
                            },
                        });
                    }
                    continue;
                }
            };

            let target = match self.devices.get_mut(&peer_device) {
                Some(d) => d,
                None => continue,
            };

            if !target.powered_on {
                envelope.status = DeliveryStatus::Dropped;
                events.push(SimEvent {
                    timestamp: now,
                    kind: SimEventKind::FrameDropped {
                        source_device: from_device,
                        source_interface: Some(from_interface),
                        packet_id: envelope.id,
                        reason: DropReason::DevicePoweredOff,
                    },
                });
                continue;
            }
            match target.interfaces.get_mut(peer_interface) {
                Some(iface) if iface.is_up => {
                    iface.rx_packets += 1;
                }
                _ => {
                    envelope.status = DeliveryStatus::Dropped;
                    events.push(SimEvent {
                        timestamp: now,
                        kind: SimEventKind::FrameDropped {
                            source_device: from_device,
                            source_interface: Some(from_interface),
                            packet_id: envelope.id,
                            reason: DropReason::InterfaceDown,
                        },
                    });
                    continue;
                }
            }

            envelope.hops.push(peer_device);
            events.push(SimEvent {
                timestamp: now,
                kind: SimEventKind::FrameReceived {
                    destination_device: peer_device,
                    destination_interface: peer_interface,
                    packet_id: envelope.id,
                    hops: envelope.hops.clone(),
                },
            });

            let out = target.process_frame(&envelope.frame, peer_interface, now);

            if let Some((mac, vlan, port)) = out.learned {
                events.push(SimEvent {
                    timestamp: now,
                    kind: SimEventKind::MacLearned {
                        device: peer_device,
                        mac,
                        vlan,
                        interface: port,
                    },
                });
            }

            // Switch continuation: the same packet keeps travelling. A
            // flood duplicates the envelope per egress, a known-unicast
            // forward moves it along unchanged.
            if out.forwarded.is_empty() {
                envelope.status = DeliveryStatus::Delivered;
            } else if out.flooded {
                for port in out.forwarded {
                    if let Some(iface) = target.interfaces.get_mut(port) {
                        iface.tx_packets += 1;
                    }
                    queue.push_back(Transit {
                        from_device: peer_device,
                        from_interface: port,
                        envelope: envelope.fork(),
                    });
                }
            } else {
                let port = out.forwarded[0];
                if let Some(iface) = target.interfaces.get_mut(port) {
                    iface.tx_packets += 1;
                }
                queue.push_back(Transit {
                    from_device: peer_device,
                    from_interface: port,
                    envelope,
                });
            }

            // Frames the device originated in reaction (replies, forwards
            // after routing, parked packets released by ARP).
            for (interface, frame) in out.emissions {
                if let Some(iface) = target.interfaces.get_mut(interface) {
                    iface.tx_packets += 1;
                }
                queue.push_back(Transit {
                    from_device: peer_device,
                    from_interface: interface,
                    envelope: PacketEnvelope::new(frame, peer_device, now),
                });
            }
        }

        self.dispatch(events);
    }

    // ── Virtual clock ───────────────────────────────────────

    /// Advance the virtual clock, driving every device timer (ARP retries
    /// and aging, DHCP T1/T2/expiry, DNS query timeouts) and delivering
    /// whatever the timers transmit.
    pub fn advance(&mut self, ms: u64) {
        let mut remaining = ms;
        while remaining > 0 {
            let step = remaining.min(TICK_SLICE_MS);
            remaining -= step;
            self.now_ms += step;

            let order = self.order.clone();
            for id in order {
                let emissions = match self.devices.get_mut(&id) {
                    Some(device) => device.tick(self.now_ms),
                    None => continue,
                };
                self.emit_from(id, emissions);
            }
        }
    }

    // ── Device operation wrappers ───────────────────────────

    /// Ping from a host and deliver the traffic. Returns the echo id.
    pub fn ping(
        &mut self,
        device: DeviceId,
        destination: Ipv4Addr,
        sequence_number: u16,
    ) -> Result<u16, SimError> {
        let now = self.now_ms;
        let (identifier, emissions) = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice)?
            .ping(destination, sequence_number, now)?;
        self.emit_from(device, emissions);
        Ok(identifier)
    }

    /// Start DHCP on a host interface and deliver the handshake.
    pub fn start_dhcp(&mut self, device: DeviceId, interface: InterfaceId) -> Result<(), SimError> {
        let now = self.now_ms;
        let emissions = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice)?
            .start_dhcp(interface, now)?;
        self.emit_from(device, emissions);
        Ok(())
    }

    /// Release a host's DHCP lease.
    pub fn release_dhcp(&mut self, device: DeviceId) -> Result<(), SimError> {
        let now = self.now_ms;
        let emissions = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice)?
            .release_dhcp(now)?;
        self.emit_from(device, emissions);
        Ok(())
    }

    /// Start resolving a name from a host.
    pub fn resolve_name(&mut self, device: DeviceId, name: &str) -> Result<(), SimError> {
        let now = self.now_ms;
        let emissions = self
            .devices
            .get_mut(&device)
            .ok_or(SimError::UnknownDevice)?
            .resolve_name(name, now)?;
        self.emit_from(device, emissions);
        Ok(())
    }
}
