//! Session registry: endpoint-to-client bookkeeping.
//!
//! Clients are keyed by their network endpoint and kept in registration
//! order, which is observable: the resend sweep and join announcements
//! both walk clients oldest-first. Each client carries the anti-cheat
//! malus counter and the table of outbound packets still awaiting an Ack.

use log::{debug, info};

use crate::transport::Endpoint;

/// An outbound packet retained until the recipient acknowledges it.
///
/// The stored bytes are resent unmodified once per tick; `attempts` counts
/// resends so a configured cap can evict permanently silent recipients.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub endpoint: Endpoint,
    pub packet_id: u32,
    pub data: Vec<u8>,
    pub attempts: u32,
}

impl PendingSend {
    pub fn new(endpoint: Endpoint, packet_id: u32, data: Vec<u8>) -> Self {
        Self {
            endpoint,
            packet_id,
            data,
            attempts: 0,
        }
    }
}

/// A registered session. Created on the first valid Join from an endpoint
/// and never destroyed.
#[derive(Debug)]
pub struct GameClient {
    pub id: u32,
    pub endpoint: Endpoint,
    malus: u32,
    pending_acks: Vec<PendingSend>,
}

impl GameClient {
    fn new(id: u32, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            malus: 0,
            pending_acks: Vec::new(),
        }
    }

    /// Anti-cheat counter; only ever goes up.
    pub fn malus(&self) -> u32 {
        self.malus
    }

    pub fn penalize(&mut self) {
        self.malus += 1;
        debug!("client {} malus now {}", self.id, self.malus);
    }

    /// Appends a packet that must be retransmitted until acknowledged.
    pub fn schedule_pending_ack(&mut self, pending: PendingSend) {
        self.pending_acks.push(pending);
    }

    /// Removes the matching pending entry. Unknown or already-removed ids
    /// are a silent no-op: acks may legitimately race retransmits.
    pub fn acknowledge(&mut self, packet_id: u32) {
        match self.pending_acks.iter().position(|p| p.packet_id == packet_id) {
            Some(index) => {
                self.pending_acks.remove(index);
                debug!("client {} acknowledged packet {}", self.id, packet_id);
            }
            None => debug!(
                "client {} acknowledged unknown packet {}, ignoring",
                self.id, packet_id
            ),
        }
    }

    pub fn pending_ack_count(&self) -> usize {
        self.pending_acks.len()
    }

    /// Pending entries in insertion order, with resend accounting exposed
    /// so the sweep can bump `attempts`.
    pub fn pending_acks_mut(&mut self) -> impl Iterator<Item = &mut PendingSend> {
        self.pending_acks.iter_mut()
    }

    /// Drops entries that have been resent `cap` times or more.
    pub fn evict_exhausted(&mut self, cap: u32) {
        let id = self.id;
        self.pending_acks.retain(|p| {
            if p.attempts >= cap {
                log::warn!(
                    "client {}: dropping packet {} after {} unacknowledged resends",
                    id,
                    p.packet_id,
                    p.attempts
                );
                false
            } else {
                true
            }
        });
    }
}

/// All registered clients, in registration order.
#[derive(Debug)]
pub struct SessionRegistry {
    clients: Vec<GameClient>,
    next_client_id: u32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            next_client_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Pure lookup by endpoint.
    pub fn find(&self, endpoint: &Endpoint) -> Option<&GameClient> {
        self.clients.iter().find(|c| c.endpoint == *endpoint)
    }

    pub fn find_mut(&mut self, endpoint: &Endpoint) -> Option<&mut GameClient> {
        self.clients.iter_mut().find(|c| c.endpoint == *endpoint)
    }

    /// Creates a client with malus 0 and an empty pending-ack table and
    /// returns its id. The caller must have checked that the endpoint is
    /// not yet registered.
    pub fn register(&mut self, endpoint: Endpoint) -> u32 {
        debug_assert!(self.find(&endpoint).is_none(), "endpoint already registered");

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("client {} registered from {}", client_id, endpoint);
        self.clients.push(GameClient::new(client_id, endpoint));
        client_id
    }

    /// Clients in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &GameClient> {
        self.clients.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameClient> {
        self.clients.iter_mut()
    }
}
