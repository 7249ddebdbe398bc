//! The authoritative server core: command dispatch, the reliability sweep,
//! and the tick orchestrator.
//!
//! One [`GameServer::single_step`] call is one tick: resend everything
//! still awaiting an Ack, drain the transport and dispatch each packet in
//! receipt order, then snapshot the clock. All state is exclusively owned
//! by the server; nothing here suspends or blocks.

use log::{info, warn};
use thiserror::Error;

use shared::{Command, DecodeError, Packet, Vec3};

use crate::clock::Clock;
use crate::session::{GameClient, PendingSend, SessionRegistry};
use crate::transport::{Endpoint, Transport};
use crate::world::{GameObject, World};

/// Fatal per-packet failures, surfaced to the tick's caller. Anti-cheat
/// violations are not errors; they only bump the offender's malus.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServerError {
    /// The payload was malformed for the declared command.
    #[error("malformed packet from {endpoint}: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: DecodeError,
    },

    /// A non-Join command arrived from an endpoint with no session, so
    /// there is no client to attribute consequences to.
    #[error("no session established for {0}: only Join is accepted from unknown endpoints")]
    SessionRequired(Endpoint),
}

/// Core policy knobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How many times an unacknowledged packet is resent before being
    /// dropped. `None` retransmits once per tick indefinitely.
    pub max_resend_attempts: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_resend_attempts: None,
        }
    }
}

/// The tick-driven server. Owns the session registry and world state;
/// reads the clock once per tick and talks to the network only through
/// the [`Transport`] it was constructed with.
pub struct GameServer<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: ServerConfig,
    registry: SessionRegistry,
    world: World,
    now: f64,
    next_packet_id: u32,
}

impl<T: Transport, C: Clock> GameServer<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self::with_config(transport, clock, ServerConfig::default())
    }

    pub fn with_config(transport: T, clock: C, config: ServerConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            registry: SessionRegistry::new(),
            world: World::new(),
            now: 0.0,
            next_packet_id: 1,
        }
    }

    /// Runs exactly one tick: reliability sweep, inbound drain and
    /// dispatch, clock snapshot.
    ///
    /// A fatal packet aborts the remainder of the tick; packets dispatched
    /// before it stay applied.
    pub fn single_step(&mut self) -> Result<(), ServerError> {
        self.resend_pending();

        for (endpoint, data) in self.transport.drain() {
            self.dispatch(endpoint, &data)?;
        }

        self.now = self.clock.now();
        Ok(())
    }

    /// Resends every pending entry that existed when the tick began, in
    /// registration order per client and insertion order per entry.
    fn resend_pending(&mut self) {
        let cap = self.config.max_resend_attempts;

        for client in self.registry.iter_mut() {
            for pending in client.pending_acks_mut() {
                self.transport.send(&pending.endpoint, &pending.data);
                pending.attempts += 1;
            }
            if let Some(cap) = cap {
                client.evict_exhausted(cap);
            }
        }
    }

    /// Interprets one inbound packet against the current state.
    fn dispatch(&mut self, endpoint: Endpoint, data: &[u8]) -> Result<(), ServerError> {
        let packet = Packet::decode(data).map_err(|source| {
            warn!("malformed packet from {}: {}", endpoint, source);
            ServerError::Decode {
                endpoint: endpoint.clone(),
                source,
            }
        })?;

        match packet.command {
            Command::Join => {
                self.handle_join(endpoint);
                Ok(())
            }
            command => {
                // A session must exist before anything but Join.
                if self.registry.find(&endpoint).is_none() {
                    warn!(
                        "command {} from unknown endpoint {}",
                        command.tag(),
                        endpoint
                    );
                    return Err(ServerError::SessionRequired(endpoint));
                }

                match command {
                    Command::Move { avatar_id, delta } => {
                        self.handle_move(&endpoint, avatar_id, delta);
                    }
                    Command::Ack { packet_id } => {
                        if let Some(client) = self.registry.find_mut(&endpoint) {
                            client.acknowledge(packet_id);
                        }
                    }
                    // Server-to-client tags and anything unassigned: the
                    // sender is known, so absorb it as an anomaly.
                    _ => {
                        warn!("unhandled command {} from {}", command.tag(), endpoint);
                        if let Some(client) = self.registry.find_mut(&endpoint) {
                            client.penalize();
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn handle_join(&mut self, endpoint: Endpoint) {
        if let Some(client) = self.registry.find_mut(&endpoint) {
            warn!("duplicate join from {}", endpoint);
            client.penalize();
            return;
        }

        // Snapshot the veterans before the newcomer enters the registry.
        let veterans: Vec<(Endpoint, u32)> = self
            .registry
            .iter()
            .map(|c| (c.endpoint.clone(), c.id))
            .collect();

        let client_id = self.registry.register(endpoint.clone());
        let avatar_id = self.world.spawn(client_id);
        info!(
            "client {} joined from {} with avatar {}",
            client_id, endpoint, avatar_id
        );

        // Announce the newcomer's avatar to everyone already in the world.
        for (veteran_endpoint, _) in &veterans {
            self.send(
                veteran_endpoint,
                Command::Spawn {
                    avatar_id,
                    owner_id: client_id,
                },
            );
        }

        // Welcome the newcomer; retransmitted until acknowledged.
        self.send_with_ack(&endpoint, Command::Welcome { avatar_id });

        // Teach the newcomer the existing world, in registration order.
        let veteran_avatars: Vec<(u32, u32)> = veterans
            .iter()
            .filter_map(|(_, id)| self.world.avatar_of(*id).map(|obj| (obj.id, *id)))
            .collect();
        for (veteran_avatar, veteran_id) in veteran_avatars {
            self.send(
                &endpoint,
                Command::Spawn {
                    avatar_id: veteran_avatar,
                    owner_id: veteran_id,
                },
            );
        }
    }

    fn handle_move(&mut self, endpoint: &Endpoint, avatar_id: u32, delta: Vec3) {
        let sender_id = match self.registry.find(endpoint) {
            Some(client) => client.id,
            None => return,
        };

        // A missing target is treated exactly like an ownership mismatch.
        let authorized = self
            .world
            .get(avatar_id)
            .map_or(false, |obj| obj.owner == sender_id);

        if !authorized {
            warn!(
                "client {} tried to move avatar {} it does not own",
                sender_id, avatar_id
            );
            if let Some(client) = self.registry.find_mut(endpoint) {
                client.penalize();
            }
            return;
        }

        self.world.apply_move(avatar_id, delta);
    }

    /// Encodes and fires one packet, no delivery tracking.
    fn send(&mut self, endpoint: &Endpoint, command: Command) {
        let packet = Packet::new(self.alloc_packet_id(), command);
        self.transport.send(endpoint, &packet.encode());
    }

    /// Encodes and fires one packet, retaining it for retransmission until
    /// the recipient acknowledges the packet id.
    fn send_with_ack(&mut self, endpoint: &Endpoint, command: Command) {
        let packet = Packet::new(self.alloc_packet_id(), command);
        let data = packet.encode();
        self.transport.send(endpoint, &data);

        if let Some(client) = self.registry.find_mut(endpoint) {
            client.schedule_pending_ack(PendingSend::new(endpoint.clone(), packet.id, data));
        }
    }

    fn alloc_packet_id(&mut self) -> u32 {
        let id = self.next_packet_id;
        self.next_packet_id += 1;
        id
    }

    // Observation surface used by drivers and tests.

    /// Latest clock snapshot, taken at the end of the last completed tick.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn num_clients(&self) -> usize {
        self.registry.len()
    }

    pub fn num_game_objects(&self) -> usize {
        self.world.len()
    }

    pub fn client(&self, endpoint: &Endpoint) -> Option<&GameClient> {
        self.registry.find(endpoint)
    }

    pub fn object(&self, avatar_id: u32) -> Option<&GameObject> {
        self.world.get(avatar_id)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
