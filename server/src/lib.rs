//! # Authoritative Tick Server
//!
//! This library implements the server core for a tick-driven multiplayer
//! game: it owns all shared world state, validates commands arriving over
//! an unreliable transport, and emits the packets describing what changed.
//!
//! ## Architecture
//!
//! The core is single-threaded and step-driven. An external driver calls
//! [`server::GameServer::single_step`] once per tick; each call performs
//! the retransmission sweep for packets still awaiting acknowledgment,
//! drains and dispatches everything the transport has queued, and
//! snapshots the clock. No operation inside a tick suspends or yields, so
//! no locking is needed anywhere in the core.
//!
//! The two environment-facing seams are traits: [`transport::Transport`]
//! (drain inbound, fire-and-forget send) and [`clock::Clock`]. Production
//! binds them to a tokio UDP socket and wall-clock time; deterministic
//! drivers and the test suite bind them to in-memory queues and a manually
//! advanced clock.
//!
//! ## Reliability
//!
//! UDP gives no delivery guarantee, so packets that must arrive (the
//! Welcome completing a join handshake) are retained per client and resent
//! every tick until the matching Ack comes back. Resends happen at the
//! start of the tick, before any new input is processed, which makes their
//! scheduling deterministic and testable.
//!
//! ## Anti-cheat
//!
//! Every command is validated against session and ownership state.
//! Violations that can be attributed to a registered client (moving someone
//! else's avatar, duplicate joins, reserved command tags) increment that
//! client's malus counter and are otherwise absorbed. Commands that cannot
//! be attributed to anyone, or payloads too short for their declared
//! command, fail the tick with an explicit error.

pub mod clock;
pub mod server;
pub mod session;
pub mod transport;
pub mod world;
