//! Tokio TCP transport for the textsync peer protocol.
//!
//! `textsync-core` has no networking; this crate supplies it. Each process
//! holds one [`engine::EngineHandle`] (the actor owning a single
//! `textsync_core::PeerAlgorithm`), one [`listener::BoundPort`] if it
//! accepts inbound connections, and zero-or-more [`transport::PeerLink`]s —
//! one per TCP connection, implementing whichever of
//! `textsync_core::CoordinatorLink`/`ParticipantFanout` its role calls for.

#![warn(missing_docs)]

mod engine;
mod listener;
mod transport;

pub use engine::EngineHandle;
pub use listener::{connect, listen, BoundPort};
pub use transport::PeerLink;
