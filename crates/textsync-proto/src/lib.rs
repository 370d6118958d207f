//! Wire types for the textsync peer protocol.
//!
//! This crate defines the frames exchanged between a Participant and its
//! Coordinator over a length-prefixed TCP stream, using postcard encoding.
//! It carries no algorithm logic — see `textsync-core` for the convergence
//! engine and `textsync-session` for the transport actor.

#![warn(missing_docs)]

pub mod protocol;
pub mod types;

pub use protocol::{is_disconnect, read_frame, write_frame};
pub use types::*;
