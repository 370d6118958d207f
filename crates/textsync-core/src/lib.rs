//! The convergence engine: diff/patch, history, recovery, and the per-peer
//! state machine that synchronizes one logical text document across a star
//! topology of a Coordinator and its Participants.
//!
//! This crate has no networking of its own. `textsync-session` supplies the
//! concrete TCP transport; the [`link`] module defines the seams
//! (`CoordinatorLink`, `ParticipantFanout`) that transport plugs into.

#![warn(missing_docs)]

pub mod clock;
pub mod diff;
pub mod error;
pub mod history;
pub mod link;
pub mod peer;
pub mod recovery;
pub mod time_machine;

pub use clock::{ClockSource, SystemTimeSource, TimeSource, Timestamp};
pub use diff::{DiffEngine, EditorCommand, Hunk, MatchThreshold, Patch};
pub use error::TextSyncError;
pub use history::{HistoryEntry, HistoryLine};
pub use link::{CoordinatorLink, ParticipantFanout, PeerId};
pub use peer::{ApplyOutcome, PeerAlgorithm, PeerRole};
pub use time_machine::RecoveryOutcome;
