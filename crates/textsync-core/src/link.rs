//! Transport-facing seams the convergence engine calls through.
//!
//! `textsync-core` has no networking of its own. `textsync-session` supplies
//! the concrete implementations over TCP; tests in this crate supply
//! in-process fakes so the engine is exercised without a transport at all.

use async_trait::async_trait;

use crate::clock::Timestamp;
use crate::error::TextSyncError;

/// Identifies one fanout target in the Coordinator's `peers[]` set.
///
/// Adding/removing a peer under the same id is an idempotent set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

/// A Participant's single upstream connection to its Coordinator.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
	/// `GetText` — seeds or resyncs `currentText`.
	async fn get_text(&self) -> Result<String, TextSyncError>;

	/// `TryApplyPatch` — submits a locally-computed patch for
	/// authoritative serialization. `Ok(false)`/`PatchNotApplicable`
	/// both mean "rejected"; the caller treats them identically.
	async fn try_apply_patch(&self, patch: String, ts: Timestamp) -> Result<bool, TextSyncError>;
}

/// One entry in the Coordinator's fanout set: a connected Participant.
///
/// Fire-and-forget by design: the Coordinator does not await delivery before
/// acknowledging the original submitter.
pub trait ParticipantFanout: Send + Sync {
	/// Force-pushes `ApplyPatch` toward this participant.
	fn apply_patch(&self, patch: &str, ts: Timestamp);
}
