//! Per-peer convergence state machine.
//!
//! The Coordinator/Participant distinction is a closed variant set, modeled
//! as a tagged union with shared operations rather than two separate types:
//! one `PeerAlgorithm` type with a `PeerRole` carrying the only two things
//! that actually differ: the fanout set vs. the upstream link, and whether
//! `recover` is reachable at all.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{ClockSource, Timestamp};
use crate::diff::{DiffEngine, EditorCommand, Patch};
use crate::error::TextSyncError;
use crate::history::{HistoryEntry, HistoryLine};
use crate::link::{CoordinatorLink, ParticipantFanout, PeerId};
use crate::time_machine;

/// The two shapes a peer can take.
pub enum PeerRole {
	/// A non-coordinator peer with a single upstream connection.
	Participant {
		/// `None` before a connection has been established, or after it
		/// drops — a participant holds at most one upstream connection at a
		/// time.
		upstream: Option<Arc<dyn CoordinatorLink>>,
	},
	/// The authority that linearizes changes and fans them out.
	Coordinator {
		/// Inbound connections, keyed for idempotent add/remove.
		peers: HashMap<PeerId, Arc<dyn ParticipantFanout>>,
	},
}

impl PeerRole {
	/// A participant with no upstream connection yet.
	#[must_use]
	pub fn participant() -> Self {
		Self::Participant { upstream: None }
	}

	/// A coordinator with no connected peers yet.
	#[must_use]
	pub fn coordinator() -> Self {
		Self::Coordinator {
			peers: HashMap::new(),
		}
	}
}

/// What `onLocalTextChanged` reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
	/// The diff against `currentText` was empty, or there was nothing to
	/// send it to (no patch committed... except when the diff was
	/// non-empty and committed locally but there's no upstream; see
	/// `PeerAlgorithm::on_local_text_changed`).
	NoWorkDone,
	/// The patch was sent and the Coordinator accepted it.
	Sent,
	/// The Coordinator rejected the patch (`PatchNotApplicable`), or
	/// returned `succeed: false`. Local state is never rolled back for
	/// this — the Coordinator's authoritative order will eventually
	/// reconcile via fanout.
	Rejected,
}

/// Per-peer convergence state machine: the `currentText`, its
/// [`HistoryLine`], and the strict/loose [`DiffEngine`] pair.
pub struct PeerAlgorithm {
	/// Display name, used only for logging/tests.
	pub name: String,
	pub(crate) current_text: Option<String>,
	pub(crate) history: HistoryLine,
	pub(crate) strict: DiffEngine,
	pub(crate) loose: DiffEngine,
	clock: ClockSource,
	role: PeerRole,
}

impl PeerAlgorithm {
	/// Builds a peer with no text yet (Participant fetches it via
	/// `GetText` on connect; Coordinator takes it from configuration).
	#[must_use]
	pub fn new(name: impl Into<String>, role: PeerRole, clock: ClockSource) -> Self {
		Self {
			name: name.into(),
			current_text: None,
			history: HistoryLine::new(),
			strict: DiffEngine::strict(),
			loose: DiffEngine::loose(),
			clock,
			role,
		}
	}

	/// Whether this peer is acting as the Coordinator.
	#[must_use]
	pub fn is_coordinator(&self) -> bool {
		matches!(self.role, PeerRole::Coordinator { .. })
	}

	/// The current text, if one has been set.
	#[must_use]
	pub fn local_text(&self) -> Option<&str> {
		self.current_text.as_deref()
	}

	/// Replaces `currentText` with no other side effects.
	///
	/// Used by the initial-text fetch (`GetText` response) and nowhere
	/// else — it deliberately does not touch history.
	pub fn set_local_text(&mut self, text: String) {
		self.current_text = Some(text);
	}

	/// `remoteGetText` : returns `currentText` or fails with
	/// `NoTextAvailable`.
	pub fn remote_get_text(&self) -> Result<String, TextSyncError> {
		self.current_text
			.clone()
			.ok_or(TextSyncError::NoTextAvailable)
	}

	/// Forward history entries committed after `ts`, oldest first.
	///
	/// Backs the optional `Catchup` wire command ; a thin
	/// pass-through to [`HistoryLine::entries_since`].
	#[must_use]
	pub fn entries_since(&self, ts: Timestamp) -> Vec<HistoryEntry> {
		self.history.entries_since(ts)
	}

	/// Registers (or replaces) an inbound participant connection. Coordinator
	/// only; idempotent under the same `id`.
	pub fn add_peer(&mut self, id: PeerId, fanout: Arc<dyn ParticipantFanout>) {
		if let PeerRole::Coordinator { peers } = &mut self.role {
			peers.insert(id, fanout);
		}
	}

	/// Removes an inbound participant connection. Coordinator only;
	/// idempotent — removing an absent id is a no-op.
	pub fn remove_peer(&mut self, id: PeerId) {
		if let PeerRole::Coordinator { peers } = &mut self.role {
			peers.remove(&id);
		}
	}

	/// Sets (or clears, via `None`) the upstream Coordinator connection.
	/// Participant only.
	pub fn set_upstream(&mut self, upstream: Option<Arc<dyn CoordinatorLink>>) {
		if let PeerRole::Participant { upstream: slot } = &mut self.role {
			*slot = upstream;
		}
	}

	/// `onLocalTextChanged`.
	pub async fn on_local_text_changed(
		&mut self,
		next_text: String,
	) -> Result<ApplyOutcome, TextSyncError> {
		let current = self.current_text.clone().unwrap_or_default();
		let forward = self.strict.make_patch(&current, &next_text);
		if forward.is_empty() {
			return Ok(ApplyOutcome::NoWorkDone);
		}

		let ts = self.clock.now();
		let backward = self.strict.make_patch(&next_text, &current);
		self.history.commit(
			HistoryEntry {
				patch: forward.clone(),
				timestamp: ts,
				is_owner_local: true,
			},
			HistoryEntry {
				patch: backward,
				timestamp: ts,
				is_owner_local: true,
			},
		);
		self.current_text = Some(next_text);

		let upstream = match &self.role {
			PeerRole::Participant { upstream } => upstream.clone(),
			PeerRole::Coordinator { .. } => None,
		};
		let Some(upstream) = upstream else {
			return Ok(ApplyOutcome::NoWorkDone);
		};

		match upstream.try_apply_patch(forward.to_text(), ts).await {
			Ok(true) => Ok(ApplyOutcome::Sent),
			Ok(false) => {
				warn!(peer = %self.name, "coordinator reported succeed=false for TryApplyPatch");
				Ok(ApplyOutcome::Rejected)
			}
			Err(TextSyncError::PatchNotApplicable { patch }) => {
				warn!(peer = %self.name, %patch, "coordinator rejected patch");
				Ok(ApplyOutcome::Rejected)
			}
			Err(e) => {
				tracing::error!(peer = %self.name, error = %e, "unknown coordinator error");
				Err(e)
			}
		}
	}

	/// `onForcePatch` : invoked when the Coordinator pushes
	/// `ApplyPatch`. Participant only — the Coordinator never routes
	/// `ApplyPatch` to this method.
	pub async fn on_force_patch(
		&mut self,
		patch_text: &str,
		ts: Timestamp,
	) -> Result<Vec<EditorCommand>, TextSyncError> {
		debug_assert!(!self.is_coordinator(), "coordinator never receives ApplyPatch");

		let patch = Patch::from_text(patch_text);
		let current = self.current_text.clone().unwrap_or_default();
		let (patched, oks, commands) = self.strict.apply(&patch, &current);

		if oks.iter().all(|ok| *ok) {
			let backward = self.strict.make_patch(&patched, &current);
			self.history.commit(
				HistoryEntry {
					patch,
					timestamp: ts,
					is_owner_local: false,
				},
				HistoryEntry {
					patch: backward,
					timestamp: ts,
					is_owner_local: false,
				},
			);
			self.current_text = Some(patched);
			return Ok(commands);
		}

		match time_machine::recover(self, patch, ts) {
			Ok(outcome) => {
				info!(peer = %self.name, "recovery converged");
				Ok(crate::recovery::into_editor_commands(outcome))
			}
			Err(TextSyncError::HistoryInconsistent { reason })
			| Err(TextSyncError::RollbackFailed { reason }) => {
				warn!(peer = %self.name, %reason, "history inconsistent, resyncing");
				self.retry().await?;
				Ok(Vec::new())
			}
			Err(e) => Err(e),
		}
	}

	/// `retry()`: the concrete completion chosen for the abstract resync
	/// hook. Issues `GetText`, adopts the result as `currentText`, and clears
	/// history — discarding any in-flight local edits rather than buffering
	/// and replaying them (documented as the simpler, lossy option in
	/// DESIGN.md).
	pub async fn retry(&mut self) -> Result<(), TextSyncError> {
		let upstream = match &self.role {
			PeerRole::Participant { upstream } => upstream.clone(),
			PeerRole::Coordinator { .. } => None,
		};
		let upstream = upstream.ok_or_else(|| {
			TextSyncError::UnknownCoordinatorError("no upstream to resync from".into())
		})?;
		let text = upstream.get_text().await?;
		self.current_text = Some(text);
		self.history.clean();
		Ok(())
	}

	/// The authoritative `tryApplyPatch` . Coordinator only.
	///
	/// Recovery is statically unreachable here: a failed strict-apply is
	/// authoritative rejection, not a prompt to roll back and retry.
	pub fn coordinator_try_apply_patch(
		&mut self,
		patch_text: String,
		ts: Timestamp,
	) -> Result<(), TextSyncError> {
		debug_assert!(self.is_coordinator(), "only the coordinator serializes patches");

		let patch = Patch::from_text(&patch_text);
		let current = self.current_text.clone().ok_or(TextSyncError::NoTextAvailable)?;
		let (patched, oks, _commands) = self.strict.apply(&patch, &current);

		if oks.iter().any(|ok| !ok) {
			return Err(TextSyncError::PatchNotApplicable { patch: patch_text });
		}

		let backward = self.strict.make_patch(&patched, &current);
		self.history.commit(
			HistoryEntry {
				patch,
				timestamp: ts,
				is_owner_local: false,
			},
			HistoryEntry {
				patch: backward,
				timestamp: ts,
				is_owner_local: false,
			},
		);
		self.current_text = Some(patched);

		if let PeerRole::Coordinator { peers } = &self.role {
			for fanout in peers.values() {
				fanout.apply_patch(&patch_text, ts);
			}
		}
		Ok(())
	}
}
