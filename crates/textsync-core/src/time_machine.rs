//! Recovery: rewind history until a force-patch applies, then replay.
//!
//! Modeled as a free function taking `&mut PeerAlgorithm` rather than a
//! struct holding a back-reference to its owner — a cyclic
//! `TimeMachine`/`PeerAlgorithm` pair referring to each other would make a
//! literal `Weak`-style handle awkward for this shape of problem, so the
//! back-reference is dropped entirely in favor of passing `&mut
//! PeerAlgorithm` through the call instead.

use crate::clock::Timestamp;
use crate::diff::{EditorCommand, Patch};
use crate::error::TextSyncError;
use crate::history::HistoryEntry;
use crate::peer::PeerAlgorithm;

/// What a successful recovery produces.
pub struct RecoveryOutcome {
	/// Editor commands to replay the rollforward phase, in order.
	pub rollforward_commands: Vec<EditorCommand>,
	/// Editor commands to replay the rollback phase, in order.
	pub rollback_commands: Vec<EditorCommand>,
	/// The text obtained immediately after the remote patch was inserted
	/// into rewound history, named `d1d3` after the intermediate diff stage
	/// it corresponds to.
	pub d1d3: String,
}

/// Rewinds `peer`'s history until `patch` applies cleanly, then replays the
/// popped local edits on top with loose matching.
///
/// On success, commits one composite `HistoryEntry` representing the net
/// change and updates `peer.currentText` — the recovered state becomes the
/// new ground truth. On failure (`HistoryInconsistent`/`RollbackFailed`),
/// `peer.history` has already had entries popped off by `pop_latest` and
/// they are not restored — `peer.currentText` is untouched, but the history
/// log is now short the entries consumed before the failing rollback. The
/// caller (`PeerAlgorithm::on_force_patch`) is responsible for calling
/// `retry()`, which resyncs via `GetText` and clears history outright rather
/// than relying on it being intact.
pub fn recover(
	peer: &mut PeerAlgorithm,
	patch: Patch,
	ts: Timestamp,
) -> Result<RecoveryOutcome, TextSyncError> {
	debug_assert!(!peer.is_coordinator(), "the coordinator never recovers");

	let original_text = peer.current_text.clone().ok_or(TextSyncError::NoTextAvailable)?;
	let mut model_text = original_text.clone();
	let mut pop_stack: Vec<(HistoryEntry, HistoryEntry)> = Vec::new();
	let mut rollback_commands = Vec::new();

	let d1d3 = loop {
		let (back, fwd) = peer.history.pop_latest().map_err(|_| {
			TextSyncError::HistoryInconsistent {
				reason: "history exhausted without a clean match for the incoming patch".into(),
			}
		})?;

		let (rolled_back_text, oks, commands) = peer.strict.apply(&back.patch, &model_text);
		if oks.iter().any(|ok| !ok) {
			return Err(TextSyncError::RollbackFailed {
				reason: format!(
					"inverse patch committed at {:?} did not strict-apply during rollback",
					back.timestamp
				),
			});
		}
		model_text = rolled_back_text;
		rollback_commands.extend(commands);
		pop_stack.push((back, fwd));

		let (candidate_text, candidate_oks, _commands) = peer.strict.apply(&patch, &model_text);
		if candidate_oks.iter().all(|ok| *ok) {
			model_text = candidate_text;
			break model_text.clone();
		}
	};

	// Rollforward: loose-apply the popped local edits back on top, tolerating
	// the context drift the concurrent remote insertion introduced.
	for (_, fwd) in pop_stack.iter().rev() {
		let (rolled_forward_text, oks, _commands) = peer.loose.apply(&fwd.patch, &model_text);
		if oks.iter().any(|ok| !ok) {
			tracing::warn!(
				peer = %peer.name,
				timestamp = ?fwd.timestamp,
				"loose rollforward left a hunk unmatched"
			);
		}
		model_text = rolled_forward_text;
	}

	let recovered_patch = peer.strict.make_patch(&d1d3, &model_text);
	let (_, _, rollforward_commands) = peer.strict.apply(&recovered_patch, &d1d3);

	let forward = peer.strict.make_patch(&original_text, &model_text);
	let backward = peer.strict.make_patch(&model_text, &original_text);
	peer.current_text = Some(model_text.clone());
	peer.history.commit(
		HistoryEntry {
			patch: forward,
			timestamp: ts,
			is_owner_local: false,
		},
		HistoryEntry {
			patch: backward,
			timestamp: ts,
			is_owner_local: false,
		},
	);

	Ok(RecoveryOutcome {
		rollforward_commands,
		rollback_commands,
		d1d3,
	})
}
