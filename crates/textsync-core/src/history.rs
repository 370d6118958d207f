//! Append-only per-peer patch log with a parallel inverse log.

use crate::clock::Timestamp;
use crate::diff::Patch;
use crate::error::TextSyncError;

/// One committed patch: who originated it, when, and the patch itself.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
	/// The patch, forward or backward depending on which log it lives in.
	pub patch: Patch,
	/// The commit timestamp (shared between the forward/backward pair).
	pub timestamp: Timestamp,
	/// `true` when this peer originated the edit; `false` when it arrived
	/// from the network.
	pub is_owner_local: bool,
}

/// Two parallel ordered sequences, `forward[]` and `backward[]`.
///
/// Invariant: `len(forward) == len(backward)` at all times, and
/// `backward[i]` is the strict inverse of `forward[i]` with respect to the
/// text that existed immediately before `forward[i]` committed. Enforced
/// structurally: the only way to mutate either sequence is `commit`
/// (pushes both) or `pop_latest`/`clean` (removes from both).
///
/// Not touched from more than one task — the single-threaded scheduler
/// model means no internal locking is needed.
#[derive(Debug, Default)]
pub struct HistoryLine {
	forward: Vec<HistoryEntry>,
	backward: Vec<HistoryEntry>,
}

impl HistoryLine {
	/// An empty history.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of committed entries.
	#[must_use]
	pub fn len(&self) -> usize {
		debug_assert_eq!(self.forward.len(), self.backward.len());
		self.forward.len()
	}

	/// Whether the history is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Appends a `(forward, backward)` pair atomically.
	pub fn commit(&mut self, forward: HistoryEntry, backward: HistoryEntry) {
		self.forward.push(forward);
		self.backward.push(backward);
	}

	/// Removes and returns the newest `(backward, forward)` pair.
	///
	/// Fails with [`TextSyncError::HistoryUnderflow`] when the history is
	/// empty.
	pub fn pop_latest(&mut self) -> Result<(HistoryEntry, HistoryEntry), TextSyncError> {
		let forward = self.forward.pop().ok_or(TextSyncError::HistoryUnderflow)?;
		let backward = self
			.backward
			.pop()
			.expect("forward/backward length invariant violated");
		Ok((backward, forward))
	}

	/// Empties both sequences. Called at (re)initialization or after a
	/// `retry()` resync.
	pub fn clean(&mut self) {
		self.forward.clear();
		self.backward.clear();
	}

	/// Forward entries with `timestamp > ts`, oldest first.
	///
	/// Backs the optional catch-up command ; not a stub here
	/// since it is a trivial filter over already-held data.
	#[must_use]
	pub fn entries_since(&self, ts: Timestamp) -> Vec<HistoryEntry> {
		self.forward
			.iter()
			.filter(|e| e.timestamp.is_after(ts))
			.cloned()
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::diff::DiffEngine;

	fn entry(text_len: usize, owner: bool) -> HistoryEntry {
		let engine = DiffEngine::strict();
		HistoryEntry {
			patch: engine.make_patch("a", &"a".repeat(text_len + 1)),
			timestamp: Timestamp(text_len as f64),
			is_owner_local: owner,
		}
	}

	#[test]
	fn commit_keeps_forward_and_backward_in_lock_step() {
		let mut history = HistoryLine::new();
		history.commit(entry(1, true), entry(1, true));
		history.commit(entry(2, false), entry(2, false));
		assert_eq!(history.len(), 2);
	}

	#[test]
	fn pop_latest_underflows_on_an_empty_history() {
		let mut history = HistoryLine::new();
		assert!(matches!(
			history.pop_latest(),
			Err(TextSyncError::HistoryUnderflow)
		));
	}

	#[test]
	fn entries_since_is_exclusive_and_ordered() {
		let mut history = HistoryLine::new();
		history.commit(entry(1, true), entry(1, true));
		history.commit(entry(2, true), entry(2, true));
		history.commit(entry(3, true), entry(3, true));

		let since = history.entries_since(Timestamp(1.0));
		assert_eq!(since.len(), 2);
		assert_eq!(since[0].timestamp.0, 2.0);
		assert_eq!(since[1].timestamp.0, 3.0);
	}

	#[test]
	fn clean_empties_both_sequences() {
		let mut history = HistoryLine::new();
		history.commit(entry(1, true), entry(1, true));
		history.clean();
		assert!(history.is_empty());
	}
}
