//! Error kinds for the convergence engine.

use thiserror::Error;

/// All error kinds the convergence engine can raise.
///
/// Policy : local, recoverable errors are logged and swallowed by
/// the caller; history-corruption errors escalate to a resync; time-source
/// errors abort startup. This type only names the kind — callers decide
/// what to do with it, following the corpus convention of keeping
/// `#[error]` messages descriptive but side-effect free.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextSyncError {
	/// The Coordinator has not yet been given an initial text.
	#[error("no text available yet")]
	NoTextAvailable,

	/// The Coordinator rejected a `TryApplyPatch` submission.
	#[error("patch not applicable against the current text: {patch}")]
	PatchNotApplicable {
		/// The rejected patch's textual serialization.
		patch: String,
	},

	/// `HistoryLine::pop_latest` was called with nothing left to pop.
	#[error("history underflow: no entries left to pop")]
	HistoryUnderflow,

	/// Recovery exhausted the history without finding a clean match for the
	/// incoming force-patch.
	#[error("history inconsistent: {reason}")]
	HistoryInconsistent {
		/// Human-readable description of what failed.
		reason: String,
	},

	/// Strict-apply of a recorded inverse patch failed during rollback.
	///
	/// A degenerate case of [`TextSyncError::HistoryInconsistent`]; callers
	/// handle it identically.
	#[error("rollback failed while strict-applying an inverse patch: {reason}")]
	RollbackFailed {
		/// Human-readable description of the offending patch.
		reason: String,
	},

	/// Transport-level or otherwise unexpected failure talking to the
	/// Coordinator.
	#[error("unknown coordinator error: {0}")]
	UnknownCoordinatorError(String),

	/// The startup clock exchange failed; fatal at initialization.
	#[error("cannot reach time source: {0}")]
	CannotReachTimeSource(String),

	/// The bound listen port was queried before `listen()` completed.
	#[error("server port not initialized")]
	ServerPortNotInitialized,

	/// A patch's textual serialization could not be parsed.
	#[error("encoding unsupported: {0}")]
	EncodingUnsupported(String),
}
