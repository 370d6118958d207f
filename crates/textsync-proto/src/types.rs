//! Wire types for the textsync peer protocol.
//!
//! A Participant holds exactly one connection to the Coordinator and speaks
//! request/response `Frame`s over it; the Coordinator speaks the same frames
//! over each of its inbound connections, plus force-pushes `ApplyPatch`
//! requests of its own down each connection.

use serde::{Deserialize, Serialize};

/// Unique identifier for an in-flight request on a single connection.
///
/// Scoped per-connection, not globally: the Coordinator and a Participant
/// each run their own counter over the same TCP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Classification of frames carried over the length-prefixed socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
	/// A request, in either direction: Participant->Coordinator for
	/// `GetText`/`TryApplyPatch`/`Catchup`, Coordinator->Participant for the
	/// force-applied `ApplyPatch`.
	Request(Request),
	/// The response to a previously received request.
	Response(Response),
}

/// A request envelope carrying a command-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Identifier echoed back in the matching [`Response`].
	pub id: RequestId,
	/// The command-specific payload.
	pub payload: RequestPayload,
}

/// The four named commands from the wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Fetch the current full text (Participant seeding its `currentText`,
	/// or resyncing after a `HistoryInconsistent` recovery failure).
	GetText,
	/// Submit a locally-computed patch for authoritative serialization.
	///
	/// Sent by a Participant to its Coordinator only.
	TryApplyPatch {
		/// Textual serialization of the patch (`DiffEngine::to_text`).
		patch: String,
		/// The submitter's clock reading at commit time.
		timestamp: f64,
	},
	/// Force-apply a patch that the Coordinator has already linearized.
	///
	/// Sent by the Coordinator to every other Participant.
	ApplyPatch {
		/// Textual serialization of the patch.
		patch: String,
		/// The Coordinator's clock reading at commit time.
		timestamp: f64,
	},
	/// Optional catch-up query: forward history entries since `since`.
	Catchup {
		/// Only entries with a later timestamp are returned.
		since: f64,
	},
}

/// A response envelope, either carrying a payload or a named error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// The request this responds to.
	pub request_id: RequestId,
	/// The payload on success.
	pub payload: Option<ResponsePayload>,
	/// The error on failure.
	pub error: Option<ErrorCode>,
}

/// Response payload variants, one per [`RequestPayload`] variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
	/// Reply to `GetText`.
	Text {
		/// The full current text.
		text: String,
	},
	/// Reply to `TryApplyPatch` or `ApplyPatch`.
	Applied {
		/// Whether the patch committed cleanly.
		succeed: bool,
	},
	/// Reply to `Catchup` — `HistoryLine::entries_since` backs it directly.
	CatchupEntries(Vec<WireHistoryEntry>),
}

/// A single forward-history entry as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHistoryEntry {
	/// Textual serialization of the patch.
	pub patch: String,
	/// The commit timestamp.
	pub timestamp: f64,
	/// Whether the entry originated locally at the peer serving the catch-up.
	pub is_owner: bool,
}

/// Named error kinds that can ride in a [`Response`].
///
/// A strict subset of `textsync_core::TextSyncError`: only the kinds that
/// are meaningful to a remote caller cross the wire. Connection loss and
/// other transport failures never reach this type — they surface as I/O
/// errors on the read/write loop instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
	/// `GetText` before the Coordinator has been seeded with an initial text.
	NoTextAvailable,
	/// `TryApplyPatch` rejected by the Coordinator (authoritative mismatch).
	PatchNotApplicable,
	/// The patch text could not be parsed back into hunks.
	EncodingUnsupported,
}
