//! The single-task actor that owns one peer's [`PeerAlgorithm`].
//!
//! A struct holding the receiving half of an `mpsc` channel and the state it
//! serializes access to, paired with a cheaply-`Clone`able [`EngineHandle`]
//! wrapping the sending half.
//! Every accepted or dialed connection talks to the engine through the
//! handle, so `PeerAlgorithm` is touched from exactly one task regardless of
//! how many TCP connections are live — the single-threaded-scheduler model
//! the convergence algorithm assumes, reproduced here with an actor instead
//! of a literal single-threaded runtime.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use textsync_core::{
	ApplyOutcome, ClockSource, CoordinatorLink, ParticipantFanout, PeerAlgorithm, PeerId, PeerRole,
	TextSyncError, Timestamp,
};
use textsync_proto::{ErrorCode, RequestPayload, ResponsePayload, WireHistoryEntry};

/// Commands the engine actor processes, one at a time, in arrival order.
enum EngineCmd {
	LocalTextChanged {
		next_text: String,
		reply: oneshot::Sender<Result<ApplyOutcome, TextSyncError>>,
	},
	SetLocalText {
		text: String,
	},
	LocalText {
		reply: oneshot::Sender<Option<String>>,
	},
	Request {
		payload: RequestPayload,
		reply: oneshot::Sender<(Option<ResponsePayload>, Option<ErrorCode>)>,
	},
	PeerConnected {
		id: PeerId,
		fanout: Arc<dyn ParticipantFanout>,
	},
	PeerDisconnected {
		id: PeerId,
	},
	SetUpstream {
		upstream: Option<Arc<dyn CoordinatorLink>>,
	},
}

/// Cheaply-cloneable handle to a running [`PeerEngine`] actor.
///
/// Every method sends one command and, where a reply matters, awaits it —
/// the same request/await-reply shape throughout.
#[derive(Clone)]
pub struct EngineHandle {
	tx: mpsc::Sender<EngineCmd>,
}

impl EngineHandle {
	/// Spawns a new [`PeerEngine`] actor and returns a handle to it.
	#[must_use]
	pub fn spawn(name: impl Into<String>, role: PeerRole, clock: ClockSource) -> Self {
		let (tx, rx) = mpsc::channel(256);
		let engine = PeerEngine {
			peer: PeerAlgorithm::new(name, role, clock),
			rx,
		};
		tokio::spawn(engine.run());
		Self { tx }
	}

	/// `onLocalTextChanged`, routed through the actor.
	pub async fn local_text_changed(
		&self,
		next_text: String,
	) -> Result<ApplyOutcome, TextSyncError> {
		let (reply, rx) = oneshot::channel();
		self.send(EngineCmd::LocalTextChanged { next_text, reply }).await;
		rx.await
			.unwrap_or_else(|_| Err(TextSyncError::UnknownCoordinatorError("engine dropped".into())))
	}

	/// Replaces `currentText` with no history side effect — used to seed a
	/// Participant from a `GetText` response, or a Coordinator from its
	/// configuration at startup.
	pub async fn set_local_text(&self, text: String) {
		self.send(EngineCmd::SetLocalText { text }).await;
	}

	/// The current text, if one has been set. Mainly for tests/diagnostics.
	pub async fn local_text(&self) -> Option<String> {
		let (reply, rx) = oneshot::channel();
		self.send(EngineCmd::LocalText { reply }).await;
		rx.await.unwrap_or(None)
	}

	/// Dispatches one inbound wire request to the matching
	/// `PeerAlgorithm`/Coordinator method, returning the payload/error pair a
	/// [`textsync_proto::Response`] is built from.
	pub(crate) async fn handle_request(
		&self,
		payload: RequestPayload,
	) -> (Option<ResponsePayload>, Option<ErrorCode>) {
		let (reply, rx) = oneshot::channel();
		self.send(EngineCmd::Request { payload, reply }).await;
		rx.await.unwrap_or((None, Some(ErrorCode::EncodingUnsupported)))
	}

	/// Registers an inbound Participant connection (Coordinator only).
	pub async fn peer_connected(&self, id: PeerId, fanout: Arc<dyn ParticipantFanout>) {
		self.send(EngineCmd::PeerConnected { id, fanout }).await;
	}

	/// Removes a disconnected Participant (Coordinator only); idempotent.
	pub async fn peer_disconnected(&self, id: PeerId) {
		self.send(EngineCmd::PeerDisconnected { id }).await;
	}

	/// Sets (or, on disconnect, clears) the upstream Coordinator link
	/// (Participant only).
	pub async fn set_upstream(&self, upstream: Option<Arc<dyn CoordinatorLink>>) {
		self.send(EngineCmd::SetUpstream { upstream }).await;
	}

	/// Convenience for the connection-lost path: clears the upstream link.
	/// A dropped connection is logged and treated as
	/// `unknownCoordinatorError`, never a local rollback.
	pub async fn upstream_lost(&self) {
		warn!("upstream connection lost");
		self.set_upstream(None).await;
	}

	async fn send(&self, cmd: EngineCmd) {
		let _ = self.tx.send(cmd).await;
	}
}

/// Inbound dispatch shaped as a [`tower_service::Service`]: the connection
/// layer calls through this trait rather than `EngineHandle::handle_request`
/// directly, so swapping in middleware (rate limiting, auth) later is a
/// `tower::Layer`, not a rewrite of the read loop.
impl tower_service::Service<textsync_proto::Request> for EngineHandle {
	type Response = textsync_proto::Response;
	type Error = std::convert::Infallible;
	type Future = std::pin::Pin<
		Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
	>;

	fn poll_ready(
		&mut self,
		_cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Result<(), Self::Error>> {
		std::task::Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: textsync_proto::Request) -> Self::Future {
		let engine = self.clone();
		Box::pin(async move {
			let (payload, error) = engine.handle_request(req.payload).await;
			Ok(textsync_proto::Response {
				request_id: req.id,
				payload,
				error,
			})
		})
	}
}

struct PeerEngine {
	peer: PeerAlgorithm,
	rx: mpsc::Receiver<EngineCmd>,
}

impl PeerEngine {
	async fn run(mut self) {
		while let Some(cmd) = self.rx.recv().await {
			match cmd {
				EngineCmd::LocalTextChanged { next_text, reply } => {
					let result = self.peer.on_local_text_changed(next_text).await;
					let _ = reply.send(result);
				}
				EngineCmd::SetLocalText { text } => {
					self.peer.set_local_text(text);
				}
				EngineCmd::LocalText { reply } => {
					let _ = reply.send(self.peer.local_text().map(str::to_owned));
				}
				EngineCmd::Request { payload, reply } => {
					let outcome = self.handle_request(payload).await;
					let _ = reply.send(outcome);
				}
				EngineCmd::PeerConnected { id, fanout } => {
					self.peer.add_peer(id, fanout);
				}
				EngineCmd::PeerDisconnected { id } => {
					self.peer.remove_peer(id);
				}
				EngineCmd::SetUpstream { upstream } => {
					self.peer.set_upstream(upstream);
				}
			}
		}
	}

	async fn handle_request(
		&mut self,
		payload: RequestPayload,
	) -> (Option<ResponsePayload>, Option<ErrorCode>) {
		match payload {
			RequestPayload::GetText => match self.peer.remote_get_text() {
				Ok(text) => (Some(ResponsePayload::Text { text }), None),
				Err(TextSyncError::NoTextAvailable) => (None, Some(ErrorCode::NoTextAvailable)),
				Err(_) => (None, Some(ErrorCode::EncodingUnsupported)),
			},
			RequestPayload::TryApplyPatch { patch, timestamp } => {
				if !self.peer.is_coordinator() {
					warn!("received TryApplyPatch on a non-coordinator peer; rejecting");
					return (None, Some(ErrorCode::PatchNotApplicable));
				}
				match self
					.peer
					.coordinator_try_apply_patch(patch, Timestamp(timestamp))
				{
					Ok(()) => (Some(ResponsePayload::Applied { succeed: true }), None),
					Err(TextSyncError::PatchNotApplicable { .. }) => {
						(None, Some(ErrorCode::PatchNotApplicable))
					}
					Err(_) => (None, Some(ErrorCode::EncodingUnsupported)),
				}
			}
			RequestPayload::ApplyPatch { patch, timestamp } => {
				if self.peer.is_coordinator() {
					warn!("received ApplyPatch on the coordinator; rejecting");
					return (Some(ResponsePayload::Applied { succeed: false }), None);
				}
				match self.peer.on_force_patch(&patch, Timestamp(timestamp)).await {
					Ok(_commands) => (Some(ResponsePayload::Applied { succeed: true }), None),
					Err(e) => {
						warn!(error = %e, "force patch could not be converged");
						(Some(ResponsePayload::Applied { succeed: false }), None)
					}
				}
			}
			RequestPayload::Catchup { since } => {
				let entries: Vec<WireHistoryEntry> = self
					.peer
					.entries_since(Timestamp(since))
					.into_iter()
					.map(|e| WireHistoryEntry {
						patch: e.patch.to_text(),
						timestamp: e.timestamp.0,
						is_owner: e.is_owner_local,
					})
					.collect();
				info!(count = entries.len(), "catchup served");
				(Some(ResponsePayload::CatchupEntries(entries)), None)
			}
		}
	}
}
