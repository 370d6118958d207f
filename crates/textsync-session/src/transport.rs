//! Per-connection framing and the bidirectional request/response link.
//!
//! Each TCP connection carries [`textsync_proto::Frame`]s in both
//! directions: a Participant's upstream connection sends `GetText`/
//! `TryApplyPatch` requests and *receives* force-pushed `ApplyPatch`
//! requests on the same socket. [`PeerLink`] is therefore symmetric — it is
//! the type both the Coordinator's per-participant fanout target and the
//! Participant's upstream handle are built from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};

use tower_service::Service;

use textsync_core::{CoordinatorLink, ParticipantFanout, TextSyncError, Timestamp};
use textsync_proto::{
	is_disconnect, read_frame, write_frame, ErrorCode, Frame, Request, RequestId, RequestPayload,
	Response, ResponsePayload,
};

use crate::engine::EngineHandle;

type PendingTable = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Response>>>>;

/// One end of a connection's bidirectional request/response traffic.
///
/// Implements both [`CoordinatorLink`] (outbound calls a Participant makes
/// of its Coordinator) and [`ParticipantFanout`] (outbound fire-and-forget
/// pushes a Coordinator makes toward a Participant) — whichever side holds
/// it uses only the half its role calls for.
pub struct PeerLink {
	write_tx: mpsc::UnboundedSender<Frame>,
	pending: PendingTable,
	next_id: AtomicU64,
}

impl PeerLink {
	fn next_request_id(&self) -> RequestId {
		RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
	}

	/// Sends `payload` as a request and awaits the matching response.
	async fn call(&self, payload: RequestPayload) -> Result<ResponsePayload, TextSyncError> {
		let id = self.next_request_id();
		let (reply, rx) = oneshot::channel();
		self.pending.lock().unwrap().insert(id, reply);

		if self.write_tx.send(Frame::Request(Request { id, payload })).is_err() {
			self.pending.lock().unwrap().remove(&id);
			return Err(TextSyncError::UnknownCoordinatorError(
				"connection closed before request could be sent".into(),
			));
		}

		let response = rx.await.map_err(|_| {
			TextSyncError::UnknownCoordinatorError("connection closed before response arrived".into())
		})?;
		decode(response)
	}

	/// Sends `payload` as a request without waiting on its response.
	///
	/// Used for the Coordinator's fanout, which is fire-and-forget: the
	/// Coordinator never waits on a participant's ack. The response frame
	/// still arrives eventually and is silently dropped by the reader loop,
	/// since no entry for its id is ever registered in `pending`.
	fn fire(&self, payload: RequestPayload) {
		let id = self.next_request_id();
		let _ = self.write_tx.send(Frame::Request(Request { id, payload }));
	}
}

fn decode(response: Response) -> Result<ResponsePayload, TextSyncError> {
	if let Some(code) = response.error {
		return Err(match code {
			ErrorCode::NoTextAvailable => TextSyncError::NoTextAvailable,
			ErrorCode::PatchNotApplicable => {
				TextSyncError::PatchNotApplicable { patch: String::new() }
			}
			ErrorCode::EncodingUnsupported => {
				TextSyncError::EncodingUnsupported("remote could not decode the patch".into())
			}
		});
	}
	response.payload.ok_or_else(|| {
		TextSyncError::UnknownCoordinatorError("response carried neither a payload nor an error".into())
	})
}

#[async_trait]
impl CoordinatorLink for PeerLink {
	async fn get_text(&self) -> Result<String, TextSyncError> {
		match self.call(RequestPayload::GetText).await? {
			ResponsePayload::Text { text } => Ok(text),
			_ => Err(TextSyncError::UnknownCoordinatorError(
				"unexpected response shape for GetText".into(),
			)),
		}
	}

	async fn try_apply_patch(&self, patch: String, ts: Timestamp) -> Result<bool, TextSyncError> {
		let result = self
			.call(RequestPayload::TryApplyPatch {
				patch: patch.clone(),
				timestamp: ts.0,
			})
			.await;
		match result {
			Ok(ResponsePayload::Applied { succeed }) => Ok(succeed),
			Ok(_) => Err(TextSyncError::UnknownCoordinatorError(
				"unexpected response shape for TryApplyPatch".into(),
			)),
			// Re-attach the patch text the wire error code drops, so callers
			// can log which submission the Coordinator rejected.
			Err(TextSyncError::PatchNotApplicable { .. }) => {
				Err(TextSyncError::PatchNotApplicable { patch })
			}
			Err(e) => Err(e),
		}
	}
}

impl ParticipantFanout for PeerLink {
	fn apply_patch(&self, patch: &str, ts: Timestamp) {
		self.fire(RequestPayload::ApplyPatch {
			patch: patch.to_string(),
			timestamp: ts.0,
		});
	}
}

/// Splits `stream`, spawns its reader and writer loops, and returns the
/// [`PeerLink`] through which the caller can issue outbound requests.
///
/// `on_disconnect` runs once, after the reader loop observes the connection
/// close (cleanly or otherwise) — the caller uses it to remove the peer from
/// whichever set tracks it (the Coordinator's `peers[]`, or a Participant's
/// single upstream slot).
pub fn spawn_connection(
	stream: tokio::net::TcpStream,
	engine: EngineHandle,
	on_disconnect: impl FnOnce() + Send + 'static,
) -> Arc<PeerLink> {
	let (read_half, write_half) = stream.into_split();
	let (write_tx, write_rx) = mpsc::unbounded_channel();
	let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

	tokio::spawn(writer_loop(write_half, write_rx));
	tokio::spawn(reader_loop(
		read_half,
		engine,
		write_tx.clone(),
		pending.clone(),
		on_disconnect,
	));

	Arc::new(PeerLink {
		write_tx,
		pending,
		next_id: AtomicU64::new(0),
	})
}

async fn writer_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Frame>) {
	while let Some(frame) = rx.recv().await {
		if let Err(e) = write_frame(&mut writer, &frame).await {
			tracing::error!(error = %e, "connection write failed");
			break;
		}
	}
}

async fn reader_loop(
	mut reader: OwnedReadHalf,
	engine: EngineHandle,
	write_tx: mpsc::UnboundedSender<Frame>,
	pending: PendingTable,
	on_disconnect: impl FnOnce() + Send + 'static,
) {
	loop {
		match read_frame(&mut reader).await {
			Ok(Frame::Request(req)) => {
				let write_tx = write_tx.clone();
				let mut engine = engine.clone();
				tokio::spawn(async move {
					let response = Service::call(&mut engine, req)
						.await
						.unwrap_or_else(|never| match never {});
					let _ = write_tx.send(Frame::Response(response));
				});
			}
			Ok(Frame::Response(resp)) => {
				if let Some(reply) = pending.lock().unwrap().remove(&resp.request_id) {
					let _ = reply.send(resp);
				}
			}
			Err(e) => {
				if !is_disconnect(&e) {
					tracing::error!(error = %e, "connection read failed");
				}
				break;
			}
		}
	}
	on_disconnect();
}
