//! The two connection endpoints: `listen` accepts inbound connections (many,
//! as Coordinator), `connect` dials out (Participant reaching its
//! Coordinator).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;

use textsync_core::PeerId;

use crate::engine::EngineHandle;
use crate::transport::{spawn_connection, PeerLink};

/// A listening socket, released on drop.
///
/// Makes the scoped server-port resource explicit rather than relying on
/// finalizer-style teardown: the accept loop's `JoinHandle` is aborted in
/// [`Drop`], so dropping a `BoundPort` guarantees the listener stops
/// accepting new connections.
pub struct BoundPort {
	addr: SocketAddr,
	accept_task: JoinHandle<()>,
}

impl BoundPort {
	/// The address the listener actually bound to (useful when `addr:0` was
	/// requested and the OS picked a port).
	#[must_use]
	pub fn local_addr(&self) -> SocketAddr {
		self.addr
	}
}

impl Drop for BoundPort {
	fn drop(&mut self) {
		self.accept_task.abort();
	}
}

/// Opens a server endpoint at `addr` and accepts connections indefinitely.
///
/// Each accepted connection is assigned a fresh [`PeerId`], registered with
/// `engine` via [`EngineHandle::peer_connected`], and deregistered on
/// disconnect. Binding a Coordinator this way naturally accepts many
/// connections; a Participant that also calls `listen` (uncommon, but not
/// forbidden) would simply never see more than the one Coordinator connect
/// to it.
pub async fn listen(addr: impl ToSocketAddrs, engine: EngineHandle) -> std::io::Result<BoundPort> {
	let listener = TcpListener::bind(addr).await?;
	let local_addr = listener.local_addr()?;
	let accept_task = tokio::spawn(accept_loop(listener, engine));
	Ok(BoundPort {
		addr: local_addr,
		accept_task,
	})
}

async fn accept_loop(listener: TcpListener, engine: EngineHandle) {
	let next_id = AtomicU64::new(0);
	loop {
		match listener.accept().await {
			Ok((stream, addr)) => {
				let id = PeerId(next_id.fetch_add(1, Ordering::Relaxed));
				tracing::info!(peer = id.0, %addr, "participant connected");
				let disconnect_engine = engine.clone();
				let link = spawn_connection(stream, engine.clone(), move || {
					tokio::spawn(async move {
						disconnect_engine.peer_disconnected(id).await;
					});
				});
				let fanout: Arc<dyn textsync_core::ParticipantFanout> = link;
				engine.peer_connected(id, fanout).await;
			}
			Err(e) => {
				tracing::error!(error = %e, "accept failed");
			}
		}
	}
}

/// Dials `addr` and returns the [`PeerLink`] through which the caller (a
/// Participant) issues `GetText`/`TryApplyPatch` and receives force-pushed
/// `ApplyPatch` requests on the same socket.
///
/// Does not itself call `GetText` or register the link as the engine's
/// upstream — the caller sequences that: reach the Coordinator first, then
/// issue `GetText` to seed `currentText`.
pub async fn connect(addr: impl ToSocketAddrs, engine: EngineHandle) -> std::io::Result<Arc<PeerLink>> {
	let stream = TcpStream::connect(addr).await?;
	let disconnect_engine = engine.clone();
	let link = spawn_connection(stream, engine, move || {
		tokio::spawn(async move {
			disconnect_engine.upstream_lost().await;
		});
	});
	Ok(link)
}
