//! Multi-peer convergence scenarios, wired with in-process fakes rather than
//! a real transport. `textsync-session`'s own tests cover the same
//! ground end to end over loopback TCP for the scenarios that most exercise
//! framing and dispatch (S2, S5); the scenarios here only need
//! `PeerAlgorithm` and a pair of trait objects wired directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use textsync_core::{
	ClockSource, CoordinatorLink, ParticipantFanout, PeerAlgorithm, PeerId, PeerRole, TextSyncError,
	Timestamp,
};
use tokio::sync::Mutex;

/// A `CoordinatorLink` backed by an in-process `PeerAlgorithm` rather than a
/// socket. Lets a participant's `onLocalTextChanged` drive a real
/// coordinator state machine synchronously within one test process.
struct FakeUpstream {
	coordinator: Arc<Mutex<PeerAlgorithm>>,
}

#[async_trait]
impl CoordinatorLink for FakeUpstream {
	async fn get_text(&self) -> Result<String, TextSyncError> {
		self.coordinator.lock().await.remote_get_text()
	}

	async fn try_apply_patch(&self, patch: String, ts: Timestamp) -> Result<bool, TextSyncError> {
		match self.coordinator.lock().await.coordinator_try_apply_patch(patch, ts) {
			Ok(()) => Ok(true),
			Err(e) => Err(e),
		}
	}
}

/// A `ParticipantFanout` that force-pushes onto another in-process
/// `PeerAlgorithm` on a spawned task, matching the fire-and-forget contract
/// real transport fanout has.
struct FakeFanout {
	participant: Arc<Mutex<PeerAlgorithm>>,
}

impl ParticipantFanout for FakeFanout {
	fn apply_patch(&self, patch: &str, ts: Timestamp) {
		let participant = self.participant.clone();
		let patch = patch.to_string();
		tokio::spawn(async move {
			let _ = participant.lock().await.on_force_patch(&patch, ts).await;
		});
	}
}

async fn settle() {
	tokio::time::sleep(Duration::from_millis(5)).await;
}

/// S1: an edit identical to the current text is a no-op; nothing is sent.
#[tokio::test]
async fn s1_identical_edit_is_a_no_op() {
	let mut participant = PeerAlgorithm::new("a", PeerRole::participant(), ClockSource::local());
	participant.set_local_text("hello".to_string());

	let outcome = participant.on_local_text_changed("hello".to_string()).await.unwrap();
	assert_eq!(outcome, textsync_core::ApplyOutcome::NoWorkDone);
	assert_eq!(participant.local_text(), Some("hello"));
}

/// S3: both peers seeded at `"the quick brown fox"`. A changes the head to
/// `"THE quick brown fox"`; B, concurrently and not yet sent, changes the
/// tail to `"the quick brown FOX"`. A's edit reaches the coordinator first
/// and fans out to B. The two edited regions sit well past each other's
/// context margin, so the force-patch strict-applies directly against B's
/// already-mutated text — both edits land without recovery ever running,
/// the common case a star topology is built for. (Edits close enough for
/// their context windows to overlap go through rollback/rollforward
/// instead; see S4.)
#[tokio::test]
async fn s3_disjoint_concurrent_edits_converge_without_recovery() {
	let base = "the quick brown fox";

	let coordinator = Arc::new(Mutex::new(PeerAlgorithm::new(
		"coordinator",
		PeerRole::coordinator(),
		ClockSource::local(),
	)));
	coordinator.lock().await.set_local_text(base.to_string());

	let b = Arc::new(Mutex::new(PeerAlgorithm::new(
		"b",
		PeerRole::participant(),
		ClockSource::local(),
	)));
	b.lock().await.set_local_text(base.to_string());

	coordinator
		.lock()
		.await
		.add_peer(PeerId(2), Arc::new(FakeFanout { participant: b.clone() }));

	let mut a = PeerAlgorithm::new("a", PeerRole::participant(), ClockSource::local());
	a.set_local_text(base.to_string());
	a.set_upstream(Some(Arc::new(FakeUpstream { coordinator: coordinator.clone() })));

	// B edits its own tail locally first, but hasn't sent yet (no upstream
	// attached yet).
	b.lock()
		.await
		.on_local_text_changed("the quick brown FOX".to_string())
		.await
		.unwrap();

	// A's edit to the head reaches the coordinator first and fans out to B.
	let outcome = a.on_local_text_changed("THE quick brown fox".to_string()).await.unwrap();
	assert_eq!(outcome, textsync_core::ApplyOutcome::Sent);
	settle().await;

	assert_eq!(coordinator.lock().await.local_text(), Some("THE quick brown fox"));
	assert_eq!(b.lock().await.local_text(), Some("THE quick brown FOX"));
}

/// S4: a force-patch whose context has drifted under a participant's own
/// unsent local edit is resolved by rollback/rollforward rather than
/// rejected outright — both edits land in the recovered text.
#[tokio::test]
async fn s4_recovery_preserves_an_unsent_local_edit() {
	let mut b = PeerAlgorithm::new("b", PeerRole::participant(), ClockSource::local());
	b.set_local_text("hello".to_string());

	// Committed locally, never sent (no upstream attached).
	b.on_local_text_changed("hello?".to_string()).await.unwrap();

	let strict = textsync_core::DiffEngine::strict();
	let incoming = strict.make_patch("hello", "hello!");

	let commands = b
		.on_force_patch(&incoming.to_text(), ClockSource::local().now())
		.await
		.unwrap();

	assert_eq!(b.local_text(), Some("hello?!"));
	assert!(!commands.is_empty());
}

/// S6: a force-patch that can't be reconciled against an empty history
/// (nothing to roll back) falls back to a full resync via `GetText`.
#[tokio::test]
async fn s6_history_exhaustion_falls_back_to_resync() {
	let coordinator = Arc::new(Mutex::new(PeerAlgorithm::new(
		"coordinator",
		PeerRole::coordinator(),
		ClockSource::local(),
	)));
	coordinator.lock().await.set_local_text("hello world".to_string());

	let mut b = PeerAlgorithm::new("b", PeerRole::participant(), ClockSource::local());
	b.set_local_text("goodbye".to_string());
	b.set_upstream(Some(Arc::new(FakeUpstream { coordinator: coordinator.clone() })));

	let strict = textsync_core::DiffEngine::strict();
	let unrelated = strict.make_patch("hello world", "hello there world");

	// b's history is empty: there's nothing to pop, so rollback fails
	// immediately and on_force_patch must fall back to retry().
	b.on_force_patch(&unrelated.to_text(), ClockSource::local().now())
		.await
		.unwrap();

	assert_eq!(b.local_text(), Some("hello world"));
}
