//! End-to-end sanity over real TCP sockets: two participants converging
//! through a coordinator, and a coordinator rejecting a stale submission.
//!
//! The bulk of the convergence engine's behavior is exercised in-process in
//! `textsync-core`'s own tests; this file only checks that framing and
//! dispatch actually work end to end across a loopback connection.

use std::time::Duration;

use textsync_core::{ClockSource, CoordinatorLink, PeerRole};
use textsync_session::{connect, listen, EngineHandle};

async fn settle() {
	tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn two_participants_converge_through_a_real_coordinator() {
	let coordinator = EngineHandle::spawn("coordinator", PeerRole::coordinator(), ClockSource::local());
	coordinator.set_local_text(String::new()).await;
	let bound = listen("127.0.0.1:0", coordinator.clone()).await.unwrap();
	let addr = bound.local_addr();

	// Participant A connects, seeds from GetText, types "cat".
	let a = EngineHandle::spawn("a", PeerRole::participant(), ClockSource::local());
	let link_a = connect(addr, a.clone()).await.unwrap();
	let seed = link_a.get_text().await.unwrap();
	assert_eq!(seed, "");
	a.set_local_text(seed).await;
	a.set_upstream(Some(link_a)).await;

	a.local_text_changed("cat".to_string()).await.unwrap();
	settle().await;
	assert_eq!(coordinator.local_text().await.as_deref(), Some("cat"));

	// Participant B connects after the fact, seeds "cat".
	let b = EngineHandle::spawn("b", PeerRole::participant(), ClockSource::local());
	let link_b = connect(addr, b.clone()).await.unwrap();
	let seed_b = link_b.get_text().await.unwrap();
	assert_eq!(seed_b, "cat");
	b.set_local_text(seed_b).await;
	b.set_upstream(Some(link_b)).await;

	// B types "cats"; after fanout, A converges too.
	b.local_text_changed("cats".to_string()).await.unwrap();
	settle().await;
	assert_eq!(coordinator.local_text().await.as_deref(), Some("cats"));
	assert_eq!(a.local_text().await.as_deref(), Some("cats"));
	assert_eq!(b.local_text().await.as_deref(), Some("cats"));
}

#[tokio::test]
async fn coordinator_rejects_a_patch_against_stale_context() {
	let coordinator = EngineHandle::spawn("coordinator", PeerRole::coordinator(), ClockSource::local());
	coordinator.set_local_text("A".to_string()).await;
	let bound = listen("127.0.0.1:0", coordinator.clone()).await.unwrap();

	let a = EngineHandle::spawn("a", PeerRole::participant(), ClockSource::local());
	let link_a = connect(bound.local_addr(), a.clone()).await.unwrap();
	a.set_local_text("B".to_string()).await;
	a.set_upstream(Some(link_a)).await;

	// A's view ("B") diverges from the coordinator's ("A"); its patch context
	// won't match and the coordinator must reject it without mutating state.
	let outcome = a.local_text_changed("B!".to_string()).await.unwrap();
	settle().await;
	assert!(matches!(outcome, textsync_core::ApplyOutcome::Rejected));
	assert_eq!(coordinator.local_text().await.as_deref(), Some("A"));
}
