//! Monotonically-comparable timestamps with remote-clock offset.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TextSyncError;

/// Seconds since the Unix epoch, matching the wire `timestamp: float` field.
///
/// History ordering is correctness-relevant , so this is a plain
/// comparable value rather than an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Timestamp(pub f64);

impl Timestamp {
	/// Returns whether `self` is strictly later than `other`.
	#[must_use]
	pub fn is_after(&self, other: Timestamp) -> bool {
		self.0 > other.0
	}
}

/// External collaborator boundary for clock-skew estimation.
///
/// A real implementation performs an NTP-style round trip against `peer`;
/// that exchange is explicitly out of scope for this crate. This trait is
/// the seam a caller plugs a real implementation into.
pub trait TimeSource: Send + Sync {
	/// Returns `server_time - local_time`, in seconds, for `peer`.
	fn offset_to(&self, peer: &str) -> Result<f64, TextSyncError>;
}

/// A `TimeSource` that always reports zero skew.
///
/// Used for single-process tests and as the default when no external time
/// service is configured, so the crate is runnable end-to-end without a
/// live NTP server.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
	fn offset_to(&self, _peer: &str) -> Result<f64, TextSyncError> {
		Ok(0.0)
	}
}

/// Supplies `now() = local_clock() + global_delta`.
#[derive(Debug, Clone, Copy)]
pub struct ClockSource {
	global_delta: f64,
}

impl ClockSource {
	/// Performs the startup clock exchange against `source` for `peer`.
	///
	/// Failure here is fatal at initialization (`CannotReachTimeSource`):
	/// timestamps feed history ordering, so a peer must not run with an
	/// unresolved clock.
	pub fn connect(source: &dyn TimeSource, peer: &str) -> Result<Self, TextSyncError> {
		let global_delta = source
			.offset_to(peer)
			.map_err(|e| TextSyncError::CannotReachTimeSource(e.to_string()))?;
		Ok(Self { global_delta })
	}

	/// A clock with no remote offset, for single-process use and tests.
	#[must_use]
	pub fn local() -> Self {
		Self { global_delta: 0.0 }
	}

	/// Returns the current, offset-adjusted timestamp.
	#[must_use]
	pub fn now(&self) -> Timestamp {
		let local = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs_f64())
			.unwrap_or(0.0);
		Timestamp(local + self.global_delta)
	}
}
