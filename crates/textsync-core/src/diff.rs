//! Character-level diff/patch with configurable match strictness.
//!
//! Patches are context-anchored hunks, deliberately modeled after
//! `diff-match-patch`'s patch object rather than a CRDT operation list —
//! only the committed patch/apply path is ported, not the full
//! `diff_match_patch` surface. Hunk extraction here is a
//! common-prefix/common-suffix trim rather than a full Myers diff: the
//! editing model assumed here is one interactive edit region per
//! `onLocalTextChanged` call, which a single hunk always covers exactly;
//! `apply` nonetheless walks a `Vec<Hunk>` generically so a future
//! multi-region engine drops in without changing callers.

use std::fmt;

/// How forgiving `DiffEngine::apply` is about context drift.
///
/// `0.0` requires the hunk's recorded context to match exactly at its
/// recorded offset ("strict"); any value `> 0.0` additionally scans the
/// whole text for a matching context window ("loose"). Clamped to
/// `[0.0, 1.0]` at construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct MatchThreshold(f32);

impl MatchThreshold {
	/// Clamps `value` into `[0.0, 1.0]`.
	#[must_use]
	pub fn new(value: f32) -> Self {
		Self(value.clamp(0.0, 1.0))
	}

	/// `0.0` — exact match required.
	#[must_use]
	pub fn strict() -> Self {
		Self(0.0)
	}

	/// `1.0` — best-effort fuzzy.
	#[must_use]
	pub fn loose() -> Self {
		Self(1.0)
	}

	/// The underlying clamped value.
	#[must_use]
	pub fn get(self) -> f32 {
		self.0
	}

	fn is_strict(self) -> bool {
		self.0 <= 0.0
	}
}

/// One context-anchored character-level edit.
///
/// `before_context`/`after_context` anchor the edit against drift;
/// `start_in_old`/`old_len` name the char-offset range being replaced by
/// `replacement` in the *old* text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
	/// Up to `context_len` chars immediately preceding the edit.
	pub before_context: String,
	/// Up to `context_len` chars immediately following the edit.
	pub after_context: String,
	/// Char offset (in the pre-patch text) where the replaced region starts.
	pub start_in_old: usize,
	/// Length, in chars, of the region being replaced.
	pub old_len: usize,
	/// The text that replaces the old region.
	pub replacement: String,
}

/// An opaque, serializable sequence of [`Hunk`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Patch(pub Vec<Hunk>);

impl Patch {
	/// A patch with no hunks — the empty-diff short circuit.
	#[must_use]
	pub fn empty() -> Self {
		Self(Vec::new())
	}

	/// Whether this patch changes anything.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Stable textual serialization. Round-trips through [`Patch::from_text`]
	/// exactly (not merely operationally), satisfying testable property 3.
	#[must_use]
	pub fn to_text(&self) -> String {
		let mut out = String::new();
		for hunk in &self.0 {
			out.push_str(&format!("H {} {}\n", hunk.start_in_old, hunk.old_len));
			out.push_str("B ");
			out.push_str(&escape(&hunk.before_context));
			out.push('\n');
			out.push_str("A ");
			out.push_str(&escape(&hunk.after_context));
			out.push('\n');
			out.push_str("R ");
			out.push_str(&escape(&hunk.replacement));
			out.push('\n');
		}
		out
	}

	/// Parses the format written by [`Patch::to_text`].
	///
	/// Malformed lines are skipped rather than failing outright — the wire
	/// layer surfaces `EncodingUnsupported` separately when the result comes
	/// back empty but the input wasn't.
	#[must_use]
	pub fn from_text(text: &str) -> Self {
		let mut hunks = Vec::new();
		let mut lines = text.lines();
		while let Some(header) = lines.next() {
			let Some(rest) = header.strip_prefix("H ") else {
				continue;
			};
			let mut nums = rest.split_whitespace();
			let (Some(start_in_old), Some(old_len)) = (
				nums.next().and_then(|n| n.parse::<usize>().ok()),
				nums.next().and_then(|n| n.parse::<usize>().ok()),
			) else {
				continue;
			};
			let before_context = lines
				.next()
				.and_then(|l| l.strip_prefix("B "))
				.map(unescape)
				.unwrap_or_default();
			let after_context = lines
				.next()
				.and_then(|l| l.strip_prefix("A "))
				.map(unescape)
				.unwrap_or_default();
			let replacement = lines
				.next()
				.and_then(|l| l.strip_prefix("R "))
				.map(unescape)
				.unwrap_or_default();
			hunks.push(Hunk {
				before_context,
				after_context,
				start_in_old,
				old_len,
				replacement,
			});
		}
		Self(hunks)
	}
}

impl fmt::Display for Patch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_text())
	}
}

fn escape(s: &str) -> String {
	s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('n') => out.push('\n'),
			Some('\\') => out.push('\\'),
			Some(other) => {
				out.push('\\');
				out.push(other);
			}
			None => out.push('\\'),
		}
	}
	out
}

/// The concrete insert/delete operations an [`DiffEngine::apply`] performed.
///
/// Consumed by the external editor integration to replay the edit on its
/// view without re-diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
	/// Insert `text` at char offset `at`.
	Insert {
		/// Char offset in the text *as of this command*.
		at: usize,
		/// The inserted text.
		text: String,
	},
	/// Delete `len` chars starting at char offset `at`.
	Delete {
		/// Char offset in the text *as of this command*.
		at: usize,
		/// Number of chars removed.
		len: usize,
	},
}

/// `diff-match-patch`'s own default patch margin (`Patch_Margin`).
const DEFAULT_CONTEXT_LEN: usize = 4;

/// Computes and applies patches at a fixed [`MatchThreshold`].
///
/// Two instances are held per peer: `strict` (`MatchThreshold::strict`) and
/// `loose` (`MatchThreshold::loose`). Both are stateless after
/// construction and safely `Clone`/shared across peers in the same
/// process.
#[derive(Debug, Clone)]
pub struct DiffEngine {
	threshold: MatchThreshold,
	context_len: usize,
}

impl DiffEngine {
	/// Builds an engine at the given threshold with the default context
	/// window.
	#[must_use]
	pub fn new(threshold: MatchThreshold) -> Self {
		Self {
			threshold,
			context_len: DEFAULT_CONTEXT_LEN,
		}
	}

	/// Exact-match-required engine (`MatchThreshold = 0.0`).
	#[must_use]
	pub fn strict() -> Self {
		Self::new(MatchThreshold::strict())
	}

	/// Best-effort fuzzy engine (`MatchThreshold = 1.0`).
	#[must_use]
	pub fn loose() -> Self {
		Self::new(MatchThreshold::loose())
	}

	/// The configured threshold.
	#[must_use]
	pub fn threshold(&self) -> MatchThreshold {
		self.threshold
	}

	/// Computes the patch that transforms `old` into `new`.
	///
	/// Returns [`Patch::empty`] when the texts are identical.
	#[must_use]
	pub fn make_patch(&self, old: &str, new: &str) -> Patch {
		let old_chars: Vec<char> = old.chars().collect();
		let new_chars: Vec<char> = new.chars().collect();

		if old_chars == new_chars {
			return Patch::empty();
		}

		let max_common = old_chars.len().min(new_chars.len());
		let mut prefix = 0;
		while prefix < max_common && old_chars[prefix] == new_chars[prefix] {
			prefix += 1;
		}
		let mut suffix = 0;
		while suffix < max_common - prefix
			&& old_chars[old_chars.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
		{
			suffix += 1;
		}

		let old_mid_end = old_chars.len() - suffix;
		let new_mid_end = new_chars.len() - suffix;

		let before_len = self.context_len.min(prefix);
		let after_len = self.context_len.min(suffix);

		let before_context: String = old_chars[prefix - before_len..prefix].iter().collect();
		let after_context: String = old_chars[old_mid_end..old_mid_end + after_len]
			.iter()
			.collect();
		let replacement: String = new_chars[prefix..new_mid_end].iter().collect();

		Patch(vec![Hunk {
			before_context,
			after_context,
			start_in_old: prefix,
			old_len: old_mid_end - prefix,
			replacement,
		}])
	}

	/// Applies `patch` to `text`.
	///
	/// Never fails: returns the (possibly unchanged) resulting text, one
	/// `bool` per hunk indicating whether it matched cleanly, and the
	/// derived [`EditorCommand`]s for the hunks that did apply. Presence of
	/// any `false` in the per-hunk list means the patch did not match
	/// cleanly overall.
	#[must_use]
	pub fn apply(&self, patch: &Patch, text: &str) -> (String, Vec<bool>, Vec<EditorCommand>) {
		let mut chars: Vec<char> = text.chars().collect();
		let mut oks = vec![false; patch.0.len()];
		let mut commands_by_hunk: Vec<Vec<EditorCommand>> = vec![Vec::new(); patch.0.len()];

		let mut order: Vec<usize> = (0..patch.0.len()).collect();
		order.sort_by_key(|&i| patch.0[i].start_in_old);

		// Apply back-to-front so earlier hunks' offsets stay valid as later
		// (in text order) hunks shift the buffer length.
		for &idx in order.iter().rev() {
			let hunk = &patch.0[idx];
			let Some(loc) = self.locate(&chars, hunk) else {
				continue;
			};
			let before_len = hunk.before_context.chars().count();
			let start = loc + before_len;
			let replacement: Vec<char> = hunk.replacement.chars().collect();

			let mut commands = Vec::new();
			if hunk.old_len > 0 {
				commands.push(EditorCommand::Delete {
					at: start,
					len: hunk.old_len,
				});
			}
			if !replacement.is_empty() {
				commands.push(EditorCommand::Insert {
					at: start,
					text: hunk.replacement.clone(),
				});
			}

			chars.splice(start..start + hunk.old_len, replacement);
			oks[idx] = true;
			commands_by_hunk[idx] = commands;
		}

		let commands = commands_by_hunk.into_iter().flatten().collect();
		(chars.into_iter().collect(), oks, commands)
	}

	/// Finds the char offset where `hunk.before_context` should begin.
	///
	/// Tries the recorded location first; a strict engine accepts only
	/// that. A loose engine additionally scans the whole text and prefers
	/// the candidate closest to the recorded location — context drift from
	/// concurrent edits is expected during rollforward.
	fn locate(&self, chars: &[char], hunk: &Hunk) -> Option<usize> {
		let before: Vec<char> = hunk.before_context.chars().collect();
		let after: Vec<char> = hunk.after_context.chars().collect();
		let before_len = before.len();
		let after_len = after.len();

		// An insertion (`old_len == 0`) recorded with no after-context was
		// made at the end of its base text: nothing followed the anchor.
		// Strict mode requires that still be true at apply time, so a pure
		// insertion can't silently land ahead of text a concurrent edit
		// appended past the anchor. Loose mode deliberately skips this: its
		// whole purpose is replaying a popped local edit back on top of a
		// just-applied remote one, where text beyond the anchor is expected
		// to have changed.
		let requires_end_of_text = self.threshold.is_strict() && hunk.old_len == 0 && after_len == 0;

		let matches_at = |loc: usize| -> bool {
			let start = loc + before_len;
			let Some(after_start) = start.checked_add(hunk.old_len) else {
				return false;
			};
			let Some(end) = after_start.checked_add(after_len) else {
				return false;
			};
			if end > chars.len() {
				return false;
			}
			if requires_end_of_text && after_start != chars.len() {
				return false;
			}
			chars.get(loc..loc + before_len) == Some(before.as_slice())
				&& chars.get(after_start..after_start + after_len) == Some(after.as_slice())
		};

		let preferred_loc = hunk.start_in_old.saturating_sub(before_len);
		if matches_at(preferred_loc) {
			return Some(preferred_loc);
		}
		if self.threshold.is_strict() {
			return None;
		}

		let max_loc = chars.len().saturating_sub(before_len);
		let mut best: Option<(usize, usize)> = None;
		for loc in 0..=max_loc {
			if matches_at(loc) {
				let dist = loc.abs_diff(preferred_loc);
				if best.is_none_or(|(best_dist, _)| dist < best_dist) {
					best = Some((dist, loc));
				}
			}
		}
		best.map(|(_, loc)| loc)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn identical_texts_produce_an_empty_patch() {
		let engine = DiffEngine::strict();
		let patch = engine.make_patch("hello", "hello");
		assert!(patch.is_empty());
	}

	#[test]
	fn strict_apply_round_trips_a_simple_edit() {
		let engine = DiffEngine::strict();
		let patch = engine.make_patch("the quick brown fox", "THE quick brown fox");
		let (text, oks, commands) = engine.apply(&patch, "the quick brown fox");
		assert_eq!(text, "THE quick brown fox");
		assert!(oks.iter().all(|ok| *ok));
		assert!(!commands.is_empty());
	}

	#[test]
	fn strict_apply_fails_when_context_has_drifted() {
		let engine = DiffEngine::strict();
		let patch = engine.make_patch("hello", "hello!");
		let (_, oks, _) = engine.apply(&patch, "hello?");
		assert!(oks.iter().any(|ok| !ok));
	}

	#[test]
	fn loose_apply_tolerates_a_shifted_context() {
		let strict = DiffEngine::strict();
		let loose = DiffEngine::loose();
		// Patch recorded against "hello", but the text grew a prefix.
		let patch = strict.make_patch("hello", "hello!");
		let (text, oks, _) = loose.apply(&patch, "say hello");
		assert!(oks.iter().all(|ok| *ok));
		assert_eq!(text, "say hello!");
	}

	#[test]
	fn patch_text_round_trips_exactly() {
		let engine = DiffEngine::strict();
		let patch = engine.make_patch("hello", "hello world,\\goodbye");
		let text = patch.to_text();
		let parsed = Patch::from_text(&text);
		assert_eq!(patch, parsed);
	}

	proptest::proptest! {
		#[test]
		fn round_trip_is_operationally_equivalent(old in ".{0,40}", new in ".{0,40}") {
			let strict = DiffEngine::strict();
			let patch = strict.make_patch(&old, &new);
			let parsed = Patch::from_text(&patch.to_text());
			let (applied_original, _, _) = strict.apply(&patch, &old);
			let (applied_parsed, _, _) = strict.apply(&parsed, &old);
			prop_assert_eq!(applied_original, applied_parsed);
		}
	}
}
