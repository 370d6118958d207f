//! Recovery protocol glue.
//!
//! A thin adapter between `TimeMachine::recover`'s two command lists and the
//! single ordered list an external editor integration would replay.

use crate::diff::EditorCommand;
use crate::time_machine::RecoveryOutcome;

/// Flattens a [`RecoveryOutcome`] into one `Vec<EditorCommand>`, preserving
/// rollback-then-rollforward order.
#[must_use]
pub fn into_editor_commands(outcome: RecoveryOutcome) -> Vec<EditorCommand> {
	let mut commands = outcome.rollback_commands;
	commands.extend(outcome.rollforward_commands);
	commands
}
