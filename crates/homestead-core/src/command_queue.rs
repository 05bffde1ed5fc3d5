//! Input command queue for externally-submitted farm actions.
//!
//! Commands are queued by the presentation shell (clicks, menus) or returned
//! by reactive event handlers, and applied at the start of the next
//! [`Farm::advance`](crate::farm::Farm::advance) before the clock moves.

use crate::grid::GridPosition;
use crate::id::ItemId;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single user-level action on the farm.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Place an item by definition name.
    Place { item: String, cell: GridPosition },
    /// Place the currently selected item.
    PlaceSelected { cell: GridPosition },
    /// Collect the pending yield of a placed item.
    Collect { item: ItemId },
    /// Remove a placed item.
    Remove { item: ItemId },
    /// Change the build-menu selection.
    SelectItem { item: String },
    /// Pause or resume virtual time.
    SetPaused(bool),
    /// Fast-forward through the current cycle.
    SpeedUp,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting to be applied at the next frame boundary.
///
/// Supports optional history tracking for debugging.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// Applied commands: (frame, command).
    history: Vec<(u64, Command)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue that retains up to `max_history` applied commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands in submission order, recording them in
    /// history against `frame`.
    pub fn drain(&mut self, frame: u64) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().cloned().map(|cmd| (frame, cmd)));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(u64, Command)] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
