//! # Terminal Marker
//!
//! The closed tagged union recording how the bus ended, plus the atomic cell
//! that publishes it. The cell transitions away from its pristine instance at
//! most once; the winner is decided by a single pointer compare-and-swap.

use crate::error::Failure;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Terminal state of the bus.
///
/// Appears in two places: the bus-wide terminal cell (where `None` means
/// "still active") and, once terminated, as the last entry of the replay
/// buffer (only ever `Completed` or `Failed` there).
#[derive(Debug, Clone)]
pub(crate) enum Terminal {
    /// No terminal event yet.
    None,
    /// The producer completed the sequence.
    Completed,
    /// The producer failed the sequence.
    Failed(Failure),
}

/// Atomic cell holding the bus's terminal state.
pub(crate) struct TerminalCell {
    cell: ArcSwap<Terminal>,
    /// The distinguished "no terminal yet" instance; the install CAS compares
    /// against this by pointer.
    pristine: Arc<Terminal>,
}

impl TerminalCell {
    pub(crate) fn new() -> Self {
        let pristine = Arc::new(Terminal::None);
        Self {
            cell: ArcSwap::from(Arc::clone(&pristine)),
            pristine,
        }
    }

    /// Installs `marker`, returning true iff this call won the transition.
    pub(crate) fn try_install(&self, marker: Terminal) -> bool {
        let prev = self
            .cell
            .compare_and_swap(&self.pristine, Arc::new(marker));
        Arc::ptr_eq(&*prev, &self.pristine)
    }

    /// Whether a terminal marker has been installed.
    pub(crate) fn is_set(&self) -> bool {
        !Arc::ptr_eq(&*self.cell.load(), &self.pristine)
    }

    /// Current marker; [`Terminal::None`] while the bus is active.
    pub(crate) fn get(&self) -> Terminal {
        Terminal::clone(&*self.cell.load())
    }
}
