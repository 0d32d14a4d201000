use tracing::debug;

use crate::editor_core::{EditorSurface, SelectionRange};

/// Keeps the last known selection so it survives interactions that drop the
/// surface's own selection (toolbar clicks, the size control).
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionTracker {
    saved: Option<SelectionRange>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the live selection. Keeps the previous snapshot when the
    /// surface has no selection at all.
    pub fn capture(&mut self, surface: &impl EditorSurface) {
        if let Some(selection) = surface.selection() {
            self.saved = Some(selection);
        }
    }

    /// Reinstates the snapshot as the live selection. Returns false, leaving
    /// the live selection as it was, when nothing was captured or the
    /// snapshot names nodes that are no longer in the document.
    pub fn restore(&self, surface: &mut impl EditorSurface) -> bool {
        let Some(saved) = self.saved else {
            return false;
        };
        if !saved.is_valid_in(surface.document()) {
            debug!("selection snapshot is stale; keeping live selection");
            return false;
        }
        surface.set_selection(None);
        surface.set_selection(Some(saved));
        true
    }

    pub fn snapshot(&self) -> Option<SelectionRange> {
        self.saved
    }
}
