//! Keeps a chosen font size on newly typed content.
//!
//! The formatting primitive toggles bold/italic/underline reliably but loses
//! an active font size as soon as the caret moves or a line break is typed.
//! While a size is forced, text and paragraph insertions are taken over here
//! instead of being left to the surface.

use tracing::trace;

use crate::document::{InlineStyle, NodeKind};
use crate::editor_core::{CoreError, EditorSurface, SelectionRange};
use crate::selection::SelectionTracker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StickyStyle {
    #[default]
    Default,
    Forced(u32),
}

/// An atomic insertion about to be applied by the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    InsertText(String),
    InsertCompositionText(String),
    InsertParagraph,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intercept {
    /// The surface's default handling should run.
    PassThrough,
    /// The default handling is suppressed; the insertion was done here.
    Handled,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StickySizeInterceptor {
    state: StickyStyle,
}

impl StickySizeInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StickyStyle {
        self.state
    }

    /// Enters (or re-enters) the forced state. There is no way back to
    /// `Default` other than constructing a new interceptor.
    pub fn force(&mut self, size_px: u32) {
        trace!(size_px, "sticky font size forced");
        self.state = StickyStyle::Forced(size_px);
    }

    pub fn intercept(
        &self,
        surface: &mut impl EditorSurface,
        tracker: &mut SelectionTracker,
        event: &InputEvent,
    ) -> Result<Intercept, CoreError> {
        let StickyStyle::Forced(size_px) = self.state else {
            return Ok(Intercept::PassThrough);
        };
        // Suppressed even without a selection; there is nowhere to insert.
        let Some(selection) = surface.selection() else {
            return Ok(Intercept::Handled);
        };

        let doc = surface.document_mut();
        let caret = doc.delete_range(selection.anchor, selection.focus)?;
        let caret = match event {
            InputEvent::InsertText(text) | InputEvent::InsertCompositionText(text) => {
                let (container, after) =
                    doc.insert_at(caret, NodeKind::Style(InlineStyle::sized(size_px)))?;
                if !text.is_empty() {
                    doc.append(container, NodeKind::Text(text.clone()));
                }
                after
            }
            InputEvent::InsertParagraph => doc.insert_at(caret, NodeKind::LineBreak)?.1,
        };
        surface.set_selection(Some(SelectionRange::cursor(caret)));
        surface.notify_content_changed();
        tracker.capture(surface);
        Ok(Intercept::Handled)
    }
}
