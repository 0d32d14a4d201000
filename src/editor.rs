//! Editing session: the event handlers of the editing surface.
//!
//! Every handler runs to completion synchronously. Work that must observe
//! the settled result of a mutation is queued on the [`Scheduler`] and runs
//! on the next [`Editor::tick`].

use tracing::trace;

use crate::editor_core::{
    CoreError, DeleteDirection, EditorSurface, FormattingEngine, SelectionRange,
};
use crate::formatting::{toolbar_state, ToolbarState};
use crate::normalize::normalize;
use crate::scheduler::{DeferredTask, Scheduler};
use crate::selection::SelectionTracker;
use crate::sticky::{InputEvent, Intercept, StickySizeInterceptor, StickyStyle};

pub struct Editor<S> {
    pub(crate) surface: S,
    pub(crate) tracker: SelectionTracker,
    pub(crate) sticky: StickySizeInterceptor,
    pub(crate) scheduler: Scheduler,
    pub(crate) toolbar: ToolbarState,
}

impl<S: EditorSurface + FormattingEngine> Editor<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            tracker: SelectionTracker::new(),
            sticky: StickySizeInterceptor::new(),
            scheduler: Scheduler::new(),
            toolbar: ToolbarState::default(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn toolbar(&self) -> ToolbarState {
        self.toolbar
    }

    pub fn sticky_state(&self) -> StickyStyle {
        self.sticky.state()
    }

    pub fn tracked_selection(&self) -> Option<SelectionRange> {
        self.tracker.snapshot()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn pointer_up(&mut self) {
        self.tracker.capture(&self.surface);
    }

    pub fn key_up(&mut self) {
        self.tracker.capture(&self.surface);
    }

    pub fn focus(&mut self) {
        self.surface.focus();
        self.tracker.capture(&self.surface);
    }

    /// Must run before the size control takes focus away from the surface.
    pub fn size_control_pressed(&mut self) {
        self.tracker.capture(&self.surface);
    }

    pub fn selection_changed(&mut self) {
        self.toolbar = toolbar_state(&self.surface);
        self.tracker.capture(&self.surface);
    }

    /// Runs an insertion through the sticky-size interceptor, falling back
    /// to the surface's default handling when no size is forced.
    pub fn before_input(&mut self, event: InputEvent) -> Result<Intercept, CoreError> {
        let outcome = self
            .sticky
            .intercept(&mut self.surface, &mut self.tracker, &event)?;
        if outcome == Intercept::PassThrough {
            match &event {
                InputEvent::InsertText(text) | InputEvent::InsertCompositionText(text) => {
                    self.surface.insert_text_default(text)?
                }
                InputEvent::InsertParagraph => self.surface.insert_paragraph_default()?,
            }
            self.tracker.capture(&self.surface);
        }
        self.flush_content_changes();
        Ok(outcome)
    }

    /// Deletion goes straight to the surface; the sticky size only governs
    /// insertions.
    pub fn delete(&mut self, direction: DeleteDirection) -> Result<(), CoreError> {
        self.surface.delete_default(direction)?;
        self.tracker.capture(&self.surface);
        self.flush_content_changes();
        Ok(())
    }

    /// Content-changed listener: cleans up legacy markup right away.
    pub fn content_changed(&mut self) {
        self.normalize_now();
    }

    /// Runs the tasks deferred before this tick.
    pub fn tick(&mut self) {
        for task in self.scheduler.take_ready() {
            match task {
                DeferredTask::Normalize => self.normalize_now(),
            }
        }
    }

    /// Replaces the whole document with plain text, as when a note is opened.
    pub fn replace_content(&mut self, text: &str) {
        self.surface.document_mut().set_plain_text(text);
        let end = self.surface.document().end_position();
        self.surface.set_selection(Some(SelectionRange::cursor(end)));
        self.normalize_now();
    }

    pub fn plain_text(&self) -> String {
        self.surface.document().plain_text()
    }

    fn flush_content_changes(&mut self) {
        let changes = self.surface.take_content_changes();
        if changes > 0 {
            trace!(changes, "content changed");
            self.content_changed();
        }
    }

    /// Normalizes and keeps the live selection usable: when it pointed into a
    /// replaced element it is remapped by caret offset. The tracked snapshot
    /// is left alone.
    fn normalize_now(&mut self) {
        let live = self.surface.selection();
        let offsets = live.and_then(|selection| {
            let doc = self.surface.document();
            Some((doc.offset_of(selection.anchor)?, doc.offset_of(selection.focus)?))
        });
        if normalize(self.surface.document_mut()) == 0 {
            return;
        }
        let still_valid =
            live.is_some_and(|selection| selection.is_valid_in(self.surface.document()));
        if let (false, Some((anchor, focus))) = (still_valid, offsets) {
            let doc = self.surface.document();
            let remapped = SelectionRange::new(doc.position_at(anchor), doc.position_at(focus));
            self.surface.set_selection(Some(remapped));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, InlineStyle, NodeKind};
    use crate::editor_core::MemorySurface;
    use crate::formatting::Command;

    fn editor(markup: &str) -> Editor<MemorySurface> {
        let mut surface = MemorySurface::new(Document::from_markup(markup));
        surface.caret_to_end();
        Editor::new(surface)
    }

    #[test]
    fn typed_text_keeps_forced_size_across_paragraphs() {
        let mut editor = editor("");
        editor.exec(Command::FontSize(4)).unwrap();
        editor.tick();

        for event in [
            InputEvent::InsertText("a".into()),
            InputEvent::InsertText("b".into()),
            InputEvent::InsertParagraph,
            InputEvent::InsertText("c".into()),
        ] {
            assert_eq!(editor.before_input(event).unwrap(), Intercept::Handled);
        }

        let doc = editor.surface().document();
        let sized = NodeKind::Style(InlineStyle::sized(20));
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .filter_map(|id| doc.kind(*id).cloned())
            .collect();
        assert_eq!(
            kinds,
            vec![sized.clone(), sized.clone(), NodeKind::LineBreak, sized]
        );
        assert_eq!(editor.tracked_selection(), editor.surface().selection());
    }

    #[test]
    fn default_input_goes_to_the_surface() {
        let mut editor = editor("ab");
        assert_eq!(
            editor.before_input(InputEvent::InsertText("c".into())).unwrap(),
            Intercept::PassThrough
        );
        editor.before_input(InputEvent::InsertParagraph).unwrap();
        assert_eq!(editor.plain_text(), "abc\n");
        assert_eq!(editor.tracked_selection(), editor.surface().selection());
    }

    #[test]
    fn normalization_waits_for_the_next_tick() {
        let mut editor = editor("xyz");
        editor.surface_mut().select_offsets(0, 3);
        editor.key_up();
        editor.exec(Command::FontSize(9)).unwrap();
        assert_eq!(editor.pending_tasks(), 1);
        assert!(editor.surface().document().to_markup().contains("<font"));

        editor.tick();
        assert_eq!(editor.pending_tasks(), 0);
        assert_eq!(
            editor.surface().document().to_markup(),
            "<span style=\"font-size: 16px\">xyz</span>"
        );
        assert!(editor
            .surface()
            .selection()
            .is_some_and(|selection| selection.is_valid_in(editor.surface().document())));
    }

    #[test]
    fn deleting_keeps_tracker_in_step_and_normalizes() {
        let mut editor = editor("ab<font size=\"2\">cd</font>");
        editor.delete(DeleteDirection::Backward).unwrap();

        assert_eq!(editor.plain_text(), "abc");
        assert_eq!(
            editor.surface().document().to_markup(),
            "ab<span style=\"font-size: 12px\">c</span>"
        );
        assert_eq!(editor.tracked_selection(), editor.surface().selection());
        assert!(editor
            .tracked_selection()
            .is_some_and(|selection| selection.is_valid_in(editor.surface().document())));
    }

    #[test]
    fn replacing_content_resets_document_text() {
        let mut editor = editor("<b>old</b>");
        editor.replace_content("new\nnote");
        assert_eq!(editor.surface().document().to_markup(), "new<br>note");
        let caret = editor.surface().selection().unwrap();
        assert_eq!(caret.anchor, editor.surface().document().end_position());
    }

    #[test]
    fn selection_change_publishes_toolbar_state() {
        let mut editor = editor("<i>slanted</i>");
        editor.selection_changed();
        assert!(editor.toolbar().italic);
        assert!(!editor.toolbar().bold);
    }
}
