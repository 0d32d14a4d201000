use thiserror::Error;

use crate::document::{Document, InlineStyle, NodeId, NodeKind, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: Position,
    pub focus: Position,
}

impl SelectionRange {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn cursor(pos: Position) -> Self {
        Self {
            anchor: pos,
            focus: pos,
        }
    }

    pub fn is_cursor(self) -> bool {
        self.anchor == self.focus
    }

    /// Both ends still name attached nodes at in-bounds offsets.
    pub fn is_valid_in(self, doc: &Document) -> bool {
        doc.is_valid_position(self.anchor) && doc.is_valid_position(self.focus)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("position offset {offset} is out of bounds or names a removed node")]
    InvalidPosition { offset: usize },
    #[error("node is not attached to the document")]
    Detached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Bold,
    Italic,
    Underline,
}

impl Toggle {
    fn get(self, state: FormatState) -> bool {
        match self {
            Self::Bold => state.bold,
            Self::Italic => state.italic,
            Self::Underline => state.underline,
        }
    }

    fn set(self, style: &mut InlineStyle, on: bool) {
        match self {
            Self::Bold => style.bold = on,
            Self::Italic => style.italic = on,
            Self::Underline => style.underline = on,
        }
    }
}

/// Which side of a collapsed caret a deletion removes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteDirection {
    Backward,
    Forward,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl From<InlineStyle> for FormatState {
    fn from(style: InlineStyle) -> Self {
        Self {
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
        }
    }
}

/// The editable region the editing components act on. Implementations own
/// the document and the live ("native") selection.
pub trait EditorSurface {
    fn document(&self) -> &Document;
    fn document_mut(&mut self) -> &mut Document;
    fn selection(&self) -> Option<SelectionRange>;
    fn set_selection(&mut self, selection: Option<SelectionRange>);
    fn focus(&mut self);
    fn has_focus(&self) -> bool;
    /// Queues a content-changed notification for listeners.
    fn notify_content_changed(&mut self);
    /// Drains queued content-changed notifications, returning how many there were.
    fn take_content_changes(&mut self) -> usize;
    /// The surface's own handling of a text insertion.
    fn insert_text_default(&mut self, text: &str) -> Result<(), CoreError>;
    /// The surface's own handling of a paragraph insertion.
    fn insert_paragraph_default(&mut self) -> Result<(), CoreError>;
    /// Removes the selected content, or one caret unit next to a collapsed
    /// caret.
    fn delete_default(&mut self, direction: DeleteDirection) -> Result<(), CoreError>;
}

/// Rich-text primitive of the editing surface.
pub trait FormattingEngine {
    /// Toggles a flag over the live selection.
    fn toggle(&mut self, toggle: Toggle) -> Result<(), CoreError>;
    /// Applies a legacy size level to `range`.
    fn set_font_size(&mut self, range: SelectionRange, level: u8) -> Result<(), CoreError>;
    fn query_state(&self, position: Position) -> FormatState;
}

/// In-memory editing surface.
///
/// Formatting over a range splits the tree at both range ends all the way up
/// to the root, so the selected content is a run of root children that no
/// outer container reaches into.
#[derive(Clone, Debug, Default)]
pub struct MemorySurface {
    document: Document,
    selection: Option<SelectionRange>,
    focused: bool,
    content_changes: usize,
    typing_style: Option<InlineStyle>,
}

impl MemorySurface {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    /// Places a collapsed caret at the end of the document.
    pub fn caret_to_end(&mut self) {
        let end = self.document.end_position();
        self.selection = Some(SelectionRange::cursor(end));
    }

    /// Selects the caret units `start..end`.
    pub fn select_offsets(&mut self, start: usize, end: usize) {
        let anchor = self.document.position_at(start);
        let focus = self.document.position_at(end);
        self.selection = Some(SelectionRange::new(anchor, focus));
    }

    /// Anchor and focus as caret-unit offsets, in selection order.
    pub fn selection_offsets(&self) -> Option<(usize, usize)> {
        let selection = self.selection?;
        Some((
            self.document.offset_of(selection.anchor)?,
            self.document.offset_of(selection.focus)?,
        ))
    }

    pub fn select_all(&mut self) {
        let end = self.document.units(self.document.root());
        self.select_offsets(0, end);
    }

    /// Moves the focus by `delta` caret units, clamped to the document.
    /// Without `extend` the selection collapses onto the new focus.
    pub fn move_focus(&mut self, delta: isize, extend: bool) {
        let doc = &self.document;
        let end = doc.units(doc.root());
        let Some(current) = self
            .selection
            .filter(|selection| selection.is_valid_in(doc))
        else {
            self.select_offsets(end, end);
            return;
        };
        let focus = doc.offset_of(current.focus).unwrap_or(end);
        let anchor = doc.offset_of(current.anchor).unwrap_or(focus);
        let target = focus.saturating_add_signed(delta).min(end);
        if extend {
            self.select_offsets(anchor, target);
        } else {
            self.select_offsets(target, target);
        }
    }

    fn ordered_offsets(&self, range: SelectionRange) -> Result<(usize, usize), CoreError> {
        let a = self
            .document
            .offset_of(range.anchor)
            .ok_or(CoreError::InvalidPosition {
                offset: range.anchor.offset,
            })?;
        let b = self
            .document
            .offset_of(range.focus)
            .ok_or(CoreError::InvalidPosition {
                offset: range.focus.offset,
            })?;
        Ok((a.min(b), a.max(b)))
    }

    fn reselect(&mut self, start: usize, end: usize) {
        self.document.prune();
        self.select_offsets(start, end);
    }

    /// Text runs and line breaks under the root-level slice `[first, last)`.
    fn slice_leaves(&self, first: usize, last: usize) -> Vec<NodeId> {
        let root = self.document.root();
        self.document.children(root)[first..last]
            .iter()
            .flat_map(|child| self.document.descendants(*child))
            .filter(|id| {
                matches!(
                    self.document.kind(*id),
                    Some(NodeKind::Text(_)) | Some(NodeKind::LineBreak)
                )
            })
            .collect()
    }

    fn state_of(&self, id: NodeId) -> FormatState {
        let mut state = FormatState::default();
        for node in self.document.ancestors(id) {
            if let Some(NodeKind::Style(style)) = self.document.kind(node) {
                state.bold |= style.bold;
                state.italic |= style.italic;
                state.underline |= style.underline;
            }
        }
        state
    }
}

impl EditorSurface for MemorySurface {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn selection(&self) -> Option<SelectionRange> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<SelectionRange>) {
        self.selection = selection;
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn notify_content_changed(&mut self) {
        self.content_changes += 1;
    }

    fn take_content_changes(&mut self) -> usize {
        std::mem::take(&mut self.content_changes)
    }

    fn insert_text_default(&mut self, text: &str) -> Result<(), CoreError> {
        let Some(selection) = self.selection else {
            return Ok(());
        };
        let caret = self.document.delete_range(selection.anchor, selection.focus)?;
        let caret = match self.typing_style.take() {
            Some(style) => {
                let root = self.document.root();
                let index = self.document.split_to(caret, root)?;
                let container = self
                    .document
                    .insert_child(root, index, NodeKind::Style(style));
                self.document.append(container, NodeKind::Text(text.to_string()));
                Position::new(root, index + 1)
            }
            None => self.document.insert_text(caret, text)?,
        };
        self.selection = Some(SelectionRange::cursor(caret));
        self.content_changes += 1;
        Ok(())
    }

    fn insert_paragraph_default(&mut self) -> Result<(), CoreError> {
        let Some(selection) = self.selection else {
            return Ok(());
        };
        let caret = self.document.delete_range(selection.anchor, selection.focus)?;
        let (_, caret) = self.document.insert_at(caret, NodeKind::LineBreak)?;
        self.selection = Some(SelectionRange::cursor(caret));
        self.content_changes += 1;
        Ok(())
    }

    fn delete_default(&mut self, direction: DeleteDirection) -> Result<(), CoreError> {
        let Some(selection) = self.selection else {
            return Ok(());
        };
        let (mut start, mut end) = self.ordered_offsets(selection)?;
        if start == end {
            let total = self.document.units(self.document.root());
            match direction {
                DeleteDirection::Backward if start > 0 => start -= 1,
                DeleteDirection::Forward if end < total => end += 1,
                _ => return Ok(()),
            }
        }
        let from = self.document.position_at(start);
        let to = self.document.position_at(end);
        self.document.delete_range(from, to)?;
        self.reselect(start, start);
        self.content_changes += 1;
        Ok(())
    }
}

impl FormattingEngine for MemorySurface {
    fn toggle(&mut self, toggle: Toggle) -> Result<(), CoreError> {
        let Some(selection) = self.selection else {
            return Ok(());
        };
        if selection.is_cursor() {
            // Collapsed: arm the style for the next default insertion.
            let leaf = self.document.leaf_before(selection.anchor);
            let current = self.typing_style.unwrap_or_else(|| {
                let state = self.state_of(leaf);
                InlineStyle {
                    font_size_px: self.document.font_size_at(leaf),
                    bold: state.bold,
                    italic: state.italic,
                    underline: state.underline,
                }
            });
            let mut next = current;
            toggle.set(&mut next, !toggle.get(current.into()));
            self.typing_style = Some(next);
            return Ok(());
        }

        let (start, end) = self.ordered_offsets(selection)?;
        let root = self.document.root();
        let (first, last) = self
            .document
            .split_range(selection.anchor, selection.focus, root)?;
        let leaves = self.slice_leaves(first, last);
        let all_on = !leaves.is_empty()
            && leaves
                .iter()
                .all(|leaf| toggle.get(self.state_of(*leaf)));

        if all_on {
            let nodes: Vec<NodeId> = self.document.children(root)[first..last]
                .iter()
                .flat_map(|child| self.document.descendants(*child))
                .collect();
            for id in nodes {
                if let Some(NodeKind::Style(mut style)) = self.document.kind(id).cloned() {
                    toggle.set(&mut style, false);
                    self.document.set_kind(id, NodeKind::Style(style));
                }
            }
        } else if first < last {
            let mut style = InlineStyle::default();
            toggle.set(&mut style, true);
            self.document
                .wrap_children(root, first, last, NodeKind::Style(style));
        }
        self.reselect(start, end);
        Ok(())
    }

    fn set_font_size(&mut self, range: SelectionRange, level: u8) -> Result<(), CoreError> {
        if range.is_cursor() {
            return Ok(());
        }
        let (start, end) = self.ordered_offsets(range)?;
        let root = self.document.root();
        let (first, last) = self.document.split_range(range.anchor, range.focus, root)?;
        if first == last {
            return Ok(());
        }
        let marker = self.document.children(root).get(last).copied();
        let nested: Vec<NodeId> = self.document.children(root)[first..last]
            .iter()
            .flat_map(|child| self.document.descendants(*child))
            .collect();
        for id in nested {
            match self.document.kind(id).cloned() {
                Some(NodeKind::LegacySize(_)) => self.document.unwrap_container(id),
                Some(NodeKind::Style(mut style)) if style.font_size_px.is_some() => {
                    style.font_size_px = None;
                    self.document.set_kind(id, NodeKind::Style(style));
                }
                _ => {}
            }
        }
        // Unwrapping a root-level size element changes the slice length.
        let last = match marker {
            Some(marker) => self
                .document
                .index_in_parent(marker)
                .ok_or(CoreError::Detached)?,
            None => self.document.children(root).len(),
        };
        self.document
            .wrap_children(root, first, last, NodeKind::LegacySize(level));
        self.reselect(start, end);
        Ok(())
    }

    fn query_state(&self, position: Position) -> FormatState {
        if !self.document.is_valid_position(position) {
            return FormatState::default();
        }
        self.state_of(self.document.leaf_before(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(markup: &str) -> MemorySurface {
        MemorySurface::new(Document::from_markup(markup))
    }

    #[test]
    fn toggles_bold_on_and_off_over_range() {
        let mut surface = surface("hello world");
        surface.select_offsets(0, 5);
        surface.toggle(Toggle::Bold).unwrap();
        assert_eq!(
            surface.document().to_markup(),
            "<span style=\"font-weight: bold\">hello</span> world"
        );

        surface.toggle(Toggle::Bold).unwrap();
        assert_eq!(surface.document().to_markup(), "hello world");
    }

    #[test]
    fn partial_bold_selection_becomes_fully_bold() {
        let mut surface = surface("<b>ab</b>cd");
        surface.select_offsets(1, 3);
        surface.toggle(Toggle::Bold).unwrap();
        let doc = surface.document();
        assert_eq!(
            doc.to_markup(),
            "<span style=\"font-weight: bold\">a</span><span style=\"font-weight: bold\"><span style=\"font-weight: bold\">b</span>c</span>d"
        );
        assert!(surface.query_state(Position::new(doc.root(), 2)).bold);
        assert!(!surface.query_state(doc.end_position()).bold);
    }

    #[test]
    fn set_font_size_emits_legacy_markup() {
        let mut surface = surface("abc");
        surface.select_offsets(1, 2);
        let range = surface.selection().unwrap();
        surface.set_font_size(range, 4).unwrap();
        assert_eq!(surface.document().to_markup(), "a<font size=\"4\">b</font>c");
    }

    #[test]
    fn set_font_size_replaces_nested_sizes() {
        let mut surface =
            surface("<font size=\"2\">ab</font><span style=\"font-size: 12px\">cd</span>");
        surface.select_offsets(0, 4);
        let range = surface.selection().unwrap();
        surface.set_font_size(range, 3).unwrap();
        assert_eq!(surface.document().to_markup(), "<font size=\"3\">abcd</font>");
    }

    #[test]
    fn collapsed_toggle_styles_next_insertion() {
        let mut surface = surface("ab");
        surface.caret_to_end();
        surface.toggle(Toggle::Italic).unwrap();
        surface.insert_text_default("c").unwrap();
        assert_eq!(
            surface.document().to_markup(),
            "ab<span style=\"font-style: italic\">c</span>"
        );
        assert_eq!(surface.take_content_changes(), 1);
    }

    #[test]
    fn query_state_reads_text_before_container_boundary() {
        let surface = surface("<u>x</u>y");
        let root = surface.document().root();
        assert!(surface.query_state(Position::new(root, 1)).underline);
        assert!(!surface.query_state(surface.document().end_position()).underline);
    }

    #[test]
    fn collapsed_delete_removes_one_unit_on_either_side() {
        let mut surface = surface("ab<br>cd");
        surface.caret_to_end();
        surface.delete_default(DeleteDirection::Backward).unwrap();
        assert_eq!(surface.document().plain_text(), "ab\nc");
        assert_eq!(surface.selection_offsets(), Some((4, 4)));

        surface.select_offsets(2, 2);
        surface.delete_default(DeleteDirection::Forward).unwrap();
        assert_eq!(surface.document().plain_text(), "abc");
        assert_eq!(surface.selection_offsets(), Some((2, 2)));
        assert_eq!(surface.take_content_changes(), 2);
    }

    #[test]
    fn delete_at_document_edges_is_a_no_op() {
        let mut surface = surface("ab");
        surface.select_offsets(0, 0);
        surface.delete_default(DeleteDirection::Backward).unwrap();
        surface.caret_to_end();
        surface.delete_default(DeleteDirection::Forward).unwrap();
        assert_eq!(surface.document().plain_text(), "ab");
        assert_eq!(surface.take_content_changes(), 0);
    }

    #[test]
    fn delete_over_range_crosses_styles_and_breaks() {
        let mut surface = surface("<b>ab</b><br>cd");
        surface.select_offsets(4, 1);
        surface.delete_default(DeleteDirection::Forward).unwrap();
        assert_eq!(surface.document().plain_text(), "ad");
        assert_eq!(surface.selection_offsets(), Some((1, 1)));
        assert!(surface.query_state(surface.document().position_at(1)).bold);
    }

    #[test]
    fn focus_moves_are_clamped() {
        let mut surface = surface("ab<br>cd");
        surface.select_all();
        surface.move_focus(-1, true);
        let offsets = |s: &MemorySurface| {
            let selection = s.selection().unwrap();
            let doc = s.document();
            (doc.offset_of(selection.anchor), doc.offset_of(selection.focus))
        };
        assert_eq!(offsets(&surface), (Some(0), Some(4)));

        surface.move_focus(10, false);
        assert_eq!(offsets(&surface), (Some(5), Some(5)));
        surface.move_focus(-9, false);
        assert_eq!(offsets(&surface), (Some(0), Some(0)));
    }
}
