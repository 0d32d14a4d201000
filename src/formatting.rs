use std::str::FromStr;

use tracing::debug;

use crate::editor::Editor;
use crate::editor_core::{CoreError, EditorSurface, FormattingEngine, Toggle};
use crate::normalize::mapped_size_px;
use crate::scheduler::DeferredTask;

/// A named formatting operation from the toolbar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Bold,
    Italic,
    Underline,
    /// Legacy size level as offered by the size control (`2`, `3`, `4`).
    FontSize(u8),
}

impl Command {
    /// Builds a command from its name and optional value, e.g.
    /// `("fontSize", Some("4"))`.
    pub fn parse(name: &str, value: Option<&str>) -> Option<Self> {
        match name {
            "bold" => Some(Self::Bold),
            "italic" => Some(Self::Italic),
            "underline" => Some(Self::Underline),
            "fontSize" => value?.trim().parse().ok().map(Self::FontSize),
            _ => None,
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, None).ok_or_else(|| format!("unknown formatting command: {s}"))
    }
}

/// Active state of the toggle buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolbarState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

pub fn toolbar_state<S: EditorSurface + FormattingEngine>(surface: &S) -> ToolbarState {
    let Some(selection) = surface.selection() else {
        return ToolbarState::default();
    };
    let state = surface.query_state(selection.focus);
    ToolbarState {
        bold: state.bold,
        italic: state.italic,
        underline: state.underline,
    }
}

impl<S: EditorSurface + FormattingEngine> Editor<S> {
    /// Applies `command` to the tracked selection.
    ///
    /// Restores the tracked selection, runs the primitive, refocuses the
    /// surface, publishes the toolbar state and defers a normalization pass
    /// to the next tick. A size command with a mapped level also forces that
    /// size for text typed afterwards.
    pub fn exec(&mut self, command: Command) -> Result<ToolbarState, CoreError> {
        self.tracker.restore(&mut self.surface);
        match command {
            Command::Bold => self.surface.toggle(Toggle::Bold)?,
            Command::Italic => self.surface.toggle(Toggle::Italic)?,
            Command::Underline => self.surface.toggle(Toggle::Underline)?,
            Command::FontSize(level) => {
                if let Some(range) = self.surface.selection() {
                    self.surface.set_font_size(range, level)?;
                }
            }
        }
        self.surface.focus();
        self.toolbar = toolbar_state(&self.surface);
        self.scheduler.defer(DeferredTask::Normalize);
        if let Command::FontSize(level) = command {
            match mapped_size_px(level) {
                Some(size_px) => self.sticky.force(size_px),
                None => debug!(level, "unmapped size level, typed size left as is"),
            }
        }
        debug!(?command, toolbar = ?self.toolbar, "formatting command applied");
        Ok(self.toolbar)
    }
}
