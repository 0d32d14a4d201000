pub mod config;
pub mod document;
pub mod editor;
pub mod editor_core;
pub mod error;
pub mod filename;
pub mod formatting;
pub mod identity;
pub mod normalize;
pub mod notes;
pub mod scheduler;
pub mod selection;
pub mod sticky;
pub mod web;

pub use config::ClientConfig;
pub use document::{Document, InlineStyle, NodeId, NodeKind, Position};
pub use editor::Editor;
pub use editor_core::{
    CoreError, DeleteDirection, EditorSurface, FormattingEngine, MemorySurface, SelectionRange,
};
pub use error::NoteError;
pub use formatting::{Command, ToolbarState};
pub use identity::{Identity, IdentityResolver};
pub use notes::{HttpBackend, ListView, NoteBackend, NoteClient, NoteEntry, NotesPanel};
pub use sticky::{InputEvent, Intercept, StickyStyle};
