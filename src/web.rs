//! Browser adapters: prompt, local storage, wall clock, console logging and
//! the mapping between DOM selections and caret-unit offsets.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::io;
use tracing::{warn, Level};
use wasm_bindgen::JsValue;
use web_sys::Node;

use crate::identity::{Identity, IdentityProvider, IdentityStore, IDENTITY_STORAGE_KEY};
use crate::notes::Clock;

pub struct PromptIdentity;

impl IdentityProvider for PromptIdentity {
    fn prompt(&self, message: &str) -> Option<String> {
        web_sys::window()?.prompt_with_message(message).ok().flatten()
    }
}

pub struct LocalStorageIdentityStore;

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

#[async_trait(?Send)]
impl IdentityStore for LocalStorageIdentityStore {
    async fn load(&self) -> Option<String> {
        local_storage()?.get_item(IDENTITY_STORAGE_KEY).ok().flatten()
    }

    async fn save(&self, identity: &Identity) {
        let Some(storage) = local_storage() else {
            warn!("local storage unavailable, identity kept for this session only");
            return;
        };
        if let Err(err) = storage.set_item(IDENTITY_STORAGE_KEY, identity.as_str()) {
            warn!(?err, "failed to persist identity");
        }
    }
}

pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now(&self) -> NaiveDateTime {
        let now = js_sys::Date::new_0();
        NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
            .and_then(|date| {
                date.and_hms_opt(now.get_hours(), now.get_minutes(), now.get_seconds())
            })
            .unwrap_or_default()
    }
}

/// Caret units rendered by `node`: characters of text nodes and one per
/// `<br>`, matching the document's own count.
fn dom_units(node: &Node) -> usize {
    match node.node_type() {
        Node::TEXT_NODE => node.text_content().map_or(0, |text| text.chars().count()),
        Node::ELEMENT_NODE if node.node_name().eq_ignore_ascii_case("br") => 1,
        _ => {
            let children = node.child_nodes();
            (0..children.length())
                .filter_map(|index| children.item(index))
                .map(|child| dom_units(&child))
                .sum()
        }
    }
}

/// Characters of `text` that start within its first `utf16_len` UTF-16
/// code units. DOM text offsets count UTF-16, the document counts chars.
pub fn chars_in_utf16_prefix(text: &str, utf16_len: u32) -> usize {
    let mut seen = 0;
    text.chars()
        .take_while(|c| {
            let inside = seen < utf16_len as usize;
            seen += c.len_utf16();
            inside
        })
        .count()
}

pub fn utf16_len_of_chars(text: &str, chars: usize) -> u32 {
    text.chars().take(chars).map(char::len_utf16).sum::<usize>() as u32
}

/// Caret-unit offset of the DOM point `(node, offset)` inside `root`, or
/// `None` when the point lies outside it.
fn dom_offset(root: &Node, node: &Node, offset: u32) -> Option<usize> {
    let inner = if node.node_type() == Node::TEXT_NODE {
        chars_in_utf16_prefix(&node.text_content().unwrap_or_default(), offset)
    } else {
        let children = node.child_nodes();
        (0..offset.min(children.length()))
            .filter_map(|index| children.item(index))
            .map(|child| dom_units(&child))
            .sum()
    };
    let mut before = 0;
    let mut current = node.clone();
    while !current.is_same_node(Some(root)) {
        let mut sibling = current.previous_sibling();
        while let Some(previous) = sibling {
            before += dom_units(&previous);
            sibling = previous.previous_sibling();
        }
        current = current.parent_node()?;
    }
    Some(before + inner)
}

/// DOM point for a caret-unit offset inside `container`; offsets past the
/// end clamp.
fn dom_point(container: &Node, offset: usize) -> (Node, u32) {
    let mut remaining = offset;
    let children = container.child_nodes();
    for index in 0..children.length() {
        let Some(child) = children.item(index) else {
            continue;
        };
        if remaining == 0 {
            return (container.clone(), index);
        }
        let units = dom_units(&child);
        if remaining < units {
            if child.node_type() == Node::TEXT_NODE {
                let text = child.text_content().unwrap_or_default();
                return (child, utf16_len_of_chars(&text, remaining));
            }
            return dom_point(&child, remaining);
        }
        remaining -= units;
    }
    (container.clone(), children.length())
}

/// The window selection as `(anchor, focus)` caret-unit offsets, when both
/// ends lie inside `root`.
pub fn dom_selection_offsets(root: &Node) -> Option<(usize, usize)> {
    let selection = web_sys::window()?.get_selection().ok().flatten()?;
    let anchor = dom_offset(root, &selection.anchor_node()?, selection.anchor_offset())?;
    let focus = dom_offset(root, &selection.focus_node()?, selection.focus_offset())?;
    Some((anchor, focus))
}

/// Points the window selection at caret-unit offsets inside `root`.
pub fn select_dom_offsets(root: &Node, anchor: usize, focus: usize) {
    let Some(selection) =
        web_sys::window().and_then(|window| window.get_selection().ok().flatten())
    else {
        return;
    };
    let (anchor_node, anchor_offset) = dom_point(root, anchor);
    let (focus_node, focus_offset) = dom_point(root, focus);
    if let Err(err) =
        selection.set_base_and_extent(&anchor_node, anchor_offset, &focus_node, focus_offset)
    {
        warn!(?err, "failed to place the caret");
    }
}

/// Buffers one formatted event and writes it to the browser console.
#[derive(Default)]
pub struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer);
            web_sys::console::log_1(&JsValue::from_str(line.trim_end()));
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

pub fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_writer(ConsoleWriter::default)
        .with_ansi(false)
        .without_time()
        .with_max_level(level)
        .init();
}
