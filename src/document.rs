//! Inline document tree backing the editing surface.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are never
//! reused, so a [`Position`] that names a removed node can be detected
//! instead of silently pointing at unrelated content.

use regex::Regex;
use std::sync::OnceLock;

use crate::editor_core::CoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Explicit inline formatting carried by a style container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub font_size_px: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl InlineStyle {
    pub fn sized(px: u32) -> Self {
        Self {
            font_size_px: Some(px),
            ..Self::default()
        }
    }

    pub fn is_plain(&self) -> bool {
        self.font_size_px.is_none() && !self.bold && !self.italic && !self.underline
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Text(String),
    Style(InlineStyle),
    /// Size markup emitted by the legacy formatting primitive: a small
    /// integer level instead of a pixel value.
    LegacySize(u8),
    LineBreak,
}

impl NodeKind {
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Root | Self::Style(_) | Self::LegacySize(_))
    }
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A boundary point: a char offset inside a text node, or a child index
/// inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// True when `id` exists and its ancestor chain reaches the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.node(current).and_then(|node| node.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Char count for text nodes, child count for containers, zero for breaks.
    pub fn len(&self, id: NodeId) -> Option<usize> {
        let node = self.node(id)?;
        Some(match &node.kind {
            NodeKind::Text(text) => text.chars().count(),
            NodeKind::LineBreak => 0,
            _ => node.children.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn is_valid_position(&self, pos: Position) -> bool {
        if !self.is_attached(pos.node) {
            return false;
        }
        match self.kind(pos.node) {
            Some(NodeKind::LineBreak) | None => false,
            Some(_) => self.len(pos.node).is_some_and(|len| pos.offset <= len),
        }
    }

    pub fn end_position(&self) -> Position {
        Position::new(self.root, self.children(self.root).len())
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let index = self.children(parent).len();
        self.insert_child(parent, index, kind)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind);
        self.attach(parent, index, id);
        id
    }

    /// Detaches `id` and frees its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.detach(id);
        self.free_subtree(id);
    }

    /// Puts a fresh node of `kind` where `id` was, moving `id`'s children
    /// into it in order. `id` itself is freed.
    pub fn replace_with(&mut self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        let replacement = self.alloc(kind);
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in &children {
            if let Some(node) = self.node_mut(*child) {
                node.parent = Some(replacement);
            }
        }
        if let Some(node) = self.node_mut(replacement) {
            node.children = children;
        }
        self.detach(id);
        self.nodes[id.0] = None;
        self.attach(parent, index, replacement);
        Some(replacement)
    }

    /// Moves `id`'s children into its parent at its index and frees `id`.
    pub fn unwrap_container(&mut self, id: NodeId) {
        let (Some(parent), Some(index)) = (self.parent(id), self.index_in_parent(id)) else {
            return;
        };
        let children = self
            .node_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        self.detach(id);
        self.nodes[id.0] = None;
        for (offset, child) in children.into_iter().enumerate() {
            self.attach(parent, index + offset, child);
        }
    }

    /// Moves `children(parent)[start..end]` into a new container of `kind`
    /// placed at `start`.
    pub fn wrap_children(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        kind: NodeKind,
    ) -> NodeId {
        let moved: Vec<NodeId> = self.children(parent)[start..end].to_vec();
        for child in &moved {
            self.detach(*child);
        }
        let wrapper = self.insert_child(parent, start, kind);
        for (index, child) in moved.into_iter().enumerate() {
            self.attach(wrapper, index, child);
        }
        wrapper
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(node) = self.node_mut(id) {
            node.kind = kind;
        }
    }

    pub fn clear(&mut self) {
        let children = self.children(self.root).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    /// All attached nodes in document order, root first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Number of caret units (chars and line breaks) inside a subtree.
    pub fn units(&self, id: NodeId) -> usize {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => text.chars().count(),
            Some(NodeKind::LineBreak) => 1,
            Some(_) => self.children(id).iter().map(|child| self.units(*child)).sum(),
            None => 0,
        }
    }

    /// Document-order offset of `pos`, counted in caret units.
    pub fn offset_of(&self, pos: Position) -> Option<usize> {
        if !self.is_valid_position(pos) {
            return None;
        }
        let inner = match self.kind(pos.node)? {
            NodeKind::Text(_) => pos.offset,
            _ => self.children(pos.node)[..pos.offset]
                .iter()
                .map(|child| self.units(*child))
                .sum(),
        };
        Some(self.units_before(pos.node) + inner)
    }

    /// Inverse of [`Document::offset_of`]; offsets past the end clamp.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut remaining = offset;
        let mut container = self.root;
        'descend: loop {
            let children = self.children(container);
            for (index, child) in children.iter().enumerate() {
                if remaining == 0 {
                    return Position::new(container, index);
                }
                let units = self.units(*child);
                if remaining < units {
                    match self.kind(*child) {
                        Some(NodeKind::Text(_)) => return Position::new(*child, remaining),
                        _ => {
                            container = *child;
                            continue 'descend;
                        }
                    }
                }
                remaining -= units;
            }
            return Position::new(container, children.len());
        }
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for id in self.descendants(self.root) {
            match self.kind(id) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::LineBreak) => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    /// Replaces all content with `text`, one text run per line separated by
    /// line breaks.
    pub fn set_plain_text(&mut self, text: &str) {
        self.clear();
        let root = self.root;
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                self.append(root, NodeKind::LineBreak);
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                self.append(root, NodeKind::Text(line.to_string()));
            }
        }
    }

    /// Splits a text position into a container boundary. Container positions
    /// are returned unchanged.
    pub fn split_text(&mut self, pos: Position) -> Result<(NodeId, usize), CoreError> {
        if !self.is_valid_position(pos) {
            return Err(CoreError::InvalidPosition {
                offset: pos.offset,
            });
        }
        let NodeKind::Text(text) = self.kind(pos.node).cloned().unwrap_or(NodeKind::Root) else {
            return Ok((pos.node, pos.offset));
        };
        let parent = self.parent(pos.node).ok_or(CoreError::Detached)?;
        let index = self.index_in_parent(pos.node).ok_or(CoreError::Detached)?;
        let len = text.chars().count();
        if pos.offset == 0 {
            return Ok((parent, index));
        }
        if pos.offset >= len {
            return Ok((parent, index + 1));
        }
        let byte = char_to_byte(&text, pos.offset);
        let (head, tail) = text.split_at(byte);
        let tail = tail.to_string();
        self.set_kind(pos.node, NodeKind::Text(head.to_string()));
        self.insert_child(parent, index + 1, NodeKind::Text(tail));
        Ok((parent, index + 1))
    }

    /// Splits text and containers between `pos` and `ancestor` so that `pos`
    /// becomes a child boundary of `ancestor`. Returns that child index.
    pub fn split_to(&mut self, pos: Position, ancestor: NodeId) -> Result<usize, CoreError> {
        let (mut container, mut index) = self.split_text(pos)?;
        while container != ancestor {
            let parent = self.parent(container).ok_or(CoreError::Detached)?;
            let container_index = self.index_in_parent(container).ok_or(CoreError::Detached)?;
            let len = self.children(container).len();
            if index == 0 {
                index = container_index;
            } else if index >= len {
                index = container_index + 1;
            } else {
                let kind = self.kind(container).cloned().ok_or(CoreError::Detached)?;
                let clone = self.insert_child(parent, container_index + 1, kind);
                let moved: Vec<NodeId> = self.children(container)[index..].to_vec();
                for (offset, child) in moved.into_iter().enumerate() {
                    self.detach(child);
                    self.attach(clone, offset, child);
                }
                index = container_index + 1;
            }
            container = parent;
        }
        Ok(index)
    }

    /// Splits at both ends of a range up to `ancestor` and returns the child
    /// index span the range now covers, in document order.
    pub fn split_range(
        &mut self,
        a: Position,
        b: Position,
        ancestor: NodeId,
    ) -> Result<(usize, usize), CoreError> {
        let (start, end) = self.ordered(a, b)?;
        let end_index = self.split_to(end, ancestor)?;
        let marker = self.children(ancestor).get(end_index).copied();
        let start_index = self.split_to(start, ancestor)?;
        let end_index = match marker {
            Some(marker) => self.index_in_parent(marker).ok_or(CoreError::Detached)?,
            None => self.children(ancestor).len(),
        };
        Ok((start_index, end_index.max(start_index)))
    }

    /// Removes everything between `a` and `b` and returns the collapsed caret.
    pub fn delete_range(&mut self, a: Position, b: Position) -> Result<Position, CoreError> {
        let (start, end) = self.ordered(a, b)?;
        if start == end {
            return Ok(start);
        }
        let ancestor = self.common_ancestor(self.container_of(start), self.container_of(end))?;
        let (first, last) = self.split_range(start, end, ancestor)?;
        let doomed: Vec<NodeId> = self.children(ancestor)[first..last].to_vec();
        for id in doomed {
            self.remove(id);
        }
        Ok(Position::new(ancestor, first))
    }

    /// Inserts a new node at `pos`, splitting text if needed. Returns the new
    /// node and the caret immediately after it.
    pub fn insert_at(
        &mut self,
        pos: Position,
        kind: NodeKind,
    ) -> Result<(NodeId, Position), CoreError> {
        let (container, index) = self.split_text(pos)?;
        let id = self.insert_child(container, index, kind);
        Ok((id, Position::new(container, index + 1)))
    }

    /// Inserts plain text at `pos`, extending an adjacent text run where one
    /// exists. Returns the caret after the inserted text.
    pub fn insert_text(&mut self, pos: Position, text: &str) -> Result<Position, CoreError> {
        if !self.is_valid_position(pos) {
            return Err(CoreError::InvalidPosition {
                offset: pos.offset,
            });
        }
        let inserted = text.chars().count();
        if let Some(NodeKind::Text(existing)) = self.kind(pos.node).cloned() {
            let byte = char_to_byte(&existing, pos.offset);
            let mut next = existing;
            next.insert_str(byte, text);
            self.set_kind(pos.node, NodeKind::Text(next));
            return Ok(Position::new(pos.node, pos.offset + inserted));
        }
        let previous = pos
            .offset
            .checked_sub(1)
            .and_then(|index| self.children(pos.node).get(index).copied());
        if let Some(previous) = previous {
            if let Some(NodeKind::Text(existing)) = self.kind(previous).cloned() {
                let end = existing.chars().count();
                self.set_kind(previous, NodeKind::Text(format!("{existing}{text}")));
                return Ok(Position::new(previous, end + inserted));
            }
        }
        let (id, _) = self.insert_at(pos, NodeKind::Text(text.to_string()))?;
        Ok(Position::new(id, inserted))
    }

    /// Drops empty text runs and empty containers, and unwraps style
    /// containers that carry no formatting.
    pub fn prune(&mut self) {
        let order = self.descendants(self.root);
        for id in order.into_iter().rev() {
            let empty = self.children(id).is_empty();
            match self.kind(id).cloned() {
                Some(NodeKind::Text(text)) if text.is_empty() => self.remove(id),
                Some(NodeKind::Style(_)) | Some(NodeKind::LegacySize(_)) if empty => {
                    self.remove(id)
                }
                Some(NodeKind::Style(style)) if style.is_plain() => self.unwrap_container(id),
                _ => {}
            }
        }
    }

    /// The leaf whose formatting applies at `pos`: the text node itself, or
    /// the last leaf before a container boundary.
    pub fn leaf_before(&self, pos: Position) -> NodeId {
        if matches!(self.kind(pos.node), Some(NodeKind::Text(_))) || pos.offset == 0 {
            return pos.node;
        }
        let mut current = match self.children(pos.node).get(pos.offset - 1) {
            Some(child) => *child,
            None => return pos.node,
        };
        while let Some(last) = self.children(current).last() {
            current = *last;
        }
        current
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.filter(|node| self.contains(*node)) {
            chain.push(node);
            current = self.parent(node);
        }
        chain
    }

    /// The pixel size in effect at a node, from the nearest sized container.
    pub fn font_size_at(&self, id: NodeId) -> Option<u32> {
        self.ancestors(id).into_iter().find_map(|node| match self.kind(node) {
            Some(NodeKind::Style(style)) => style.font_size_px,
            _ => None,
        })
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    /// Parses the markup produced by [`Document::to_markup`] plus the common
    /// `b`/`strong`/`i`/`em`/`u` tags. Unknown tags are dropped, their content
    /// kept.
    pub fn from_markup(markup: &str) -> Self {
        static RE_TOKEN: OnceLock<Regex> = OnceLock::new();
        let re_token = RE_TOKEN.get_or_init(|| {
            Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>|([^<]+)").unwrap()
        });

        let mut doc = Self::new();
        let mut stack: Vec<(String, Option<NodeId>)> = Vec::new();
        for cap in re_token.captures_iter(markup) {
            let container = stack
                .iter()
                .rev()
                .find_map(|(_, id)| *id)
                .unwrap_or(doc.root);
            if let Some(text) = cap.get(4) {
                let text = unescape(text.as_str());
                if !text.is_empty() {
                    doc.append(container, NodeKind::Text(text));
                }
                continue;
            }
            let closing = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
            let tag = cap
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            let attrs = cap.get(3).map(|m| m.as_str()).unwrap_or_default();
            if closing {
                if let Some(at) = stack.iter().rposition(|(name, _)| *name == tag) {
                    stack.truncate(at);
                }
                continue;
            }
            if tag == "br" {
                doc.append(container, NodeKind::LineBreak);
                continue;
            }
            let kind = match tag.as_str() {
                "span" => Some(NodeKind::Style(parse_style_attr(attrs))),
                "font" => attr_value(attrs, "size")
                    .and_then(|size| size.trim().parse::<u8>().ok())
                    .map(NodeKind::LegacySize),
                "b" | "strong" => Some(NodeKind::Style(InlineStyle {
                    bold: true,
                    ..InlineStyle::default()
                })),
                "i" | "em" => Some(NodeKind::Style(InlineStyle {
                    italic: true,
                    ..InlineStyle::default()
                })),
                "u" => Some(NodeKind::Style(InlineStyle {
                    underline: true,
                    ..InlineStyle::default()
                })),
                _ => None,
            };
            let id = kind.map(|kind| doc.append(container, kind));
            if !attrs.trim_end().ends_with('/') {
                stack.push((tag, id));
            }
        }
        doc
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::LineBreak => out.push_str("<br>"),
            NodeKind::Root => {}
            NodeKind::Style(style) => {
                let css = style_css(style);
                if css.is_empty() {
                    out.push_str("<span>");
                } else {
                    out.push_str(&format!("<span style=\"{css}\">"));
                }
                for child in self.children(id) {
                    self.write_markup(*child, out);
                }
                out.push_str("</span>");
            }
            NodeKind::LegacySize(level) => {
                out.push_str(&format!("<font size=\"{level}\">"));
                for child in self.children(id) {
                    self.write_markup(*child, out);
                }
                out.push_str("</font>");
            }
        }
    }

    fn ordered(&self, a: Position, b: Position) -> Result<(Position, Position), CoreError> {
        let a_offset = self.offset_of(a).ok_or(CoreError::InvalidPosition {
            offset: a.offset,
        })?;
        let b_offset = self.offset_of(b).ok_or(CoreError::InvalidPosition {
            offset: b.offset,
        })?;
        Ok(if b_offset < a_offset { (b, a) } else { (a, b) })
    }

    fn container_of(&self, pos: Position) -> NodeId {
        match self.kind(pos.node) {
            Some(NodeKind::Text(_)) => self.parent(pos.node).unwrap_or(self.root),
            _ => pos.node,
        }
    }

    fn common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId, CoreError> {
        let chain = self.ancestors(a);
        self.ancestors(b)
            .into_iter()
            .find(|node| chain.contains(node))
            .ok_or(CoreError::Detached)
    }

    fn units_before(&self, id: NodeId) -> usize {
        let mut total = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            for sibling in self.children(parent) {
                if *sibling == current {
                    break;
                }
                total += self.units(*sibling);
            }
            current = parent;
        }
        total
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    fn attach(&mut self, parent: NodeId, index: usize, id: NodeId) {
        let Some(parent_node) = self.node_mut(parent) else {
            return;
        };
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, id);
        if let Some(node) = self.node_mut(id) {
            node.parent = Some(parent);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.free_subtree(child);
        }
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

fn style_css(style: &InlineStyle) -> String {
    let mut parts = Vec::new();
    if let Some(px) = style.font_size_px {
        parts.push(format!("font-size: {px}px"));
    }
    if style.bold {
        parts.push("font-weight: bold".to_string());
    }
    if style.italic {
        parts.push("font-style: italic".to_string());
    }
    if style.underline {
        parts.push("text-decoration: underline".to_string());
    }
    parts.join("; ")
}

fn parse_style_attr(attrs: &str) -> InlineStyle {
    let mut style = InlineStyle::default();
    let Some(css) = attr_value(attrs, "style") else {
        return style;
    };
    for declaration in css.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim().to_ascii_lowercase();
        match name.trim().to_ascii_lowercase().as_str() {
            "font-size" => {
                style.font_size_px = value
                    .strip_suffix("px")
                    .and_then(|px| px.trim().parse::<f32>().ok())
                    .map(|px| px.round() as u32);
            }
            "font-weight" => style.bold = value == "bold" || value == "700",
            "font-style" => style.italic = value == "italic",
            "text-decoration" | "text-decoration-line" => {
                style.underline = value.contains("underline")
            }
            _ => {}
        }
    }
    style
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    static RE_ATTR: OnceLock<Regex> = OnceLock::new();
    let re_attr = RE_ATTR.get_or_init(|| {
        Regex::new(r#"([a-zA-Z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#).unwrap()
    });
    re_attr.captures_iter(attrs).find_map(|cap| {
        let key = cap.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        cap.get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| unescape(m.as_str()))
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_doc(text: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let id = doc.append(root, NodeKind::Text(text.to_string()));
        (doc, id)
    }

    #[test]
    fn deletes_inside_single_text_run() {
        let (mut doc, id) = text_doc("hello world");
        let caret = doc
            .delete_range(Position::new(id, 5), Position::new(id, 11))
            .unwrap();
        assert_eq!(doc.plain_text(), "hello");
        assert_eq!(doc.offset_of(caret), Some(5));
    }

    #[test]
    fn deletes_across_style_containers() {
        let mut doc = Document::new();
        let root = doc.root();
        let bold = doc.append(
            root,
            NodeKind::Style(InlineStyle {
                bold: true,
                ..InlineStyle::default()
            }),
        );
        let left = doc.append(bold, NodeKind::Text("abc".into()));
        let right = doc.append(root, NodeKind::Text("def".into()));

        let caret = doc
            .delete_range(Position::new(right, 1), Position::new(left, 1))
            .unwrap();

        assert_eq!(doc.plain_text(), "aef");
        assert_eq!(caret.node, root);
        assert_eq!(doc.to_markup(), "<span style=\"font-weight: bold\">a</span>ef");
    }

    #[test]
    fn offsets_round_trip_through_positions() {
        let doc = Document::from_markup("ab<br><span style=\"font-size: 20px\">cd</span>");
        assert_eq!(doc.plain_text(), "ab\ncd");
        let pos = doc.position_at(4);
        assert_eq!(doc.offset_of(pos), Some(4));
        assert_eq!(doc.position_at(99), doc.end_position());
    }

    #[test]
    fn insert_text_extends_previous_run() {
        let (mut doc, id) = text_doc("ab");
        let caret = doc.insert_text(doc.end_position(), "c").unwrap();
        assert_eq!(caret, Position::new(id, 3));
        assert_eq!(doc.children(doc.root()).len(), 1);
    }

    #[test]
    fn removed_nodes_invalidate_positions() {
        let (mut doc, id) = text_doc("gone");
        let pos = Position::new(id, 2);
        assert!(doc.is_valid_position(pos));
        doc.remove(id);
        assert!(!doc.is_valid_position(pos));
    }

    #[test]
    fn markup_round_trip_keeps_legacy_and_styles() {
        let markup = "x<font size=\"4\">big <b>bold</b></font><br><span style=\"font-size: 12px; font-style: italic\">s</span>";
        let doc = Document::from_markup(markup);
        assert_eq!(
            doc.to_markup(),
            "x<font size=\"4\">big <span style=\"font-weight: bold\">bold</span></font><br><span style=\"font-size: 12px; font-style: italic\">s</span>"
        );
    }

    #[test]
    fn prune_unwraps_plain_containers() {
        let mut doc = Document::from_markup("<span>a</span><b></b>b");
        doc.prune();
        assert_eq!(doc.to_markup(), "ab");
    }

    #[test]
    fn set_plain_text_splits_lines() {
        let mut doc = Document::new();
        doc.set_plain_text("one\r\ntwo\n");
        assert_eq!(doc.to_markup(), "one<br>two<br>");
        assert_eq!(doc.plain_text(), "one\ntwo\n");
    }
}
