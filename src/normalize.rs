//! Rewrites legacy size markup into explicit inline-style containers.

use tracing::trace;

use crate::document::{Document, InlineStyle, NodeKind};

/// Pixel sizes for the legacy size levels offered by the size control.
pub const LEGACY_SIZE_PX: [(u8, u32); 3] = [(2, 12), (3, 16), (4, 20)];

/// Used for any legacy level missing from [`LEGACY_SIZE_PX`].
pub const FALLBACK_SIZE_PX: u32 = 16;

/// Pixel size of a level listed in [`LEGACY_SIZE_PX`].
pub fn mapped_size_px(level: u8) -> Option<u32> {
    LEGACY_SIZE_PX
        .iter()
        .find(|(known, _)| *known == level)
        .map(|(_, px)| *px)
}

pub fn legacy_size_px(level: u8) -> u32 {
    mapped_size_px(level).unwrap_or(FALLBACK_SIZE_PX)
}

/// Replaces every legacy size element with a style container of the mapped
/// pixel size, keeping its children and position. Returns how many elements
/// were replaced; a document without legacy markup is left untouched.
pub fn normalize(doc: &mut Document) -> usize {
    let legacy: Vec<_> = doc
        .descendants(doc.root())
        .into_iter()
        .filter_map(|id| match doc.kind(id) {
            Some(NodeKind::LegacySize(level)) => Some((id, *level)),
            _ => None,
        })
        .collect();

    let mut replaced = 0;
    for (id, level) in legacy {
        let style = InlineStyle::sized(legacy_size_px(level));
        if doc.replace_with(id, NodeKind::Style(style)).is_some() {
            replaced += 1;
        }
    }
    if replaced > 0 {
        trace!(replaced, "normalized legacy size markup");
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_levels_and_falls_back() {
        assert_eq!(legacy_size_px(2), 12);
        assert_eq!(legacy_size_px(3), 16);
        assert_eq!(legacy_size_px(4), 20);
        assert_eq!(legacy_size_px(7), FALLBACK_SIZE_PX);
    }

    #[test]
    fn replaces_legacy_elements_in_place() {
        let mut doc = Document::from_markup(
            "a<font size=\"4\">b<b>c</b></font>d<font size=\"9\">e</font>",
        );
        assert_eq!(normalize(&mut doc), 2);
        assert_eq!(
            doc.to_markup(),
            "a<span style=\"font-size: 20px\">b<span style=\"font-weight: bold\">c</span></span>d<span style=\"font-size: 16px\">e</span>"
        );
    }

    #[test]
    fn nested_legacy_elements_are_all_replaced() {
        let mut doc =
            Document::from_markup("<font size=\"2\">x<font size=\"4\">y</font></font>");
        normalize(&mut doc);
        assert_eq!(
            doc.to_markup(),
            "<span style=\"font-size: 12px\">x<span style=\"font-size: 20px\">y</span></span>"
        );
        for id in doc.descendants(doc.root()) {
            assert!(doc.is_attached(id));
        }
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut doc = Document::from_markup("<font size=\"3\">x</font><br>y");
        normalize(&mut doc);
        let once = doc.to_markup();
        let nodes_once = doc.descendants(doc.root());

        assert_eq!(normalize(&mut doc), 0);
        assert_eq!(doc.to_markup(), once);
        assert_eq!(doc.descendants(doc.root()), nodes_once);
    }
}
