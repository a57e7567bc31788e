//! Document node-tree model and traversal.
//!
//! The tree is a JSON-shaped, tagged structure: every node carries a `type`
//! discriminant, an optional `attrs` bag, and either a `text` (+ `marks`)
//! pair for leaves or an ordered `content` sequence for branches. Container
//! node types the engine does not recognize (`run` and similar inline
//! wrappers introduced by the editor) are never special-cased: they are
//! just branches whose `content` gets walked like any other.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HEADING: &str = "heading";
pub const PARAGRAPH: &str = "paragraph";
pub const BULLET_LIST: &str = "bulletList";
pub const ORDERED_LIST: &str = "orderedList";
pub const LIST_ITEM: &str = "listItem";
pub const TABLE: &str = "table";
pub const TABLE_ROW: &str = "tableRow";
pub const TABLE_CELL: &str = "tableCell";
pub const TABLE_HEADER: &str = "tableHeader";
pub const TEXT: &str = "text";

/// An inline formatting tag attached to a text leaf (bold, italic, link, ...).
/// Preserved verbatim across translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

/// A single node in the document tree. Either a text leaf (`text` set,
/// `content` absent) or a branch (`content` set, `text` absent). `attrs` is
/// an open bag: the schema for any given `type` belongs to the editor, not
/// to this engine, so it is carried through untouched rather than modeled
/// field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Node>>,
}

impl Node {
    pub fn text_leaf(text: impl Into<String>, marks: Option<Vec<Mark>>) -> Self {
        Self {
            kind: TEXT.to_string(),
            attrs: None,
            text: Some(text.into()),
            marks,
            content: None,
        }
    }

    pub fn branch(kind: impl Into<String>, content: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
            text: None,
            marks: None,
            content: Some(content),
        }
    }

    pub fn is_text_leaf(&self) -> bool {
        self.kind == TEXT
    }

    pub fn is_branch(&self) -> bool {
        self.content.is_some()
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_deref().unwrap_or(&[])
    }

    pub fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        self.attrs.get_or_insert_with(Map::new)
    }
}

/// The root document: `{type: "doc", content: [...blocks]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Vec<Node>,
}

impl Document {
    pub fn new(blocks: Vec<Node>) -> Self {
        Self {
            kind: "doc".to_string(),
            content: blocks,
        }
    }
}

/// `paragraph` or `heading` — the two block types that are directly
/// translatable without unwrapping a container first.
pub fn is_translatable_block(kind: &str) -> bool {
    kind == PARAGRAPH || kind == HEADING
}

/// Concatenate every descendant `text` field, space-joined across branches.
pub fn extract_text(node: &Node) -> String {
    if let Some(text) = &node.text {
        return text.clone();
    }
    node.children()
        .iter()
        .map(extract_text)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn extract_document_text(document: &Document) -> String {
    document
        .content
        .iter()
        .map(extract_text)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk `node` in document order, replacing the `text` field of every text
/// leaf with the next value `next` yields. Descends through every branch
/// unconditionally (including unknown wrapper types), so a transparent
/// wrapper is simply never special-cased. Stops replacing once `next`
/// starts returning `None`, but keeps descending so callers can observe
/// how many leaves were left untouched.
pub fn rewrite_text_leaves<F>(node: &mut Node, next: &mut F)
where
    F: FnMut() -> Option<String>,
{
    if node.is_text_leaf() {
        if let Some(replacement) = next() {
            node.text = Some(replacement);
        }
        return;
    }
    if let Some(children) = node.content.as_mut() {
        for child in children.iter_mut() {
            rewrite_text_leaves(child, next);
        }
    }
}

/// Count text leaves reachable from `node`, for diagnostics and tests.
pub fn count_text_leaves(node: &Node) -> usize {
    if node.is_text_leaf() {
        return 1;
    }
    node.children().iter().map(count_text_leaves).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::text_leaf(s, None)
    }

    #[test]
    fn extract_text_joins_descendants_with_space() {
        let para = Node::branch(PARAGRAPH, vec![text("Hello"), text("world")]);
        assert_eq!(extract_text(&para), "Hello world");
    }

    #[test]
    fn extract_text_skips_empty_branches() {
        let list_item = Node::branch(LIST_ITEM, vec![Node::branch(PARAGRAPH, vec![])]);
        assert_eq!(extract_text(&list_item), "");
    }

    #[test]
    fn rewrite_descends_through_unknown_wrapper_types() {
        let mut para = Node::branch(
            PARAGRAPH,
            vec![Node::branch("run", vec![text("original")])],
        );
        let mut replacements = vec!["translated".to_string()].into_iter();
        rewrite_text_leaves(&mut para, &mut || replacements.next());
        assert_eq!(
            extract_text(&para),
            "translated",
            "text inside an unrecognized wrapper must still be rewritten"
        );
    }

    #[test]
    fn rewrite_leaves_excess_leaves_untouched_when_segments_run_out() {
        let mut para = Node::branch(PARAGRAPH, vec![text("a"), text("b"), text("c")]);
        let mut replacements = vec!["A".to_string()].into_iter();
        rewrite_text_leaves(&mut para, &mut || replacements.next());
        let leaves: Vec<_> = para
            .children()
            .iter()
            .map(|n| n.text.clone().unwrap())
            .collect();
        assert_eq!(leaves, vec!["A".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn marks_survive_rewrite() {
        let bold = vec![Mark {
            kind: "bold".to_string(),
            attrs: None,
        }];
        let mut para = Node::branch(PARAGRAPH, vec![Node::text_leaf("FooCorp", Some(bold.clone()))]);
        let mut replacements = vec!["FooCorp".to_string()].into_iter();
        rewrite_text_leaves(&mut para, &mut || replacements.next());
        assert_eq!(para.children()[0].marks, Some(bold));
    }
}
