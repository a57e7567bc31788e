//! Document accumulator (C9): owns a deep clone of the original tree,
//! collects translated batches, and rebuilds the document incrementally
//! as milestones are crossed.

use std::collections::HashMap;

use crate::model::{
    rewrite_text_leaves, Document, Node, BULLET_LIST, LIST_ITEM, ORDERED_LIST, TABLE, TABLE_CELL,
    TABLE_HEADER,
};
use crate::translator::BatchTranslation;

/// Sink invoked whenever a milestone-triggered rebuild produces a fresh
/// document snapshot.
pub trait DocumentUpdateSink: Send + Sync {
    fn on_update(&self, document: &Document, progress_percent: u8);
}

impl<F: Fn(&Document, u8) + Send + Sync> DocumentUpdateSink for F {
    fn on_update(&self, document: &Document, progress_percent: u8) {
        self(document, progress_percent)
    }
}

pub struct DocumentAccumulator {
    original: Document,
    total_batches: usize,
    completed: HashMap<usize, BatchTranslation>,
    milestones: Vec<u8>,
    reached_milestones: Vec<u8>,
    on_update: Option<Box<dyn DocumentUpdateSink>>,
}

impl DocumentAccumulator {
    pub fn new(
        original: Document,
        total_batches: usize,
        milestones: Vec<u8>,
        on_update: Option<Box<dyn DocumentUpdateSink>>,
    ) -> Self {
        Self {
            original,
            total_batches,
            completed: HashMap::new(),
            milestones,
            reached_milestones: Vec::new(),
            on_update,
        }
    }

    /// Pre-populate from a resumed session's already-completed batches,
    /// without re-firing milestones for progress already made before the
    /// crash/pause.
    pub fn seed_completed(&mut self, batches: Vec<BatchTranslation>) {
        let progress = self.progress_percent_for(batches.len());
        for batch in batches {
            self.completed.insert(batch.batch_index, batch);
        }
        self.reached_milestones = self
            .milestones
            .iter()
            .copied()
            .filter(|m| *m <= progress)
            .collect();
    }

    fn progress_percent_for(&self, completed_count: usize) -> u8 {
        if self.total_batches == 0 {
            return 100;
        }
        ((completed_count as f64 / self.total_batches as f64) * 100.0).round() as u8
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent_for(self.completed.len())
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Inserts `result`, and if progress has newly crossed a milestone,
    /// rebuilds the document and notifies the update sink. Returns the
    /// rebuilt document only when a rebuild actually happened.
    pub fn add_batch(&mut self, result: BatchTranslation) -> Option<Document> {
        self.completed.insert(result.batch_index, result);
        let progress = self.progress_percent();

        let crossed = self
            .milestones
            .iter()
            .copied()
            .find(|m| *m <= progress && !self.reached_milestones.contains(m));
        let Some(crossed) = crossed else {
            return None;
        };
        self.reached_milestones.push(crossed);

        let rebuilt = self.rebuild_document();
        if let Some(sink) = &self.on_update {
            sink.on_update(&rebuilt, progress);
        }
        Some(rebuilt)
    }

    /// Produces a fresh deep clone of the original tree with every
    /// translated paragraph applied so far. Pure w.r.t. accumulator state:
    /// safe to call repeatedly (e.g. for a final rebuild at completion).
    pub fn rebuild_document(&self) -> Document {
        let mut document = self.original.clone();
        let by_node_and_paragraph = group_segments(&self.completed);

        for (node_index, block) in document.content.iter_mut().enumerate() {
            let Some(paragraphs) = by_node_and_paragraph.get(&node_index) else {
                continue;
            };
            apply_translations_to_block(block, paragraphs);
        }

        sanitize_lists(&mut document);
        document
    }
}

/// `nodeIndex -> paragraphIndex -> ordered translated texts (one per text
/// leaf encountered, in document order within that paragraph)`. Segments
/// already carry their source `node_index`/`paragraph_index`, so no id
/// parsing is needed.
fn group_segments(
    completed: &HashMap<usize, BatchTranslation>,
) -> HashMap<usize, HashMap<usize, Vec<String>>> {
    let mut grouped: HashMap<usize, HashMap<usize, Vec<String>>> = HashMap::new();
    for batch in completed.values() {
        for segment in &batch.segments {
            grouped
                .entry(segment.node_index)
                .or_default()
                .entry(segment.paragraph_index)
                .or_default()
                .push(segment.translated_text.clone());
        }
    }
    grouped
}

fn apply_translations_to_block(block: &mut Node, paragraphs: &HashMap<usize, Vec<String>>) {
    match block.kind.as_str() {
        crate::model::PARAGRAPH | crate::model::HEADING => {
            if let Some(texts) = paragraphs.get(&0) {
                apply_texts(block, texts);
            }
        }
        BULLET_LIST | ORDERED_LIST => {
            let mut next_index = 0usize;
            walk_and_apply(block, LIST_ITEM, paragraphs, &mut next_index);
        }
        TABLE => {
            let mut next_index = 0usize;
            walk_and_apply(block, TABLE_CELL, paragraphs, &mut next_index);
            walk_and_apply(block, TABLE_HEADER, paragraphs, &mut next_index);
        }
        _ => {}
    }
}

fn walk_and_apply(
    node: &mut Node,
    container_kind: &str,
    paragraphs: &HashMap<usize, Vec<String>>,
    next_index: &mut usize,
) {
    if node.kind == container_kind {
        if let Some(content) = node.content.as_mut() {
            for child in content.iter_mut() {
                if crate::model::is_translatable_block(&child.kind) {
                    if let Some(texts) = paragraphs.get(next_index) {
                        apply_texts(child, texts);
                    }
                    *next_index += 1;
                }
            }
        }
    }
    if let Some(content) = node.content.as_mut() {
        for child in content.iter_mut() {
            walk_and_apply(child, container_kind, paragraphs, next_index);
        }
    }
}

/// Consumes `texts` one per text leaf, in document order, through
/// transparent wrappers. Excess leaves (more leaves than texts) are left
/// untouched; excess texts are ignored.
fn apply_texts(node: &mut Node, texts: &[String]) {
    let mut iter = texts.iter().cloned();
    rewrite_text_leaves(node, &mut || iter.next());
}

fn sanitize_lists(document: &mut Document) {
    for block in document.content.iter_mut() {
        sanitize_lists_in(block);
    }
}

/// Sets `attrs[key]` to `default` unless it's already present with a
/// non-null value. An explicit `null` counts as missing: list sanitization
/// is unconditional, even over an original tree's explicit nulls.
fn set_default_unless_present(
    attrs: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
    default: serde_json::Value,
) {
    if attrs.get(key).map_or(true, serde_json::Value::is_null) {
        attrs.insert(key.to_string(), default);
    }
}

fn sanitize_lists_in(node: &mut Node) {
    match node.kind.as_str() {
        ORDERED_LIST => {
            let attrs = node.attrs_mut();
            set_default_unless_present(attrs, "listStyleType", serde_json::json!("decimal"));
            set_default_unless_present(attrs, "start", serde_json::json!(1));
        }
        BULLET_LIST => {
            let attrs = node.attrs_mut();
            set_default_unless_present(attrs, "listStyleType", serde_json::json!("disc"));
        }
        _ => {}
    }
    if let Some(content) = node.content.as_mut() {
        for child in content.iter_mut() {
            sanitize_lists_in(child);
        }
    }
}
