//! Batching engine (C7): walks the document into sections, then emits
//! batches that respect word-count bounds and section integrity.

use serde::{Deserialize, Serialize};

use crate::config::TranslationConfig;
use crate::model::{
    extract_text, is_translatable_block, Document, Mark, Node, BULLET_LIST, HEADING, LIST_ITEM,
    ORDERED_LIST, PARAGRAPH, TABLE, TABLE_CELL, TABLE_HEADER,
};

/// A contiguous text leaf inside a paragraph; the atomic unit of the
/// translator's structured I/O. `id` is local to its paragraph (`s_<k>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub text: String,
    pub marks: Vec<Mark>,
}

impl Segment {
    /// The batch-scoped id (`p<paragraphIndex>_<localId>`) the translator
    /// uses as the structured-output key.
    pub fn global_id(&self, paragraph_index: usize) -> String {
        format!("p{paragraph_index}_{}", self.id)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// `{nodeIndex, paragraphIndex, segments[], originalNode}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub node_index: usize,
    pub paragraph_index: usize,
    pub segments: Vec<Segment>,
    pub original_node: Node,
}

impl Paragraph {
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(Segment::word_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub level: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub paragraphs: Vec<Paragraph>,
}

impl Section {
    pub fn word_count(&self) -> usize {
        self.paragraphs.iter().map(Paragraph::word_count).sum()
    }
}

/// `{batchIndex, sectionId, sectionTitle, paragraphs[], wordCount,
/// isPartialSection?, partNumber?, totalParts?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_index: usize,
    pub section_id: String,
    pub section_title: String,
    pub paragraphs: Vec<Paragraph>,
    pub word_count: usize,
    pub is_partial_section: bool,
    pub part_number: Option<usize>,
    pub total_parts: Option<usize>,
}

/// Recursively collect every descendant text leaf, in document order,
/// descending through transparent wrappers without exception.
fn collect_segments(node: &Node) -> Vec<Segment> {
    let mut out = Vec::new();
    collect_segments_into(node, &mut out);
    out
}

fn collect_segments_into(node: &Node, out: &mut Vec<Segment>) {
    if node.is_text_leaf() {
        let k = out.len();
        out.push(Segment {
            id: format!("s_{k}"),
            text: node.text.clone().unwrap_or_default(),
            marks: node.marks.clone().unwrap_or_default(),
        });
        return;
    }
    for child in node.children() {
        collect_segments_into(child, out);
    }
}

/// Walks every `listItem` descendant of a list block (at any depth, so
/// nested lists are covered too) and harvests its direct `paragraph`
/// children as translatable paragraphs, in document order.
fn harvest_list_paragraphs(list_node: &Node) -> Vec<(Node, Vec<Segment>)> {
    let mut results = Vec::new();
    walk_harvest(list_node, LIST_ITEM, &mut results);
    results
}

/// Walks every `tableCell`/`tableHeader` descendant of a table block and
/// harvests its direct `paragraph` children.
fn harvest_table_paragraphs(table_node: &Node) -> Vec<(Node, Vec<Segment>)> {
    let mut results = Vec::new();
    walk_harvest(table_node, TABLE_CELL, &mut results);
    walk_harvest(table_node, TABLE_HEADER, &mut results);
    results
}

fn walk_harvest(node: &Node, container_kind: &str, out: &mut Vec<(Node, Vec<Segment>)>) {
    if node.kind == container_kind {
        for child in node.children() {
            if is_translatable_block(&child.kind) {
                let segments = collect_segments(child);
                if !segments.is_empty() {
                    out.push((child.clone(), segments));
                }
            }
        }
    }
    for child in node.children() {
        walk_harvest(child, container_kind, out);
    }
}

fn harvest_paragraphs_for_block(block: &Node) -> Vec<(Node, Vec<Segment>)> {
    match block.kind.as_str() {
        PARAGRAPH | HEADING => {
            let segments = collect_segments(block);
            if segments.is_empty() {
                Vec::new()
            } else {
                vec![(block.clone(), segments)]
            }
        }
        BULLET_LIST | ORDERED_LIST => harvest_list_paragraphs(block),
        TABLE => harvest_table_paragraphs(block),
        _ => Vec::new(),
    }
}

struct SectionBuilder {
    title: String,
    level: usize,
    start_index: usize,
    end_index: usize,
    paragraphs: Vec<Paragraph>,
}

impl SectionBuilder {
    fn new(title: String, level: usize, start_index: usize) -> Self {
        Self {
            title,
            level,
            start_index,
            end_index: start_index,
            paragraphs: Vec::new(),
        }
    }

    fn finish(self, id: String) -> Section {
        Section {
            id,
            title: self.title,
            level: self.level,
            start_index: self.start_index,
            end_index: self.end_index,
            paragraphs: self.paragraphs,
        }
    }
}

/// Scans the document's top-level blocks into sections: a section spans
/// from a heading (or the document start) up to but not including the
/// next heading. Sections with no harvested paragraphs are dropped.
pub fn extract_sections(document: &Document) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<SectionBuilder> = None;

    for (i, block) in document.content.iter().enumerate() {
        if block.kind == HEADING {
            if let Some(builder) = current.take() {
                if !builder.paragraphs.is_empty() {
                    sections.push(builder);
                }
            }
            let level = block
                .attrs
                .as_ref()
                .and_then(|a| a.get("level"))
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as usize;
            current = Some(SectionBuilder::new(extract_text(block), level, i));
        }
        if current.is_none() {
            current = Some(SectionBuilder::new("Document Start".to_string(), 0, i));
        }

        let builder = current.as_mut().expect("section builder just ensured");
        builder.end_index = i;
        for (paragraph_index, (original_node, segments)) in
            harvest_paragraphs_for_block(block).into_iter().enumerate()
        {
            builder.paragraphs.push(Paragraph {
                node_index: i,
                paragraph_index,
                segments,
                original_node,
            });
        }
    }
    if let Some(builder) = current.take() {
        if !builder.paragraphs.is_empty() {
            sections.push(builder);
        }
    }

    sections
        .into_iter()
        .enumerate()
        .map(|(i, b)| b.finish(format!("section_{i}")))
        .collect()
}

struct PartialBatch {
    paragraphs: Vec<Paragraph>,
    word_count: usize,
}

/// Splits an over-long section into TARGET-sized parts. A single paragraph
/// larger than MAX is allowed to stand alone (never subdivided). Whether a
/// too-small trailing part gets merged into its predecessor is left
/// undecided by the source and is not done here (see SPEC_FULL.md §9).
fn split_section(section: &Section, config: &TranslationConfig) -> Vec<PartialBatch> {
    let mut parts = Vec::new();
    let mut current: Vec<Paragraph> = Vec::new();
    let mut current_words = 0usize;

    for paragraph in &section.paragraphs {
        let words = paragraph.word_count();
        if !current.is_empty() && current_words + words > config.target_batch_words {
            parts.push(PartialBatch {
                paragraphs: std::mem::take(&mut current),
                word_count: current_words,
            });
            current_words = 0;
        }
        current.push(paragraph.clone());
        current_words += words;
    }
    if !current.is_empty() {
        parts.push(PartialBatch {
            paragraphs: current,
            word_count: current_words,
        });
    }
    parts
}

/// A section whose total word count is at most MAX becomes a single
/// batch; otherwise it is split into TARGET-sized parts via
/// [`split_section`]. Returns a flat ordered list across all sections.
pub fn create_batches(document: &Document, config: &TranslationConfig) -> Vec<Batch> {
    let sections = extract_sections(document);
    let mut batches = Vec::new();

    for section in sections {
        let total_words = section.word_count();
        if total_words <= config.max_batch_words {
            batches.push(Batch {
                batch_index: batches.len(),
                section_id: section.id.clone(),
                section_title: section.title.clone(),
                paragraphs: section.paragraphs,
                word_count: total_words,
                is_partial_section: false,
                part_number: None,
                total_parts: None,
            });
        } else {
            let parts = split_section(&section, config);
            let total_parts = parts.len();
            for (i, part) in parts.into_iter().enumerate() {
                batches.push(Batch {
                    batch_index: batches.len(),
                    section_id: section.id.clone(),
                    section_title: section.title.clone(),
                    paragraphs: part.paragraphs,
                    word_count: part.word_count,
                    is_partial_section: true,
                    part_number: Some(i + 1),
                    total_parts: Some(total_parts),
                });
            }
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::text_leaf(s, None)
    }

    fn heading(level: u64, title: &str) -> Node {
        let mut node = Node::branch(HEADING, vec![text(title)]);
        node.attrs_mut()
            .insert("level".to_string(), serde_json::json!(level));
        node
    }

    fn paragraph_of_words(word: &str, count: usize) -> Node {
        Node::branch(PARAGRAPH, vec![text(&vec![word; count].join(" "))])
    }

    #[test]
    fn single_paragraph_with_no_heading_is_document_start_section() {
        let document = Document::new(vec![Node::branch(PARAGRAPH, vec![text("Hello world")])]);
        let sections = extract_sections(&document);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Document Start");
    }

    #[test]
    fn heading_starts_a_new_section_including_itself() {
        let document = Document::new(vec![
            heading(1, "Intro"),
            Node::branch(PARAGRAPH, vec![text("body")]),
        ]);
        let sections = extract_sections(&document);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Intro");
        assert_eq!(sections[0].paragraphs.len(), 2);
    }

    #[test]
    fn empty_paragraphs_produce_no_section() {
        let document = Document::new(vec![heading(1, ""), Node::branch(PARAGRAPH, vec![])]);
        let sections = extract_sections(&document);
        assert!(sections.is_empty());
    }

    #[test]
    fn section_under_max_words_is_a_single_batch() {
        let config = TranslationConfig::default();
        let document = Document::new(vec![
            heading(1, "Intro"),
            paragraph_of_words("word", 1000),
        ]);
        let batches = create_batches(&document, &config);
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].is_partial_section);
    }

    #[test]
    fn oversized_section_splits_into_target_sized_parts() {
        let config = TranslationConfig::default();
        let mut blocks = vec![heading(1, "Big")];
        for _ in 0..6 {
            blocks.push(paragraph_of_words("word", 400));
        }
        let document = Document::new(blocks);
        let batches = create_batches(&document, &config);
        assert_eq!(batches.len(), 3);
        for (i, batch) in batches.iter().enumerate() {
            assert!(batch.is_partial_section);
            assert_eq!(batch.part_number, Some(i + 1));
            assert_eq!(batch.total_parts, Some(3));
            assert!(batch.word_count <= config.target_batch_words);
        }
    }

    #[test]
    fn oversized_single_paragraph_is_not_split() {
        let config = TranslationConfig::default();
        let document = Document::new(vec![
            heading(1, "Huge"),
            paragraph_of_words("word", 2000),
        ]);
        let batches = create_batches(&document, &config);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].word_count > config.max_batch_words);
    }

    #[test]
    fn list_items_are_harvested_as_individual_paragraphs() {
        let list = Node::branch(
            BULLET_LIST,
            vec![
                Node::branch(
                    LIST_ITEM,
                    vec![Node::branch(PARAGRAPH, vec![text("first")])],
                ),
                Node::branch(
                    LIST_ITEM,
                    vec![Node::branch(PARAGRAPH, vec![text("second")])],
                ),
            ],
        );
        let document = Document::new(vec![list]);
        let sections = extract_sections(&document);
        assert_eq!(sections[0].paragraphs.len(), 2);
        assert_eq!(sections[0].paragraphs[0].paragraph_index, 0);
        assert_eq!(sections[0].paragraphs[1].paragraph_index, 1);
    }

    #[test]
    fn table_cells_are_harvested_as_individual_paragraphs() {
        let table = Node::branch(
            TABLE,
            vec![Node::branch(
                "tableRow",
                vec![
                    Node::branch(
                        TABLE_HEADER,
                        vec![Node::branch(PARAGRAPH, vec![text("Name")])],
                    ),
                    Node::branch(
                        TABLE_CELL,
                        vec![Node::branch(PARAGRAPH, vec![text("Alice")])],
                    ),
                ],
            )],
        );
        let document = Document::new(vec![table]);
        let sections = extract_sections(&document);
        assert_eq!(sections[0].paragraphs.len(), 2);
    }
}
