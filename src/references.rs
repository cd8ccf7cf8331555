// ABOUTME: Structural rewriting of resource references in Markdown trees
// ABOUTME: Maps filename <-> ref:<id> targets and splices the description section

use crate::model::Resource;
use crate::{Error, Result};
use comrak::nodes::{Ast, AstNode, LineColumn, NodeCodeBlock, NodeHeading, NodeHtmlBlock, NodeValue};
use comrak::{format_commonmark, parse_document, Arena, Options};
use std::cell::RefCell;
use std::collections::btree_map::{BTreeMap, Entry};
use tracing::warn;

/// Prefix of an id-addressed reference target, e.g. `ref:r1`.
pub const ID_SCHEME: &str = "ref:";

/// Stands in for the paragraph of a section whose text is empty.
pub const EMPTY_SECTION_MARKER: &str = "<!-- no description -->";

/// Info string of the fenced block holding section text that a paragraph
/// would not reproduce exactly.
pub const VERBATIM_SECTION_INFO: &str = "description";

pub fn id_reference(id: &str) -> String {
    format!("{ID_SCHEME}{id}")
}

/// One direction of the filename <-> id translation for a single post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    entries: BTreeMap<String, String>,
}

impl ReferenceMap {
    /// `cover.png -> ref:r1`. A filename shared by several resources maps to
    /// the smallest id.
    pub fn filename_to_id(resources: &[Resource]) -> Self {
        let mut sorted: Vec<&Resource> = resources.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut entries = BTreeMap::new();
        for resource in sorted {
            if resource.filename.is_empty() {
                continue;
            }
            match entries.entry(resource.filename.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(id_reference(&resource.id));
                }
                Entry::Occupied(kept) => {
                    warn!(
                        filename = %resource.filename,
                        kept = %kept.get(),
                        dropped = %resource.id,
                        "duplicate resource filename"
                    );
                }
            }
        }
        ReferenceMap { entries }
    }

    /// `ref:r1 -> cover.png`.
    pub fn id_to_filename(resources: &[Resource]) -> Self {
        let mut sorted: Vec<&Resource> = resources.iter().collect();
        sorted.sort_by(|a, b| (&a.id, &a.filename).cmp(&(&b.id, &b.filename)));

        let mut entries = BTreeMap::new();
        for resource in sorted {
            if resource.filename.is_empty() {
                continue;
            }
            entries
                .entry(id_reference(&resource.id))
                .or_insert_with(|| resource.filename.clone());
        }
        ReferenceMap { entries }
    }

    pub fn inverse(&self) -> Self {
        let mut entries = BTreeMap::new();
        for (from, to) in &self.entries {
            entries.entry(to.clone()).or_insert_with(|| from.clone());
        }
        ReferenceMap { entries }
    }

    pub fn get(&self, target: &str) -> Option<&str> {
        self.entries.get(target).map(String::as_str)
    }

    /// Like [`get`](Self::get), but also tries the percent-decoded target.
    /// The CommonMark renderer writes `my cover.png` as `my%20cover.png`.
    pub fn resolve(&self, target: &str) -> Option<&str> {
        self.get(target).or_else(|| {
            let decoded = urlencoding::decode(target).ok()?;
            if decoded == target {
                None
            } else {
                self.get(&decoded)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of one rewrite pass. Local image targets with no mapping are left
/// unchanged and listed in `unresolved`; remote URLs are never listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    pub rewritten: usize,
    pub unresolved: Vec<String>,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

pub fn options() -> Options {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options
}

pub fn parse<'a>(arena: &'a Arena<AstNode<'a>>, markdown: &str) -> &'a AstNode<'a> {
    parse_document(arena, markdown, &options())
}

/// CommonMark text of `root`, trailing whitespace trimmed.
pub fn render<'a>(root: &'a AstNode<'a>) -> Result<String> {
    let mut out = Vec::new();
    format_commonmark(root, &options(), &mut out).map_err(|e| Error::Render(e.to_string()))?;
    let text = String::from_utf8(out).map_err(|e| Error::Render(e.to_string()))?;
    Ok(text.trim_end().to_string())
}

pub fn rewrite_references<'a>(root: &'a AstNode<'a>, map: &ReferenceMap) -> TranslationReport {
    let mut report = TranslationReport::default();

    for node in root.descendants() {
        let mut ast = node.data.borrow_mut();
        match ast.value {
            NodeValue::Image(ref mut link) => match map.resolve(&link.url) {
                Some(target) => {
                    link.url = target.to_string();
                    report.rewritten += 1;
                }
                None if is_local_target(&link.url) => report.unresolved.push(link.url.clone()),
                None => {}
            },
            NodeValue::Link(ref mut link) => {
                if let Some(target) = map.resolve(&link.url) {
                    link.url = target.to_string();
                    report.rewritten += 1;
                }
            }
            _ => {}
        }
    }

    report
}

/// Vault filenames and `ref:` ids, as opposed to URLs on another host.
fn is_local_target(url: &str) -> bool {
    !(url.is_empty()
        || url.contains("://")
        || url.starts_with("//")
        || url.starts_with('#')
        || url.starts_with("data:")
        || url.starts_with("mailto:"))
}

pub fn translate(markdown: &str, map: &ReferenceMap) -> Result<(String, TranslationReport)> {
    let arena = Arena::new();
    let root = parse(&arena, markdown);
    let report = rewrite_references(root, map);
    Ok((render(root)?, report))
}

/// Image targets in document order.
pub fn image_targets(markdown: &str) -> Vec<String> {
    let arena = Arena::new();
    let root = parse(&arena, markdown);
    root.descendants()
        .filter_map(|node| match node.data.borrow().value {
            NodeValue::Image(ref link) => Some(link.url.clone()),
            _ => None,
        })
        .collect()
}

fn new_node<'a>(arena: &'a Arena<AstNode<'a>>, value: NodeValue) -> &'a AstNode<'a> {
    arena.alloc(AstNode::new(RefCell::new(Ast::new(
        value,
        LineColumn { line: 0, column: 0 },
    ))))
}

/// Inserts `heading` followed by one block carrying `text` before the first
/// child of `root`. Text that a paragraph cannot reproduce exactly (blank
/// lines, edge whitespace) goes into a fenced block instead.
pub fn prepend_section<'a>(
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    level: u8,
    heading: &str,
    text: &str,
) {
    let heading_node = new_node(arena, NodeValue::Heading(NodeHeading { level, setext: false }));
    heading_node.append(new_node(arena, NodeValue::Text(heading.to_string())));

    let block = if text.is_empty() {
        new_node(
            arena,
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 2,
                literal: format!("{EMPTY_SECTION_MARKER}\n"),
            }),
        )
    } else if fits_paragraph(text) {
        let paragraph = new_node(arena, NodeValue::Paragraph);
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                paragraph.append(new_node(arena, NodeValue::SoftBreak));
            }
            paragraph.append(new_node(arena, NodeValue::Text(line.to_string())));
        }
        paragraph
    } else {
        new_node(
            arena,
            NodeValue::CodeBlock(NodeCodeBlock {
                fenced: true,
                fence_char: b'`',
                fence_length: 3,
                fence_offset: 0,
                info: VERBATIM_SECTION_INFO.to_string(),
                literal: format!("{text}\n"),
            }),
        )
    };

    root.prepend(block);
    root.prepend(heading_node);
}

/// Removes a section written by [`prepend_section`] and returns its text.
/// Returns `None`, leaving the tree alone, when `root` does not open with a
/// matching heading.
pub fn take_section<'a>(root: &'a AstNode<'a>, level: u8, heading: &str) -> Option<String> {
    let first = root.first_child()?;
    if !is_heading(first, Some(level)) || plain_text(first).trim() != heading {
        return None;
    }

    let block = first.next_sibling();
    first.detach();

    let text = match block {
        Some(node) if !is_heading(node, None) => {
            let text = match node.data.borrow().value {
                NodeValue::HtmlBlock(ref html) if html.literal.trim() == EMPTY_SECTION_MARKER => {
                    String::new()
                }
                NodeValue::CodeBlock(ref code) if code.info == VERBATIM_SECTION_INFO => code
                    .literal
                    .strip_suffix('\n')
                    .unwrap_or(&code.literal)
                    .to_string(),
                _ => plain_text(node).trim().to_string(),
            };
            node.detach();
            text
        }
        _ => String::new(),
    };

    Some(text)
}

/// True when a plain paragraph parses back to exactly `text`.
fn fits_paragraph(text: &str) -> bool {
    !text.contains('\r')
        && !text.ends_with('\n')
        && text
            .lines()
            .all(|line| !line.trim().is_empty() && line.trim() == line)
}

fn is_heading<'a>(node: &'a AstNode<'a>, level: Option<u8>) -> bool {
    match node.data.borrow().value {
        NodeValue::Heading(ref h) => level.map_or(true, |l| h.level == l),
        _ => false,
    }
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.descendants() {
        match child.data.borrow().value {
            NodeValue::Text(ref t) => text.push_str(t),
            NodeValue::Code(ref code) => text.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push('\n'),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
fn resource(id: &str, filename: &str) -> Resource {
    Resource {
        id: id.into(),
        filename: filename.into(),
        resource_type: "image".into(),
        description: String::new(),
        url: String::new(),
    }
}

#[cfg(test)]
mod map_tests {
    use super::*;

    #[test]
    fn test_filename_to_id() {
        let map = ReferenceMap::filename_to_id(&[resource("r1", "cover.png"), resource("r2", "diagram.svg")]);
        assert_eq!(map.get("cover.png"), Some("ref:r1"));
        assert_eq!(map.get("diagram.svg"), Some("ref:r2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_id_to_filename_is_inverse() {
        let resources = [resource("r1", "cover.png"), resource("r2", "diagram.svg")];
        let forward = ReferenceMap::filename_to_id(&resources);
        let backward = ReferenceMap::id_to_filename(&resources);
        assert_eq!(forward.inverse(), backward);
        assert_eq!(backward.inverse(), forward);
    }

    #[test]
    fn test_construction_ignores_resource_order() {
        let mut resources = vec![
            resource("r3", "c.png"),
            resource("r1", "a.png"),
            resource("r2", "b.png"),
            resource("r4", "a.png"),
        ];
        let first = ReferenceMap::filename_to_id(&resources);
        let first_back = ReferenceMap::id_to_filename(&resources);
        resources.reverse();
        assert_eq!(ReferenceMap::filename_to_id(&resources), first);
        assert_eq!(ReferenceMap::id_to_filename(&resources), first_back);
        resources.swap(0, 2);
        assert_eq!(ReferenceMap::filename_to_id(&resources), first);
    }

    #[test]
    fn test_duplicate_filename_keeps_smallest_id() {
        let map = ReferenceMap::filename_to_id(&[resource("r9", "a.png"), resource("r2", "a.png")]);
        assert_eq!(map.get("a.png"), Some("ref:r2"));
    }

    #[test]
    fn test_empty_filenames_skipped() {
        let map = ReferenceMap::filename_to_id(&[resource("r1", "")]);
        assert!(map.is_empty());
        assert!(ReferenceMap::id_to_filename(&[resource("r1", "")]).is_empty());
    }
}
