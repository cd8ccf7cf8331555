// ABOUTME: Packs posts into vault Markdown documents and unpacks them again
// ABOUTME: Combines the frontmatter codec with structural reference translation

use crate::frontmatter::{self, Frontmatter};
use crate::model::Resource;
use crate::post::Post;
use crate::references::{self, ReferenceMap, TranslationReport};
use crate::Result;
use comrak::Arena;
use serde::Serialize;
use serde_yaml::Mapping;
use tracing::debug;

pub const DESCRIPTION_HEADING: &str = "Description";
pub const DESCRIPTION_LEVEL: u8 = 1;
/// Written into `cssclasses` of every packed document.
pub const PACKED_CSS_CLASS: &str = "folio-post";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMarkdownMetadata {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub date: String,
    pub tags: Vec<String>,
    pub post_description: String,
    pub cssclasses: Vec<String>,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnpackedPost {
    pub metadata: PostMarkdownMetadata,
    /// Body with `ref:<id>` image targets.
    pub markdown: String,
    #[serde(skip)]
    pub report: TranslationReport,
}

pub fn unpack(document: &str, resources: &[Resource]) -> Result<UnpackedPost> {
    let (header, body) = frontmatter::parse(document)?;

    let arena = Arena::new();
    let root = references::parse(&arena, body);
    let description = match references::take_section(root, DESCRIPTION_LEVEL, DESCRIPTION_HEADING) {
        Some(text) => text,
        None => {
            debug!(id = %header.id, "document has no description section");
            String::new()
        }
    };

    let map = ReferenceMap::filename_to_id(resources);
    let report = references::rewrite_references(root, &map);
    let markdown = references::render(root)?;

    let Frontmatter {
        id,
        title,
        post_type,
        date,
        tags,
        cssclasses,
        extra,
    } = header;

    Ok(UnpackedPost {
        metadata: PostMarkdownMetadata {
            id,
            title,
            post_type,
            date,
            tags,
            post_description: description,
            cssclasses,
            extra,
        },
        markdown,
        report,
    })
}

pub fn pack(post: &Post) -> Result<String> {
    pack_with_report(post).map(|(document, _)| document)
}

pub fn pack_with_report(post: &Post) -> Result<(String, TranslationReport)> {
    let map = ReferenceMap::id_to_filename(&post.resources);

    let arena = Arena::new();
    let root = references::parse(&arena, &post.body);
    let report = references::rewrite_references(root, &map);
    references::prepend_section(
        &arena,
        root,
        DESCRIPTION_LEVEL,
        DESCRIPTION_HEADING,
        &post.description,
    );
    let mut body = references::render(root)?;
    body.push('\n');

    let header = Frontmatter {
        id: post.id.clone(),
        title: post.title.clone(),
        post_type: post.post_type.clone(),
        date: post.date.clone(),
        tags: post.tags.clone(),
        cssclasses: vec![PACKED_CSS_CLASS.to_string()],
        extra: post.extra.clone(),
    };

    Ok((frontmatter::serialize(&header, &body)?, report))
}


#[cfg(test)]
mod pack_tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_pack_demo_post() {
        let doc = pack(&demo_post()).unwrap();
        assert!(doc.starts_with("---\nid: p1\n"));
        assert!(doc.contains("cssclasses:\n- folio-post\n"));
        assert!(doc.ends_with("---\n# Description\n\nA demo project.\n\nSee ![cover](cover.png) above.\n"));
    }

    #[test]
    fn test_pack_reports_unresolved() {
        let mut post = demo_post();
        post.body = "![a](ref:r1) ![b](ref:r404)".into();
        let (doc, report) = pack_with_report(&post).unwrap();
        assert!(doc.contains("![a](cover.png) ![b](ref:r404)"));
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.unresolved, vec!["ref:r404".to_string()]);
    }

    #[test]
    fn test_pack_is_deterministic() {
        let mut post = demo_post();
        post.resources.push(resource("r2", "second.png"));
        let first = pack(&post).unwrap();
        post.resources.reverse();
        assert_eq!(pack(&post).unwrap(), first);
    }
}


#[cfg(test)]
mod round_trip_tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_round_trip_rich_post() {
        let post = Post {
            id: "p2".into(),
            title: "Rich: a post with punctuation".into(),
            post_type: "blog".into(),
            date: "2022-12-31".into(),
            tags: vec!["rust".into(), "web dev".into()],
            description: "Covers *emphasis* and [brackets] too".into(),
            resources: vec![
                resource("r1", "cover.png"),
                resource("r2", "plot.svg"),
                resource("md", "p2.md"),
            ],
            body: "## Intro\n\n![cover](ref:r1)\n\n| a | b |\n| --- | --- |\n| 1 | 2 |\n\n- [ ] task\n- [x] done\n\n```rust\nfn main() {}\n```\n\nInline `code` and ![plot](ref:r2 \"Plot\")"
                .into(),
            ..Post::default()
        };

        let doc = pack(&post).unwrap();
        assert!(doc.contains("![cover](cover.png)"));
        assert!(doc.contains("![plot](plot.svg \"Plot\")"));

        let unpacked = unpack(&doc, &post.resources).unwrap();
        assert_eq!(unpacked.metadata.id, post.id);
        assert_eq!(unpacked.metadata.title, post.title);
        assert_eq!(unpacked.metadata.post_type, post.post_type);
        assert_eq!(unpacked.metadata.date, post.date);
        assert_eq!(unpacked.metadata.tags, post.tags);
        assert_eq!(unpacked.metadata.post_description, post.description);

        let normalized = references::translate(&post.body, &ReferenceMap::default())
            .unwrap()
            .0;
        assert_eq!(unpacked.markdown, normalized);
    }

    #[test]
    fn test_repeated_round_trips_are_stable() {
        let mut post = demo_post();
        let first = pack(&post).unwrap();
        for _ in 0..3 {
            let unpacked = unpack(&pack(&post).unwrap(), &post.resources).unwrap();
            post.body = unpacked.markdown;
            post.description = unpacked.metadata.post_description;
        }
        assert_eq!(pack(&post).unwrap(), first);
    }

    #[test]
    fn test_round_trip_filenames_needing_escapes() {
        for filename in ["my cover (1).png", "Pasted image 20240101.png", "a&b.png", "über.png"] {
            let mut post = demo_post();
            post.resources = vec![resource("r1", filename)];

            let (doc, report) = pack_with_report(&post).unwrap();
            assert!(report.is_complete(), "{filename}: {report:?}");
            assert!(!doc.contains("ref:r1"), "{filename}: {doc}");

            let unpacked = unpack(&doc, &post.resources).unwrap();
            assert_eq!(unpacked.markdown, post.body, "{filename}");
            assert!(unpacked.report.is_complete(), "{filename}: {:?}", unpacked.report);
        }
    }

    #[test]
    fn test_round_trip_descriptions_verbatim() {
        for description in [
            "Para one.\n\nPara two.",
            "  indented start",
            "hard break  \nnext line",
            "line one\nline two",
            "# not a heading",
        ] {
            let mut post = demo_post();
            post.description = description.into();
            let unpacked = unpack(&pack(&post).unwrap(), &post.resources).unwrap();
            assert_eq!(unpacked.metadata.post_description, description);
            assert_eq!(unpacked.markdown, post.body);
        }
    }

    #[test]
    fn test_extra_frontmatter_keys_round_trip() {
        let mut post = demo_post();
        post.extra
            .insert("aliases".into(), serde_yaml::Value::Sequence(vec!["demo".into()]));
        let unpacked = unpack(&pack(&post).unwrap(), &post.resources).unwrap();
        assert_eq!(unpacked.metadata.extra, post.extra);
    }
}
