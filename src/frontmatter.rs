// ABOUTME: YAML frontmatter block codec for packed post documents
// ABOUTME: Splits the header from the body and renders it back in key order

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

const DELIMITER: &str = "---";

/// Header of a packed document. Keys the codec does not know about are kept
/// in `extra` and written back after the known ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub post_type: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cssclasses: Vec<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Returns the header and whatever follows its closing delimiter line.
pub fn parse(document: &str) -> Result<(Frontmatter, &str)> {
    let (yaml, body) = split(document)?;
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)
        .map_err(|e| Error::MalformedHeader(format!("invalid header: {}", e)))?;
    Ok((frontmatter, body))
}

pub fn serialize(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

fn split(document: &str) -> Result<(&str, &str)> {
    let document = document.strip_prefix('\u{feff}').unwrap_or(document);
    let rest = strip_delimiter_line(document)
        .ok_or_else(|| Error::MalformedHeader("missing opening '---' line".into()))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(&['\r', '\n'][..]) == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }

    Err(Error::MalformedHeader("missing closing '---' line".into()))
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(DELIMITER)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}



#[cfg(test)]
mod extra_key_tests {
    use super::*;

    #[test]
    fn test_unknown_keys_pass_through() {
        let doc = "---\nid: p1\ntitle: Demo\naliases:\n- demo\nsummary: kept\n---\nbody";
        let (fm, _) = parse(doc).unwrap();
        assert_eq!(fm.extra.len(), 2);
        assert_eq!(
            fm.extra.get("summary").and_then(|v| v.as_str()),
            Some("kept")
        );

        let again = serialize(&fm, "body").unwrap();
        let aliases = again.find("aliases:").unwrap();
        let summary = again.find("summary:").unwrap();
        let cssclasses = again.find("cssclasses:").unwrap();
        assert!(cssclasses < aliases && aliases < summary);

        let (reparsed, _) = parse(&again).unwrap();
        assert_eq!(reparsed, fm);
    }
}
