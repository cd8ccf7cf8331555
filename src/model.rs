// ABOUTME: Serde data models for the website's post and resource records
// ABOUTME: Tolerant parsing with optional fields and camelCase wire names

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub filename: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[cfg(test)]
mod resource_tests {
    use super::*;

    #[test]
    fn test_resource_deserialize_minimal() {
        let json = r#"{"id": "r1", "filename": "cover.png"}"#;
        let res: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(res.id, "r1");
        assert_eq!(res.filename, "cover.png");
        assert!(res.url.is_empty());
    }

    #[test]
    fn test_resource_deserialize_full() {
        let json = r#"{
            "id": "r1",
            "filename": "cover.png",
            "type": "image",
            "description": "The cover",
            "url": "https://bucket.example/r1",
            "title": "ignored"
        }"#;
        let res: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(res.resource_type, "image");
        assert_eq!(res.url, "https://bucket.example/r1");
    }
}

/// A post as the website's API returns it. `markdown` on the wire is the
/// id of the resource holding the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
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
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub covers: Vec<String>,
    #[serde(default, alias = "markdown")]
    pub markdown_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}


/// Fields published back to the website when pushing local edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub date: String,
    pub tags: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_id: Option<String>,
}
