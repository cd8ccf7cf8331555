// ABOUTME: In-memory post aggregate built from remote records
// ABOUTME: Owns the codec calls that produce or absorb packed documents

use crate::codec::{self, UnpackedPost};
use crate::model::{PostRecord, PostUpdate, Resource};
use crate::references::{self, TranslationReport, ID_SCHEME};
use crate::util::normalize_date;
use crate::{Error, Result};
use serde_yaml::Mapping;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub post_type: String,
    pub date: String,
    pub tags: Vec<String>,
    pub description: String,
    pub notes: String,
    pub covers: Vec<String>,
    pub markdown_id: Option<String>,
    /// Markdown with `ref:<id>` image targets.
    pub body: String,
    pub resources: Vec<Resource>,
    /// Frontmatter keys with no field of their own.
    pub extra: Mapping,
}

impl Post {
    pub fn from_record(record: PostRecord, body: String) -> Result<Self> {
        let post = Post {
            id: record.id,
            title: record.title,
            post_type: record.post_type,
            date: normalize_date(&record.date),
            tags: dedup_tags(record.tags),
            description: record.description,
            notes: record.notes,
            covers: record.covers,
            markdown_id: record.markdown_id,
            body,
            resources: record.resources,
            extra: Mapping::new(),
        };
        post.validate()?;
        Ok(post)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Invariant("post has an empty id".into()));
        }
        if let Some(markdown_id) = &self.markdown_id {
            if self.resource(markdown_id).is_none() {
                return Err(Error::Invariant(format!(
                    "post {} names markdown resource {} which it does not own",
                    self.id, markdown_id
                )));
            }
        }
        if let Some(cover) = self.covers.iter().find(|c| self.resource(c).is_none()) {
            return Err(Error::Invariant(format!(
                "post {} names cover {} which it does not own",
                self.id, cover
            )));
        }
        Ok(())
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn markdown_resource(&self) -> Option<&Resource> {
        self.markdown_id.as_deref().and_then(|id| self.resource(id))
    }

    pub fn cover_resources(&self) -> impl Iterator<Item = &Resource> {
        self.covers.iter().filter_map(|id| self.resource(id))
    }

    /// Resources other than the markdown body.
    pub fn attachments(&self) -> impl Iterator<Item = &Resource> {
        let markdown_id = self.markdown_id.as_deref();
        self.resources
            .iter()
            .filter(move |r| Some(r.id.as_str()) != markdown_id)
    }

    pub fn pack(&self) -> Result<String> {
        codec::pack(self)
    }

    pub fn pack_with_report(&self) -> Result<(String, TranslationReport)> {
        codec::pack_with_report(self)
    }

    /// A copy of this post carrying the fields and body of `document`.
    ///
    /// The document must belong to this post, must not reference a filename
    /// shared by several resources, and the copy must reproduce its own body
    /// when packed and unpacked again. Any failure is an
    /// [`Error::ConsistencyMismatch`].
    pub fn refreshed(&self, document: &str) -> Result<(Post, TranslationReport)> {
        let unpacked = codec::unpack(document, &self.resources)?;
        if !self.id.is_empty() && unpacked.metadata.id != self.id {
            return Err(Error::ConsistencyMismatch {
                post_id: self.id.clone(),
                detail: format!("document belongs to post {}", unpacked.metadata.id),
            });
        }
        let report = unpacked.report.clone();
        let post = self.with_unpacked(unpacked);
        post.check_unambiguous()?;

        let recomputed = codec::unpack(&post.pack()?, &post.resources)?;
        if recomputed.markdown != post.body {
            return Err(Error::ConsistencyMismatch {
                post_id: post.id.clone(),
                detail: format!(
                    "body does not survive a round trip ({} vs {} bytes)",
                    post.body.len(),
                    recomputed.markdown.len()
                ),
            });
        }

        Ok((post, report))
    }

    fn check_unambiguous(&self) -> Result<()> {
        for target in references::image_targets(&self.body) {
            let Some(id) = target.strip_prefix(ID_SCHEME) else {
                continue;
            };
            let Some(resource) = self.resource(id) else {
                continue;
            };
            let shared: Vec<&str> = self
                .resources
                .iter()
                .filter(|r| r.filename == resource.filename)
                .map(|r| r.id.as_str())
                .collect();
            if shared.len() > 1 {
                return Err(Error::ConsistencyMismatch {
                    post_id: self.id.clone(),
                    detail: format!(
                        "filename {} is shared by resources {}",
                        resource.filename,
                        shared.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    fn with_unpacked(&self, unpacked: UnpackedPost) -> Post {
        let meta = unpacked.metadata;
        Post {
            id: meta.id,
            title: meta.title,
            post_type: meta.post_type,
            date: meta.date,
            tags: dedup_tags(meta.tags),
            description: meta.post_description,
            body: unpacked.markdown,
            extra: meta.extra,
            ..self.clone()
        }
    }

    pub fn update(&self) -> PostUpdate {
        PostUpdate {
            title: self.title.clone(),
            post_type: self.post_type.clone(),
            date: self.date.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            markdown_id: self.markdown_id.clone(),
        }
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}
