// ABOUTME: Core sync logic for fetching posts into the vault and pushing edits back
// ABOUTME: Bounded concurrent fan-out with failures recorded per post

use crate::{
    api::RemoteStore,
    frontmatter,
    model::Resource,
    post::Post,
    storage::{checked_component, document_path, post_dir, TargetStore},
    Error, Result,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Posts in flight at once during a bulk fetch.
    pub post_concurrency: usize,
    /// Resource transfers in flight at once within one post.
    pub resource_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            post_concurrency: 8,
            resource_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPost {
    pub id: String,
    pub document: PathBuf,
    pub attachments: Vec<PathBuf>,
    /// Image targets left as `ref:<id>` because no resource matched.
    pub unresolved: Vec<String>,
}

#[derive(Debug)]
pub struct PostOutcome {
    pub id: String,
    pub result: Result<FetchedPost>,
}

/// Per-post results of a bulk fetch, sorted by id.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub outcomes: Vec<PostOutcome>,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &FetchedPost> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.id.as_str(), e)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn into_result(self) -> Result<Vec<FetchedPost>> {
        let total = self.total();
        let mut fetched = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(post) => fetched.push(post),
                Err(_) => failed.push(outcome.id),
            }
        }
        if failed.is_empty() {
            Ok(fetched)
        } else {
            Err(Error::PartialBulkFailure { failed, total })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedPost {
    pub id: String,
    pub markdown_id: String,
    /// Local files uploaded as new resources.
    pub uploaded: Vec<String>,
    pub unresolved: Vec<String>,
}

pub struct Syncer<R, T> {
    remote: R,
    target: T,
    options: SyncOptions,
    progress: ProgressBar,
}

impl<R: RemoteStore, T: TargetStore> Syncer<R, T> {
    pub fn new(remote: R, target: T, options: SyncOptions) -> Self {
        Syncer {
            remote,
            target,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Fetches every remote post. Only a failure to enumerate the posts is
    /// returned as an error; per-post failures land in the report.
    pub async fn fetch_all(&self) -> Result<BulkReport> {
        let mut ids = self.remote.list_post_ids().await?;
        ids.sort();
        ids.dedup();
        info!(count = ids.len(), "fetching posts");

        self.progress.set_length(ids.len() as u64);
        let mut outcomes: Vec<PostOutcome> = stream::iter(ids)
            .map(|id| async move {
                let result = self.fetch_post(&id).await;
                match &result {
                    Ok(fetched) => info!(id = %id, document = %fetched.document.display(), "fetched post"),
                    Err(e) => warn!(id = %id, error = %e, "failed to fetch post"),
                }
                self.progress.inc(1);
                PostOutcome { id, result }
            })
            .buffer_unordered(self.options.post_concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));

        let report = BulkReport { outcomes };
        self.progress.finish_with_message(format!(
            "fetched {} posts ({} failed)",
            report.total(),
            report.failed().count()
        ));
        Ok(report)
    }

    pub async fn fetch_post(&self, id: &str) -> Result<FetchedPost> {
        let record = self.remote.get_post(id).await?;
        if record.id != id {
            return Err(Error::Invariant(format!(
                "requested post {} but received {}",
                id, record.id
            )));
        }
        let post = Post::from_record(record, String::new())?;
        let folder = post_dir(&post.post_type, &post.id)?;
        let document = document_path(&post.post_type, &post.id)?;

        let body = match post.markdown_resource() {
            Some(resource) => {
                let bytes = self.remote.get_resource_bytes(resource).await?;
                decode(bytes, resource)?
            }
            None => {
                debug!(id = %post.id, "post has no markdown resource");
                String::new()
            }
        };
        let post = Post { body, ..post };

        let attachments = self.attachment_targets(&post, &folder, &document)?;
        let folder = &folder;
        let mut downloads: Vec<(PathBuf, Vec<u8>)> = stream::iter(attachments)
            .map(|resource| async move {
                let bytes = self.remote.get_resource_bytes(resource).await?;
                Ok::<_, Error>((folder.join(&resource.filename), bytes))
            })
            .buffer_unordered(self.options.resource_concurrency.max(1))
            .try_collect()
            .await?;
        downloads.sort_by(|a, b| a.0.cmp(&b.0));

        let mut written = Vec::with_capacity(downloads.len());
        for (path, bytes) in downloads {
            self.target.write_file(&path, &bytes).await?;
            written.push(path);
        }

        let (packed, report) = post.pack_with_report()?;
        if !report.is_complete() {
            warn!(id = %post.id, unresolved = ?report.unresolved, "unresolved image references");
        }
        self.target.write_file(&document, packed.as_bytes()).await?;

        Ok(FetchedPost {
            id: post.id,
            document,
            attachments: written,
            unresolved: report.unresolved,
        })
    }

    /// Re-fetches the post a local document belongs to.
    pub async fn fetch_open(&self, document: &Path) -> Result<FetchedPost> {
        let text = self.read_document(document).await?;
        let (header, _) = frontmatter::parse(&text)?;
        info!(id = %header.id, "fetching open document");
        self.fetch_post(&header.id).await
    }

    /// Publishes a local document: uploads attachments the website does not
    /// have yet, then the body and metadata. The document is checked against
    /// placeholder resources first, so a rejected document uploads nothing.
    pub async fn push_post(&self, document: &Path) -> Result<PushedPost> {
        let text = self.read_document(document).await?;
        let (header, _) = frontmatter::parse(&text)?;
        let record = self.remote.get_post(&header.id).await?;
        let mut post = Post::from_record(record, String::new())?;

        let folder = document.parent().unwrap_or_else(|| Path::new(""));
        let document_name = document
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let known: HashSet<&str> = post.resources.iter().map(|r| r.filename.as_str()).collect();
        let pending: Vec<String> = self
            .target
            .list_files(folder)
            .await?
            .into_iter()
            .filter(|name| name != document_name && !name.starts_with('.'))
            .filter(|name| !known.contains(name.as_str()))
            .collect();

        let mut provisional = post.clone();
        provisional
            .resources
            .extend(pending.iter().enumerate().map(|(i, name)| Resource {
                id: format!("pending-{i}"),
                filename: name.clone(),
                resource_type: String::new(),
                description: String::new(),
                url: String::new(),
            }));
        provisional.refreshed(&text)?;

        let post_id = post.id.as_str();
        let mut uploaded: Vec<Resource> = stream::iter(pending)
            .map(|name| async move {
                let bytes = self.target.read_file(&folder.join(&name)).await?;
                let resource = self.remote.store_resource(post_id, &name, bytes).await?;
                info!(id = %post_id, filename = %name, resource = %resource.id, "uploaded resource");
                Ok::<_, Error>(resource)
            })
            .buffer_unordered(self.options.resource_concurrency.max(1))
            .try_collect()
            .await?;
        uploaded.sort_by(|a, b| a.filename.cmp(&b.filename));
        let uploaded_names = uploaded.iter().map(|r| r.filename.clone()).collect();
        post.resources.extend(uploaded);

        let (mut post, report) = post.refreshed(&text)?;
        if !report.is_complete() {
            warn!(id = %post.id, unresolved = ?report.unresolved, "unresolved image references");
        }

        let markdown = self
            .remote
            .store_resource(&post.id, &format!("{}.md", post.id), post.body.clone().into_bytes())
            .await?;
        post.markdown_id = Some(markdown.id.clone());
        post.resources.push(markdown);

        self.remote.store_post_update(&post.id, &post.update()).await?;
        info!(id = %post.id, "pushed post");

        Ok(PushedPost {
            markdown_id: post.markdown_id.clone().unwrap_or_default(),
            id: post.id,
            uploaded: uploaded_names,
            unresolved: report.unresolved,
        })
    }

    /// Attachments to download, one per filename; the smallest id wins a
    /// shared filename, matching the reference map.
    fn attachment_targets<'p>(
        &self,
        post: &'p Post,
        folder: &Path,
        document: &Path,
    ) -> Result<Vec<&'p Resource>> {
        let mut attachments: Vec<&Resource> = post.attachments().collect();
        attachments.sort_by(|a, b| (&a.filename, &a.id).cmp(&(&b.filename, &b.id)));
        attachments.dedup_by(|a, b| a.filename == b.filename);

        let mut targets = Vec::with_capacity(attachments.len());
        for resource in attachments {
            checked_component(&resource.filename)?;
            if folder.join(&resource.filename) == document {
                debug!(id = %post.id, resource = %resource.id, "skipping stale markdown resource");
                continue;
            }
            targets.push(resource);
        }
        Ok(targets)
    }

    async fn read_document(&self, document: &Path) -> Result<String> {
        let bytes = self.target.read_file(document).await?;
        String::from_utf8(bytes).map_err(|_| Error::Encoding {
            address: document.display().to_string(),
        })
    }
}

fn decode(bytes: Vec<u8>, resource: &Resource) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::Encoding {
        address: resource.url.clone(),
    })
}
