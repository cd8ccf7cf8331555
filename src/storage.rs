// ABOUTME: Vault storage layer with atomic writes and per-post folders
// ABOUTME: Lays posts out as <TitleCasedType>s/<postId>/ under the vault root

use crate::util::type_folder;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Where synchronized posts are written.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Writes `bytes` to `relative`, creating parent directories on demand.
    async fn write_file(&self, relative: &Path, bytes: &[u8]) -> Result<()>;

    async fn read_file(&self, relative: &Path) -> Result<Vec<u8>>;

    /// Names of the regular files directly inside `relative_dir`, sorted.
    async fn list_files(&self, relative_dir: &Path) -> Result<Vec<String>>;
}

pub fn post_dir(post_type: &str, post_id: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(type_folder(post_type)).join(checked_component(post_id)?))
}

pub fn document_path(post_type: &str, post_id: &str) -> Result<PathBuf> {
    Ok(post_dir(post_type, post_id)?.join(format!("{}.md", post_id)))
}

/// Accepts `name` only if it is a single normal path component.
pub fn checked_component(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('\\') => Ok(name),
        _ => Err(Error::InvalidPath(name.to_string())),
    }
}

pub struct VaultStore {
    pub root: PathBuf,
    pub tmp_dir: PathBuf,
}

impl VaultStore {
    pub fn new(root: PathBuf) -> Self {
        VaultStore {
            tmp_dir: root.join(".folio").join("tmp"),
            root,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.tmp_dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.tmp_dir, perms).await?;
        }
        Ok(())
    }

    /// Maps a user-supplied path onto the vault. Absolute paths must lie
    /// inside the root; relative ones are taken as vault-relative.
    pub fn relative(&self, path: &Path) -> Result<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| Error::InvalidPath(path.display().to_string()))?
        } else {
            path.strip_prefix(".").unwrap_or(path)
        };
        self.resolve(relative)?;
        Ok(relative.to_path_buf())
    }

    fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidPath(relative.display().to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TargetStore for VaultStore {
    async fn write_file(&self, relative: &Path, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        write_atomic(&path, bytes, &self.tmp_dir).await
    }

    async fn read_file(&self, relative: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        Ok(fs::read(path).await?)
    }

    async fn list_files(&self, relative_dir: &Path) -> Result<Vec<String>> {
        let dir = self.resolve(relative_dir)?;
        let mut entries = fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

pub async fn write_atomic(path: &Path, content: &[u8], tmp_dir: &Path) -> Result<()> {
    use rand::Rng;

    fs::create_dir_all(tmp_dir).await?;

    // Create temp file
    let random: u64 = rand::thread_rng().gen();
    let tmp_path = tmp_dir.join(format!("{:x}.part", random));

    fs::write(&tmp_path, content).await?;

    // Atomic rename
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(&tmp_path, path).await?;

    Ok(())
}
