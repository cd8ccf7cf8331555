// ABOUTME: Settings discovery with precedence chain
// ABOUTME: CLI flag → settings.json → FOLIO_* env vars → defaults

use crate::api::DEFAULT_BASE_URL;
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub domain: String,
    pub secret: String,
    pub vault: PathBuf,
    pub concurrency: usize,
}

/// Contents of `settings.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsFile {
    pub domain: Option<String>,
    pub secret: Option<String>,
    pub vault: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub secret: Option<String>,
    pub vault: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub settings_path: Option<PathBuf>,
}

pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "folio").map(|dirs| dirs.config_dir().join("settings.json"))
}

pub fn resolve(overrides: Overrides) -> Result<Settings> {
    let file = match &overrides.settings_path {
        // An explicit path must exist
        Some(path) => Some(load_settings_file(path)?.ok_or_else(|| {
            Error::Config(format!("settings file {} not found", path.display()))
        })?),
        None => match default_settings_path() {
            Some(path) => load_settings_file(&path)?,
            None => None,
        },
    };
    resolve_with(overrides, file.unwrap_or_default(), |key| env::var(key).ok())
}

/// Applies the precedence chain with an injectable environment lookup.
pub fn resolve_with(
    overrides: Overrides,
    file: SettingsFile,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let domain = overrides
        .domain
        .or(file.domain)
        .or_else(|| env_lookup("FOLIO_DOMAIN"))
        .unwrap_or_else(|| DEFAULT_BASE_URL.into());

    let secret = overrides
        .secret
        .or(file.secret)
        .or_else(|| env_lookup("FOLIO_SECRET"))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            Error::Auth(
                "No API secret found. Provide via --secret, settings.json, or FOLIO_SECRET env var"
                    .into(),
            )
        })?;

    let vault = overrides
        .vault
        .or(file.vault)
        .or_else(|| env_lookup("FOLIO_VAULT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let concurrency = overrides
        .concurrency
        .or(file.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(Error::Config("concurrency must be at least 1".into()));
    }

    Ok(Settings {
        domain,
        secret,
        vault,
        concurrency,
    })
}

fn load_settings_file(path: &Path) -> Result<Option<SettingsFile>> {
    if !path.exists() {
        return Ok(None);
    }
    debug!(path = %path.display(), "loading settings");

    let content = fs::read_to_string(path)?;
    let file = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("invalid settings file {}: {}", path.display(), e))
    })?;
    Ok(Some(file))
}
