//! Manifest merge rules and the two on-disk copies of the manifest.

use crate::errors::{SyncError, SyncResult};
use crate::models::manifest::{Manifest, ManifestEntry};
use crate::models::media::{content_type_for, file_stem};
use chrono::{DateTime, Utc};
use serde_json::Map;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// How one batch of uploaded names landed in the manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added_intros: Vec<String>,
    pub added_backgrounds: Vec<String>,
    /// Already present; left untouched.
    pub skipped: Vec<String>,
}

impl MergeOutcome {
    pub fn added(&self) -> usize {
        self.added_intros.len() + self.added_backgrounds.len()
    }
}

/// Build the entry for a freshly uploaded file.
pub fn entry_for(name: &str, public_url: &str, background_prefix: &str) -> ManifestEntry {
    let intro = !name.starts_with(background_prefix);
    ManifestEntry {
        key: name.to_string(),
        url: format!("{}/{}", public_url.trim_end_matches('/'), name),
        content_type: content_type_for(name).to_string(),
        is_intro: intro.then_some(true),
        entity_id: intro.then(|| file_stem(name).to_string()),
        extra: Map::new(),
    }
}

/// Merge uploaded names into `manifest`.
///
/// Intro entries go right after the leading run of intros, background
/// entries at the end; names already present are skipped. `totalVideos` and
/// `generated` are refreshed afterwards.
pub fn merge_uploaded(
    manifest: &mut Manifest,
    uploaded: &[String],
    public_url: &str,
    background_prefix: &str,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for name in uploaded {
        if manifest.contains(name) {
            info!("already in manifest: {}", name);
            outcome.skipped.push(name.clone());
            continue;
        }

        let entry = entry_for(name, public_url, background_prefix);
        if entry.is_intro() {
            let index = manifest.intro_insert_index();
            info!(
                "added intro: {} (entity: {})",
                name,
                entry.entity_id.as_deref().unwrap_or_default()
            );
            manifest.videos.insert(index, entry);
            outcome.added_intros.push(name.clone());
        } else {
            info!("added background: {}", name);
            manifest.videos.push(entry);
            outcome.added_backgrounds.push(name.clone());
        }
    }
    manifest.touch(now);
    outcome
}

/// The primary manifest file and its mirror, kept byte-identical.
#[derive(Clone, Debug)]
pub struct ManifestFiles {
    pub primary: PathBuf,
    pub mirror: PathBuf,
}

impl ManifestFiles {
    pub fn new(primary: impl Into<PathBuf>, mirror: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            mirror: mirror.into(),
        }
    }

    /// Read the primary copy.
    pub async fn load(&self) -> SyncResult<Manifest> {
        let raw = match fs::read(&self.primary).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SyncError::ManifestNotFound(self.primary.clone()));
            }
            Err(err) => return Err(SyncError::persistence(&self.primary, err)),
        };
        serde_json::from_slice(&raw).map_err(|err| SyncError::persistence(&self.primary, err))
    }

    /// Load the manifest and prove both copies can be rewritten, without
    /// changing either file.
    pub async fn preflight(&self) -> SyncResult<Manifest> {
        let manifest = self.load().await?;
        for target in [&self.primary, &self.mirror] {
            ensure_writable(target).await?;
        }
        Ok(manifest)
    }

    /// Write `manifest` to both copies. Returns the serialized bytes.
    pub async fn save(&self, manifest: &Manifest) -> SyncResult<Vec<u8>> {
        let bytes = serde_json::to_vec_pretty(manifest)?;
        for target in [&self.primary, &self.mirror] {
            write_atomic(target, &bytes).await?;
            info!("saved manifest: {}", target.display());
        }
        Ok(bytes)
    }
}

fn parent_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Create the parent directory, drop a marker file in it, and check an
/// existing target opens for writing.
async fn ensure_writable(target: &Path) -> SyncResult<()> {
    let dir = parent_of(target);
    fs::create_dir_all(&dir)
        .await
        .map_err(|err| SyncError::persistence(target, err))?;

    let marker = dir.join(format!(".sync-write-check-{}", Uuid::new_v4()));
    fs::write(&marker, b"")
        .await
        .map_err(|err| SyncError::persistence(target, err))?;
    if let Err(err) = fs::remove_file(&marker).await {
        debug!("could not remove marker file {}: {}", marker.display(), err);
    }

    match OpenOptions::new().write(true).open(target).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SyncError::persistence(target, err)),
    }
}

/// Write to a temp file beside `target`, fsync, then rename over it.
async fn write_atomic(target: &Path, bytes: &[u8]) -> SyncResult<()> {
    let dir = parent_of(target);
    fs::create_dir_all(&dir)
        .await
        .map_err(|err| SyncError::persistence(target, err))?;
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));

    let result: io::Result<()> = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, target).await
    }
    .await;

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(SyncError::persistence(target, err));
    }
    Ok(())
}
