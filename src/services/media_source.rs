//! Where local videos come from.

use crate::errors::{SyncError, SyncResult};
use crate::models::media::{LocalFile, is_media_file};
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use std::{future::Future, io, path::PathBuf};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;

/// Capability interface over the local media folder.
pub trait MediaSource: Send + Sync {
    /// Media files in the folder, sorted by name.
    ///
    /// Fails with `SourceNotFound` when the folder is missing.
    fn scan(&self) -> impl Future<Output = SyncResult<Vec<LocalFile>>> + Send;

    /// Stream the bytes of a previously scanned file.
    fn open(
        &self,
        name: &str,
    ) -> impl Future<Output = SyncResult<BoxStream<'static, io::Result<Bytes>>>> + Send;
}

/// Non-recursive scan of one directory on disk.
#[derive(Clone, Debug)]
pub struct FsMediaSource {
    root: PathBuf,
}

impl FsMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaSource for FsMediaSource {
    async fn scan(&self) -> SyncResult<Vec<LocalFile>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SyncError::SourceNotFound(self.root.clone()));
            }
            Err(err) => return Err(SyncError::Io(err)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!("skipping non UTF-8 filename {:?}", entry.file_name());
                continue;
            };
            if is_media_file(&name) {
                files.push(LocalFile::new(name, metadata.len()));
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn open(&self, name: &str) -> SyncResult<BoxStream<'static, io::Result<Bytes>>> {
        let file = File::open(self.root.join(name)).await?;
        Ok(ReaderStream::new(file).boxed())
    }
}
