//! src/services/sync_service.rs
//!
//! Reconciler: one sync run from scan to published manifest. Runs strictly
//! sequentially: scan, list, diff, upload each file in scan order, merge,
//! persist. Concurrent runs against the same manifest are last-writer-wins.

use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::models::{
    manifest::Manifest,
    media::{LocalFile, content_type_for},
};
use crate::services::{
    diff::{SyncPlan, plan_sync},
    manifest_service::{ManifestFiles, merge_uploaded},
    media_source::MediaSource,
    remote_store::RemoteStore,
};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use indicatif::HumanBytes;
use tracing::{error, info, warn};

const MANIFEST_CONTENT_TYPE: &str = "application/json";

/// A file that did not make it into the bucket.
#[derive(Debug)]
pub struct FailedUpload {
    pub name: String,
    pub error: SyncError,
}

/// What a run did. Pre-flight aborts are returned as `Err` instead.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub dry_run: bool,
    pub local_count: usize,
    pub remote_count: usize,
    pub plan: SyncPlan,
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
    /// Already-synced media with no manifest entry.
    pub unrecorded: Vec<String>,
    /// Entry count after the merge, when the manifest was rewritten.
    pub manifest_total: Option<usize>,
    /// Set when the local copies were saved but the bucket copy was not.
    pub manifest_upload_error: Option<SyncError>,
}

impl SyncReport {
    pub fn manifest_published(&self) -> bool {
        self.manifest_total.is_some() && self.manifest_upload_error.is_none()
    }
}

/// Drives one sync run against an injected source and store.
pub struct Reconciler<M, R> {
    config: SyncConfig,
    source: M,
    remote: R,
    manifest_files: ManifestFiles,
}

impl<M: MediaSource, R: RemoteStore> Reconciler<M, R> {
    pub fn new(config: SyncConfig, source: M, remote: R) -> Self {
        let manifest_files = ManifestFiles::new(
            config.manifest_path.clone(),
            config.mirror_manifest_path.clone(),
        );
        Self {
            config,
            source,
            remote,
            manifest_files,
        }
    }

    #[cfg(test)]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub async fn run(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport {
            dry_run: self.config.dry_run,
            ..SyncReport::default()
        };

        info!("scanning local videos in {}", self.config.source_dir.display());
        let local = self.source.scan().await?;
        report.local_count = local.len();
        info!("found {} video(s) locally", local.len());
        if local.is_empty() {
            info!("no videos to sync");
            return Ok(report);
        }

        self.remote.probe().await?;
        info!("connected to bucket {}", self.config.remote.bucket);

        let remote = match self.remote.list_media().await {
            Ok(objects) => objects,
            Err(err) => {
                warn!("listing bucket failed, assuming it is empty: {}", err);
                Vec::new()
            }
        };
        report.remote_count = remote.len();
        info!("found {} video(s) in bucket", remote.len());

        report.plan = plan_sync(&local, &remote, self.config.force);
        info!(
            "to upload: {}, already synced: {}",
            report.plan.to_upload.len(),
            report.plan.already_synced.len()
        );
        if report.plan.is_empty() {
            info!("all videos already synced");
            report.unrecorded = self.check_recorded(&report.plan.already_synced).await;
            return Ok(report);
        }

        info!(
            "files to upload ({}):",
            HumanBytes(report.plan.total_bytes())
        );
        for file in &report.plan.to_upload {
            let marker = if self.is_background(&file.name) {
                "background"
            } else {
                "intro"
            };
            info!("  {} {} ({})", marker, file.name, HumanBytes(file.size_bytes));
        }

        if self.config.dry_run {
            report.unrecorded = self.check_recorded(&report.plan.already_synced).await;
            info!("dry run, nothing uploaded");
            return Ok(report);
        }

        // Media that could never be recorded is not worth uploading.
        let mut manifest = self.manifest_files.preflight().await?;
        info!("loaded manifest with {} videos", manifest.videos.len());
        report.unrecorded = unrecorded(&manifest, &report.plan.already_synced);

        for file in &report.plan.to_upload {
            match self.upload(file).await {
                Ok(()) => report.uploaded.push(file.name.clone()),
                Err(err) => {
                    error!("failed to upload {}: {}", file.name, err);
                    report.failed.push(FailedUpload {
                        name: file.name.clone(),
                        error: err,
                    });
                }
            }
        }
        info!("uploaded: {}", report.uploaded.len());
        if !report.failed.is_empty() {
            warn!("failed: {}", report.failed.len());
            for failed in &report.failed {
                warn!("  - {} ({:?})", failed.name, failed.error.kind());
            }
        }

        if report.uploaded.is_empty() {
            return Ok(report);
        }

        let outcome = merge_uploaded(
            &mut manifest,
            &report.uploaded,
            &self.config.public_url,
            &self.config.background_prefix,
            Utc::now(),
        );
        info!(
            "manifest: {} added, {} already present",
            outcome.added(),
            outcome.skipped.len()
        );
        let bytes = self.manifest_files.save(&manifest).await?;
        report.manifest_total = Some(manifest.total_videos);

        match self
            .remote
            .put_bytes(
                &self.config.manifest_key,
                MANIFEST_CONTENT_TYPE,
                Bytes::from(bytes),
            )
            .await
        {
            Ok(()) => info!(
                "manifest published: {}",
                self.config.public_url_for(&self.config.manifest_key)
            ),
            Err(err) => {
                warn!("failed to upload manifest, local copies are newer: {}", err);
                report.manifest_upload_error = Some(err);
            }
        }
        info!("total videos in manifest: {}", manifest.total_videos);

        Ok(report)
    }

    /// Read-only manifest check for runs that will not rewrite it. A manifest
    /// that cannot be read only costs the check.
    async fn check_recorded(&self, already_synced: &[String]) -> Vec<String> {
        if already_synced.is_empty() {
            return Vec::new();
        }
        match self.manifest_files.load().await {
            Ok(manifest) => unrecorded(&manifest, already_synced),
            Err(err) => {
                warn!("could not check manifest entries: {}", err);
                Vec::new()
            }
        }
    }

    fn is_background(&self, name: &str) -> bool {
        name.starts_with(&self.config.background_prefix)
    }

    /// Stream one file up and confirm the stored size.
    async fn upload(&self, file: &LocalFile) -> SyncResult<()> {
        let bar = self.config.progress.upload_bar(&file.name, file.size_bytes);
        let tracker = bar.clone();
        let body = self
            .source
            .open(&file.name)
            .await?
            .inspect(move |chunk| {
                if let Ok(bytes) = chunk {
                    tracker.inc(bytes.len() as u64);
                }
            })
            .boxed();

        let result = self
            .remote
            .put_stream(
                &file.name,
                content_type_for(&file.name),
                file.size_bytes,
                body,
            )
            .await;
        bar.finish_and_clear();
        let sent = result?;

        if sent != file.size_bytes {
            return Err(SyncError::PartialUpload {
                key: file.name.clone(),
                sent,
                total: file.size_bytes,
                reason: "file changed size while uploading".into(),
            });
        }

        match self.remote.object_size(&file.name).await? {
            Some(stored) if stored == file.size_bytes => {
                info!("uploaded {} ({})", file.name, HumanBytes(stored));
                Ok(())
            }
            stored => Err(SyncError::SizeMismatch {
                key: file.name.clone(),
                local: file.size_bytes,
                remote: stored.unwrap_or(0),
            }),
        }
    }
}

/// Names that are in the bucket but missing from `manifest`. The diff only
/// looks at the bucket, so these stay unrecorded until a forced run.
fn unrecorded(manifest: &Manifest, already_synced: &[String]) -> Vec<String> {
    let missing: Vec<String> = already_synced
        .iter()
        .filter(|name| !manifest.contains(name))
        .cloned()
        .collect();
    for name in &missing {
        warn!(
            "{} is in the bucket but not in the manifest; rerun with --force to record it",
            name
        );
    }
    missing
}
