use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod models;
mod progress;
mod services;

use services::{
    media_source::FsMediaSource, remote_store::S3RemoteStore, sync_service::Reconciler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aws_config=warn")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::SyncConfig::from_env_and_args().context("loading configuration")?;
    tracing::debug!("Starting video-sync with config: {:?}", cfg);

    tracing::info!("source:     {}", cfg.source_dir.display());
    tracing::info!("bucket:     {}", cfg.remote.bucket);
    tracing::info!("public url: {}", cfg.public_url);
    if cfg.dry_run {
        tracing::info!("mode: dry run (no changes will be made)");
    }
    if cfg.force {
        tracing::info!("mode: force (re-upload all files)");
    }

    // --- Wire source, store and reconciler ---
    let source = FsMediaSource::new(cfg.source_dir.clone());
    let store = S3RemoteStore::connect(&cfg.remote).await;
    let reconciler = Reconciler::new(cfg, source, store);

    let report = match reconciler.run().await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), "sync aborted: {}", err);
            return Err(err.into());
        }
    };

    // --- Summary ---
    if report.dry_run {
        tracing::info!(
            "dry run complete: {} of {} local video(s) would be uploaded",
            report.plan.to_upload.len(),
            report.local_count
        );
        return Ok(());
    }

    tracing::info!(
        "sync complete: {} uploaded, {} failed, {} already synced ({} in bucket)",
        report.uploaded.len(),
        report.failed.len(),
        report.plan.already_synced.len(),
        report.remote_count
    );
    if !report.unrecorded.is_empty() {
        tracing::warn!(
            "{} synced video(s) missing from the manifest; rerun with --force to record them",
            report.unrecorded.len()
        );
    }
    if let Some(total) = report.manifest_total {
        if report.manifest_published() {
            tracing::info!("manifest updated and published ({} videos)", total);
        } else {
            tracing::warn!(
                "manifest saved locally ({} videos) but not published; rerun to publish",
                total
            );
        }
    }

    Ok(())
}
