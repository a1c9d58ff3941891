use crate::errors::{SyncError, SyncResult};
use crate::progress::ProgressMode;
use clap::Parser;
use std::{env, path::PathBuf};

const DEFAULT_SOURCE_DIR: &str = "videos-to-upload";
const DEFAULT_MANIFEST: &str = "public/r2-video-manifest.json";
const DEFAULT_MIRROR_MANIFEST: &str = "public/cloudflare/video-manifest.json";
const DEFAULT_MANIFEST_KEY: &str = "video-manifest.json";
const DEFAULT_BACKGROUND_PREFIX: &str = "sww-";
const DEFAULT_BUCKET: &str = "sww-videos";
const DEFAULT_REGION: &str = "auto";

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Everything one sync run needs, resolved from CLI arguments and the
/// environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub mirror_manifest_path: PathBuf,
    /// Bucket key the manifest is published under.
    pub manifest_key: String,
    /// Filenames starting with this are background media, everything else an intro.
    pub background_prefix: String,
    pub public_url: String,
    pub dry_run: bool,
    pub force: bool,
    pub progress: ProgressMode,
    pub remote: RemoteConfig,
}

/// Connection settings for the S3-compatible bucket.
#[derive(Clone)]
pub struct RemoteConfig {
    pub bucket: String,
    pub region: String,
    /// `None` leaves endpoint resolution to the SDK.
    pub endpoint_url: Option<String>,
    /// `None` falls back to the SDK default credential chain.
    pub credentials: Option<StaticCredentials>,
}

#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("static_credentials", &self.credentials.is_some())
            .finish()
    }
}

/// Sync local videos to an S3-compatible bucket and update the video manifest.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Sync local videos to R2 and update the video manifest")]
pub struct Args {
    /// Report what would be uploaded without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Upload every local video regardless of what the bucket holds
    #[arg(long)]
    pub force: bool,

    /// Folder scanned for videos (overrides VIDEO_SYNC_SOURCE_DIR)
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Manifest file to update (overrides VIDEO_SYNC_MANIFEST)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Second copy of the manifest kept identical (overrides VIDEO_SYNC_MIRROR_MANIFEST)
    #[arg(long)]
    pub mirror_manifest: Option<PathBuf>,

    /// Bucket key the manifest is published under (overrides VIDEO_SYNC_MANIFEST_KEY)
    #[arg(long)]
    pub manifest_key: Option<String>,

    /// Filename prefix marking background videos (overrides VIDEO_SYNC_BACKGROUND_PREFIX)
    #[arg(long)]
    pub background_prefix: Option<String>,

    /// Bucket name (overrides R2_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3 API endpoint (overrides R2_ENDPOINT_URL, default derived from R2_ACCOUNT_ID)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Public base URL used for manifest entries (overrides R2_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Signing region (overrides R2_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Upload progress display
    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    pub progress: ProgressMode,
}

impl SyncConfig {
    /// Parse CLI args and merge them over the process environment.
    pub fn from_env_and_args() -> SyncResult<Self> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge `args` over values produced by `lookup`, then over defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let public_url = args
            .public_url
            .or_else(|| var("R2_PUBLIC_URL"))
            .ok_or_else(|| SyncError::Config("R2_PUBLIC_URL (or --public-url) is required".into()))?;
        let public_url = public_url.trim().trim_end_matches('/').to_string();
        if public_url.is_empty() {
            return Err(SyncError::Config("public URL cannot be empty".into()));
        }

        let bucket = args
            .bucket
            .or_else(|| var("R2_BUCKET_NAME"))
            .unwrap_or_else(|| DEFAULT_BUCKET.into());
        ensure_bucket_name_safe(&bucket)?;

        let endpoint_url = args
            .endpoint_url
            .or_else(|| var("R2_ENDPOINT_URL"))
            .or_else(|| {
                var("R2_ACCOUNT_ID")
                    .map(|account| format!("https://{}.r2.cloudflarestorage.com", account.trim()))
            });

        let credentials = match (var("R2_ACCESS_KEY_ID"), var("R2_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => {
                return Err(SyncError::Config(
                    "R2_ACCESS_KEY_ID and R2_SECRET_ACCESS_KEY must be set together".into(),
                ));
            }
        };

        let background_prefix = args
            .background_prefix
            .or_else(|| var("VIDEO_SYNC_BACKGROUND_PREFIX"))
            .unwrap_or_else(|| DEFAULT_BACKGROUND_PREFIX.into());
        if background_prefix.is_empty() {
            return Err(SyncError::Config("background prefix cannot be empty".into()));
        }

        Ok(Self {
            source_dir: args
                .source_dir
                .or_else(|| var("VIDEO_SYNC_SOURCE_DIR").map(PathBuf::from))
                .unwrap_or_else(|| DEFAULT_SOURCE_DIR.into()),
            manifest_path: args
                .manifest
                .or_else(|| var("VIDEO_SYNC_MANIFEST").map(PathBuf::from))
                .unwrap_or_else(|| DEFAULT_MANIFEST.into()),
            mirror_manifest_path: args
                .mirror_manifest
                .or_else(|| var("VIDEO_SYNC_MIRROR_MANIFEST").map(PathBuf::from))
                .unwrap_or_else(|| DEFAULT_MIRROR_MANIFEST.into()),
            manifest_key: args
                .manifest_key
                .or_else(|| var("VIDEO_SYNC_MANIFEST_KEY"))
                .unwrap_or_else(|| DEFAULT_MANIFEST_KEY.into()),
            background_prefix,
            public_url,
            dry_run: args.dry_run,
            force: args.force,
            progress: args.progress,
            remote: RemoteConfig {
                bucket,
                region: args
                    .region
                    .or_else(|| var("R2_REGION"))
                    .unwrap_or_else(|| DEFAULT_REGION.into()),
                endpoint_url,
                credentials,
            },
        })
    }

    /// Public URL for an object key.
    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

/// Validate bucket name format.
///
/// S3 naming rules: 3–63 characters of lowercase letters, digits, dots and
/// hyphens, starting and ending alphanumeric, no `..`, `.-` or `-.`, and not
/// shaped like an IPv4 address.
fn ensure_bucket_name_safe(name: &str) -> SyncResult<()> {
    let invalid = |reason: &str| SyncError::Config(format!("bucket `{name}` invalid: {reason}"));

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
