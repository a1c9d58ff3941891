//! Decide which local files need uploading.

use crate::models::media::{LocalFile, RemoteObject};
use std::collections::HashMap;

/// Outcome of comparing the local folder with the bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Files to upload, in scan order.
    pub to_upload: Vec<LocalFile>,
    /// Names whose remote copy already has the same size.
    pub already_synced: Vec<String>,
}

impl SyncPlan {
    pub fn total_bytes(&self) -> u64 {
        self.to_upload.iter().map(|f| f.size_bytes).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty()
    }
}

/// Compare by name and byte size only; a same-size file with different
/// content counts as synced.
pub fn plan_sync(local: &[LocalFile], remote: &[RemoteObject], force: bool) -> SyncPlan {
    if force {
        return SyncPlan {
            to_upload: local.to_vec(),
            already_synced: Vec::new(),
        };
    }

    let remote_sizes: HashMap<&str, u64> = remote
        .iter()
        .map(|obj| (obj.key.as_str(), obj.size_bytes))
        .collect();

    let mut plan = SyncPlan::default();
    for file in local {
        match remote_sizes.get(file.name.as_str()) {
            Some(&size) if size == file.size_bytes => plan.already_synced.push(file.name.clone()),
            _ => plan.to_upload.push(file.clone()),
        }
    }
    plan
}
