//! Sync building blocks: capability traits for both ends, the pure diff and
//! merge rules, and the reconciler tying them together.

pub mod diff;
pub mod manifest_service;
pub mod media_source;
#[cfg(test)]
pub mod memory_store;
pub mod remote_store;
pub mod sync_service;
