//! Data carried through a sync run.
//!
//! `media` holds the ephemeral per-run views of local files and bucket
//! objects; `manifest` is the persisted JSON document.

pub mod manifest;
pub mod media;
