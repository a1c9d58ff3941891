//! Media files on either side of a sync.

/// Extensions (lowercase, without the dot) that count as syncable media.
pub const MEDIA_EXTENSIONS: [&str; 4] = ["mp4", "mov", "webm", "m4v"];

pub const QUICKTIME_CONTENT_TYPE: &str = "video/quicktime";
pub const DEFAULT_VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// A media file found in the local source directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    /// Bare filename; doubles as the object key.
    pub name: String,
    pub size_bytes: u64,
}

/// A media object found in the bucket listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size_bytes: u64,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}

impl RemoteObject {
    pub fn new(key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
        }
    }
}

/// Text after the final `.`, if any. A leading dot with nothing before it
/// (`.mp4`) is a hidden file, not an extension.
pub fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext)
}

/// True when `name` ends in one of [`MEDIA_EXTENSIONS`], ignoring case.
pub fn is_media_file(name: &str) -> bool {
    extension(name).is_some_and(|ext| {
        MEDIA_EXTENSIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    })
}

/// MIME type recorded in the manifest and sent with the upload.
pub fn content_type_for(name: &str) -> &'static str {
    match extension(name) {
        Some(ext) if ext.eq_ignore_ascii_case("mov") => QUICKTIME_CONTENT_TYPE,
        _ => DEFAULT_VIDEO_CONTENT_TYPE,
    }
}

/// Filename without its final extension.
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_filter_ignores_case_and_other_types() {
        assert!(is_media_file("welcome.mp4"));
        assert!(is_media_file("Welcome.MOV"));
        assert!(is_media_file("clip.m4v"));
        assert!(is_media_file("loop.webm"));
        assert!(!is_media_file("notes.txt"));
        assert!(!is_media_file("mp4"));
        assert!(!is_media_file("video-manifest.json"));
    }

    #[test]
    fn content_type_only_special_cases_mov() {
        assert_eq!(content_type_for("intro.mov"), "video/quicktime");
        assert_eq!(content_type_for("intro.MOV"), "video/quicktime");
        assert_eq!(content_type_for("loop.webm"), "video/mp4");
        assert_eq!(content_type_for("sww-beach.mp4"), "video/mp4");
    }

    #[test]
    fn stem_strips_only_the_final_extension() {
        assert_eq!(file_stem("welcome.mp4"), "welcome");
        assert_eq!(file_stem("entity.v2.mov"), "entity.v2");
        assert_eq!(file_stem("bare"), "bare");
        assert_eq!(file_stem(".mp4"), ".mp4");
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(extension(".mp4"), None);
        assert!(!is_media_file(".mp4"));
        assert!(!is_media_file(".MOV"));
        assert!(is_media_file(".hidden.mp4"));
        assert_eq!(extension("a.b.webm"), Some("webm"));
    }
}
