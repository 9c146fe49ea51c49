//! Destination naming for downloaded assets.
//!
//! The asset source only suggests a quality tag; the final file name is
//! namespaced by id and quality so two assets never share a path.

use std::path::{Path, PathBuf};

/// Extension used when the URL path carries none.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_file_name(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        let c = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

/// Lowercase extension of the last URL path segment, if it has a short alphanumeric one.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `video_{id}_{quality}.{ext}`, sanitized.
pub fn video_file_name(id: i64, quality: &str, extension: &str) -> String {
    let quality = sanitize_file_name(quality);
    let quality = if quality.is_empty() { "sd" } else { quality.as_str() };
    sanitize_file_name(&format!("video_{}_{}.{}", id, quality, extension))
}

/// Full destination path for an asset inside `download_dir`.
pub fn destination_for(download_dir: &Path, id: i64, quality: &str, url: &str) -> PathBuf {
    let ext = extension_from_url(url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    download_dir.join(video_file_name(id, quality, &ext))
}
