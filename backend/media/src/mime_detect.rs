//! MIME detection and up-front checks for video files.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use reelchat_core::VideoError;

/// Files above this size are accepted but flagged as slow to process.
pub const LARGE_FILE_BYTES: u64 = 1024 * 1024 * 1024;

/// Container extensions the decoder is expected to handle.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm"];

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        // Video
        "mp4"          => "video/mp4",
        "webm"         => "video/webm",
        "mkv"          => "video/x-matroska",
        "mov"          => "video/quicktime",
        "avi"          => "video/x-msvideo",
        "flv"          => "video/x-flv",
        "wmv"          => "video/x-ms-wmv",
        "ogv"          => "video/ogg",

        // Frame stills
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",

        _              => "application/octet-stream",
    }
}

/// Whether a MIME type is for video.
pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Whether the extension is one of [`VIDEO_EXTENSIONS`].
pub fn has_known_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Result of [`validate_video_file`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFileReport {
    pub mime_type: &'static str,
    pub size_bytes: u64,
    pub warnings: Vec<String>,
}

impl VideoFileReport {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Check that `path` is an existing regular file before decoding it.
///
/// Unusual extensions and very large files only produce warnings.
pub fn validate_video_file(path: &Path) -> Result<VideoFileReport, VideoError> {
    let meta = std::fs::metadata(path).map_err(|e| VideoError::open(path, e.to_string()))?;
    if !meta.is_file() {
        return Err(VideoError::open(path, "not a regular file"));
    }

    let mut warnings = Vec::new();
    if !has_known_video_extension(path) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("<none>");
        warnings.push(format!("uncommon video format: .{ext}"));
    }
    if meta.len() > LARGE_FILE_BYTES {
        warnings.push("large video file; processing may take a while".to_string());
    }

    let report = VideoFileReport {
        mime_type: detect_mime_type(path),
        size_bytes: meta.len(),
        warnings,
    };
    for warning in &report.warnings {
        warn!(path = %path.display(), "{}", warning);
    }
    info!(
        path = %path.display(),
        size_mib = format_args!("{:.2}", report.size_mib()),
        "Validated video file"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn detects_mp4() {
        assert_eq!(detect_mime_type(&PathBuf::from("clip.MP4")), "video/mp4");
        assert!(is_video(detect_mime_type(&PathBuf::from("clip.wmv"))));
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_mime_type(&PathBuf::from("file.xyz")), "application/octet-stream");
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = validate_video_file(Path::new("/no/such/video.mp4")).unwrap_err();
        assert!(matches!(err, VideoError::Open { .. }));
    }

    #[test]
    fn uncommon_extension_only_warns() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(b"not really a video").unwrap();
        let report = validate_video_file(file.path()).unwrap();
        assert_eq!(report.size_bytes, 18);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn known_extension_has_no_warnings() {
        let file = tempfile::Builder::new().suffix(".webm").tempfile().unwrap();
        let report = validate_video_file(file.path()).unwrap();
        assert_eq!(report.mime_type, "video/webm");
        assert!(report.warnings.is_empty());
    }
}
