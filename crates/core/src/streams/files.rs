//! File-name helpers: type detection, MIME types, human-readable numbers.

use std::time::Duration;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "ass", "ssa", "vtt", "smi"];

fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty()).then(|| ext.to_ascii_lowercase())
}

pub fn is_video_file(name: &str) -> bool {
    extension(name).is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_subtitle_file(name: &str) -> bool {
    extension(name).is_some_and(|e| SUBTITLE_EXTENSIONS.contains(&e.as_str()))
}

/// MIME type to stream a file with, by extension.
pub fn streaming_mime_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("ts") | Some("m2ts") => "video/mp2t",
        Some("srt") => "application/x-subrip",
        Some("vtt") => "text/vtt",
        Some("ass") | Some("ssa") => "text/x-ssa",
        Some("sub") | Some("smi") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// `1536` -> `"1.5 KB"`; binary units.
pub fn readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// `3725s` -> `"1h 2m 5s"`. Leading zero parts are omitted.
pub fn readable_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_and_subtitle_detection() {
        assert!(is_video_file("Movie.2024.1080p.MKV"));
        assert!(is_video_file("a/b/episode.mp4"));
        assert!(!is_video_file("sample.txt"));
        assert!(!is_video_file("mkv"));
        assert!(!is_video_file(".mkv"));

        assert!(is_subtitle_file("Movie.hun.srt"));
        assert!(is_subtitle_file("subs.ASS"));
        assert!(!is_subtitle_file("Movie.mkv"));
    }

    #[test]
    fn test_streaming_mime_type() {
        assert_eq!(streaming_mime_type("a.mkv"), "video/x-matroska");
        assert_eq!(streaming_mime_type("a.MP4"), "video/mp4");
        assert_eq!(streaming_mime_type("a.srt"), "application/x-subrip");
        assert_eq!(streaming_mime_type("noext"), "application/octet-stream");
    }

    #[test]
    fn test_readable_size() {
        assert_eq!(readable_size(512), "512 B");
        assert_eq!(readable_size(1536), "1.5 KB");
        assert_eq!(readable_size(1024 * 1024 * 1024), "1 GB");
        assert_eq!(readable_size(4_500_000_000), "4.19 GB");
    }

    #[test]
    fn test_readable_duration() {
        assert_eq!(readable_duration(Duration::from_secs(5)), "5s");
        assert_eq!(readable_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(readable_duration(Duration::from_secs(90_061)), "1d 1h 1m 1s");
        assert_eq!(readable_duration(Duration::from_secs(86_400)), "1d 0h 0m 0s");
    }
}
