//! Release quality classification from a torrent or file name.

use serde::{Deserialize, Serialize};

/// Quality guessed from a release name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGuess {
    /// Human readable label, e.g. "1080p HDR BluRay Remux" or "Unknown".
    pub label: String,
    /// Ordering score. Negative infinity when nothing was recognised.
    pub score: f64,
    /// Resolution tag ("2160p", "1080p", "720p", "480p") if present.
    pub resolution: Option<&'static str>,
    /// CAM/TS/TC family capture.
    pub is_low_quality_capture: bool,
}

impl QualityGuess {
    /// Whether any quality token was recognised.
    pub fn is_known(&self) -> bool {
        self.score.is_finite()
    }
}

/// Split a name into lower-cased alphanumeric tokens.
pub(crate) fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Guess the quality of a release from its name.
///
/// Never fails: names without any recognised token yield an "Unknown" label
/// with a score of negative infinity, so they sort last.
pub fn guess_quality(name: &str) -> QualityGuess {
    let tokens = tokenize(name);
    let has = |t: &str| tokens.iter().any(|x| x == t);

    let mut score = 0.0;
    let mut parts: Vec<&str> = Vec::new();
    let mut resolution = None;
    let mut is_low_quality_capture = false;

    if has("2160p") || has("4k") {
        parts.push("4K");
        score += 3000.0;
        resolution = Some("2160p");
    } else if has("1080p") {
        parts.push("1080p");
        score += 2000.0;
        resolution = Some("1080p");
    } else if has("720p") {
        parts.push("720p");
        score += 1000.0;
        resolution = Some("720p");
    } else if has("480p") {
        parts.push("480p");
        score += 500.0;
        resolution = Some("480p");
    }

    if (has("dolby") && has("vision"))
        || has("dovi")
        || has("dv")
        || has("hdr")
        || has("hdr10")
    {
        parts.push("HDR");
        score += 10.0;
    }

    if has("bluray") || (has("blu") && has("ray")) || has("bdrip") || has("brrip") {
        parts.push("BluRay");
        score += 500.0;

        if has("remux") {
            parts.push("Remux");
            score += 100.0;
        }
    } else if has("webrip") || has("webdl") || has("web") {
        parts.push("WEB");
        score += 400.0;
    } else if has("dvdrip") {
        parts.push("DVD");
        score += 300.0;
    } else if has("hdtv") {
        parts.push("HDTV");
        score += 200.0;
    } else if has("sdtv") {
        parts.push("SDTV");
        score += 100.0;
    } else if ["camrip", "cam", "hdcam", "ts", "hdts", "telesync", "tc", "hdtc", "telecine"]
        .iter()
        .any(|t| has(t))
    {
        parts.push("CAM");
        score -= 5000.0;
        is_low_quality_capture = true;
    }

    if has("3d") {
        parts.push("3D");
        score -= 1.0;
    }

    if parts.is_empty() {
        return QualityGuess {
            label: "Unknown".to_string(),
            score: f64::NEG_INFINITY,
            resolution: None,
            is_low_quality_capture: false,
        };
    }

    QualityGuess {
        label: parts.join(" "),
        score,
        resolution,
        is_low_quality_capture,
    }
}
