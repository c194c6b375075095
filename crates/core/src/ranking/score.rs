//! Composite score: weighted signal components minus penalties.

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

const W_SEEDS: f64 = 0.12;
const W_RESOLUTION: f64 = 0.28;
const W_SIZE: f64 = 0.30;
const W_SOURCE: f64 = 0.10;
const W_LANGUAGE: f64 = 0.15;
const W_PACK: f64 = 0.05;
const W_FREELEECH: f64 = 0.05;

/// Inputs to [`composite_score`], already classified.
#[derive(Debug, Clone, Default)]
pub struct ScoreInput<'a> {
    pub name: &'a str,
    pub tracker: &'a str,
    pub seeds: u32,
    pub size_bytes: u64,
    pub resolution: Option<&'a str>,
    pub is_low_quality_capture: bool,
    pub has_target_audio: bool,
    pub has_target_subtitle: bool,
    pub is_season_pack: bool,
    pub is_freeleech: bool,
    /// A single episode (as opposed to a movie or season pack).
    pub is_episode: bool,
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Logarithmic popularity, saturating at 100 seeds.
pub fn seed_score(seeds: u32) -> f64 {
    let s = seeds.min(100) as f64;
    clamp((s + 1.0).log10() / 101f64.log10(), 0.0, 1.0)
}

pub fn resolution_score(resolution: Option<&str>) -> f64 {
    match resolution.map(str::to_lowercase).as_deref() {
        Some("2160p") => 1.0,
        Some("1440p") => 0.95,
        Some("1080p") => 0.9,
        Some("720p") => 0.75,
        Some("480p") => 0.55,
        _ => 0.3,
    }
}

/// Bell-shaped fit against the ideal size range.
///
/// Episodes clamp to `[0, 1]`, movies and packs to `[-1, 1]`: a movie far
/// from the ideal centre can pull the composite down, an episode cannot.
pub fn size_score(size_bytes: u64, is_episode: bool) -> f64 {
    if size_bytes == 0 {
        return 0.0;
    }
    let gb = size_bytes as f64 / GIB;

    let (zero_below, zero_above, ideal_min, ideal_max, floor) = if is_episode {
        (0.3, 12.0, 1.2, 7.0, 0.0)
    } else {
        (0.7, 60.0, 4.0, 16.0, -1.0)
    };

    if !(zero_below..=zero_above).contains(&gb) {
        return 0.0;
    }

    let center = (ideal_min + ideal_max) / 2.0;
    let dist = (gb - center).abs();
    clamp(1.0 - dist / center, floor, 1.0)
}

/// Reputation of the tracker the candidate came from.
pub fn source_score(tracker: &str) -> f64 {
    match tracker.to_lowercase().as_str() {
        "ncore" => 1.0,
        "yts" => 0.8,
        "eztv" | "jackett" => 0.7,
        _ => 0.5,
    }
}

pub fn language_score(has_audio: bool, has_subtitle: bool) -> f64 {
    let audio = if has_audio { 1.0 } else { 0.0 };
    let subtitle = if has_subtitle { 1.0 } else { 0.0 };
    0.7 * audio + 0.3 * subtitle
}

fn is_web_name(tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|t| t == "web" || t == "webrip" || t == "webdl")
}

fn is_remux_name(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t == "remux")
}

/// Sum of all penalties (zero or negative).
pub fn penalties(input: &ScoreInput<'_>) -> f64 {
    let mut penalty = 0.0;

    if input.is_low_quality_capture {
        penalty -= 0.9;
    }
    if input.seeds == 0 {
        penalty -= 1.0;
    }

    if input.size_bytes > 0 {
        let gb = input.size_bytes as f64 / GIB;

        if input.is_episode {
            if gb > 15.0 {
                penalty -= 3.0;
            } else if gb > 10.0 {
                penalty -= 1.5;
            }

            if gb < 1.2 {
                penalty -= 1.0;
            } else if gb < 2.0 {
                penalty -= 0.4;
            }
        } else {
            let tokens = crate::classify::tokenize(input.name);
            let is_web = is_web_name(&tokens);
            let is_remux = is_remux_name(&tokens);

            if is_web && gb > 20.0 {
                penalty -= 0.35;
            } else if is_web && gb > 16.0 {
                penalty -= 0.18;
            }

            if is_remux && gb > 30.0 {
                penalty -= 0.6;
            }
            if !is_remux && gb > 45.0 {
                penalty -= 0.35;
            }
        }

        if gb < 0.7 {
            penalty -= 0.4;
        }
        if gb > 80.0 {
            penalty -= 0.5;
        }
    }

    penalty
}

/// Weighted sum of the seven components plus penalties.
pub fn composite_score(input: &ScoreInput<'_>) -> f64 {
    let bonus = |flag: bool| if flag { 1.0 } else { 0.0 };

    W_SEEDS * seed_score(input.seeds)
        + W_RESOLUTION * resolution_score(input.resolution)
        + W_SIZE * size_score(input.size_bytes, input.is_episode)
        + W_SOURCE * source_score(input.tracker)
        + W_LANGUAGE * language_score(input.has_target_audio, input.has_target_subtitle)
        + W_PACK * bonus(input.is_season_pack)
        + W_FREELEECH * bonus(input.is_freeleech)
        + penalties(input)
}
