//! Name classifiers: quality, language and episode markers.
//!
//! Every function here is pure and total. Unrecognised input yields a
//! sentinel ("Unknown" quality, an Unknown language tag, `false`) rather than
//! an error.

mod episode;
mod language;
mod quality;

pub use episode::{has_episode_token, is_season_pack, EpisodeMatcher};
pub use language::{
    guess_languages, has_hungarian_subtitle_hint, has_subtitle_hint, Language, LanguageTag,
    LanguageTags,
};
pub(crate) use quality::tokenize;
pub use quality::{guess_quality, QualityGuess};
