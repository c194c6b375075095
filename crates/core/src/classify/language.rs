//! Audio language tagging and subtitle hint detection.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use super::quality::tokenize;

/// Languages recognised in release names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Hun,
    Ger,
    Fre,
    Ita,
    Eng,
    Rus,
    Spa,
    Multi,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Hun,
        Language::Ger,
        Language::Fre,
        Language::Ita,
        Language::Eng,
        Language::Rus,
        Language::Spa,
        Language::Multi,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Hun => "HUN",
            Language::Ger => "GER",
            Language::Fre => "FRE",
            Language::Ita => "ITA",
            Language::Eng => "ENG",
            Language::Rus => "RUS",
            Language::Spa => "SPA",
            Language::Multi => "MULTI",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Language::Hun => "🇭🇺",
            Language::Ger => "🇩🇪",
            Language::Fre => "🇫🇷",
            Language::Ita => "🇮🇹",
            Language::Eng => "🇬🇧",
            Language::Rus => "🇷🇺",
            Language::Spa => "🇪🇸",
            Language::Multi => "🌍",
        }
    }

    /// Name tokens that mark this language.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Language::Hun => &["hun", "hungarian"],
            Language::Ger => &["ger", "german"],
            Language::Fre => &["fre", "french"],
            Language::Ita => &["ita", "italian"],
            Language::Eng => &["eng", "english"],
            Language::Rus => &["rus", "russian"],
            Language::Spa => &["spa", "spanish"],
            Language::Multi => &["multi"],
        }
    }

    /// Parse a language code such as "HUN" (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(code.trim()))
    }

    fn from_keyword(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.keywords().contains(&token))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flag(), self.code())
    }
}

/// One entry of a language tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageTag {
    Known(Language),
    Unknown,
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageTag::Known(lang) => lang.fmt(f),
            LanguageTag::Unknown => f.write_str("❓ Unknown"),
        }
    }
}

impl Serialize for LanguageTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered, duplicate-free language tags. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LanguageTags(Vec<LanguageTag>);

impl Default for LanguageTags {
    fn default() -> Self {
        Self(vec![LanguageTag::Unknown])
    }
}

impl LanguageTags {
    fn from_tags(tags: Vec<LanguageTag>) -> Self {
        if tags.is_empty() {
            Self(vec![LanguageTag::Unknown])
        } else {
            Self(tags)
        }
    }

    pub fn contains(&self, language: Language) -> bool {
        self.0.contains(&LanguageTag::Known(language))
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == [LanguageTag::Unknown]
    }

    /// True when every tag is a known language other than `language` or multi.
    pub fn is_foreign_only(&self, language: Language) -> bool {
        self.0.iter().all(|tag| match tag {
            LanguageTag::Known(l) => *l != language && *l != Language::Multi,
            LanguageTag::Unknown => false,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageTag> {
        self.0.iter()
    }
}

impl fmt::Display for LanguageTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            tag.fmt(f)?;
        }
        Ok(())
    }
}

static HUN_SUB_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:hun?\s*sub|subhun)\b").expect("valid regex"));
static SUB_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsubs?\b").expect("valid regex"));
static HUN_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:hun|hungarian|hu)\b").expect("valid regex"));

/// Whether the name annotates Hungarian *subtitles* ("hunsub", "sub hun", a
/// bare "subs" next to a Hungarian token...).
pub fn has_hungarian_subtitle_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    HUN_SUB_TOKEN.is_match(&lower) || (SUB_WORD.is_match(&lower) && HUN_WORD.is_match(&lower))
}

/// Subtitle annotations per language other than Hungarian, which has its
/// own rules.
static SUBTITLE_HINTS: Lazy<HashMap<Language, Regex>> = Lazy::new(|| {
    Language::ALL
        .into_iter()
        .filter(|l| *l != Language::Hun)
        .filter_map(|language| {
            let code = language.code().to_lowercase();
            let words = language.keywords().join("|");
            let pattern =
                format!(r"\b(?:{code}\s*subs?|subs?\s*{code})\b|(?:{words})[^a-z0-9]+subs?\b");
            Regex::new(&pattern).ok().map(|re| (language, re))
        })
        .collect()
});

/// Whether the name advertises subtitles in `language`.
pub fn has_subtitle_hint(name: &str, language: Language) -> bool {
    if language == Language::Hun {
        return has_hungarian_subtitle_hint(name);
    }
    SUBTITLE_HINTS
        .get(&language)
        .is_some_and(|re| re.is_match(&name.to_lowercase()))
}

/// Tag the audio languages of a release.
///
/// Uppercase "HU"/"EN" in the provider category force-add Hungarian/English.
/// Name tokens are matched against each language's keywords; a Hungarian
/// token is ignored when the name reads as a Hungarian subtitle annotation.
pub fn guess_languages(name: &str, category: Option<&str>) -> LanguageTags {
    let mut tags: Vec<LanguageTag> = Vec::new();
    let mut push = |tag: LanguageTag| {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    if let Some(category) = category {
        if category.contains("HU") {
            push(LanguageTag::Known(Language::Hun));
        }
        if category.contains("EN") {
            push(LanguageTag::Known(Language::Eng));
        }
    }

    let subtitle_hint = has_hungarian_subtitle_hint(name);
    for token in tokenize(name) {
        match Language::from_keyword(&token) {
            Some(Language::Hun) if subtitle_hint => {}
            Some(lang) => push(LanguageTag::Known(lang)),
            None => {}
        }
    }

    LanguageTags::from_tags(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_case_insensitive() {
        assert_eq!(Language::from_code("HUN"), Some(Language::Hun));
        assert_eq!(Language::from_code("eng"), Some(Language::Eng));
        assert_eq!(Language::from_code(" Multi "), Some(Language::Multi));
        assert_eq!(Language::from_code("xx"), None);
    }

    #[test]
    fn test_tags_in_first_match_order() {
        let tags = guess_languages("Movie.2020.ENG.HUN.1080p", None);
        assert_eq!(tags.to_string(), "🇬🇧 ENG / 🇭🇺 HUN");
    }

    #[test]
    fn test_duplicates_collapse() {
        let tags = guess_languages("Movie Hungarian HUN hun", None);
        assert_eq!(tags.iter().count(), 1);
        assert!(tags.contains(Language::Hun));
    }

    #[test]
    fn test_unknown_when_no_language() {
        let tags = guess_languages("Movie.2020.1080p.BluRay", None);
        assert!(tags.is_unknown());
        assert_eq!(tags.to_string(), "❓ Unknown");
    }

    #[test]
    fn test_category_forces_tags() {
        let tags = guess_languages("Movie.2020.1080p", Some("HD_HUN"));
        assert!(tags.contains(Language::Hun));

        let tags = guess_languages("Movie.2020.1080p", Some("xvid_EN"));
        assert!(tags.contains(Language::Eng));
        assert!(!tags.contains(Language::Hun));
    }

    #[test]
    fn test_hungarian_subtitle_is_not_audio() {
        for name in [
            "Movie.2020.1080p.ENG.HUNSUB",
            "Movie 2020 1080p ENG Hun Sub",
            "Movie 2020 1080p ENG subs HUN",
            "Movie.2020.SubHun",
        ] {
            assert!(has_hungarian_subtitle_hint(name), "{}", name);
            let tags = guess_languages(name, None);
            assert!(!tags.contains(Language::Hun), "{}", name);
        }
    }

    #[test]
    fn test_hungarian_audio_without_subtitle_hint() {
        assert!(!has_hungarian_subtitle_hint("Movie.2020.HUN.1080p"));
        assert!(guess_languages("Movie.2020.HUN.1080p", None).contains(Language::Hun));
    }

    #[test]
    fn test_keywords_are_whole_tokens() {
        // "free", "space", "german" inside other words must not match
        let tags = guess_languages("Free Guy Space Adventures 1080p", None);
        assert!(tags.is_unknown());
    }

    #[test]
    fn test_generic_subtitle_hint() {
        assert!(has_subtitle_hint("Movie 1080p engsub", Language::Eng));
        assert!(has_subtitle_hint("Movie 1080p English Subs", Language::Eng));
        assert!(has_subtitle_hint("Movie 1080p sub ger", Language::Ger));
        assert!(!has_subtitle_hint("Movie 1080p ENG", Language::Eng));
        assert!(has_subtitle_hint("Film.2019.FRENCH.SUBS.720p", Language::Fre));
        assert!(!has_subtitle_hint("Film.2019.FRENCH.SUBS.720p", Language::Ita));
        for language in Language::ALL {
            if language != Language::Hun {
                assert!(SUBTITLE_HINTS.contains_key(&language), "{:?}", language);
            }
        }
    }

    #[test]
    fn test_foreign_only() {
        let tags = guess_languages("Movie GER", None);
        assert!(tags.is_foreign_only(Language::Hun));
        assert!(!guess_languages("Movie MULTI", None).is_foreign_only(Language::Hun));
        assert!(!guess_languages("Movie", None).is_foreign_only(Language::Hun));
        assert!(!guess_languages("Movie HUN GER", None).is_foreign_only(Language::Hun));
    }

    #[test]
    fn test_tags_serialize_as_display_strings() {
        let tags = guess_languages("Movie ENG", None);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["🇬🇧 ENG"]"#);
    }
}
