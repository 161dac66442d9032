//! Mapping between ISO language codes and the site's URL language tokens.

use encoding_rs::Encoding;
use std::collections::HashMap;
use std::sync::LazyLock;

/// One language the site knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageEntry {
    /// Every ISO 639-1 / 639-2 spelling accepted for this language
    pub aliases: &'static [&'static str],
    /// Three-letter ISO 639-2/B code
    pub iso639_2: &'static str,
    /// Lowercase token used in `/subtitles/<slug>/<token>` paths
    pub site_token: &'static str,
}

const fn entry(
    aliases: &'static [&'static str],
    iso639_2: &'static str,
    site_token: &'static str,
) -> LanguageEntry {
    LanguageEntry {
        aliases,
        iso639_2,
        site_token,
    }
}

pub static LANGUAGES: &[LanguageEntry] = &[
    entry(&["fa", "per"], "per", "farsi_persian"),
    entry(&["ar", "ara"], "ara", "arabic"),
    entry(&["en", "eng"], "eng", "english"),
    entry(&["my", "bur"], "bur", "burmese"),
    entry(&["da", "dan"], "dan", "danish"),
    entry(&["nl", "dut"], "dut", "dutch"),
    entry(&["he", "heb"], "heb", "hebrew"),
    entry(&["id", "ind"], "ind", "indonesian"),
    entry(&["ko", "kor"], "kor", "korean"),
    entry(&["ms", "may"], "may", "malay"),
    entry(&["es", "spa"], "spa", "spanish"),
    entry(&["vi", "vie"], "vie", "vietnamese"),
    entry(&["tr", "tur"], "tur", "turkish"),
    entry(&["bn", "ben"], "ben", "bengali"),
    entry(&["bg", "bul"], "bul", "bulgarian"),
    entry(&["hr", "hrv"], "hrv", "croatian"),
    entry(&["fi", "fin"], "fin", "finnish"),
    entry(&["fr", "fre"], "fre", "french"),
    entry(&["de", "ger"], "ger", "german"),
    entry(&["el", "gre"], "gre", "greek"),
    entry(&["hu", "hun"], "hun", "hungarian"),
    entry(&["it", "ita"], "ita", "italian"),
    entry(&["ku", "kur"], "kur", "kurdish"),
    entry(&["mk", "mac"], "mac", "macedonian"),
    entry(&["ml", "mal"], "mal", "malayalam"),
    entry(
        &["nn", "nno", "nb", "nob", "no", "nor"],
        "nor",
        "norwegian",
    ),
    entry(&["pt", "por"], "por", "portuguese"),
    entry(&["ru", "rus"], "rus", "russian"),
    entry(&["sr", "srp"], "srp", "serbian"),
    entry(&["si", "sin"], "sin", "sinhala"),
    entry(&["sl", "slv"], "slv", "slovenian"),
    entry(&["sv", "swe"], "swe", "swedish"),
    entry(&["th", "tha"], "tha", "thai"),
    entry(&["ur", "urd"], "urd", "urdu"),
    entry(&["pt-br", "pob"], "pob", "brazillian-portuguese"),
];

static BY_ALIAS: LazyLock<HashMap<&'static str, &'static LanguageEntry>> = LazyLock::new(|| {
    LANGUAGES
        .iter()
        .flat_map(|entry| entry.aliases.iter().map(move |alias| (*alias, entry)))
        .collect()
});

/// Look up a language by any of its aliases, case-insensitively
pub fn lookup(code: &str) -> Option<&'static LanguageEntry> {
    BY_ALIAS
        .get(code.trim().to_lowercase().as_str())
        .copied()
}

/// Site URL token for an ISO code; unknown codes come back lower-cased
pub fn to_site_token(code: &str) -> String {
    match lookup(code) {
        Some(entry) => entry.site_token.to_string(),
        None => code.to_lowercase(),
    }
}

/// Three-letter code for a language that may be missing.
///
/// Only a blank `language` is resolved, through `fallback_locale`; anything
/// else is returned unchanged.
pub fn to_iso(language: &str, fallback_locale: &str) -> String {
    if !language.trim().is_empty() {
        return language.to_string();
    }

    match lookup(fallback_locale) {
        Some(entry) => entry.iso639_2.to_string(),
        None => fallback_locale.to_string(),
    }
}

/// Legacy code page most subtitle files in `language` are written in
pub fn text_encoding_for(language: &str) -> &'static Encoding {
    let code = lookup(language).map(|entry| entry.iso639_2).unwrap_or_default();
    match code {
        "per" | "ara" | "urd" | "kur" => encoding_rs::WINDOWS_1256,
        "heb" => encoding_rs::WINDOWS_1255,
        "rus" | "bul" | "srp" | "mac" => encoding_rs::WINDOWS_1251,
        "gre" => encoding_rs::WINDOWS_1253,
        "tur" => encoding_rs::WINDOWS_1254,
        "hun" | "hrv" | "slv" => encoding_rs::WINDOWS_1250,
        "tha" => encoding_rs::WINDOWS_874,
        "vie" => encoding_rs::WINDOWS_1258,
        _ => encoding_rs::WINDOWS_1252,
    }
}
