use crate::error::{SubsceneError, SubsceneResult};
use crate::language;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://subscene.com";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Configuration for a [`crate::Subscene`] client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubsceneOptions {
    /// Root of the subtitle site, without a trailing path
    pub base_url: String,
    /// Ceiling for every single request (not cumulative over a search)
    pub timeout_seconds: u64,
    /// Custom User-Agent string
    pub user_agent: Option<String>,
    /// Proxy URL applied to every request
    pub proxy: Option<String>,
    /// TMDB API key; metadata resolution is skipped without one
    pub tmdb_api_key: Option<String>,
    /// Root of the TMDB API
    pub tmdb_base_url: String,
    /// Language used when a query carries none
    pub fallback_language: String,
}

impl Default for SubsceneOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: None,
            proxy: None,
            tmdb_api_key: None,
            tmdb_base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            fallback_language: "eng".to_string(),
        }
    }
}

impl SubsceneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn user_agent(mut self, agent: &str) -> Self {
        self.user_agent = Some(agent.to_string());
        self
    }

    pub fn proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }

    pub fn tmdb_api_key(mut self, key: &str) -> Self {
        self.tmdb_api_key = Some(key.to_string());
        self
    }

    pub fn tmdb_base_url(mut self, url: &str) -> Self {
        self.tmdb_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn fallback_language(mut self, language: &str) -> Self {
        self.fallback_language = language.to_string();
        self
    }

    /// User agent sent with every request
    pub fn effective_user_agent(&self) -> Cow<'_, str> {
        match &self.user_agent {
            Some(agent) => Cow::Borrowed(agent.as_str()),
            None => Cow::Owned(format!("subscene-rs/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Kind of media a search is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Movie,
    Episode,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Episode => write!(f, "episode"),
        }
    }
}

/// A single logical subtitle search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Movie title, or series title for episodes
    pub title: String,
    pub year: Option<i32>,
    /// ISO language code (`per`, `eng`, `fa`, ...)
    pub language: String,
    pub media_kind: MediaKind,
    /// IMDB/TMDB identifier enabling metadata resolution
    pub external_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl SearchQuery {
    pub fn movie(title: &str) -> Self {
        Self {
            title: title.to_string(),
            year: None,
            language: String::new(),
            media_kind: MediaKind::Movie,
            external_id: None,
            season: None,
            episode: None,
        }
    }

    pub fn episode(series_title: &str, season: u32, episode: u32) -> Self {
        Self {
            title: series_title.to_string(),
            year: None,
            language: String::new(),
            media_kind: MediaKind::Episode,
            external_id: None,
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn external_id(mut self, id: &str) -> Self {
        self.external_id = Some(id.to_string());
        self
    }

    /// `SxxEyy` token used to filter episode candidates.
    ///
    /// `None` for movies and for episode queries missing a season or
    /// episode number of at least 1.
    pub fn episode_token(&self) -> Option<String> {
        if self.media_kind != MediaKind::Episode {
            return None;
        }
        match (self.season, self.episode) {
            (Some(season), Some(episode)) if season >= 1 && episode >= 1 => {
                Some(format!("S{:02}E{:02}", season, episode))
            }
            _ => None,
        }
    }
}

/// Site-relative detail page plus the language it was requested in.
///
/// The serialized form is the opaque [`SubtitleCandidate::id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateId {
    pub path: String,
    pub language: String,
}

const LEGACY_LANGUAGE_DELIMITER: &str = "___";
const LEGACY_PATH_DELIMITER: &str = "__";

impl CandidateId {
    pub fn new(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
        }
    }

    /// Serialize as form-urlencoded `path=..&lang=..` pairs
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("path", &self.path)
            .append_pair("lang", &self.language)
            .finish()
    }

    /// Parse an id produced by [`CandidateId::encode`], or the older
    /// `__path__segments___lang` delimiter form.
    pub fn decode(id: &str) -> SubsceneResult<Self> {
        let invalid = || SubsceneError::InvalidCandidateId { id: id.to_string() };

        if id.starts_with("path=") {
            let mut path = None;
            let mut language = None;
            for (key, value) in url::form_urlencoded::parse(id.as_bytes()) {
                match key.as_ref() {
                    "path" => path = Some(value.into_owned()),
                    "lang" => language = Some(value.into_owned()),
                    _ => {}
                }
            }
            return match (path, language) {
                (Some(path), Some(language)) if path.starts_with('/') => {
                    Ok(Self { path, language })
                }
                _ => Err(invalid()),
            };
        }

        let (encoded_path, language) = id
            .rsplit_once(LEGACY_LANGUAGE_DELIMITER)
            .ok_or_else(invalid)?;
        let path = encoded_path.replace(LEGACY_PATH_DELIMITER, "/");
        if !path.starts_with('/') || language.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            path,
            language: language.to_string(),
        })
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// One row of a subtitle listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    /// Opaque token accepted by [`crate::Subscene::retrieve`]
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub uploader_group: Option<String>,
    /// Three-letter ISO code
    pub language: String,
    pub is_hash_match: bool,
    /// Every release name merged into this candidate, joined with `<br/>`
    pub comment: Option<String>,
}

/// A retrieved subtitle, or an empty one when nothing could be retrieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleFile {
    pub bytes: Vec<u8>,
    /// Lowercase file extension without the leading dot
    pub format: Option<String>,
    pub language: Option<String>,
}

impl SubtitleFile {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the subtitle to UTF-8 text.
    ///
    /// BOM first, then strict UTF-8, then the legacy code page usually
    /// used for the subtitle's language.
    pub fn to_utf8(&self) -> String {
        if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(&self.bytes) {
            let (text, _) = encoding.decode_without_bom_handling(&self.bytes[bom_len..]);
            return text.into_owned();
        }

        if let Ok(text) = std::str::from_utf8(&self.bytes) {
            return text.to_string();
        }

        let encoding = language::text_encoding_for(self.language.as_deref().unwrap_or_default());
        let (text, _, _) = encoding.decode(&self.bytes);
        text.into_owned()
    }
}

/// Canonical movie details from the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub title: String,
    pub original_title: Option<String>,
    pub release_year: Option<i32>,
    pub imdb_id: Option<String>,
}

/// Canonical show details from the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowMetadata {
    pub title: String,
    pub original_title: Option<String>,
    pub release_year: Option<i32>,
    pub show_id: u64,
}

/// Result of [`crate::Subscene::search`]
#[derive(Debug)]
pub enum SearchOutcome {
    Found(Vec<SubtitleCandidate>),
    NotFound,
    /// Nothing found and at least one step failed on the way
    Failed(SubsceneError),
}

impl SearchOutcome {
    pub fn from_candidates(candidates: Vec<SubtitleCandidate>) -> Self {
        if candidates.is_empty() {
            SearchOutcome::NotFound
        } else {
            SearchOutcome::Found(candidates)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    /// Collapse to a plain list, empty for misses and failures
    pub fn into_candidates(self) -> Vec<SubtitleCandidate> {
        match self {
            SearchOutcome::Found(candidates) => candidates,
            SearchOutcome::NotFound | SearchOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Result of [`crate::Subscene::retrieve`]
#[derive(Debug)]
pub enum RetrieveOutcome {
    Found(SubtitleFile),
    NotFound,
    Failed(SubsceneError),
}

impl RetrieveOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, RetrieveOutcome::Found(_))
    }

    /// Collapse to a file, [`SubtitleFile::empty`] for misses and failures
    pub fn into_file(self) -> SubtitleFile {
        match self {
            RetrieveOutcome::Found(file) => file,
            RetrieveOutcome::NotFound | RetrieveOutcome::Failed(_) => SubtitleFile::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_options_builder() {
        let options = SubsceneOptions::new()
            .base_url("http://localhost:1234/")
            .timeout(3)
            .tmdb_api_key("key");

        assert_eq!(options.base_url, "http://localhost:1234");
        assert_eq!(options.timeout_seconds, 3);
        assert_eq!(options.tmdb_api_key.as_deref(), Some("key"));
        assert!(options.effective_user_agent().starts_with("subscene-rs/"));
    }

    #[test]
    fn test_episode_token() {
        assert_eq!(
            SearchQuery::episode("Dark", 1, 5).episode_token().as_deref(),
            Some("S01E05")
        );
        assert_eq!(
            SearchQuery::episode("Dark", 12, 103).episode_token().as_deref(),
            Some("S12E103")
        );
        assert_eq!(SearchQuery::episode("Dark", 0, 5).episode_token(), None);
        assert_eq!(SearchQuery::movie("Dark").episode_token(), None);
    }

    #[test]
    fn test_candidate_id_encode() {
        let id = CandidateId::new("/subtitles/bright/farsi_persian/1922088", "per");
        assert_eq!(
            id.encode(),
            "path=%2Fsubtitles%2Fbright%2Ffarsi_persian%2F1922088&lang=per"
        );
        assert_eq!(CandidateId::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn test_candidate_id_decode_legacy() {
        let id = CandidateId::decode("__subtitles__bright__farsi_persian__1922088___per").unwrap();
        assert_eq!(id.path, "/subtitles/bright/farsi_persian/1922088");
        assert_eq!(id.language, "per");
    }

    #[test]
    fn test_candidate_id_decode_invalid() {
        for id in ["", "garbage", "path=relative&lang=per", "path=%2Fx", "__a__b___"] {
            assert!(CandidateId::decode(id).is_err(), "should reject: {}", id);
        }
    }

    #[test]
    fn test_subtitle_file_to_utf8() {
        let file = SubtitleFile {
            bytes: "سلام".as_bytes().to_vec(),
            format: Some("srt".to_string()),
            language: Some("per".to_string()),
        };
        assert_eq!(file.to_utf8(), "سلام");

        // "سلام" in Windows-1256
        let file = SubtitleFile {
            bytes: vec![0xD3, 0xE1, 0xC7, 0xE3],
            format: Some("srt".to_string()),
            language: Some("per".to_string()),
        };
        assert_eq!(file.to_utf8(), "سلام");

        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"1\n");
        let file = SubtitleFile {
            bytes: bom,
            ..SubtitleFile::empty()
        };
        assert_eq!(file.to_utf8(), "1\n");
    }

    #[test]
    fn test_outcomes_collapse_to_empty() {
        assert!(SearchOutcome::NotFound.into_candidates().is_empty());
        assert!(
            SearchOutcome::Failed(SubsceneError::EmptyArchive)
                .into_candidates()
                .is_empty()
        );
        assert!(!SearchOutcome::from_candidates(Vec::new()).is_found());
        assert!(RetrieveOutcome::NotFound.into_file().is_empty());
        assert_eq!(
            RetrieveOutcome::Failed(SubsceneError::EmptyArchive).into_file(),
            SubtitleFile::empty()
        );
    }

    proptest! {
        #[test]
        fn prop_candidate_id_round_trips(
            path in "/[a-zA-Z0-9_\\-/&=%+ ]{0,40}",
            language in "[a-zA-Z_\\-&=%]{1,12}",
        ) {
            let id = CandidateId::new(&path, &language);
            prop_assert_eq!(CandidateId::decode(&id.encode()).unwrap(), id);
        }
    }
}
