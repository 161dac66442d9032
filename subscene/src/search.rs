//! The search cascade: locating the listing page for a title, then
//! narrowing and merging the extracted candidates.

use crate::error::{SubsceneError, SubsceneResult};
use crate::fetcher::PageFetcher;
use crate::language;
use crate::parser::{self, Relevance, SearchEntry};
use crate::slug::build_slug;
use crate::types::SubtitleCandidate;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const SEASON_ORDINALS: [&str; 9] = [
    "First", "Second", "Third", "Fourth", "Fifth", "Sixth", "Seventh", "Eighth", "Ninth",
];

const MOVIE_RELEVANCE: &[Relevance] = &[Relevance::Exact, Relevance::Close, Relevance::Popular];
const SHOW_RELEVANCE: &[Relevance] = &[Relevance::Exact, Relevance::Close];

/// What a single strategy produced
#[derive(Debug)]
pub enum TierResult {
    Page(String),
    Miss,
    Error(SubsceneError),
}

impl From<SubsceneResult<Option<String>>> for TierResult {
    fn from(result: SubsceneResult<Option<String>>) -> Self {
        match result {
            Ok(Some(page)) => TierResult::Page(page),
            Ok(None) => TierResult::Miss,
            Err(e) => TierResult::Error(e),
        }
    }
}

/// Final state of a cascade run
#[derive(Debug, Default)]
pub struct CascadeResult {
    pub page: Option<String>,
    /// Last failure seen on the way, kept to tell misses from breakage
    pub error: Option<SubsceneError>,
}

impl CascadeResult {
    fn absorb(&mut self, tier: &str, result: TierResult) -> bool {
        match result {
            TierResult::Page(page) => {
                info!("Listing page found by {} strategy", tier);
                self.page = Some(page);
                true
            }
            TierResult::Miss => {
                debug!("{} strategy missed", tier);
                false
            }
            TierResult::Error(e) => {
                warn!("{} strategy failed: {}", tier, e);
                self.error = Some(e);
                false
            }
        }
    }
}

/// Movie strategies, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieTier {
    /// `/subtitles/<slug>/<language>`
    Slug,
    /// `/subtitles/<slug>-<year>/<language>`
    SlugWithYear,
    /// Full-text search, matched by year
    SiteSearch,
}

impl MovieTier {
    pub const ORDER: [MovieTier; 3] = [MovieTier::Slug, MovieTier::SlugWithYear, MovieTier::SiteSearch];

    pub fn name(&self) -> &'static str {
        match self {
            MovieTier::Slug => "slug",
            MovieTier::SlugWithYear => "slug-with-year",
            MovieTier::SiteSearch => "site-search",
        }
    }
}

/// Listing path for a slug in a given language
pub fn listing_path(slug: &str, language: &str) -> String {
    format!("/subtitles/{}/{}", slug, language::to_site_token(language))
}

/// Site-search path for free text
pub fn search_path(text: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("/subtitles/searchbytitle?query={}&l=", query)
}

/// English ordinal the site uses in season titles, for seasons 1 to 9
pub fn season_ordinal(season: u32) -> Option<&'static str> {
    let index = usize::try_from(season).ok()?.checked_sub(1)?;
    SEASON_ORDINALS.get(index).copied()
}

/// `"<title> - <Ordinal> Season"`
pub fn season_phrase(title: &str, season: u32) -> Option<String> {
    season_ordinal(season).map(|ordinal| format!("{} - {} Season", title, ordinal))
}

pub async fn run_movie_tier(
    fetcher: &PageFetcher,
    tier: MovieTier,
    title: &str,
    year: Option<i32>,
    language: &str,
) -> TierResult {
    match tier {
        MovieTier::Slug => {
            let slug = build_slug(title);
            if slug.is_empty() {
                return TierResult::Miss;
            }
            fetcher.fetch_page(&listing_path(&slug, language)).await.into()
        }
        MovieTier::SlugWithYear => {
            let slug = build_slug(title);
            match year {
                Some(year) if !slug.is_empty() => fetcher
                    .fetch_page(&listing_path(&format!("{}-{}", slug, year), language))
                    .await
                    .into(),
                _ => TierResult::Miss,
            }
        }
        MovieTier::SiteSearch => {
            site_search(fetcher, title, MOVIE_RELEVANCE, language, |entries| match year {
                Some(year) => entries.iter().find(|entry| entry.year() == Some(year)),
                None => entries.first(),
            })
            .await
        }
    }
}

/// Run the movie strategies until one yields a listing page
pub async fn find_movie_listing(
    fetcher: &PageFetcher,
    title: &str,
    year: Option<i32>,
    language: &str,
) -> CascadeResult {
    let mut cascade = CascadeResult::default();

    for tier in MovieTier::ORDER {
        debug!("Trying {} strategy for \"{}\"", tier.name(), title);
        let result = run_movie_tier(fetcher, tier, title, year, language).await;
        if cascade.absorb(tier.name(), result) {
            break;
        }
    }

    cascade
}

/// Locate a season's listing page through site search
pub async fn find_season_listing(
    fetcher: &PageFetcher,
    title: &str,
    season: u32,
    language: &str,
) -> CascadeResult {
    let mut cascade = CascadeResult::default();

    let Some(phrase) = season_phrase(title, season) else {
        debug!("No season phrase for season {}", season);
        return cascade;
    };

    let result = site_search(fetcher, &phrase, SHOW_RELEVANCE, language, |entries| {
        entries.iter().find(|entry| entry.title.starts_with(&phrase))
    })
    .await;
    cascade.absorb("season-search", result);

    cascade
}

async fn site_search<F>(
    fetcher: &PageFetcher,
    text: &str,
    accepted: &[Relevance],
    language: &str,
    select: F,
) -> TierResult
where
    F: for<'e> Fn(&'e [SearchEntry]) -> Option<&'e SearchEntry>,
{
    debug!("Searching site for \"{}\"", text);

    let html = match fetcher.fetch_page(&search_path(text)).await {
        Ok(Some(html)) => html,
        other => return other.into(),
    };

    let Some(entries) = parser::parse_search_results(&html, accepted) else {
        return TierResult::Miss;
    };

    let Some(entry) = select(&entries) else {
        debug!("No search entry matched among {}", entries.len());
        return TierResult::Miss;
    };

    debug!("Following search entry \"{}\"", entry.title);
    let path = format!(
        "{}/{}",
        entry.href.trim_end_matches('/'),
        language::to_site_token(language)
    );
    fetcher.fetch_page(&path).await.into()
}

/// Keep candidates whose name contains the `SxxEyy` token
pub fn filter_episode(candidates: Vec<SubtitleCandidate>, token: &str) -> Vec<SubtitleCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.name.contains(token))
        .collect()
}

/// Drop unnamed candidates, merge duplicates by id and sort by name.
///
/// A merged candidate is renamed `"<uploader> (<author>)"` and lists every
/// original release name in `comment`.
pub fn merge_candidates(candidates: Vec<SubtitleCandidate>) -> Vec<SubtitleCandidate> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<SubtitleCandidate>> = HashMap::new();

    for candidate in candidates {
        if candidate.name.trim().is_empty() {
            continue;
        }
        let group = groups.entry(candidate.id.clone()).or_insert_with(|| {
            order.push(candidate.id.clone());
            Vec::new()
        });
        group.push(candidate);
    }

    let mut merged: Vec<SubtitleCandidate> = order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .filter_map(|group| {
            let comment = group
                .iter()
                .map(|candidate| candidate.name.as_str())
                .collect::<Vec<_>>()
                .join("<br/>");
            let first = group.into_iter().next()?;
            Some(SubtitleCandidate {
                name: format!(
                    "{} ({})",
                    first.uploader_group.as_deref().unwrap_or_default(),
                    first.author.as_deref().unwrap_or_default()
                ),
                comment: Some(comment),
                ..first
            })
        })
        .collect();

    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}
