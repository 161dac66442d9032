pub mod archive;
pub mod error;
pub mod fetcher;
pub mod language;
pub mod metadata;
pub mod parser;
pub mod search;
pub mod slug;
pub mod types;

pub use error::{SubsceneError, SubsceneResult};
pub use types::{
    CandidateId, MediaKind, MovieMetadata, RetrieveOutcome, SearchOutcome, SearchQuery,
    ShowMetadata, SubsceneOptions, SubtitleCandidate, SubtitleFile,
};

use fetcher::PageFetcher;
use metadata::MetadataResolver;
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for subtitle discovery and retrieval.
///
/// Each call is an independent unit of work; a client can be shared and
/// used concurrently.
pub struct Subscene {
    options: SubsceneOptions,
    fetcher: Arc<PageFetcher>,
    metadata: Option<Arc<MetadataResolver>>,
}

impl Subscene {
    /// Create a client from options
    pub fn new(options: SubsceneOptions) -> SubsceneResult<Self> {
        info!("Initializing Subscene client for {}", options.base_url);

        let fetcher = Arc::new(PageFetcher::new(&options)?);
        let metadata = MetadataResolver::from_options(&options)?.map(Arc::new);

        if metadata.is_none() {
            debug!("No TMDB API key configured, metadata resolution disabled");
        }

        Ok(Self {
            options,
            fetcher,
            metadata,
        })
    }

    pub fn options(&self) -> &SubsceneOptions {
        &self.options
    }

    /// Search for subtitle candidates, ordered by display name
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        info!(
            "Searching subtitles for \"{}\" ({}), language={}, year={:?}, id={:?}, season={:?}, episode={:?}",
            query.title,
            query.media_kind,
            query.language,
            query.year,
            query.external_id,
            query.season,
            query.episode
        );

        let episode_token = query.episode_token();
        if query.media_kind == MediaKind::Episode && episode_token.is_none() {
            info!("Episode search without season and episode numbers");
            return SearchOutcome::NotFound;
        }

        let query = self.resolve_query(query).await;
        let language = language::to_iso(&query.language, &self.options.fallback_language);

        let cascade = match query.media_kind {
            MediaKind::Movie => {
                search::find_movie_listing(&self.fetcher, &query.title, query.year, &language).await
            }
            MediaKind::Episode => {
                let season = query.season.unwrap_or_default();
                search::find_season_listing(&self.fetcher, &query.title, season, &language).await
            }
        };

        let Some(page) = cascade.page else {
            return match cascade.error {
                Some(e) => SearchOutcome::Failed(e),
                None => SearchOutcome::NotFound,
            };
        };

        let mut candidates =
            parser::extract_subtitle_rows(&page, &language, &self.options.fallback_language);
        if let Some(token) = episode_token {
            candidates = search::filter_episode(candidates, &token);
            debug!("{} candidates match {}", candidates.len(), token);
        }

        let candidates = search::merge_candidates(candidates);
        info!("Found {} subtitle candidates", candidates.len());

        SearchOutcome::from_candidates(candidates)
    }

    /// Search and collapse the outcome to a plain list
    pub async fn search_candidates(&self, query: &SearchQuery) -> Vec<SubtitleCandidate> {
        self.search(query).await.into_candidates()
    }

    /// Download the subtitle behind a candidate id
    pub async fn retrieve(&self, id: &str) -> RetrieveOutcome {
        archive::retrieve(&self.fetcher, id, &self.options.fallback_language).await
    }

    /// Retrieve and collapse the outcome to a possibly empty file
    pub async fn retrieve_file(&self, id: &str) -> SubtitleFile {
        self.retrieve(id).await.into_file()
    }

    /// Replace title/year with canonical values when an external id resolves
    async fn resolve_query(&self, query: &SearchQuery) -> SearchQuery {
        let mut resolved = query.clone();

        let (Some(resolver), Some(id)) = (
            &self.metadata,
            query.external_id.as_deref().filter(|id| !id.trim().is_empty()),
        ) else {
            return resolved;
        };

        match query.media_kind {
            MediaKind::Movie => {
                if let Some(info) = resolver.get_movie_info(id).await {
                    info!(
                        "Original movie title=\"{}\", year={:?}",
                        info.title, info.release_year
                    );
                    resolved.title = info.title;
                    if info.release_year.is_some() {
                        resolved.year = info.release_year;
                    }
                }
            }
            MediaKind::Episode => {
                if let Some(info) = resolver.get_tv_info(id).await {
                    info!("Original show title=\"{}\", show id={}", info.title, info.show_id);
                    resolved.title = info.title;
                }
            }
        }

        resolved
    }
}

/// Quick function to search with default options
pub async fn search_subtitles(query: &SearchQuery) -> SubsceneResult<Vec<SubtitleCandidate>> {
    let client = Subscene::new(SubsceneOptions::default())?;
    Ok(client.search_candidates(query).await)
}

/// Quick function to retrieve with default options
pub async fn download_subtitle(id: &str) -> SubsceneResult<SubtitleFile> {
    let client = Subscene::new(SubsceneOptions::default())?;
    Ok(client.retrieve_file(id).await)
}
