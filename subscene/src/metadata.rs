//! Canonical title/year lookup through the TMDB API.

use crate::error::{SubsceneError, SubsceneResult};
use crate::fetcher::build_client;
use crate::types::{MovieMetadata, ShowMetadata, SubsceneOptions};
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct MovieDetails {
    title: Option<String>,
    original_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    release_date: Option<NaiveDate>,
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShowDetails {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    first_air_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
struct FindResults {
    #[serde(default)]
    tv_episode_results: Vec<EpisodeReference>,
    #[serde(default)]
    tv_results: Vec<ShowReference>,
}

#[derive(Debug, Deserialize)]
struct EpisodeReference {
    show_id: u64,
}

#[derive(Debug, Deserialize)]
struct ShowReference {
    id: u64,
}

/// TMDB returns `""` for unknown dates
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()))
}

/// Client for the movie/TV metadata service.
///
/// Lookups never fail across this boundary: every error is logged and
/// reported as `None`.
pub struct MetadataResolver {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MetadataResolver {
    /// `None` when no API key is configured
    pub fn from_options(options: &SubsceneOptions) -> SubsceneResult<Option<Self>> {
        let Some(api_key) = options.tmdb_api_key.as_deref().filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            client: build_client(options)?,
            base_url: options.tmdb_base_url.clone(),
            api_key: api_key.to_string(),
        }))
    }

    /// Movie details by TMDB or IMDB id
    pub async fn get_movie_info(&self, id: &str) -> Option<MovieMetadata> {
        match self.try_movie_info(id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Movie metadata lookup for {} failed: {}", id, e);
                None
            }
        }
    }

    /// Show details for an episode's (or show's) external id
    pub async fn get_tv_info(&self, id: &str) -> Option<ShowMetadata> {
        match self.try_tv_info(id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("TV metadata lookup for {} failed: {}", id, e);
                None
            }
        }
    }

    async fn try_movie_info(&self, id: &str) -> SubsceneResult<Option<MovieMetadata>> {
        let Some(details) = self
            .get_json::<MovieDetails>(&["3", "movie", id], &[])
            .await?
        else {
            return Ok(None);
        };

        let Some(title) = details.title.filter(|title| !title.trim().is_empty()) else {
            return Ok(None);
        };

        info!("Resolved movie {} to \"{}\"", id, title);
        Ok(Some(MovieMetadata {
            title,
            original_title: details.original_title,
            release_year: details.release_date.map(|date| date.year()),
            imdb_id: details.imdb_id,
        }))
    }

    async fn try_tv_info(&self, id: &str) -> SubsceneResult<Option<ShowMetadata>> {
        let found = self
            .get_json::<FindResults>(&["3", "find", id], &[("external_source", "imdb_id")])
            .await?
            .unwrap_or_default();

        let show_id = found
            .tv_episode_results
            .first()
            .map(|episode| episode.show_id)
            .or_else(|| found.tv_results.first().map(|show| show.id));
        let Some(show_id) = show_id else {
            debug!("No TV cross-reference for {}", id);
            return Ok(None);
        };

        let Some(details) = self
            .get_json::<ShowDetails>(&["3", "tv", &show_id.to_string()], &[])
            .await?
        else {
            return Ok(None);
        };

        let Some(title) = details.name.filter(|name| !name.trim().is_empty()) else {
            return Ok(None);
        };

        info!("Resolved show {} to \"{}\" ({})", id, title, details.id);
        Ok(Some(ShowMetadata {
            title,
            original_title: details.original_name,
            release_year: details.first_air_date.map(|date| date.year()),
            show_id: details.id,
        }))
    }

    /// GET a JSON document; `None` for non-2xx or empty bodies.
    ///
    /// Each of `segments` becomes exactly one escaped path segment.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> SubsceneResult<Option<T>> {
        let invalid = || SubsceneError::InvalidUrl {
            url: format!("{}/{}", self.base_url, segments.join("/")),
        };

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .extend_pairs(params);

        let path = url.path().to_string();
        debug!("Requesting metadata: {}", path);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            debug!("Metadata request {} answered {}", path, response.status());
            return Ok(None);
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn resolver(server: &mockito::Server) -> MetadataResolver {
        let options = SubsceneOptions::new()
            .tmdb_base_url(&server.url())
            .tmdb_api_key("secret");
        MetadataResolver::from_options(&options).unwrap().unwrap()
    }

    #[test]
    fn test_no_api_key_disables_resolution() {
        assert!(MetadataResolver::from_options(&SubsceneOptions::new()).unwrap().is_none());
        let options = SubsceneOptions::new().tmdb_api_key("  ");
        assert!(MetadataResolver::from_options(&options).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_movie_info() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/3/movie/tt8385148")
            .match_query(Matcher::UrlEncoded("api_key".into(), "secret".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id": 522931, "imdb_id": "tt8385148", "title": "Hitman's Wife's Bodyguard",
                    "original_title": "The Hitman's Wife's Bodyguard", "release_date": "2021-06-14"}"#,
            )
            .create_async()
            .await;

        let info = resolver(&server).get_movie_info("tt8385148").await.unwrap();
        assert_eq!(info.title, "Hitman's Wife's Bodyguard");
        assert_eq!(info.original_title.as_deref(), Some("The Hitman's Wife's Bodyguard"));
        assert_eq!(info.release_year, Some(2021));
        assert_eq!(info.imdb_id.as_deref(), Some("tt8385148"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_external_id_is_a_single_path_segment() {
        let mut server = mockito::Server::new_async().await;
        let escaped = server
            .mock("GET", "/3/movie/tt1%2F..%2Fx%3Fy%23z")
            .match_query(Matcher::UrlEncoded("api_key".into(), "secret".into()))
            .with_status(200)
            .with_body(r#"{"title": "Escaped"}"#)
            .create_async()
            .await;

        let info = resolver(&server).get_movie_info("tt1/../x?y#z").await.unwrap();
        assert_eq!(info.title, "Escaped");
        escaped.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_movie_info_tolerates_blank_date() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/3/movie/1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"title": "Untitled", "release_date": ""}"#)
            .create_async()
            .await;

        let info = resolver(&server).get_movie_info("1").await.unwrap();
        assert_eq!(info.release_year, None);
    }

    #[tokio::test]
    async fn test_get_movie_info_failures_are_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/3/movie/404")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/3/movie/empty")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;
        server
            .mock("GET", "/3/movie/broken")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let resolver = resolver(&server);
        assert!(resolver.get_movie_info("404").await.is_none());
        assert!(resolver.get_movie_info("empty").await.is_none());
        assert!(resolver.get_movie_info("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_get_tv_info_two_steps() {
        let mut server = mockito::Server::new_async().await;
        let find = server
            .mock("GET", "/3/find/tt5753856")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "secret".into()),
                Matcher::UrlEncoded("external_source".into(), "imdb_id".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"movie_results": [], "tv_results": [],
                    "tv_episode_results": [{"id": 1, "show_id": 70523, "season_number": 1}]}"#,
            )
            .create_async()
            .await;
        let show = server
            .mock("GET", "/3/tv/70523")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id": 70523, "name": "Dark", "original_name": "Dark", "first_air_date": "2017-12-01"}"#,
            )
            .create_async()
            .await;

        let info = resolver(&server).get_tv_info("tt5753856").await.unwrap();
        assert_eq!(info.title, "Dark");
        assert_eq!(info.show_id, 70523);
        assert_eq!(info.release_year, Some(2017));
        find.assert_async().await;
        show.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_tv_info_without_cross_reference() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/3/find/tt0000000")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"movie_results": [], "tv_results": [], "tv_episode_results": []}"#)
            .create_async()
            .await;
        let show = server
            .mock("GET", Matcher::Regex("^/3/tv/".into()))
            .expect(0)
            .create_async()
            .await;

        assert!(resolver(&server).get_tv_info("tt0000000").await.is_none());
        show.assert_async().await;
    }
}
