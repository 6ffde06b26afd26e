//! Movie data provider.
//!
//! The session only cares about the [`MovieProvider`] trait: a fresh pool of
//! question movies plus a disjoint pool of decoy movies per game. The TMDb
//! implementation fetches two different discover pages so the pools never
//! clash; tests inject a fake.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::types::Movie;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// One fetch worth of movies: the question pool and the decoy pool.
#[derive(Debug, Clone, Default)]
pub struct MovieSet {
    pub movies: Vec<Movie>,
    pub extra_movies: Vec<Movie>,
}

#[async_trait]
pub trait MovieProvider: Send + Sync {
    async fn fetch_movies(&self) -> ProviderResult<MovieSet>;
}

/// Configuration for the TMDb provider
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// Bearer token for the TMDb v4 API
    pub api_token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api.themoviedb.org/4".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl TmdbConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_token: std::env::var("TMDB_API_TOKEN").ok().filter(|t| !t.is_empty()),
            base_url: std::env::var("TMDB_API_URL").unwrap_or(defaults.base_url),
            timeout: defaults.timeout,
        }
    }

    pub fn build_provider(&self) -> ProviderResult<TmdbProvider> {
        if self.api_token.is_none() {
            return Err(ProviderError::ConfigError(
                "TMDB_API_TOKEN is not set".to_string(),
            ));
        }
        Ok(TmdbProvider::from_config(self.clone()))
    }
}

/// Discover pages go up to 500; staying well below keeps results popular
/// enough to be guessable.
const MAX_DISCOVER_PAGE: u32 = 20;

pub struct TmdbProvider {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    results: Vec<DiscoverMovie>,
}

/// Raw movie entry from the discover endpoint. Everything beyond these
/// fields is pass-through metadata the engine ignores.
#[derive(Debug, Deserialize)]
struct DiscoverMovie {
    id: u64,
    title: String,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
}

impl TmdbProvider {
    /// Build from config. A missing token yields a provider whose requests
    /// fail with 401, which surfaces as data unavailability downstream.
    pub fn from_config(config: TmdbConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: config.base_url,
            api_token: config.api_token.unwrap_or_default(),
            client,
            timeout: config.timeout,
        }
    }

    async fn fetch_page(&self, page: u32) -> ProviderResult<Vec<Movie>> {
        let url = format!("{}/discover/movie?page={}", self.base_url, page);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "discover request failed with status {}",
                response.status()
            )));
        }

        let page: DiscoverResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        // Entries without artwork are useless for a poster-guessing game
        Ok(page
            .results
            .into_iter()
            .filter_map(|m| {
                Some(Movie {
                    id: m.id.to_string(),
                    title: m.title,
                    poster_path: m.poster_path?,
                    backdrop_path: m.backdrop_path?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl MovieProvider for TmdbProvider {
    async fn fetch_movies(&self) -> ProviderResult<MovieSet> {
        // Two distinct pages so decoys can never collide with answers
        let movie_page = {
            let mut rng = rand::rng();
            crate::randomness::random_in_range(&mut rng, 1, MAX_DISCOVER_PAGE as usize) as u32
        };
        let extra_page = if movie_page == MAX_DISCOVER_PAGE {
            1
        } else {
            movie_page + 1
        };

        let movies = self.fetch_page(movie_page).await?;
        let extra_movies = self.fetch_page(extra_page).await?;

        tracing::debug!(
            movies = movies.len(),
            extras = extra_movies.len(),
            movie_page,
            extra_page,
            "fetched movie pools"
        );

        Ok(MovieSet {
            movies,
            extra_movies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_reads_token_and_url() {
        std::env::set_var("TMDB_API_TOKEN", "token123");
        std::env::set_var("TMDB_API_URL", "http://localhost:9999/v4");

        let config = TmdbConfig::from_env();
        assert_eq!(config.api_token.as_deref(), Some("token123"));
        assert_eq!(config.base_url, "http://localhost:9999/v4");

        std::env::remove_var("TMDB_API_TOKEN");
        std::env::remove_var("TMDB_API_URL");
    }

    #[test]
    #[serial]
    fn from_env_treats_empty_token_as_missing() {
        std::env::set_var("TMDB_API_TOKEN", "");
        let config = TmdbConfig::from_env();
        assert!(config.api_token.is_none());
        assert!(config.build_provider().is_err());
        std::env::remove_var("TMDB_API_TOKEN");
    }

    #[test]
    fn discover_entries_without_artwork_are_dropped() {
        let raw = r#"{
            "results": [
                {"id": 1, "title": "With Art", "poster_path": "/p.jpg", "backdrop_path": "/b.jpg"},
                {"id": 2, "title": "No Poster", "backdrop_path": "/b.jpg"},
                {"id": 3, "title": "No Backdrop", "poster_path": "/p.jpg"}
            ]
        }"#;
        let page: DiscoverResponse = serde_json::from_str(raw).unwrap();
        let movies: Vec<Movie> = page
            .results
            .into_iter()
            .filter_map(|m| {
                Some(Movie {
                    id: m.id.to_string(),
                    title: m.title,
                    poster_path: m.poster_path?,
                    backdrop_path: m.backdrop_path?,
                })
            })
            .collect();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, "1");
    }
}
