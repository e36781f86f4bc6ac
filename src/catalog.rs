use crate::classifier::{genres_to_ids, MovieFilters};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// At most this many extracted keywords are resolved against the catalog.
const MAX_KEYWORD_LOOKUPS: usize = 3;

/// Results below this vote count are too obscure to recommend.
const MIN_VOTE_COUNT: &str = "50";

/// One catalog movie, in the TMDB discover shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Queries the movie catalog by structured filters, with an optional
/// secondary keyword-based lookup.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn discover(&self, filters: &MovieFilters) -> Result<DiscoverResponse, CatalogError>;

    /// Keyword variant: returns results only, no total. Individual
    /// keyword lookups that fail are skipped, not fatal.
    async fn search_by_keywords(
        &self,
        keywords: &[String],
        filters: &MovieFilters,
    ) -> Result<Vec<Movie>, CatalogError>;
}

/// TMDB-backed catalog client.
pub struct TmdbCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbCatalog {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, CatalogError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status { status, body });
        }
        Ok(response.json().await?)
    }

    async fn lookup_keyword_id(&self, keyword: &str) -> Result<Option<u64>, CatalogError> {
        let params = [("query".to_string(), keyword.to_string())];
        let found: KeywordSearchResponse = self.get_json("/search/keyword", &params).await?;
        Ok(found.results.into_iter().next().map(|hit| hit.id))
    }
}

#[async_trait]
impl CatalogSearch for TmdbCatalog {
    async fn discover(&self, filters: &MovieFilters) -> Result<DiscoverResponse, CatalogError> {
        let params = discover_params(filters);
        self.get_json("/discover/movie", &params).await
    }

    async fn search_by_keywords(
        &self,
        keywords: &[String],
        filters: &MovieFilters,
    ) -> Result<Vec<Movie>, CatalogError> {
        let mut keyword_ids = Vec::new();
        for keyword in keywords.iter().take(MAX_KEYWORD_LOOKUPS) {
            match self.lookup_keyword_id(keyword).await {
                Ok(Some(id)) => keyword_ids.push(id),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        target: "reelgate::catalog",
                        keyword,
                        error = %err,
                        "keyword lookup failed, skipping"
                    );
                }
            }
        }

        if keyword_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = keyword_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            // Pipe-joined ids are OR'd by the catalog.
            .join("|");
        let params = vec![
            ("with_keywords".to_string(), ids),
            ("sort_by".to_string(), filters.sort_by_or_default().to_string()),
            ("vote_count.gte".to_string(), MIN_VOTE_COUNT.to_string()),
        ];
        let found: DiscoverResponse = self.get_json("/discover/movie", &params).await?;
        Ok(found.results)
    }
}

#[derive(Debug, Deserialize)]
struct KeywordSearchResponse {
    #[serde(default)]
    results: Vec<KeywordHit>,
}

#[derive(Debug, Deserialize)]
struct KeywordHit {
    id: u64,
}

/// Builds the discover query from structured filters.
fn discover_params(filters: &MovieFilters) -> Vec<(String, String)> {
    let mut params = vec![
        ("sort_by".to_string(), filters.sort_by_or_default().to_string()),
        ("vote_count.gte".to_string(), MIN_VOTE_COUNT.to_string()),
        ("language".to_string(), "en-US".to_string()),
        ("include_adult".to_string(), "false".to_string()),
    ];

    let genre_ids = genres_to_ids(&filters.genres);
    if !genre_ids.is_empty() {
        let ids = genre_ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        params.push(("with_genres".to_string(), ids));
    }

    if let Some(min_rating) = filters.min_rating {
        params.push(("vote_average.gte".to_string(), min_rating.to_string()));
    }
    if let Some(year_from) = filters.year_from {
        params.push((
            "primary_release_date.gte".to_string(),
            format!("{year_from}-01-01"),
        ));
    }
    if let Some(year_to) = filters.year_to {
        params.push((
            "primary_release_date.lte".to_string(),
            format!("{year_to}-12-31"),
        ));
    }
    if let Some(max_runtime) = filters.max_runtime {
        params.push(("with_runtime.lte".to_string(), max_runtime.to_string()));
    }

    params
}
