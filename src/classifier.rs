use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SORT: &str = "popularity.desc";

/// Genre names the classifier is allowed to emit, with their catalog ids.
const GENRE_IDS: &[(&str, u32)] = &[
    ("action", 28),
    ("adventure", 12),
    ("animation", 16),
    ("comedy", 35),
    ("crime", 80),
    ("documentary", 99),
    ("drama", 18),
    ("family", 10751),
    ("fantasy", 14),
    ("history", 36),
    ("horror", 27),
    ("music", 10402),
    ("mystery", 9648),
    ("romance", 10749),
    ("science fiction", 878),
    ("sci-fi", 878),
    ("thriller", 53),
    ("war", 10752),
    ("western", 37),
];

/// Structured filters extracted from a free-text movie request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieFilters {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub max_runtime: Option<u32>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl MovieFilters {
    pub fn sort_by_or_default(&self) -> &str {
        self.sort_by.as_deref().unwrap_or(DEFAULT_SORT)
    }
}

/// Maps classifier genre names to catalog genre ids, dropping names the
/// catalog does not know.
pub fn genres_to_ids(names: &[String]) -> Vec<u32> {
    names
        .iter()
        .filter_map(|name| {
            let name = name.to_lowercase();
            GENRE_IDS
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, id)| *id)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("classifier returned an empty response")]
    EmptyResponse,
    #[error("classifier output is not valid filter JSON: {0}")]
    Unparseable(#[from] serde_json::Error),
}

/// Turns free text into [`MovieFilters`].
#[async_trait]
pub trait ClassifyRequest: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<MovieFilters, ClassifierError>;
}

/// Classifier backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn system_prompt() -> String {
        let genres: Vec<&str> = GENRE_IDS.iter().map(|(name, _)| *name).collect();
        format!(
            r#"You are a movie query parser. Analyze user prompts and extract movie preferences.

Available genres: {}

Return ONLY valid JSON with this exact schema:
{{
  "genres": string[],
  "min_rating": number | null,
  "year_from": number | null,
  "year_to": number | null,
  "sort_by": string | null,
  "max_runtime": number | null,
  "keywords": string[]
}}

Guidelines:
- "high rating" = min_rating: 7.5
- "underrated" = min_rating: 6.5, sort_by: "vote_count.asc"
- "popular" = sort_by: "popularity.desc"
- "recent" = year_from: current_year - 3
- "classic" = year_to: 1990
- "under 2 hours" = max_runtime: 120
- Extract mood keywords like "dark", "fast-paced", "emotional"

Return ONLY the JSON object, no markdown formatting."#,
            genres.join(", "),
        )
    }
}

#[async_trait]
impl ClassifyRequest for OpenAiClassifier {
    async fn classify(&self, prompt: &str) -> Result<MovieFilters, ClassifierError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.1,
            "max_tokens": 300,
            "messages": [
                { "role": "system", "content": Self::system_prompt() },
                { "role": "user", "content": prompt },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletionResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ClassifierError::EmptyResponse)?;

        parse_filters(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Parses the model's output, tolerating markdown code fences it was
/// told not to emit but sometimes emits anyway.
fn parse_filters(raw: &str) -> Result<MovieFilters, ClassifierError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ClassifierError::EmptyResponse);
    }

    let mut filters: MovieFilters = serde_json::from_str(cleaned)?;
    if filters.sort_by.as_deref().map_or(true, str::is_empty) {
        filters.sort_by = Some(DEFAULT_SORT.to_string());
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_filter_object() {
        let raw = r#"{
            "genres": ["thriller", "crime"],
            "min_rating": 7.5,
            "year_from": 2010,
            "year_to": 2020,
            "sort_by": "vote_average.desc",
            "max_runtime": 120,
            "keywords": ["dark", "gritty"]
        }"#;

        let filters = parse_filters(raw).unwrap();
        assert_eq!(filters.genres, vec!["thriller", "crime"]);
        assert_eq!(filters.min_rating, Some(7.5));
        assert_eq!(filters.sort_by_or_default(), "vote_average.desc");
        assert_eq!(filters.keywords, vec!["dark", "gritty"]);
    }

    #[test]
    fn strips_markdown_fences_before_parsing() {
        let raw = "```json\n{\"genres\": [\"horror\"], \"keywords\": []}\n```";
        let filters = parse_filters(raw).unwrap();
        assert_eq!(filters.genres, vec!["horror"]);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let filters = parse_filters("{}").unwrap();
        assert!(filters.genres.is_empty());
        assert!(filters.keywords.is_empty());
        assert_eq!(filters.min_rating, None);
        assert_eq!(filters.sort_by, Some(DEFAULT_SORT.to_string()));
    }

    #[test]
    fn empty_output_is_a_distinguishable_error() {
        assert!(matches!(
            parse_filters("   "),
            Err(ClassifierError::EmptyResponse)
        ));
        assert!(matches!(
            parse_filters("```json\n```"),
            Err(ClassifierError::EmptyResponse)
        ));
    }

    #[test]
    fn non_json_output_is_a_distinguishable_error() {
        assert!(matches!(
            parse_filters("sure, here are some movies!"),
            Err(ClassifierError::Unparseable(_))
        ));
    }

    #[test]
    fn genre_names_map_case_insensitively() {
        let names = vec![
            "Action".to_string(),
            "sci-fi".to_string(),
            "Science Fiction".to_string(),
            "polka".to_string(),
        ];
        assert_eq!(genres_to_ids(&names), vec![28, 878, 878]);
    }

    #[test]
    fn unknown_genres_map_to_nothing() {
        assert!(genres_to_ids(&["mockumentary".to_string()]).is_empty());
    }
}
