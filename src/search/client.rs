use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::card::CardCandidate;

/// A request to the card search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchQuery {
    /// Exact printing lookup by set code and collector number.
    Exact { set: String, cn: String },
    /// Free-text name search.
    Name { query: String },
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchQuery::Exact { set, cn } => write!(f, "{} #{}", set, cn),
            SearchQuery::Name { query } => write!(f, "\"{}\"", query),
        }
    }
}

/// The card search service.
///
/// An empty result list is a valid answer. `Err` means the service itself failed.
pub trait CardSearch: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CardCandidate>>;
}

/// The backend answers either `{"data": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped {
        #[serde(default)]
        data: Vec<CardCandidate>,
    },
    Bare(Vec<CardCandidate>),
}

impl SearchResponse {
    fn into_cards(self) -> Vec<CardCandidate> {
        match self {
            SearchResponse::Wrapped { data } => data,
            SearchResponse::Bare(cards) => cards,
        }
    }
}

fn parse_response(body: &str) -> Result<Vec<CardCandidate>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("Malformed search response")?;
    Ok(response.into_cards())
}

/// HTTP client for `POST {base_url}/api/cards/search`.
pub struct HttpCardSearch {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpCardSearch {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/cards/search", base_url.trim_end_matches('/')),
        })
    }
}

impl CardSearch for HttpCardSearch {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CardCandidate>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", "card-lens")
            .json(query)
            .send()
            .context(format!("Search request failed for {}", query))?;

        if !response.status().is_success() {
            return Err(anyhow!("Search failed: HTTP {}", response.status()));
        }

        let body = response.text().context("Failed to read search response")?;
        parse_response(&body)
    }
}
