//! Proxy client for the Kinopoisk movie-database API. The API key stays on the
//! server; every upstream call is bounded by a fixed timeout set at client
//! construction. Upstream failures map to gateway-class errors, never to an
//! internal fault.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::MetadataConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct MetadataService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

// ============================================================================
// Upstream Types (only the fields we consume)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDoc {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "alternativeName")]
    pub alternative_name: Option<String>,
    #[serde(rename = "enName")]
    pub en_name: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    #[serde(rename = "shortDescription")]
    pub short_description: Option<String>,
    pub rating: Option<DocRating>,
    pub poster: Option<DocPoster>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocRating {
    pub kp: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocPoster {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    docs: Vec<MetadataDoc>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DescriptionResponse {
    #[serde(rename = "match")]
    pub best_match: Option<MatchInfo>,
    pub description: Option<String>,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct MatchInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub poster: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub year: Option<i64>,
}

impl MetadataService {
    pub fn new(config: &MetadataConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("Metadata API key not configured".to_string()))
    }

    async fn search_request(
        &self,
        query: &str,
        content_type: Option<&str>,
        year: Option<i64>,
        limit: u32,
    ) -> AppResult<reqwest::Response> {
        let key = self.api_key()?;

        let mut params: Vec<(&str, String)> = vec![
            ("query", query.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(t) = content_type {
            params.push(("type", t.to_string()));
        }
        if let Some(y) = year {
            params.push(("year", y.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/movie/search", self.base_url))
            .query(&params)
            .header("X-API-KEY", key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout
                } else {
                    AppError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::MetadataApi(format!(
                "Upstream returned status {}",
                status
            )));
        }

        Ok(response)
    }

    /// Forward a search to the upstream API and pass its JSON through.
    pub async fn search(
        &self,
        query: &str,
        content_type: Option<&str>,
        year: Option<i64>,
        limit: u32,
    ) -> AppResult<serde_json::Value> {
        let response = self.search_request(query, content_type, year, limit).await?;
        let payload = response.json::<serde_json::Value>().await?;
        Ok(payload)
    }

    /// Search, then pick the best candidate and its description.
    pub async fn describe(
        &self,
        query: &str,
        content_type: Option<&str>,
        year: Option<i64>,
        limit: u32,
    ) -> AppResult<DescriptionResponse> {
        let response = self.search_request(query, content_type, year, limit).await?;
        let payload = response.json::<SearchPayload>().await?;

        Ok(build_description(payload.docs, query, content_type, year))
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Pick the best candidate from upstream docs:
/// 1. filter by type/year when given (fall back to all docs if nothing passes),
/// 2. prefer an exact normalized title match over name/alternativeName/enName,
/// 3. otherwise take the first filtered doc.
fn build_description(
    docs: Vec<MetadataDoc>,
    query: &str,
    content_type: Option<&str>,
    year: Option<i64>,
) -> DescriptionResponse {
    if docs.is_empty() {
        return DescriptionResponse {
            best_match: None,
            description: None,
            candidates: Vec::new(),
        };
    }

    let filtered: Vec<&MetadataDoc> = {
        let matching: Vec<&MetadataDoc> = docs
            .iter()
            .filter(|d| content_type.is_none() || d.doc_type.as_deref() == content_type)
            .filter(|d| year.is_none() || d.year == year)
            .collect();
        if matching.is_empty() {
            docs.iter().collect()
        } else {
            matching
        }
    };

    let query_norm = normalize(query);
    let is_exact = |d: &MetadataDoc| {
        [&d.name, &d.alternative_name, &d.en_name]
            .into_iter()
            .flatten()
            .any(|n| normalize(n) == query_norm)
    };

    let best = filtered
        .iter()
        .find(|d| is_exact(d))
        .copied()
        .or_else(|| filtered.first().copied());

    let best_match = best.map(|d| MatchInfo {
        id: d.id,
        name: d
            .name
            .clone()
            .or_else(|| d.alternative_name.clone())
            .or_else(|| d.en_name.clone()),
        doc_type: d.doc_type.clone(),
        year: d.year,
        rating: d.rating.as_ref().and_then(|r| r.kp),
        poster: d.poster.as_ref().and_then(|p| p.url.clone()),
    });

    let description = best.and_then(|d| {
        d.description
            .clone()
            .or_else(|| d.short_description.clone())
    });

    let candidates = filtered
        .iter()
        .take(5)
        .map(|d| Candidate {
            id: d.id,
            name: d
                .name
                .clone()
                .or_else(|| d.alternative_name.clone())
                .or_else(|| d.en_name.clone()),
            doc_type: d.doc_type.clone(),
            year: d.year,
        })
        .collect();

    DescriptionResponse {
        best_match,
        description,
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, doc_type: &str, year: i64) -> MetadataDoc {
        MetadataDoc {
            name: Some(name.to_string()),
            doc_type: Some(doc_type.to_string()),
            year: Some(year),
            description: Some(format!("About {}", name)),
            ..Default::default()
        }
    }

    #[test]
    fn empty_docs_yield_empty_response() {
        let resp = build_description(Vec::new(), "alien", None, None);
        assert!(resp.best_match.is_none());
        assert!(resp.description.is_none());
        assert!(resp.candidates.is_empty());
    }

    #[test]
    fn exact_title_match_preferred() {
        let docs = vec![
            doc("Alien: Covenant", "movie", 2017),
            doc("Alien", "movie", 1979),
        ];
        let resp = build_description(docs, "  ALIEN ", None, None);
        let best = resp.best_match.unwrap();
        assert_eq!(best.name.as_deref(), Some("Alien"));
        assert_eq!(best.year, Some(1979));
        assert_eq!(resp.description.as_deref(), Some("About Alien"));
    }

    #[test]
    fn type_and_year_filters_apply() {
        let docs = vec![
            doc("Fargo", "movie", 1996),
            doc("Fargo", "tv-series", 2014),
        ];
        let resp = build_description(docs, "fargo", Some("tv-series"), None);
        assert_eq!(resp.best_match.unwrap().year, Some(2014));
        assert_eq!(resp.candidates.len(), 1);
    }

    #[test]
    fn filters_fall_back_to_all_docs_when_nothing_passes() {
        let docs = vec![doc("Fargo", "movie", 1996)];
        let resp = build_description(docs, "fargo", Some("anime"), None);
        assert_eq!(resp.best_match.unwrap().year, Some(1996));
    }

    #[test]
    fn alternative_names_count_as_exact() {
        let mut d = doc("Чужой", "movie", 1979);
        d.en_name = Some("Alien".to_string());
        let docs = vec![doc("Alien vs Predator", "movie", 2004), d];
        let resp = build_description(docs, "alien", None, None);
        assert_eq!(resp.best_match.unwrap().year, Some(1979));
    }

    #[test]
    fn candidates_capped_at_five() {
        let docs: Vec<MetadataDoc> = (0..8).map(|i| doc(&format!("Movie {}", i), "movie", 2000 + i)).collect();
        let resp = build_description(docs, "something else", None, None);
        assert_eq!(resp.candidates.len(), 5);
    }

    #[test]
    fn missing_api_key_is_service_unavailable() {
        let service = MetadataService::new(&crate::config::MetadataConfig {
            api_key: None,
            base_url: "https://api.kinopoisk.dev/v1.4".to_string(),
            timeout_seconds: 10,
        })
        .unwrap();
        assert!(matches!(
            service.api_key().unwrap_err(),
            AppError::ServiceUnavailable(_)
        ));
    }
}
