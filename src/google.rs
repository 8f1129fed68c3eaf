//! Google Fact Check Tools lookup and rating normalization.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::FactCheck as FactCheckConfig;
use crate::model::VerificationStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Success,
    NoResults,
    Disabled,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRating {
    pub status: VerificationStatus,
    pub confidence: f64,
    pub original_rating: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub publisher_name: Option<String>,
    pub publisher_site: Option<String>,
    pub rating: NormalizedRating,
    pub title: Option<String>,
    pub url: Option<String>,
    pub language: Option<String>,
    pub review_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewedClaim {
    pub text: Option<String>,
    pub claimant: Option<String>,
    pub claim_date: Option<String>,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationStats {
    pub total_reviews: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub credibility_score: f64,
}

impl VerificationStats {
    pub fn count(&self, status: VerificationStatus) -> usize {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupResult {
    pub status: LookupStatus,
    pub claims: Vec<ReviewedClaim>,
    pub stats: VerificationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub fn disabled() -> Self {
        Self::empty(LookupStatus::Disabled)
    }

    pub fn failed(err: impl fmt::Display) -> Self {
        let mut r = Self::empty(LookupStatus::Error);
        r.error = Some(err.to_string());
        r
    }

    fn empty(status: LookupStatus) -> Self {
        Self {
            status,
            claims: Vec::new(),
            stats: verification_stats(&[]),
            error: None,
        }
    }

    pub fn reviews(&self) -> impl Iterator<Item = &Review> {
        self.claims.iter().flat_map(|c| c.reviews.iter())
    }
}

#[async_trait]
pub trait FactCheckService: Send + Sync {
    async fn search(&self, query: &str, language: Option<&str>) -> Result<LookupResult>;
}

// Wire format of claims:search.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    claims: Vec<ApiClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiClaim {
    text: Option<String>,
    claimant: Option<String>,
    claim_date: Option<String>,
    #[serde(default)]
    claim_review: Vec<ApiReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    publisher: Option<ApiPublisher>,
    url: Option<String>,
    title: Option<String>,
    review_date: Option<String>,
    textual_rating: Option<String>,
    rating: Option<f64>,
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPublisher {
    name: Option<String>,
    site: Option<String>,
}

/// Textual rating patterns, checked in order so "mostly false" wins over "false".
const RATING_PATTERNS: &[(&str, VerificationStatus, f64)] = &[
    ("pants on fire", VerificationStatus::False, 0.1),
    ("mostly false", VerificationStatus::False, 0.1),
    ("mostly true", VerificationStatus::PartiallyTrue, 0.6),
    ("half true", VerificationStatus::PartiallyTrue, 0.6),
    ("misleading", VerificationStatus::Misleading, 0.3),
    ("false", VerificationStatus::False, 0.1),
    ("true", VerificationStatus::Verified, 0.9),
];

pub fn normalize_rating(textual: Option<&str>, numeric: Option<f64>) -> NormalizedRating {
    let mut status = VerificationStatus::Unverified;
    let mut confidence = 0.5;

    if let Some(text) = textual {
        let lower = text.to_lowercase();
        if let Some((_, s, c)) = RATING_PATTERNS.iter().find(|(p, _, _)| lower.contains(p)) {
            status = *s;
            confidence = *c;
        }
    }

    if let Some(n) = numeric {
        confidence = n.clamp(0.0, 1.0);
        status = if confidence >= 0.8 {
            VerificationStatus::Verified
        } else if confidence >= 0.4 {
            VerificationStatus::PartiallyTrue
        } else {
            VerificationStatus::False
        };
    }

    NormalizedRating {
        status,
        confidence,
        original_rating: textual
            .map(str::to_owned)
            .or_else(|| numeric.map(|n| n.to_string()))
            .unwrap_or_default(),
    }
}

pub fn verification_stats(claims: &[ReviewedClaim]) -> VerificationStats {
    let mut counts: BTreeMap<String, usize> = VerificationStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut total = 0usize;
    let mut confidence_sum = 0.0;
    let mut weighted = 0.0;

    for review in claims.iter().flat_map(|c| c.reviews.iter()) {
        total += 1;
        *counts.entry(review.rating.status.as_str().to_string()).or_default() += 1;
        confidence_sum += review.rating.confidence;
        weighted += review.rating.status.credibility_weight();
    }

    let (average_confidence, credibility_score) = if total == 0 {
        (0.0, 0.5)
    } else {
        (confidence_sum / total as f64, weighted / total as f64)
    };

    VerificationStats {
        total_reviews: total,
        status_counts: counts,
        average_confidence,
        credibility_score,
    }
}

/// Turn a raw claims:search body into a `LookupResult`.
pub fn process_response(body: &str) -> Result<LookupResult> {
    let parsed: SearchResponse =
        serde_json::from_str(body).context("invalid fact check response JSON")?;
    if parsed.claims.is_empty() {
        return Ok(LookupResult::empty(LookupStatus::NoResults));
    }

    let claims: Vec<ReviewedClaim> = parsed
        .claims
        .into_iter()
        .map(|c| ReviewedClaim {
            text: c.text,
            claimant: c.claimant,
            claim_date: c.claim_date,
            reviews: c
                .claim_review
                .into_iter()
                .map(|r| {
                    let rating = normalize_rating(r.textual_rating.as_deref(), r.rating);
                    let (publisher_name, publisher_site) = match r.publisher {
                        Some(p) => (p.name, p.site),
                        None => (None, None),
                    };
                    Review {
                        publisher_name,
                        publisher_site,
                        rating,
                        title: r.title,
                        url: r.url,
                        language: r.language_code,
                        review_date: r.review_date,
                    }
                })
                .collect(),
        })
        .collect();

    Ok(LookupResult {
        status: LookupStatus::Success,
        stats: verification_stats(&claims),
        claims,
        error: None,
    })
}

#[derive(Clone)]
pub struct GoogleFactCheckClient {
    http: Client,
    base_url: Url,
    api_key: String,
    default_language: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl fmt::Debug for GoogleFactCheckClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleFactCheckClient")
            .field("base_url", &self.base_url)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl GoogleFactCheckClient {
    pub fn from_config(cfg: &FactCheckConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url).context("invalid factcheck.base_url")?;
        let http = Client::builder()
            .user_agent("factchecker/0.1")
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key: cfg.api_key.clone(),
            default_language: cfg.default_language.clone(),
            max_retries: cfg.max_retries.max(1),
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn build_request(&self, query: &str, language: &str) -> Result<reqwest::Request> {
        self.http
            .get(self.base_url.clone())
            .query(&[
                ("key", self.api_key.as_str()),
                ("query", query),
                ("languageCode", language),
            ])
            .build()
            .context("failed to build fact check request")
    }

    async fn attempt(&self, query: &str, language: &str) -> Result<std::result::Result<LookupResult, anyhow::Error>> {
        let request = self.build_request(query, language)?;
        let res = match self.http.execute(request).await {
            Ok(res) => res,
            Err(err) if err.is_timeout() || err.is_connect() => {
                return Ok(Err(anyhow!("fact check request failed: {}", err)))
            }
            Err(err) => return Err(err).context("failed to reach fact check API"),
        };

        let status = res.status();
        if status.is_server_error() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "fact check API transient error");
            return Ok(Err(anyhow!("fact check API error {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("fact check API error {}: {}", status, body));
        }
        let body = res.text().await.context("failed to read fact check response")?;
        debug!(bytes = body.len(), "fact check response received");
        Ok(Ok(process_response(&body)?))
    }
}

#[async_trait]
impl FactCheckService for GoogleFactCheckClient {
    /// Retries timeouts, connection failures and 5xx up to `max_retries`
    /// attempts; 4xx responses fail at once.
    #[instrument(skip_all)]
    async fn search(&self, query: &str, language: Option<&str>) -> Result<LookupResult> {
        if !self.is_enabled() {
            return Ok(LookupResult::disabled());
        }
        let language = language
            .filter(|l| *l != "unknown")
            .unwrap_or(&self.default_language);

        let mut last_err = anyhow!("fact check lookup not attempted");
        for attempt in 0..self.max_retries {
            match self.attempt(query, language).await? {
                Ok(result) => return Ok(result),
                Err(err) => {
                    warn!(attempt, ?err, "fact check lookup failed; retrying");
                    last_err = err;
                }
            }
            if attempt + 1 < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(last_err)
    }
}
