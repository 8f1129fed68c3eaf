//! Credibility scoring for URLs mentioned in a claim.
use crate::db::{self, Pool};
use crate::model::{Source, SourceType};
use crate::text;
use anyhow::Result;
use reqwest::Url;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, instrument};

const DEFAULT_SCORE: f64 = 0.5;
const HEURISTIC_PENALTY: f64 = 0.1;

/// Relevance given to a known source; unknown hosts get `UNKNOWN_RELEVANCE`.
const KNOWN_RELEVANCE: f64 = 1.0;
const UNKNOWN_RELEVANCE: f64 = 0.5;

const URL_SHORTENERS: &[&str] = &[
    "bit.ly", "t.co", "tinyurl.com", "goo.gl", "ow.ly", "is.gd", "buff.ly", "cutt.ly", "rb.gy",
    "shorturl.at",
];

/// Used when the database has no row for a domain. Mirrors the seed migration.
const BUILTIN_TRUSTED: &[(&str, &str, SourceType, f64)] = &[
    ("Factnameh", "factnameh.com", SourceType::FactCheck, 0.9),
    ("Snopes", "snopes.com", SourceType::FactCheck, 0.9),
    ("PolitiFact", "politifact.com", SourceType::FactCheck, 0.9),
    ("AFP Fact Check", "factcheck.afp.com", SourceType::FactCheck, 0.9),
    ("Reuters", "reuters.com", SourceType::News, 0.85),
    ("BBC Persian", "bbc.com", SourceType::News, 0.8),
    ("ISNA", "isna.ir", SourceType::News, 0.6),
    ("IRNA", "irna.ir", SourceType::News, 0.6),
    ("World Health Organization", "who.int", SourceType::Government, 0.9),
    ("Nature", "nature.com", SourceType::Academic, 0.95),
];

/// Score of a single URL together with what it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceScore {
    pub url: String,
    pub domain: Option<String>,
    pub name: Option<String>,
    /// Row id when the domain is a known source in the database.
    pub source_id: Option<i64>,
    pub score: f64,
    pub relevance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CredibilityScorer {
    known: HashMap<String, Source>,
}

impl CredibilityScorer {
    /// Scorer backed by the built-in trusted list only.
    pub fn builtin() -> Self {
        Self::with_sources(Vec::new())
    }

    /// Database sources take precedence over built-in entries with the same domain.
    pub fn with_sources(sources: Vec<Source>) -> Self {
        let mut known: HashMap<String, Source> = BUILTIN_TRUSTED
            .iter()
            .map(|(name, domain, source_type, base)| {
                (
                    domain.to_string(),
                    Source {
                        id: 0,
                        name: name.to_string(),
                        domain: domain.to_string(),
                        source_type: *source_type,
                        base_credibility: *base,
                        is_active: true,
                    },
                )
            })
            .collect();
        for s in sources.into_iter().filter(|s| s.is_active) {
            known.insert(s.domain.to_ascii_lowercase(), s);
        }
        Self { known }
    }

    #[instrument(skip_all)]
    pub async fn load(pool: &Pool) -> Result<Self> {
        let sources = db::list_active_sources(pool).await?;
        debug!(count = sources.len(), "loaded trusted sources");
        Ok(Self::with_sources(sources))
    }

    /// Exact domain match first, then the closest parent domain
    /// (`news.bbc.com` -> `bbc.com`).
    fn lookup(&self, domain: &str) -> Option<&Source> {
        let mut candidate = domain;
        loop {
            if let Some(s) = self.known.get(candidate) {
                return Some(s);
            }
            match candidate.split_once('.') {
                Some((_, rest)) if rest.contains('.') => candidate = rest,
                _ => return None,
            }
        }
    }

    pub fn score_url(&self, url: &str) -> SourceScore {
        let domain = text::extract_domain(url);
        let known = domain.as_deref().and_then(|d| self.lookup(d));

        if let Some(source) = known {
            return SourceScore {
                url: url.to_string(),
                domain: domain.clone(),
                name: Some(source.name.clone()),
                source_id: (source.id > 0).then_some(source.id),
                score: source.base_credibility.clamp(0.0, 1.0),
                relevance: KNOWN_RELEVANCE,
            };
        }

        SourceScore {
            url: url.to_string(),
            domain,
            name: None,
            source_id: None,
            score: heuristic_score(url),
            relevance: UNKNOWN_RELEVANCE,
        }
    }

    /// One score per input URL, in input order.
    pub fn evaluate_sources(&self, urls: &[String]) -> Vec<SourceScore> {
        urls.iter().map(|u| self.score_url(u)).collect()
    }
}

fn heuristic_score(url: &str) -> f64 {
    let mut score = DEFAULT_SCORE;
    let Ok(parsed) = Url::parse(url.trim()) else {
        return (score - HEURISTIC_PENALTY).clamp(0.0, 1.0);
    };
    let host = parsed
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();

    if host.parse::<IpAddr>().is_ok() {
        score -= HEURISTIC_PENALTY;
    }
    let bare = host.strip_prefix("www.").unwrap_or(&host);
    if URL_SHORTENERS.contains(&bare) {
        score -= HEURISTIC_PENALTY;
    }
    if parsed.scheme() != "https" {
        score -= HEURISTIC_PENALTY;
    }
    score.clamp(0.0, 1.0)
}
