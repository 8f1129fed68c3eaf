//! Combines external fact-check reviews, prior verdicts on similar claims and
//! the credibility of linked sources into one verdict.
use crate::cache::Cache;
use crate::credibility::SourceScore;
use crate::google::{FactCheckService, LookupResult, LookupStatus};
use crate::model::{Evidence, EvidenceKind, PriorCheck, SourceRef, VerificationStatus};
use crate::text::{self, Similarity};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const EXTERNAL_WEIGHT: f64 = 0.6;
pub const SIMILAR_WEIGHT: f64 = 0.25;
pub const SOURCE_WEIGHT: f64 = 0.15;

pub const SIMILARITY_THRESHOLD: f64 = 0.5;
pub const MAX_SIMILAR: usize = 5;
const SOURCE_EVIDENCE_RELEVANCE: f64 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarMatch {
    pub claim_id: i64,
    pub fact_check_id: i64,
    pub claim_text: String,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedSource {
    pub source_id: i64,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub claim_text: String,
    pub language: String,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub summary: String,
    pub evidence: Vec<Evidence>,
    pub sources: Vec<SourceRef>,
    pub similar: Vec<SimilarMatch>,
    pub linked_sources: Vec<LinkedSource>,
    pub lookup_status: LookupStatus,
    pub analyzed_at: DateTime<Utc>,
}

/// Persian one-line summary for a verdict.
pub fn summary_for(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Verified => "این ادعا با منابع معتبر تأیید شده است",
        VerificationStatus::False => "این ادعا با شواهد موجود رد می‌شود",
        VerificationStatus::PartiallyTrue => {
            "این ادعا تا حدی صحیح است اما نیاز به توضیحات تکمیلی دارد"
        }
        VerificationStatus::Misleading => "این ادعا گمراه‌کننده است و بخشی از واقعیت را تحریف می‌کند",
        VerificationStatus::Unverified => "شواهد کافی برای تأیید یا رد این ادعا وجود ندارد",
    }
}

/// `factcheck:<sha256 hex of cleaned text and language>`
pub fn lookup_cache_key(cleaned: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cleaned.as_bytes());
    hasher.update(b"\n");
    hasher.update(language.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("factcheck:{}", hex)
}

/// Prior checks with cosine similarity at or above the threshold, best first.
pub fn find_similar(claim_text: &str, prior: &[PriorCheck]) -> Vec<SimilarMatch> {
    let mut matches: Vec<SimilarMatch> = prior
        .iter()
        .filter_map(|p| {
            let sim = text::similarity(claim_text, &p.claim_text, Similarity::Cosine);
            (sim >= SIMILARITY_THRESHOLD).then(|| SimilarMatch {
                claim_id: p.claim_id,
                fact_check_id: p.fact_check_id,
                claim_text: p.claim_text.clone(),
                verification_status: p.verification_status,
                credibility_score: p.credibility_score,
                similarity: sim,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.truncate(MAX_SIMILAR);
    matches
}

/// Weighted mean of whichever signals are present; `None` when there are none.
pub fn combine_scores(
    lookup: &LookupResult,
    similar: &[SimilarMatch],
    sources: &[SourceScore],
) -> Option<f64> {
    let mut signals: Vec<(f64, f64)> = Vec::with_capacity(3);

    if lookup.stats.total_reviews > 0 {
        signals.push((lookup.stats.credibility_score, EXTERNAL_WEIGHT));
    }

    let sim_total: f64 = similar.iter().map(|s| s.similarity).sum();
    if sim_total > 0.0 {
        let weighted: f64 = similar
            .iter()
            .map(|s| s.credibility_score * s.similarity)
            .sum();
        signals.push((weighted / sim_total, SIMILAR_WEIGHT));
    }

    if !sources.is_empty() {
        let mean = sources.iter().map(|s| s.score).sum::<f64>() / sources.len() as f64;
        signals.push((mean, SOURCE_WEIGHT));
    }

    if signals.is_empty() {
        return None;
    }
    let total_weight: f64 = signals.iter().map(|(_, w)| w).sum();
    let score = signals.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight;
    Some(score.clamp(0.0, 1.0))
}

pub fn determine_status(score: Option<f64>, lookup: &LookupResult) -> VerificationStatus {
    let Some(score) = score else {
        return VerificationStatus::Unverified;
    };
    let total = lookup.stats.total_reviews;
    if total > 0 && lookup.stats.count(VerificationStatus::Misleading) * 2 > total {
        return VerificationStatus::Misleading;
    }
    if score >= 0.8 {
        VerificationStatus::Verified
    } else if score <= 0.2 {
        VerificationStatus::False
    } else {
        VerificationStatus::PartiallyTrue
    }
}

fn compile_evidence(
    lookup: &LookupResult,
    similar: &[SimilarMatch],
    sources: &[SourceScore],
) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    for claim in &lookup.claims {
        for review in &claim.reviews {
            let content = review
                .title
                .clone()
                .or_else(|| claim.text.clone())
                .unwrap_or_else(|| review.rating.original_rating.clone());
            evidence.push(Evidence {
                kind: EvidenceKind::FactCheck,
                content,
                url: review.url.clone(),
                publisher: review
                    .publisher_name
                    .clone()
                    .or_else(|| review.publisher_site.clone()),
                verification_status: Some(review.rating.status),
                credibility_score: review.rating.status.credibility_weight(),
            });
        }
    }

    for s in similar.iter().filter(|s| s.verification_status.is_decisive()) {
        evidence.push(Evidence {
            kind: EvidenceKind::SimilarClaim,
            content: s.claim_text.clone(),
            url: None,
            publisher: None,
            verification_status: Some(s.verification_status),
            credibility_score: s.credibility_score,
        });
    }

    for s in sources
        .iter()
        .filter(|s| s.relevance > SOURCE_EVIDENCE_RELEVANCE)
    {
        evidence.push(Evidence {
            kind: EvidenceKind::Source,
            content: s
                .name
                .clone()
                .or_else(|| s.domain.clone())
                .unwrap_or_else(|| s.url.clone()),
            url: Some(s.url.clone()),
            publisher: None,
            verification_status: None,
            credibility_score: s.score,
        });
    }

    evidence
}

fn compile_sources(lookup: &LookupResult, sources: &[SourceScore]) -> Vec<SourceRef> {
    let mut out: Vec<SourceRef> = Vec::new();
    let mut push = |r: SourceRef| {
        if r.url.is_none() || !out.iter().any(|o| o.url == r.url) {
            out.push(r);
        }
    };

    for review in lookup.reviews() {
        let title = review
            .publisher_name
            .clone()
            .or_else(|| review.publisher_site.clone())
            .or_else(|| review.title.clone());
        if let Some(title) = title {
            push(SourceRef {
                title,
                url: review.url.clone(),
                credibility_score: review.rating.confidence,
            });
        }
    }
    for s in sources.iter().filter(|s| s.name.is_some()) {
        push(SourceRef {
            title: s.name.clone().unwrap_or_default(),
            url: Some(s.url.clone()),
            credibility_score: s.score,
        });
    }
    out
}

pub struct FactAnalyzer {
    lookup: Arc<dyn FactCheckService>,
    cache: Option<Arc<Cache>>,
}

impl FactAnalyzer {
    pub fn new(lookup: Arc<dyn FactCheckService>, cache: Option<Arc<Cache>>) -> Self {
        Self { lookup, cache }
    }

    /// External lookup, served from the cache when possible. Lookup errors
    /// degrade to an `Error` result so the other signals still count.
    #[instrument(skip_all)]
    async fn external_lookup(&self, cleaned: &str, language: &str) -> LookupResult {
        let key = lookup_cache_key(cleaned, language);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get::<LookupResult>(&key).await {
                debug!(%key, "fact check lookup served from cache");
                return hit;
            }
        }

        let result = match self.lookup.search(cleaned, Some(language)).await {
            Ok(r) => r,
            Err(err) => {
                warn!(?err, "fact check lookup failed");
                return LookupResult::failed(err);
            }
        };

        if matches!(result.status, LookupStatus::Success | LookupStatus::NoResults) {
            if let Some(cache) = &self.cache {
                if let Err(err) = cache.set(&key, &result, None).await {
                    warn!(?err, "failed to cache lookup result");
                }
            }
        }
        result
    }

    #[instrument(skip_all, fields(language = %language))]
    pub async fn analyze(
        &self,
        claim_text: &str,
        language: &str,
        prior: &[PriorCheck],
        source_scores: &[SourceScore],
    ) -> Result<AnalysisResult> {
        let cleaned = text::clean_text(claim_text);
        let lookup = self.external_lookup(&cleaned, language).await;
        let similar = find_similar(&cleaned, prior);

        let score = combine_scores(&lookup, &similar, source_scores);
        let status = determine_status(score, &lookup);
        debug!(?score, %status, reviews = lookup.stats.total_reviews, similar = similar.len(), "claim analyzed");

        let linked_sources = source_scores
            .iter()
            .filter_map(|s| {
                s.source_id.map(|source_id| LinkedSource {
                    source_id,
                    relevance: s.relevance,
                })
            })
            .collect();

        Ok(AnalysisResult {
            claim_text: cleaned,
            language: language.to_string(),
            verification_status: status,
            credibility_score: score.unwrap_or(0.5),
            summary: summary_for(status).to_string(),
            evidence: compile_evidence(&lookup, &similar, source_scores),
            sources: compile_sources(&lookup, source_scores),
            similar,
            linked_sources,
            lookup_status: lookup.status,
            analyzed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google;

    fn prior(id: i64, text: &str, status: VerificationStatus, score: f64) -> PriorCheck {
        PriorCheck {
            claim_id: id,
            claim_text: text.to_string(),
            fact_check_id: id * 10,
            verification_status: status,
            credibility_score: score,
            analyzed_at: Utc::now(),
        }
    }

    fn lookup_with(ratings: &[&str]) -> LookupResult {
        let reviews: Vec<serde_json::Value> = ratings
            .iter()
            .map(|r| {
                serde_json::json!({
                    "publisher": {"name": "Snopes", "site": "snopes.com"},
                    "url": format!("https://snopes.com/{}", r),
                    "title": format!("Rated {}", r),
                    "textualRating": r,
                    "languageCode": "en"
                })
            })
            .collect();
        let body = serde_json::json!({
            "claims": [{"text": "claim", "claimReview": reviews}]
        });
        google::process_response(&body.to_string()).unwrap()
    }

    #[test]
    fn cache_key_is_stable_and_language_sensitive() {
        let a = lookup_cache_key("hello world", "en");
        assert_eq!(a, lookup_cache_key("hello world", "en"));
        assert_ne!(a, lookup_cache_key("hello world", "fa"));
        assert!(a.starts_with("factcheck:"));
        assert_eq!(a.len(), "factcheck:".len() + 64);
    }

    #[test]
    fn similar_claims_are_thresholded_sorted_and_capped() {
        let priors: Vec<PriorCheck> = (0..8)
            .map(|i| prior(i, "the earth is flat and round", VerificationStatus::False, 0.1))
            .chain(std::iter::once(prior(
                100,
                "completely unrelated words here",
                VerificationStatus::Verified,
                0.9,
            )))
            .collect();
        let found = find_similar("the earth is flat", &priors);
        assert_eq!(found.len(), MAX_SIMILAR);
        assert!(found.iter().all(|m| m.similarity >= SIMILARITY_THRESHOLD));
        assert!(found.iter().all(|m| m.claim_id != 100));
    }

    #[test]
    fn no_signal_means_unverified() {
        let lookup = LookupResult::disabled();
        let score = combine_scores(&lookup, &[], &[]);
        assert_eq!(score, None);
        assert_eq!(determine_status(score, &lookup), VerificationStatus::Unverified);
    }

    #[test]
    fn external_reviews_dominate_weighting() {
        let lookup = lookup_with(&["False", "False"]);
        let sources = vec![SourceScore {
            url: "https://reuters.com/a".into(),
            domain: Some("reuters.com".into()),
            name: Some("Reuters".into()),
            source_id: None,
            score: 0.8,
            relevance: 1.0,
        }];
        // (0.0 * 0.6 + 0.8 * 0.15) / 0.75 = 0.16
        let score = combine_scores(&lookup, &[], &sources).unwrap();
        assert!((score - 0.16).abs() < 1e-9);
        assert_eq!(determine_status(Some(score), &lookup), VerificationStatus::False);
    }

    #[test]
    fn misleading_majority_wins() {
        let lookup = lookup_with(&["Misleading", "Misleading", "True"]);
        let score = combine_scores(&lookup, &[], &[]);
        assert_eq!(determine_status(score, &lookup), VerificationStatus::Misleading);
    }

    #[test]
    fn similar_verdicts_weighted_by_similarity() {
        let similar = vec![
            SimilarMatch {
                claim_id: 1,
                fact_check_id: 10,
                claim_text: "a".into(),
                verification_status: VerificationStatus::Verified,
                credibility_score: 1.0,
                similarity: 1.0,
            },
            SimilarMatch {
                claim_id: 2,
                fact_check_id: 20,
                claim_text: "b".into(),
                verification_status: VerificationStatus::False,
                credibility_score: 0.0,
                similarity: 0.5,
            },
        ];
        let score = combine_scores(&LookupResult::disabled(), &similar, &[]).unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            determine_status(Some(score), &LookupResult::disabled()),
            VerificationStatus::PartiallyTrue
        );
    }

    #[test]
    fn evidence_includes_reviews_decisive_similars_and_relevant_sources() {
        let lookup = lookup_with(&["True"]);
        let similar = vec![
            SimilarMatch {
                claim_id: 1,
                fact_check_id: 10,
                claim_text: "decisive".into(),
                verification_status: VerificationStatus::False,
                credibility_score: 0.1,
                similarity: 0.9,
            },
            SimilarMatch {
                claim_id: 2,
                fact_check_id: 20,
                claim_text: "undecided".into(),
                verification_status: VerificationStatus::PartiallyTrue,
                credibility_score: 0.5,
                similarity: 0.9,
            },
        ];
        let sources = vec![
            SourceScore {
                url: "https://reuters.com/a".into(),
                domain: Some("reuters.com".into()),
                name: Some("Reuters".into()),
                source_id: Some(3),
                score: 0.85,
                relevance: 1.0,
            },
            SourceScore {
                url: "https://blog.example/x".into(),
                domain: Some("blog.example".into()),
                name: None,
                source_id: None,
                score: 0.5,
                relevance: 0.5,
            },
        ];
        let evidence = compile_evidence(&lookup, &similar, &sources);
        let kinds: Vec<EvidenceKind> = evidence.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EvidenceKind::FactCheck, EvidenceKind::SimilarClaim, EvidenceKind::Source]
        );
        assert_eq!(evidence[0].publisher.as_deref(), Some("Snopes"));
        assert_eq!(evidence[1].content, "decisive");
        assert_eq!(evidence[2].content, "Reuters");

        let refs = compile_sources(&lookup, &sources);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "Snopes");
        assert_eq!(refs[1].title, "Reuters");
    }

    #[test]
    fn summaries_differ_per_status() {
        let all: std::collections::HashSet<&str> =
            VerificationStatus::ALL.iter().map(|s| summary_for(*s)).collect();
        assert_eq!(all.len(), VerificationStatus::ALL.len());
    }
}
