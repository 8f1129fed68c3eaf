//! View models used by repositories.

use crate::model::{Evidence, SourceRef, VerificationStatus};

/// Agree/disagree tallies for one fact check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackCounts {
    pub agree: i64,
    pub disagree: i64,
}

/// Everything the worker persists for a finished analysis.
#[derive(Debug, Clone)]
pub struct NewFactCheck<'a> {
    pub claim_id: i64,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub summary: &'a str,
    pub analysis: &'a serde_json::Value,
    pub evidence: &'a [Evidence],
    pub sources: &'a [SourceRef],
    pub similar_claims: &'a [SimilarLink],
    pub source_links: &'a [SourceLink],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarLink {
    pub claim_id: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLink {
    pub source_id: i64,
    pub relevance: f64,
}
