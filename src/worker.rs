use crate::analyzer::FactAnalyzer;
use crate::credibility::CredibilityScorer;
use crate::db::{self, NewFactCheck, Pool, SimilarLink, SourceLink};
use crate::model::{CheckJob, ClaimStatus};
use crate::notify::Notifier;
use crate::reporter::{self, Format, ReportView};
use crate::text;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// How many recent completed claims are compared for similarity.
const SIMILAR_CANDIDATES: i64 = 200;

pub struct WorkerDeps {
    pub analyzer: FactAnalyzer,
    pub scorer: CredibilityScorer,
    pub notifier: Arc<dyn Notifier>,
    pub max_attempts: i32,
    pub max_backoff_secs: i64,
}

/// Runs one due check job. Returns `false` when nothing was due.
#[instrument(skip_all)]
pub async fn process_next_job(pool: &Pool, deps: &WorkerDeps) -> Result<bool> {
    let Some(job) = db::next_due_job(pool).await? else {
        return Ok(false);
    };

    match check_claim(pool, deps, &job).await {
        Ok(fact_check_id) => {
            db::delete_job(pool, job.id).await?;
            info!(job = job.id, claim = job.claim_id, fact_check_id, "claim checked");
        }
        Err(err) if job.attempt + 1 >= deps.max_attempts => {
            error!(?err, job = job.id, claim = job.claim_id, attempt = job.attempt, "claim check failed; giving up");
            db::set_claim_status(pool, job.claim_id, ClaimStatus::Failed).await?;
            if let Some(claim) = db::get_claim(pool, job.claim_id).await? {
                if let Err(err) = deps
                    .notifier
                    .deliver_failure(claim.chat_id, reporter::failure_text())
                    .await
                {
                    warn!(?err, claim = claim.id, "failed to deliver failure notice");
                }
            }
            db::delete_job(pool, job.id).await?;
        }
        Err(err) => {
            warn!(?err, job = job.id, claim = job.claim_id, attempt = job.attempt, "claim check failed; backoff");
            db::backoff_job_with_cap(pool, job.id, job.attempt, deps.max_backoff_secs).await?;
        }
    }
    Ok(true)
}

async fn check_claim(pool: &Pool, deps: &WorkerDeps, job: &CheckJob) -> Result<i64> {
    let claim = db::get_claim(pool, job.claim_id)
        .await?
        .ok_or_else(|| anyhow!("claim {} not found", job.claim_id))?;
    db::set_claim_status(pool, claim.id, ClaimStatus::Processing).await?;

    let prior = db::recent_completed_claims(pool, claim.id, SIMILAR_CANDIDATES).await?;
    let urls = text::extract_urls(&claim.claim_text);
    let source_scores = deps.scorer.evaluate_sources(&urls);

    let result = deps
        .analyzer
        .analyze(&claim.claim_text, &claim.language, &prior, &source_scores)
        .await?;

    let analysis = serde_json::to_value(&result)?;
    let similar_claims: Vec<SimilarLink> = result
        .similar
        .iter()
        .map(|m| SimilarLink { claim_id: m.claim_id, score: m.similarity })
        .collect();
    let source_links: Vec<SourceLink> = result
        .linked_sources
        .iter()
        .map(|s| SourceLink { source_id: s.source_id, relevance: s.relevance })
        .collect();
    let fact_check_id = db::insert_fact_check(
        pool,
        &NewFactCheck {
            claim_id: claim.id,
            verification_status: result.verification_status,
            credibility_score: result.credibility_score,
            summary: &result.summary,
            analysis: &analysis,
            evidence: &result.evidence,
            sources: &result.sources,
            similar_claims: &similar_claims,
            source_links: &source_links,
        },
    )
    .await?;

    // the fact check is stored; a lost message must not trigger a second analysis
    let report = reporter::render(&ReportView::from(&result), Format::Telegram)?;
    if let Err(err) = deps
        .notifier
        .deliver_result(claim.chat_id, &report, fact_check_id)
        .await
    {
        warn!(?err, claim = claim.id, fact_check_id, "failed to deliver result");
    }
    Ok(fact_check_id)
}

/// Loops forever; sleeps `poll_interval` whenever the queue is idle.
pub async fn run_worker(pool: Pool, deps: WorkerDeps, poll_interval: Duration) {
    info!("check worker started");
    loop {
        match process_next_job(&pool, &deps).await {
            Ok(processed) => {
                if !processed {
                    tokio::time::sleep(poll_interval).await;
                }
            }
            Err(err) => {
                error!(?err, "check worker error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
