use super::model::{FeedbackCounts, NewFactCheck, SimilarLink, SourceLink};
use crate::model::{
    CheckJob, Claim, ClaimStatus, ClaimType, Evidence, FactCheck, FeedbackType, PendingInput,
    PendingInputKind, PriorCheck, ReportStatus, ReportType, Source, SourceRef, SourceType, User,
    UserStats, VerificationStatus,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use tracing::instrument;

pub type Pool = PgPool;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<Pool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Versions recorded as applied; empty before the first `run`.
pub async fn applied_migrations(pool: &Pool) -> Result<HashSet<i64>> {
    let table: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations')::text")
            .fetch_one(pool)
            .await
            .context("failed to look up migrations table")?;
    if table.is_none() {
        return Ok(HashSet::new());
    }
    let versions: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
            .context("failed to read applied migrations")?;
    Ok(versions.into_iter().collect())
}

pub async fn health_check(pool: &Pool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}

// ---------------------------------------------------------------------------
// users

/// Returns the internal user id, refreshing profile fields on repeat visits.
#[instrument(skip_all)]
pub async fn get_or_create_user(
    pool: &Pool,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    language_code: Option<&str>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (telegram_id, username, first_name, last_name, language_code) \
         VALUES ($1, $2, $3, $4, COALESCE($5, 'fa')) \
         ON CONFLICT (telegram_id) DO UPDATE SET \
             username = EXCLUDED.username, \
             first_name = EXCLUDED.first_name, \
             last_name = EXCLUDED.last_name, \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(telegram_id)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(language_code)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn set_user_language(pool: &Pool, user_id: i64, language: &str) -> Result<()> {
    sqlx::query("UPDATE users SET language_code = $1, updated_at = NOW() WHERE id = $2")
        .bind(language)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, user_id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, telegram_id, username, first_name, last_name, language_code, is_banned, created_at \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| User {
        id: row.get("id"),
        telegram_id: row.get("telegram_id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        language_code: row.get("language_code"),
        is_banned: row.get("is_banned"),
        created_at: row.get("created_at"),
    }))
}

/// Preferred language of a user; `fa` for unknown users.
pub async fn user_language(pool: &Pool, user_id: i64) -> Result<String> {
    Ok(get_user(pool, user_id)
        .await?
        .map(|u| u.language_code)
        .unwrap_or_else(|| "fa".to_string()))
}

#[instrument(skip_all)]
pub async fn is_user_banned(pool: &Pool, telegram_id: i64) -> Result<bool> {
    let banned: Option<bool> =
        sqlx::query_scalar("SELECT is_banned FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(pool)
            .await?;
    Ok(banned.unwrap_or(false))
}

/// Totals count each claim once, by its latest verdict.
#[instrument(skip_all)]
pub async fn user_stats(pool: &Pool, user_id: i64) -> Result<UserStats> {
    let row = sqlx::query(
        "SELECT u.created_at AS join_date, \
                COUNT(lf.verification_status) AS total_checks, \
                COUNT(*) FILTER (WHERE lf.verification_status = 'VERIFIED') AS verified_count, \
                COUNT(*) FILTER (WHERE lf.verification_status = 'FALSE') AS false_count, \
                MAX(c.created_at) AS last_activity \
         FROM users u \
         LEFT JOIN claims c ON c.user_id = u.id \
         LEFT JOIN LATERAL ( \
             SELECT f.verification_status FROM fact_checks f \
             WHERE f.claim_id = c.id \
             ORDER BY f.created_at DESC, f.id DESC LIMIT 1 \
         ) lf ON TRUE \
         WHERE u.id = $1 \
         GROUP BY u.id, u.created_at",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Err(anyhow!("user {} not found", user_id));
    };

    let total: i64 = row.get("total_checks");
    let verified: i64 = row.get("verified_count");
    let false_count: i64 = row.get("false_count");
    Ok(UserStats {
        total_checks: total,
        verified_count: verified,
        false_count,
        unknown_count: total - verified - false_count,
        join_date: row.get("join_date"),
        last_activity: row.get("last_activity"),
    })
}

// ---------------------------------------------------------------------------
// claims

/// Stores a PENDING claim and enqueues its check job atomically.
#[instrument(skip_all)]
pub async fn submit_claim(
    pool: &Pool,
    user_id: i64,
    chat_id: i64,
    claim_text: &str,
    claim_type: ClaimType,
    language: &str,
    metadata: &serde_json::Value,
) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let claim_id: i64 = sqlx::query_scalar(
        "INSERT INTO claims (user_id, chat_id, claim_text, claim_type, language, metadata, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(claim_text)
    .bind(claim_type.as_str())
    .bind(language)
    .bind(metadata)
    .bind(ClaimStatus::Pending.as_str())
    .fetch_one(&mut *tx)
    .await?;
    enqueue_job_tx(&mut tx, claim_id, Utc::now()).await?;
    tx.commit().await?;
    Ok(claim_id)
}

/// Queue another check for an existing claim (re-check). Returns `false`
/// when the claim already has a job waiting.
#[instrument(skip_all)]
pub async fn requeue_claim(pool: &Pool, claim_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let job: Option<i64> = sqlx::query_scalar(
        "INSERT INTO check_jobs (claim_id, attempt, due_at) VALUES ($1, 0, NOW()) \
         ON CONFLICT (claim_id) DO NOTHING RETURNING id",
    )
    .bind(claim_id)
    .fetch_optional(&mut *tx)
    .await?;
    if job.is_none() {
        return Ok(false);
    }
    sqlx::query("UPDATE claims SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(ClaimStatus::Pending.as_str())
        .bind(claim_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

#[instrument(skip_all)]
pub async fn set_claim_status(pool: &Pool, claim_id: i64, status: ClaimStatus) -> Result<()> {
    sqlx::query("UPDATE claims SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(claim_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn claim_from_row(row: &PgRow) -> Result<Claim> {
    let claim_type: String = row.get("claim_type");
    let status: String = row.get("status");
    Ok(Claim {
        id: row.get("id"),
        user_id: row.get("user_id"),
        chat_id: row.get("chat_id"),
        claim_text: row.get("claim_text"),
        claim_type: ClaimType::parse(&claim_type)
            .ok_or_else(|| anyhow!("unknown claim type {}", claim_type))?,
        language: row.get("language"),
        status: ClaimStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown claim status {}", status))?,
        created_at: row.get("created_at"),
    })
}

#[instrument(skip_all)]
pub async fn get_claim(pool: &Pool, claim_id: i64) -> Result<Option<Claim>> {
    let row = sqlx::query(
        "SELECT id, user_id, chat_id, claim_text, claim_type, language, status, created_at \
         FROM claims WHERE id = $1",
    )
    .bind(claim_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(claim_from_row).transpose()
}

/// Most recent completed claims with their latest verdict, newest first.
#[instrument(skip_all)]
pub async fn recent_completed_claims(
    pool: &Pool,
    exclude_claim_id: i64,
    limit: i64,
) -> Result<Vec<PriorCheck>> {
    let rows = sqlx::query(
        "SELECT DISTINCT ON (c.id) c.id AS claim_id, c.claim_text, f.id AS fact_check_id, \
                f.verification_status, f.credibility_score, f.created_at \
         FROM claims c JOIN fact_checks f ON f.claim_id = c.id \
         WHERE c.status = 'COMPLETED' AND c.id <> $1 \
         ORDER BY c.id DESC, f.created_at DESC \
         LIMIT $2",
    )
    .bind(exclude_claim_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.get("verification_status");
            Ok(PriorCheck {
                claim_id: row.get("claim_id"),
                claim_text: row.get("claim_text"),
                fact_check_id: row.get("fact_check_id"),
                verification_status: VerificationStatus::parse(&status)
                    .ok_or_else(|| anyhow!("unknown verification status {}", status))?,
                credibility_score: row.get("credibility_score"),
                analyzed_at: row.get("created_at"),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// fact checks

/// Persists the result with its similar-claim and source links and marks
/// its claim COMPLETED, all in one transaction.
#[instrument(skip_all)]
pub async fn insert_fact_check(pool: &Pool, fc: &NewFactCheck<'_>) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO fact_checks \
             (claim_id, verification_status, credibility_score, summary, analysis_result, evidence, sources) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(fc.claim_id)
    .bind(fc.verification_status.as_str())
    .bind(fc.credibility_score.clamp(0.0, 1.0))
    .bind(fc.summary)
    .bind(fc.analysis)
    .bind(Json(fc.evidence))
    .bind(Json(fc.sources))
    .fetch_one(&mut *tx)
    .await?;
    for link in fc.similar_claims {
        record_similar_claim_tx(&mut tx, fc.claim_id, link).await?;
    }
    for link in fc.source_links {
        link_source_tx(&mut tx, id, link).await?;
    }
    sqlx::query("UPDATE claims SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(ClaimStatus::Completed.as_str())
        .bind(fc.claim_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(id)
}

async fn record_similar_claim_tx(
    tx: &mut Transaction<'_, Postgres>,
    claim_id: i64,
    link: &SimilarLink,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO similar_claims (claim_id, similar_claim_id, similarity_score) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (claim_id, similar_claim_id) DO UPDATE SET similarity_score = EXCLUDED.similarity_score",
    )
    .bind(claim_id)
    .bind(link.claim_id)
    .bind(link.score)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn link_source_tx(
    tx: &mut Transaction<'_, Postgres>,
    fact_check_id: i64,
    link: &SourceLink,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO fact_check_sources (fact_check_id, source_id, relevance_score) \
         VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(fact_check_id)
    .bind(link.source_id)
    .bind(link.relevance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn fact_check_from_row(row: &PgRow) -> Result<FactCheck> {
    let status: String = row.get("verification_status");
    let Json(evidence): Json<Vec<Evidence>> = row.get("evidence");
    let Json(sources): Json<Vec<SourceRef>> = row.get("sources");
    Ok(FactCheck {
        id: row.get("id"),
        claim_id: row.get("claim_id"),
        claim_text: row.get("claim_text"),
        verification_status: VerificationStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown verification status {}", status))?,
        credibility_score: row.get("credibility_score"),
        summary: row.get("summary"),
        evidence,
        sources,
        created_at: row.get("created_at"),
    })
}

const FACT_CHECK_SELECT: &str =
    "SELECT f.id, f.claim_id, c.claim_text, f.verification_status, f.credibility_score, \
            f.summary, f.evidence, f.sources, f.created_at \
     FROM fact_checks f JOIN claims c ON c.id = f.claim_id";

#[instrument(skip_all)]
pub async fn get_fact_check(pool: &Pool, id: i64) -> Result<Option<FactCheck>> {
    let row = sqlx::query(&format!("{} WHERE f.id = $1", FACT_CHECK_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(fact_check_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn latest_fact_check_for_claim(pool: &Pool, claim_id: i64) -> Result<Option<FactCheck>> {
    let row = sqlx::query(&format!(
        "{} WHERE f.claim_id = $1 ORDER BY f.created_at DESC, f.id DESC LIMIT 1",
        FACT_CHECK_SELECT
    ))
    .bind(claim_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(fact_check_from_row).transpose()
}

// ---------------------------------------------------------------------------
// sources

fn source_from_row(row: &PgRow) -> Result<Source> {
    let source_type: String = row.get("source_type");
    Ok(Source {
        id: row.get("id"),
        name: row.get("name"),
        domain: row.get("domain"),
        source_type: SourceType::parse(&source_type)
            .ok_or_else(|| anyhow!("unknown source type {}", source_type))?,
        base_credibility: row.get("base_credibility"),
        is_active: row.get("is_active"),
    })
}

#[instrument(skip_all)]
pub async fn find_source_by_domain(pool: &Pool, domain: &str) -> Result<Option<Source>> {
    let row = sqlx::query(
        "SELECT id, name, domain, source_type, base_credibility, is_active \
         FROM sources WHERE domain = $1 AND is_active",
    )
    .bind(domain.to_ascii_lowercase())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(source_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn list_active_sources(pool: &Pool) -> Result<Vec<Source>> {
    let rows = sqlx::query(
        "SELECT id, name, domain, source_type, base_credibility, is_active \
         FROM sources WHERE is_active ORDER BY base_credibility DESC, domain ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(source_from_row).collect()
}

// ---------------------------------------------------------------------------
// feedback, comments, reports

/// One vote per user per fact check; a second vote replaces the first.
#[instrument(skip_all)]
pub async fn save_feedback(
    pool: &Pool,
    user_id: i64,
    fact_check_id: i64,
    feedback: FeedbackType,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO feedback (user_id, fact_check_id, feedback_type) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, fact_check_id) \
         DO UPDATE SET feedback_type = EXCLUDED.feedback_type, created_at = NOW()",
    )
    .bind(user_id)
    .bind(fact_check_id)
    .bind(feedback.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn feedback_counts(pool: &Pool, fact_check_id: i64) -> Result<FeedbackCounts> {
    let row = sqlx::query(
        "SELECT COUNT(*) FILTER (WHERE feedback_type = 'AGREE') AS agree, \
                COUNT(*) FILTER (WHERE feedback_type = 'DISAGREE') AS disagree \
         FROM feedback WHERE fact_check_id = $1",
    )
    .bind(fact_check_id)
    .fetch_one(pool)
    .await?;
    Ok(FeedbackCounts {
        agree: row.get("agree"),
        disagree: row.get("disagree"),
    })
}

#[instrument(skip_all)]
pub async fn add_comment(
    pool: &Pool,
    user_id: i64,
    fact_check_id: i64,
    content: &str,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (user_id, fact_check_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(fact_check_id)
    .bind(content)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn add_report(
    pool: &Pool,
    user_id: i64,
    fact_check_id: i64,
    report_type: ReportType,
    description: Option<&str>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO reports (user_id, fact_check_id, report_type, description, status) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(fact_check_id)
    .bind(report_type.as_str())
    .bind(description)
    .bind(ReportStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Only reports still awaiting review take a description; returns whether
/// the report was updated.
#[instrument(skip_all)]
pub async fn set_report_description(pool: &Pool, report_id: i64, description: &str) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE reports SET description = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(description)
    .bind(report_id)
    .bind(ReportStatus::Pending.as_str())
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn report_status(pool: &Pool, report_id: i64) -> Result<Option<ReportStatus>> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM reports WHERE id = $1")
        .bind(report_id)
        .fetch_optional(pool)
        .await?;
    status
        .map(|s| ReportStatus::parse(&s).ok_or_else(|| anyhow!("unknown report status {}", s)))
        .transpose()
}

// ---------------------------------------------------------------------------
// pending input

#[instrument(skip_all)]
pub async fn set_pending_input(pool: &Pool, user_id: i64, input: PendingInput) -> Result<()> {
    sqlx::query(
        "INSERT INTO pending_inputs (user_id, kind, fact_check_id, report_id) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id) DO UPDATE SET kind = EXCLUDED.kind, \
             fact_check_id = EXCLUDED.fact_check_id, report_id = EXCLUDED.report_id, created_at = NOW()",
    )
    .bind(user_id)
    .bind(input.kind.as_str())
    .bind(input.fact_check_id)
    .bind(input.report_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Removes and returns the user's outstanding prompt, if any.
#[instrument(skip_all)]
pub async fn take_pending_input(pool: &Pool, user_id: i64) -> Result<Option<PendingInput>> {
    let row = sqlx::query(
        "DELETE FROM pending_inputs WHERE user_id = $1 RETURNING kind, fact_check_id, report_id",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let kind: String = row.get("kind");
    Ok(Some(PendingInput {
        kind: PendingInputKind::parse(&kind)
            .ok_or_else(|| anyhow!("unknown pending input kind {}", kind))?,
        fact_check_id: row.get("fact_check_id"),
        report_id: row.get("report_id"),
    }))
}

#[instrument(skip_all)]
pub async fn clear_pending_input(pool: &Pool, user_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM pending_inputs WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// check jobs

async fn enqueue_job_tx(
    tx: &mut Transaction<'_, Postgres>,
    claim_id: i64,
    due_at: DateTime<Utc>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO check_jobs (claim_id, attempt, due_at) VALUES ($1, 0, $2) RETURNING id",
    )
    .bind(claim_id)
    .bind(due_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn next_due_job(pool: &Pool) -> Result<Option<CheckJob>> {
    let row = sqlx::query(
        "SELECT id, claim_id, attempt, due_at FROM check_jobs \
         WHERE due_at <= NOW() ORDER BY due_at ASC, id ASC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| CheckJob {
        id: row.get("id"),
        claim_id: row.get("claim_id"),
        attempt: row.get("attempt"),
        due_at: row.get("due_at"),
    }))
}

#[instrument(skip_all)]
pub async fn delete_job(pool: &Pool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM check_jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `5s * 2^attempt`, capped at `max_cap_secs` when that is positive.
pub fn backoff_delay_secs(attempt: i32, max_cap_secs: i64) -> i64 {
    let secs = 5_i64 * (1_i64 << attempt.clamp(0, 20));
    if max_cap_secs <= 0 {
        secs
    } else {
        secs.min(max_cap_secs)
    }
}

#[instrument(skip_all)]
pub async fn backoff_job_with_cap(
    pool: &Pool,
    id: i64,
    attempt: i32,
    max_cap_secs: i64,
) -> Result<()> {
    let due_at = Utc::now() + Duration::seconds(backoff_delay_secs(attempt, max_cap_secs));
    sqlx::query("UPDATE check_jobs SET attempt = $1, due_at = $2 WHERE id = $3")
        .bind(attempt + 1)
        .bind(due_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn count_jobs(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_jobs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        assert_eq!(backoff_delay_secs(0, 3600), 5);
        assert_eq!(backoff_delay_secs(1, 3600), 10);
        assert_eq!(backoff_delay_secs(4, 3600), 80);
        assert_eq!(backoff_delay_secs(10, 3600), 3600);
        assert_eq!(backoff_delay_secs(3, 0), 40);
        assert_eq!(backoff_delay_secs(-1, 60), 5);
    }
}
