use anyhow::Result;
use factchecker::analyzer::FactAnalyzer;
use factchecker::credibility::CredibilityScorer;
use factchecker::db;
use factchecker::google::{self, FactCheckService, LookupResult};
use factchecker::model::{ClaimStatus, ClaimType, VerificationStatus};
use factchecker::notify::Notifier;
use factchecker::worker::{process_next_job, WorkerDeps};
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

// Tests share one database, so they run one at a time.
static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const FALSE_RATING: &str = r#"{"claims": [{"text": "5G towers spread the virus",
  "claimReview": [{"publisher": {"name": "AFP Fact Check", "site": "factcheck.afp.com"},
                   "url": "https://factcheck.afp.com/5g-virus", "textualRating": "False"}]}]}"#;

async fn setup_pool() -> db::Pool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = db::init_pool(&url, 5).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    sqlx::query("ALTER TABLE fact_checks DROP CONSTRAINT IF EXISTS reject_all")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("ALTER TABLE fact_check_sources DROP CONSTRAINT IF EXISTS reject_links")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "TRUNCATE users, claims, fact_checks, feedback, comments, reports, fact_check_sources, \
         similar_claims, check_jobs, pending_inputs RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool
}

#[derive(Clone, Default)]
struct ScriptedLookup {
    responses: Arc<Mutex<VecDeque<Result<LookupResult>>>>,
}

impl ScriptedLookup {
    fn with_responses(responses: Vec<Result<LookupResult>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
        }
    }
}

#[async_trait::async_trait]
impl FactCheckService for ScriptedLookup {
    async fn search(&self, _query: &str, _language: Option<&str>) -> Result<LookupResult> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(LookupResult::disabled()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Result { chat_id: i64, fact_check_id: i64, report: String },
    Failure { chat_id: i64 },
    Admin(String),
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingNotifier {
    async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver_result(&self, chat_id: i64, report: &str, fact_check_id: i64) -> Result<()> {
        self.sent.lock().await.push(Sent::Result {
            chat_id,
            fact_check_id,
            report: report.to_string(),
        });
        Ok(())
    }

    async fn deliver_failure(&self, chat_id: i64, _message: &str) -> Result<()> {
        self.sent.lock().await.push(Sent::Failure { chat_id });
        Ok(())
    }

    async fn notify_admins(&self, message: &str) {
        self.sent.lock().await.push(Sent::Admin(message.to_string()));
    }
}

async fn deps(pool: &db::Pool, lookup: ScriptedLookup, notifier: RecordingNotifier) -> WorkerDeps {
    WorkerDeps {
        analyzer: FactAnalyzer::new(Arc::new(lookup), None),
        scorer: CredibilityScorer::load(pool).await.unwrap(),
        notifier: Arc::new(notifier),
        max_attempts: 2,
        max_backoff_secs: 60,
    }
}

async fn submit(pool: &db::Pool, text: &str) -> i64 {
    let user_id = db::get_or_create_user(pool, 1001, Some("tester"), Some("Test"), None, None)
        .await
        .unwrap();
    db::submit_claim(pool, user_id, 555, text, ClaimType::Text, "en", &serde_json::json!({}))
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a Postgres test database
async fn submitted_claim_is_checked_and_delivered() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup_pool().await;
    let notifier = RecordingNotifier::default();
    let lookup = ScriptedLookup::with_responses(vec![google::process_response(FALSE_RATING)]);
    let deps = deps(&pool, lookup, notifier.clone()).await;

    let claim_id = submit(&pool, "5G towers spread the virus, see https://www.reuters.com/fake").await;
    assert!(process_next_job(&pool, &deps).await.unwrap());
    assert!(!process_next_job(&pool, &deps).await.unwrap());

    let claim = db::get_claim(&pool, claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Completed);
    let fc = db::latest_fact_check_for_claim(&pool, claim_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fc.verification_status, VerificationStatus::False);
    assert!(!fc.evidence.is_empty());

    let linked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fact_check_sources WHERE fact_check_id = $1")
        .bind(fc.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(linked, 1);

    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Sent::Result { chat_id, fact_check_id, report } => {
            assert_eq!(*chat_id, 555);
            assert_eq!(*fact_check_id, fc.id);
            assert!(report.contains(VerificationStatus::False.label()));
        }
        other => panic!("unexpected message {:?}", other),
    }
    assert_eq!(db::count_jobs(&pool).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a Postgres test database
async fn similar_claims_are_recorded_on_second_check() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup_pool().await;
    let notifier = RecordingNotifier::default();
    let lookup = ScriptedLookup::with_responses(vec![
        google::process_response(FALSE_RATING),
        Ok(LookupResult::disabled()),
    ]);
    let deps = deps(&pool, lookup, notifier.clone()).await;

    let first = submit(&pool, "5G towers spread the virus in the city").await;
    assert!(process_next_job(&pool, &deps).await.unwrap());
    let second = submit(&pool, "5G towers spread the virus in the capital city").await;
    assert!(process_next_job(&pool, &deps).await.unwrap());

    let recorded: Vec<i64> =
        sqlx::query_scalar("SELECT similar_claim_id FROM similar_claims WHERE claim_id = $1")
            .bind(second)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(recorded, vec![first]);

    let fc = db::latest_fact_check_for_claim(&pool, second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fc.verification_status, VerificationStatus::False);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a Postgres test database
async fn failing_check_backs_off_then_gives_up() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup_pool().await;
    let notifier = RecordingNotifier::default();
    let deps = deps(&pool, ScriptedLookup::default(), notifier.clone()).await;

    // every new fact check row is rejected
    sqlx::query("ALTER TABLE fact_checks ADD CONSTRAINT reject_all CHECK (false) NOT VALID")
        .execute(&pool)
        .await
        .unwrap();

    let claim_id = submit(&pool, "A claim whose result cannot be stored").await;
    assert!(process_next_job(&pool, &deps).await.unwrap());

    let attempt: i32 = sqlx::query_scalar("SELECT attempt FROM check_jobs WHERE claim_id = $1")
        .bind(claim_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(attempt, 1);
    assert!(db::next_due_job(&pool).await.unwrap().is_none());

    sqlx::query("UPDATE check_jobs SET due_at = NOW() - INTERVAL '1 second'")
        .execute(&pool)
        .await
        .unwrap();
    assert!(process_next_job(&pool, &deps).await.unwrap());

    sqlx::query("ALTER TABLE fact_checks DROP CONSTRAINT reject_all")
        .execute(&pool)
        .await
        .unwrap();

    let claim = db::get_claim(&pool, claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Failed);
    assert_eq!(db::count_jobs(&pool).await.unwrap(), 0);
    assert_eq!(notifier.sent().await, vec![Sent::Failure { chat_id: 555 }]);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a Postgres test database
async fn failed_link_write_leaves_no_fact_check_behind() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup_pool().await;
    let notifier = RecordingNotifier::default();
    let lookup = ScriptedLookup::with_responses(vec![
        google::process_response(FALSE_RATING),
        google::process_response(FALSE_RATING),
    ]);
    let deps = deps(&pool, lookup, notifier.clone()).await;

    sqlx::query("ALTER TABLE fact_check_sources ADD CONSTRAINT reject_links CHECK (false) NOT VALID")
        .execute(&pool)
        .await
        .unwrap();
    let claim_id = submit(&pool, "5G towers spread the virus, see https://www.reuters.com/fake").await;
    assert!(process_next_job(&pool, &deps).await.unwrap());

    let rows = |pool: db::Pool| async move {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fact_checks WHERE claim_id = $1")
            .bind(claim_id)
            .fetch_one(&pool)
            .await
            .unwrap()
    };
    assert_eq!(rows(pool.clone()).await, 0);
    assert!(notifier.sent().await.is_empty());

    sqlx::query("ALTER TABLE fact_check_sources DROP CONSTRAINT reject_links")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE check_jobs SET due_at = NOW() - INTERVAL '1 second'")
        .execute(&pool)
        .await
        .unwrap();
    assert!(process_next_job(&pool, &deps).await.unwrap());

    assert_eq!(rows(pool.clone()).await, 1);
    let claim = db::get_claim(&pool, claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Completed);
    assert_eq!(notifier.sent().await.len(), 1);
    assert_eq!(db::count_jobs(&pool).await.unwrap(), 0);
}
