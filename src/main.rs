use anyhow::Result;
use clap::Parser;
use factchecker::analyzer::FactAnalyzer;
use factchecker::cache::Cache;
use factchecker::credibility::CredibilityScorer;
use factchecker::google::GoogleFactCheckClient;
use factchecker::handlers::{self, BotState};
use factchecker::notify::{Notifier, TelegramNotifier};
use factchecker::validator::Validator;
use factchecker::worker::{self, WorkerDeps};
use factchecker::{config, db, health, media};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    factchecker::init_tracing();

    let args = Args::parse();
    let cfg = Arc::new(config::load(Some(&args.config))?);
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database.url, cfg.database.max_connections).await?;
    db::run_migrations(&pool).await?;

    let cache = Arc::new(Cache::connect(&cfg.cache, &cfg.redis.url).await);
    let lookup = GoogleFactCheckClient::from_config(&cfg.factcheck)?;
    if !lookup.is_enabled() {
        warn!("google fact check api key not set; external lookups disabled");
    }
    let scorer = CredibilityScorer::load(&pool).await?;

    for tool in ["tesseract", "ffmpeg"] {
        if let Err(err) = media::ensure_tool_available(tool).await {
            warn!(%err, "media text extraction will be limited");
        }
    }

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(
        bot.clone(),
        cfg.telegram.admin_user_ids.clone(),
    ));

    // Spawn check worker (single consumer of check_jobs)
    let deps = WorkerDeps {
        analyzer: FactAnalyzer::new(Arc::new(lookup), Some(cache.clone())),
        scorer,
        notifier: notifier.clone(),
        max_attempts: cfg.app.max_attempts,
        max_backoff_secs: cfg.app.max_backoff_seconds as i64,
    };
    let poll_interval = Duration::from_millis(cfg.app.poll_interval_ms);
    tokio::spawn(worker::run_worker(pool.clone(), deps, poll_interval));

    let health_addr = cfg.app.health_addr.clone();
    let backends = Arc::new(health::ServiceHealth::new(pool.clone(), cache.clone()));
    tokio::spawn(async move {
        if let Err(err) = health::serve(&health_addr, backends).await {
            error!(?err, "health endpoint stopped");
        }
    });

    let state = Arc::new(BotState {
        pool,
        validator: Validator::new(&cfg.validation),
        config: cfg.clone(),
    });

    notifier.notify_admins("🟢 ربات فکت‌چکر راه‌اندازی شد.").await;

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::on_message))
        .branch(Update::filter_callback_query().endpoint(handlers::on_callback));

    info!("starting telegram bot");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
