use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use factchecker::analyzer::FactAnalyzer;
use factchecker::cache::Cache;
use factchecker::config;
use factchecker::credibility::CredibilityScorer;
use factchecker::google::GoogleFactCheckClient;
use factchecker::model::ClaimType;
use factchecker::reporter::{self, Format, ReportView};
use factchecker::validator::Validator;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Check a single claim without the bot or the database and print the report"
)]
struct Args {
    /// Path to YAML config file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: text, json or telegram
    #[arg(long, default_value = "text")]
    format: Format,

    /// Claim text to check
    claim: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    factchecker::init_tracing();
    let args = Args::parse();

    let (factcheck, validation, cache_cfg) = match &args.config {
        Some(path) => {
            let cfg = config::load(Some(path))?;
            (cfg.factcheck, cfg.validation, cfg.cache)
        }
        None => {
            let mut factcheck = config::FactCheck::default();
            if let Some(key) = std::env::var("GOOGLE_FACTCHECK_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
            {
                factcheck.api_key = key;
            }
            (factcheck, config::Validation::default(), config::Cache::default())
        }
    };

    let validated = Validator::new(&validation)
        .validate(&args.claim, ClaimType::Text)
        .map_err(|err| anyhow!("{}", err.user_message()))?;
    let language = if validated.language == "unknown" {
        factcheck.default_language.clone()
    } else {
        validated.language.clone()
    };

    let client = GoogleFactCheckClient::from_config(&factcheck)?;
    if !client.is_enabled() {
        info!("no api key configured; external lookup skipped");
    }
    let analyzer = FactAnalyzer::new(Arc::new(client), Some(Arc::new(Cache::in_memory(&cache_cfg))));
    let scores = CredibilityScorer::builtin().evaluate_sources(&validated.urls);

    let result = analyzer
        .analyze(&validated.text, &language, &[], &scores)
        .await?;
    println!("{}", reporter::render(&ReportView::from(&result), args.format)?);
    Ok(())
}
