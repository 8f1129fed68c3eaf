//! Telegram fact-checking bot: claim intake, analysis worker and the
//! supporting storage, cache and lookup services.
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod credibility;
pub mod db;
pub mod google;
pub mod handlers;
pub mod health;
pub mod keyboards;
pub mod media;
pub mod model;
pub mod notify;
pub mod reporter;
pub mod text;
pub mod validator;
pub mod worker;

/// Default `RUST_LOG` filter shared by every binary.
pub const DEFAULT_LOG_FILTER: &str = "warn,sqlx=warn,factchecker=info,migrate=info,check_claim=info";

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
