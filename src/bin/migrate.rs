use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use factchecker::{config, db};

#[derive(Debug, Parser)]
#[command(author, version, about = "Apply, create and inspect database migrations")]
struct Args {
    /// Path to YAML config file; `DATABASE_URL` takes precedence when set
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Apply all pending migrations
    Run,
    /// Create an empty migration file
    New {
        slug: String,
        /// Directory holding the migration files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },
    /// List embedded migrations and whether they are applied
    Status,
}

/// Lowercases and maps anything outside `[a-z0-9_]` to `_`.
fn sanitize_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    for c in slug.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn migration_file_name(timestamp: &str, slug: &str) -> Result<String> {
    let slug = sanitize_slug(slug);
    if slug.is_empty() {
        bail!("migration slug must contain at least one letter or digit");
    }
    Ok(format!("{}_{}.sql", timestamp, slug))
}

fn create_migration(dir: &Path, slug: &str) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
    let path = dir.join(migration_file_name(&timestamp, slug)?);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    if path.exists() {
        bail!("migration already exists: {}", path.display());
    }
    std::fs::write(&path, format!("-- {}\n", sanitize_slug(slug)))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn database_url(config_path: Option<&Path>) -> Result<String> {
    if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty()) {
        return Ok(url);
    }
    let cfg = config::load(config_path).context("DATABASE_URL not set and config not loadable")?;
    Ok(cfg.database.url)
}

#[tokio::main]
async fn main() -> Result<()> {
    factchecker::init_tracing();
    let args = Args::parse();

    match args.command {
        Cmd::New { slug, dir } => {
            let path = create_migration(&dir, &slug)?;
            info!(path = %path.display(), "created migration");
            println!("{}", path.display());
        }
        Cmd::Run => {
            let pool = db::init_pool(&database_url(args.config.as_deref())?, 1).await?;
            db::run_migrations(&pool).await?;
            info!("migrations applied");
        }
        Cmd::Status => {
            let pool = db::init_pool(&database_url(args.config.as_deref())?, 1).await?;
            let applied = db::applied_migrations(&pool).await?;
            let migrator = sqlx::migrate!("./migrations");
            for m in migrator.iter() {
                let state = if applied.contains(&m.version) {
                    "applied"
                } else {
                    "pending"
                };
                println!("{:>14}  {:<8}  {}", m.version, state, m.description);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_sanitized() {
        assert_eq!(sanitize_slug("Add Users Index"), "add_users_index");
        assert_eq!(sanitize_slug("  drop--old/table "), "drop_old_table");
        assert_eq!(sanitize_slug("v2_sources"), "v2_sources");
        assert_eq!(sanitize_slug("!!!"), "");
    }

    #[test]
    fn file_name_needs_a_usable_slug() {
        assert_eq!(
            migration_file_name("20240101120000", "Seed Sources").unwrap(),
            "20240101120000_seed_sources.sql"
        );
        assert!(migration_file_name("20240101120000", "---").is_err());
    }

    #[test]
    fn creates_file_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_migration(dir.path(), "add claims index").unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.ends_with("_add_claims_index.sql"));
        assert_eq!(name.split('_').next().unwrap().len(), 14);
        assert!(path.exists());
    }
}
