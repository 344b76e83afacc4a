//! Ingestion entrypoint, intended to run from cron. Exits 2 on missing
//! configuration, 1 on a job-level failure, 0 otherwise.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsriver::config::Config;
use newsriver::db::Database;
use newsriver::fetcher::FeedFetcher;
use newsriver::ingest::Ingestor;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsriver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration errors fail fast, before any network call
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("[ingest] Missing DATABASE_URL");
        return ExitCode::from(2);
    };

    let config = match Config::load("sources.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ingest] Failed to load sources.toml: {}", e);
            return ExitCode::from(2);
        }
    };

    let db = match Database::new(&database_url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("[ingest] Failed to open database: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = db.initialize().await {
        eprintln!("[ingest] Failed to initialize schema: {}", e);
        return ExitCode::from(2);
    }

    let fetcher = FeedFetcher::new();
    let ingestor = Ingestor::new(&db, &fetcher, &config.sources);

    match ingestor.run().await {
        Ok(summary) => {
            println!(
                "[ingest] done: fetched={} inserted={} duplicated={}",
                summary.fetched, summary.inserted, summary.duplicated
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("[ingest] failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
