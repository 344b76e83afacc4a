use chrono::Utc;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::db::{Database, LogLevel, NewArticle, UpsertOutcome};
use crate::fetcher::FeedFetcher;

/// Totals for one ingestion run, mirrored into the job row on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: i64,
    pub inserted: i64,
    pub duplicated: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct SourceCounts {
    inserted: i64,
    duplicated: i64,
}

/// Sequential ingestion: one job row per run, sources in registry order,
/// entries in feed order. Per-source failures are logged and skipped; only
/// errors escaping that boundary mark the job failed.
pub struct Ingestor<'a> {
    db: &'a Database,
    fetcher: &'a FeedFetcher,
    sources: &'a [SourceConfig],
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, fetcher: &'a FeedFetcher, sources: &'a [SourceConfig]) -> Self {
        Self {
            db,
            fetcher,
            sources,
        }
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let job_id = self.db.create_job(&today).await?;

        match self.process_sources(job_id).await {
            Ok(summary) => {
                self.db
                    .finish_job(job_id, summary.fetched, summary.inserted, summary.duplicated)
                    .await?;
                info!(
                    fetched = summary.fetched,
                    inserted = summary.inserted,
                    duplicated = summary.duplicated,
                    "ingestion run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                self.db.fail_job(job_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn process_sources(&self, job_id: i64) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for source in self.sources {
            let source_id = self.db.ensure_source(source).await?;
            info!(source = %source.name, "ingesting source");

            let Some(rss_url) = source.rss.as_deref() else {
                self.db
                    .append_log(
                        job_id,
                        Some(source_id),
                        LogLevel::Warn,
                        "No RSS configured; skipped",
                    )
                    .await?;
                continue;
            };

            match self.ingest_feed(rss_url, source_id).await {
                Ok(counts) => {
                    summary.fetched += counts.inserted + counts.duplicated;
                    summary.inserted += counts.inserted;
                    summary.duplicated += counts.duplicated;
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "source ingestion failed");
                    self.db
                        .append_log(job_id, Some(source_id), LogLevel::Error, &e.to_string())
                        .await?;
                }
            }
        }

        Ok(summary)
    }

    async fn ingest_feed(&self, url: &str, source_id: i64) -> anyhow::Result<SourceCounts> {
        let entries = self.fetcher.fetch_entries(url).await?;
        let mut counts = SourceCounts::default();

        for entry in entries {
            let article = NewArticle {
                title: entry.title,
                summary: entry.summary,
                original_url: entry.link,
                published_at: entry.published_at,
            };
            match self.db.upsert_article(source_id, &article).await? {
                UpsertOutcome::Inserted => counts.inserted += 1,
                UpsertOutcome::Duplicated => counts.duplicated += 1,
            }
        }

        Ok(counts)
    }
}
