use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

/// One feed item, reduced to the fields the writer stores.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub link: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("NewsRiver/1.0 (RSS Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch and parse one feed URL. Entries without a link or title are
    /// skipped, not treated as errors.
    pub async fn fetch_entries(&self, url: &str) -> anyhow::Result<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;
        Ok(Self::entries_from_feed(parsed))
    }

    pub fn entries_from_feed(feed: feed_rs::model::Feed) -> Vec<FeedEntry> {
        let mut entries = Vec::with_capacity(feed.entries.len());

        for entry in feed.entries {
            let link = match entry.links.first() {
                Some(l) if !l.href.is_empty() => l.href.clone(),
                _ => continue,
            };

            let title = match entry.title.as_ref() {
                Some(t) if !t.content.is_empty() => t.content.clone(),
                _ => continue,
            };

            // Summary priority: snippet, then full content, then the title
            let summary = entry
                .summary
                .map(|t| t.content)
                .filter(|s| !s.is_empty())
                .or_else(|| entry.content.and_then(|c| c.body).filter(|s| !s.is_empty()))
                .or_else(|| Some(title.clone()));

            let published_at: Option<DateTime<Utc>> = entry.published.or(entry.updated);

            entries.push(FeedEntry {
                link,
                title,
                summary,
                published_at,
            });
        }

        entries
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}
