use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Public base URL used for self-links in the RSS and sitemap output.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Rows per page on the article listing.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// When true, listing queries degrade to an empty page on store errors
    /// instead of returning a 500. Feed routes always degrade.
    #[serde(default)]
    pub lenient_queries: bool,
    pub sources: Vec<SourceConfig>,
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub homepage: String,
    /// Sources without a feed URL are registered but skipped with a warning
    /// during ingestion.
    pub rss: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "zh".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
