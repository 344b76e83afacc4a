//! NewsRiver - a content-aggregation site
//!
//! Ingests RSS feeds from a configured source registry, deduplicates and
//! stores articles in sqlite, and serves filterable listings plus derived
//! RSS/sitemap feeds through a server-rendered web front end.

pub mod auth;
pub mod config;
pub mod db;
pub mod dedup;
pub mod fetcher;
pub mod ingest;
pub mod render;
pub mod routes;
