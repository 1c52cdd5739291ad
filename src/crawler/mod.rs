//! Crawler module for fetching pages and running scrap jobs
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind a shared connection gate
//! - Direct crawls over every page of a selector
//! - Recursive list -> detail crawls
//! - Scraping documents that are already in memory
//! - The engine tying fetcher, store and sinks together

mod engine;
mod fetcher;
mod job;
mod orchestrator;
mod reader;
mod recursive;

pub use engine::Engine;
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use job::{
    generate_job_id, ItemResult, ItemStream, JobMode, ScrapContext, ScrapOutput, Scraper,
};
pub use orchestrator::{DefaultScraper, BAD_CSS_LOG_LINE};
pub use reader::ReaderScraper;
pub use recursive::RecursiveScraper;
