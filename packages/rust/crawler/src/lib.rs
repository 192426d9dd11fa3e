//! Breadth-first text crawler.
//!
//! This crate provides:
//! - [`normalizer`]: URL canonicalization and scope checks
//! - [`filter`]: fragment cleaning, usefulness gates, fingerprints
//! - [`fetcher`]: HTTP GET with timeout, retry, and backoff
//! - [`extractor`]: paragraph fragments and article links from HTML
//! - [`engine`]: the single-worker crawl loop
//! - [`sink`]: append-only corpus output

pub mod engine;
pub mod extractor;
pub mod fetcher;
pub mod filter;
pub mod normalizer;
pub mod sink;

pub use engine::{
    CrawlState, CrawlSummary, Crawler, FrontierEntry, NoProgress, ProgressReporter, StopReason,
};
pub use extractor::{ExtractedPage, Extractor, LinkPolicy, ascii_fold};
pub use fetcher::{FetchResult, Fetcher, backoff_delay};
pub use filter::{ContentFilter, ContentFragment, Fingerprint};
pub use normalizer::{CanonicalUrl, is_in_scope, normalize, resolve};
pub use sink::CorpusSink;
