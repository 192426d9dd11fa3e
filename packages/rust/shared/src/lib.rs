//! Shared error model and configuration for textcrawl.
//!
//! This crate is the foundation depended on by the crawler and the CLI.
//! It provides:
//! - [`TextCrawlError`]: the unified error type
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlLimits, CrawlSection, FetchSection, FilterSection, OutputSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, TextCrawlError};
