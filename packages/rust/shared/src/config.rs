//! Application configuration for textcrawl.
//!
//! User config lives at `~/.textcrawl/textcrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextCrawlError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "textcrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".textcrawl";

// ---------------------------------------------------------------------------
// Config structs (matching textcrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where to start, what is in scope, and when to stop.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// HTTP fetch behaviour.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Fragment cleaning and usefulness thresholds.
    #[serde(default)]
    pub filter: FilterSection,

    /// Corpus destination.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Seed URL for the breadth-first crawl.
    #[serde(default = "default_start_url")]
    pub start_url: String,

    /// Hosts must equal or be a subdomain of this suffix.
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,

    /// Root that article links are resolved against.
    #[serde(default = "default_site_root")]
    pub site_root: String,

    /// Only hrefs starting with this prefix are followed.
    #[serde(default = "default_article_prefix")]
    pub article_prefix: String,

    /// Namespaces (`<prefix><ns>:`) that are never followed.
    #[serde(default = "default_excluded_namespaces")]
    pub excluded_namespaces: Vec<String>,

    /// Pause after each processed page, in milliseconds.
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Stop after this many successfully visited pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Do not enqueue links deeper than this (start URL is depth 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Stop once the crawl has run for this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            start_url: default_start_url(),
            domain_suffix: default_domain_suffix(),
            site_root: default_site_root(),
            article_prefix: default_article_prefix(),
            excluded_namespaces: default_excluded_namespaces(),
            politeness_delay_ms: default_politeness_delay_ms(),
            max_pages: None,
            max_depth: None,
            max_duration_secs: None,
        }
    }
}

fn default_start_url() -> String {
    "https://en.wikipedia.org/wiki/Argo_(oceanography)".into()
}
fn default_domain_suffix() -> String {
    "wikipedia.org".into()
}
fn default_site_root() -> String {
    "https://en.wikipedia.org".into()
}
fn default_article_prefix() -> String {
    "/wiki/".into()
}
fn default_excluded_namespaces() -> Vec<String> {
    ["File", "Template", "Portal", "Help", "Talk", "Category", "Special"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_politeness_delay_ms() -> u64 {
    500
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Pool of browser User-Agent strings; one is picked per request.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Timeout for a single attempt, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total attempts per URL on transport failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15".into(),
    ]
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}

/// `[filter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSection {
    /// Regex matching characters that are removed from fragments.
    #[serde(default = "default_disallowed_chars")]
    pub disallowed_chars: String,

    /// Fragments shorter than this (in characters) are rejected.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Fragments with fewer whitespace-separated tokens are rejected.
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Fragments with a larger share of digit characters are rejected.
    #[serde(default = "default_max_digit_ratio")]
    pub max_digit_ratio: f64,

    /// A fragment consisting solely of one character repeated at least
    /// this many times is rejected.
    #[serde(default = "default_min_repeat_run")]
    pub min_repeat_run: usize,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            disallowed_chars: default_disallowed_chars(),
            min_chars: default_min_chars(),
            min_words: default_min_words(),
            max_digit_ratio: default_max_digit_ratio(),
            min_repeat_run: default_min_repeat_run(),
        }
    }
}

fn default_disallowed_chars() -> String {
    r#"[^A-Za-z0-9\s\.,;:!\?'"()\-_]"#.into()
}
fn default_min_chars() -> usize {
    20
}
fn default_min_words() -> usize {
    5
}
fn default_max_digit_ratio() -> f64 {
    0.3
}
fn default_min_repeat_run() -> usize {
    4
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Corpus file; fragments are appended one per line.
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    "wikipedia_text_only.txt".into()
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Stopping policy for a crawl. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Maximum number of successfully visited pages.
    pub max_pages: Option<usize>,
    /// Maximum link depth from the start URL.
    pub max_depth: Option<u32>,
    /// Wall-clock budget for the whole crawl.
    pub max_duration: Option<Duration>,
}

/// Runtime crawl configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Seed URL (normalized by the engine before use).
    pub start_url: String,
    /// In-scope host suffix.
    pub domain_suffix: String,
    /// Root that article links resolve against.
    pub site_root: String,
    /// Required href prefix for followed links.
    pub article_prefix: String,
    /// Namespaces that are never followed.
    pub excluded_namespaces: Vec<String>,
    /// Pause after each processed page.
    pub politeness_delay: Duration,
    /// Stopping policy.
    pub limits: CrawlLimits,
    /// User-Agent pool.
    pub user_agents: Vec<String>,
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    /// Total attempts on transport failure.
    pub max_attempts: u32,
    /// First backoff delay.
    pub backoff_base: Duration,
    /// Regex of characters stripped from fragments.
    pub disallowed_chars: String,
    /// Minimum fragment length in characters.
    pub min_chars: usize,
    /// Minimum whitespace-separated tokens.
    pub min_words: usize,
    /// Maximum share of digit characters.
    pub max_digit_ratio: f64,
    /// Minimum length of a rejected single-character run.
    pub min_repeat_run: usize,
    /// Corpus file path.
    pub output_path: PathBuf,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            start_url: config.crawl.start_url.clone(),
            domain_suffix: config.crawl.domain_suffix.clone(),
            site_root: config.crawl.site_root.clone(),
            article_prefix: config.crawl.article_prefix.clone(),
            excluded_namespaces: config.crawl.excluded_namespaces.clone(),
            politeness_delay: Duration::from_millis(config.crawl.politeness_delay_ms),
            limits: CrawlLimits {
                max_pages: config.crawl.max_pages,
                max_depth: config.crawl.max_depth,
                max_duration: config.crawl.max_duration_secs.map(Duration::from_secs),
            },
            user_agents: config.fetch.user_agents.clone(),
            request_timeout: Duration::from_secs(config.fetch.request_timeout_secs),
            max_attempts: config.fetch.max_attempts,
            backoff_base: Duration::from_millis(config.fetch.backoff_base_ms),
            disallowed_chars: config.filter.disallowed_chars.clone(),
            min_chars: config.filter.min_chars,
            min_words: config.filter.min_words,
            max_digit_ratio: config.filter.max_digit_ratio,
            min_repeat_run: config.filter.min_repeat_run,
            output_path: PathBuf::from(&config.output.path),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl CrawlConfig {
    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.user_agents.is_empty() {
            return Err(TextCrawlError::config("fetch.user_agents must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(TextCrawlError::config("fetch.max_attempts must be at least 1"));
        }
        if self.domain_suffix.trim_matches('.').is_empty() {
            return Err(TextCrawlError::config("crawl.domain_suffix must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.max_digit_ratio) {
            return Err(TextCrawlError::config(format!(
                "filter.max_digit_ratio must be within 0.0..=1.0, got {}",
                self.max_digit_ratio
            )));
        }
        url::Url::parse(&self.site_root).map_err(|e| {
            TextCrawlError::config(format!("crawl.site_root '{}': {e}", self.site_root))
        })?;
        regex::Regex::new(&self.disallowed_chars).map_err(|e| {
            TextCrawlError::config(format!("filter.disallowed_chars is not a valid regex: {e}"))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.textcrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TextCrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.textcrawl/textcrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TextCrawlError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        TextCrawlError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TextCrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TextCrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TextCrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
