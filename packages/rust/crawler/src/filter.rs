//! Fragment cleaning, usefulness gates, and content fingerprints.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use textcrawl_shared::{CrawlConfig, Result, TextCrawlError};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"http\S+|www\S+").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// SHA-256 digest (lowercase hex) of a cleaned fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the given text.
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cleaned paragraph, ready for the dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFragment {
    /// Cleaned, lowercased text as it would be written to the corpus.
    pub text: String,
    /// Digest of `text`.
    pub fingerprint: Fingerprint,
    /// Whether `text` passed every usefulness gate.
    pub useful: bool,
}

/// Cleans text and decides whether a fragment is worth keeping.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    disallowed: Regex,
    min_chars: usize,
    min_words: usize,
    max_digit_ratio: f64,
    min_repeat_run: usize,
}

impl ContentFilter {
    /// Build a filter from the `[filter]` settings.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let disallowed = Regex::new(&config.disallowed_chars).map_err(|e| {
            TextCrawlError::config(format!("filter.disallowed_chars is not a valid regex: {e}"))
        })?;
        Ok(Self {
            disallowed,
            min_chars: config.min_chars,
            min_words: config.min_words,
            max_digit_ratio: config.max_digit_ratio,
            min_repeat_run: config.min_repeat_run,
        })
    }

    /// Apply every usefulness gate in order; the first failing gate rejects.
    pub fn is_useful(&self, text: &str) -> bool {
        let char_count = text.chars().count();
        if text.is_empty() || char_count < self.min_chars {
            return false;
        }
        if text.split_whitespace().count() < self.min_words {
            return false;
        }
        let digits = text.chars().filter(char::is_ascii_digit).count();
        if digits as f64 > char_count as f64 * self.max_digit_ratio {
            return false;
        }
        if is_single_char_run(text, self.min_repeat_run) {
            return false;
        }
        true
    }

    /// Strip tags, URLs, emails and disallowed characters, then collapse
    /// whitespace, trim and lowercase.
    pub fn clean_text(&self, raw: &str) -> String {
        let text = TAG_RE.replace_all(raw, " ");
        let text = URL_RE.replace_all(&text, " ");
        let text = EMAIL_RE.replace_all(&text, " ");
        let text = self.disallowed.replace_all(&text, " ");
        let text = WHITESPACE_RE.replace_all(&text, " ");
        text.trim().to_lowercase()
    }

    /// Remove disallowed characters outright (no replacement space).
    pub(crate) fn strip_disallowed(&self, text: &str) -> String {
        self.disallowed.replace_all(text, "").into_owned()
    }

    /// Clean `raw` into a fragment. Returns `None` when nothing survives.
    pub fn fragment(&self, raw: &str) -> Option<ContentFragment> {
        let text = self.clean_text(raw);
        if text.is_empty() {
            return None;
        }
        Some(ContentFragment {
            fingerprint: Fingerprint::of(&text),
            useful: self.is_useful(&text),
            text,
        })
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(&CrawlConfig::default()).expect("default disallowed_chars pattern is valid")
    }
}

/// True when the whole of `text` is a single character repeated at least
/// `min_run` times. A run inside a longer fragment does not count.
fn is_single_char_run(text: &str, min_run: usize) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first == '\n' {
        return false;
    }
    let mut len = 1;
    for c in chars {
        if c != first {
            return false;
        }
        len += 1;
    }
    len >= min_run
}
