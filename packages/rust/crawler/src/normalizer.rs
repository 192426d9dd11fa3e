//! URL canonicalization and scope checks.
//!
//! Every URL that enters the frontier or the visited set goes through
//! [`normalize`] or [`resolve`], so equality on [`CanonicalUrl`] is the
//! crawl's notion of "same page".

use std::fmt;

use textcrawl_shared::{Result, TextCrawlError};
use url::{ParseError, Url};

/// Scheme applied when the input has none.
const DEFAULT_SCHEME: &str = "https";

/// A normalized absolute URL.
///
/// Scheme and host are lowercase, query and fragment are gone, and the path
/// carries no trailing slash unless it is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Host component, if any.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Parse and canonicalize `input`.
///
/// Inputs without a scheme (`example.com/a`, `//example.com/a`) are read as
/// `https`.
pub fn normalize(input: &str) -> Result<CanonicalUrl> {
    let input = input.trim();
    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = match input.strip_prefix("//") {
                Some(rest) => format!("{DEFAULT_SCHEME}://{rest}"),
                None => format!("{DEFAULT_SCHEME}://{input}"),
            };
            Url::parse(&with_scheme).map_err(|e| TextCrawlError::malformed_url(input, e))?
        }
        Err(e) => return Err(TextCrawlError::malformed_url(input, e)),
    };
    canonicalize(url, input)
}

/// Resolve `href` against `base` (RFC 3986) and canonicalize the result.
pub fn resolve(base: &CanonicalUrl, href: &str) -> Result<CanonicalUrl> {
    let joined = base
        .0
        .join(href.trim())
        .map_err(|e| TextCrawlError::malformed_url(href, e))?;
    canonicalize(joined, href)
}

/// True iff the host equals `domain_suffix` or is a subdomain of it.
///
/// The match is on label boundaries: `notwikipedia.org` is not in scope for
/// `wikipedia.org`.
pub fn is_in_scope(url: &CanonicalUrl, domain_suffix: &str) -> bool {
    let suffix = domain_suffix.trim().trim_start_matches('.').to_ascii_lowercase();
    if suffix.is_empty() {
        return false;
    }
    let Some(host) = url.host() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    host == suffix
        || host
            .strip_suffix(suffix.as_str())
            .is_some_and(|rest| rest.ends_with('.'))
}

fn canonicalize(mut url: Url, original: &str) -> Result<CanonicalUrl> {
    // Special schemes already lowercase the host; others keep the input case.
    if let Some(host) = url.host_str() {
        let lower = host.to_ascii_lowercase();
        if lower != host {
            url.set_host(Some(&lower))
                .map_err(|e| TextCrawlError::malformed_url(original, e))?;
        }
    }

    url.set_query(None);
    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if path.is_empty() {
            url.set_path("/");
        } else if path != "/" && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
            url.set_path(&trimmed);
        }
    }

    Ok(CanonicalUrl(url))
}
