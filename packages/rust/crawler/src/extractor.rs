//! Paragraph and link extraction from article markup.

use std::collections::HashSet;

use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use textcrawl_shared::{CrawlConfig, Result};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::filter::{ContentFilter, ContentFragment};
use crate::normalizer::{CanonicalUrl, normalize, resolve};

/// Elements whose text never counts as content.
const EXCLUDED_TAGS: [&str; 8] = [
    "script", "style", "noscript", "iframe", "svg", "nav", "footer", "header",
];

/// Fragments and links pulled from one page.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Cleaned paragraph fragments, in document order.
    pub fragments: Vec<ContentFragment>,
    /// Followable article links, deduplicated, in first-seen order.
    pub links: Vec<CanonicalUrl>,
}

// ---------------------------------------------------------------------------
// Link policy
// ---------------------------------------------------------------------------

/// Decides which hrefs are article links and where they resolve.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    site_root: CanonicalUrl,
    article_prefix: String,
    excluded_prefixes: Vec<String>,
}

impl LinkPolicy {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let excluded_prefixes = config
            .excluded_namespaces
            .iter()
            .map(|ns| format!("{}{ns}:", config.article_prefix))
            .collect();

        Ok(Self {
            site_root: normalize(&config.site_root)?,
            article_prefix: config.article_prefix.clone(),
            excluded_prefixes,
        })
    }

    /// True if `href` is an article link outside the excluded namespaces.
    pub fn should_follow(&self, href: &str) -> bool {
        if href.is_empty() || !href.starts_with(&self.article_prefix) {
            return false;
        }
        !self.excluded_prefixes.iter().any(|p| href.starts_with(p))
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Turns raw HTML into content fragments and outbound article links.
#[derive(Debug, Clone)]
pub struct Extractor {
    filter: ContentFilter,
    links: LinkPolicy,
}

impl Extractor {
    pub fn new(filter: ContentFilter, links: LinkPolicy) -> Self {
        Self { filter, links }
    }

    /// Parse `html` once and extract both fragments and links.
    pub fn extract(&self, html: &str) -> ExtractedPage {
        let doc = Html::parse_document(html);
        ExtractedPage {
            fragments: self.fragments_from(&doc),
            links: self.links_from(&doc),
        }
    }

    /// Cleaned text of every visible, non-empty `<p>`.
    pub fn extract_fragments(&self, html: &str) -> Vec<ContentFragment> {
        self.fragments_from(&Html::parse_document(html))
    }

    /// Article links, resolved against the site root.
    pub fn extract_links(&self, html: &str) -> Vec<CanonicalUrl> {
        self.links_from(&Html::parse_document(html))
    }

    fn fragments_from(&self, doc: &Html) -> Vec<ContentFragment> {
        let p_sel = Selector::parse("p").expect("valid selector");
        let mut fragments = Vec::new();

        for p in doc.select(&p_sel) {
            if is_excluded(p.value()) || has_excluded_ancestor(p) {
                continue;
            }

            let raw = visible_text(p);
            if raw.trim().is_empty() {
                continue;
            }

            let folded = ascii_fold(&raw);
            let allowed = self.filter.strip_disallowed(&folded);
            let collapsed = allowed.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                continue;
            }

            if let Some(fragment) = self.filter.fragment(&collapsed.to_lowercase()) {
                fragments.push(fragment);
            }
        }

        fragments
    }

    fn links_from(&self, doc: &Html) -> Vec<CanonicalUrl> {
        let link_sel = Selector::parse("a[href]").expect("valid selector");
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for el in doc.select(&link_sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            if !self.links.should_follow(href) {
                continue;
            }

            match resolve(&self.links.site_root, href) {
                Ok(url) => {
                    if seen.insert(url.clone()) {
                        links.push(url);
                    }
                }
                Err(e) => debug!(href, error = %e, "dropping malformed link"),
            }
        }

        links
    }
}

fn is_excluded(el: &Element) -> bool {
    EXCLUDED_TAGS.contains(&el.name()) || el.attr("aria-hidden") == Some("true")
}

fn has_excluded_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_excluded(a.value()))
}

/// Text nodes under `p`, joined by a space, skipping excluded subtrees.
fn visible_text(p: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in p.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != p.id())
            .filter_map(ElementRef::wrap)
            .any(|a| is_excluded(a.value()));
        if !hidden {
            parts.push(&**text);
        }
    }

    parts.join(" ")
}

/// NFKD-decompose and drop anything left outside ASCII.
pub fn ascii_fold(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}
