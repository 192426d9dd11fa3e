//! Breadth-first crawl engine.
//!
//! The crawler starts from a single URL, processes one page at a time in
//! FIFO order, writes new useful fragments to the corpus sink, and stops
//! when the frontier is empty or a configured limit is reached.

use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use textcrawl_shared::{CrawlConfig, Result};
use tracing::{debug, info, instrument, warn};

use crate::extractor::{Extractor, LinkPolicy};
use crate::fetcher::Fetcher;
use crate::filter::{ContentFilter, Fingerprint};
use crate::normalizer::{CanonicalUrl, is_in_scope, normalize};
use crate::sink::CorpusSink;

// ---------------------------------------------------------------------------
// CrawlSummary
// ---------------------------------------------------------------------------

/// Why the crawl loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left to fetch.
    FrontierExhausted,
    /// `max_pages` pages were visited.
    PageLimit,
    /// `max_duration` elapsed.
    Deadline,
}

/// Summary of a completed crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// Normalized seed URL.
    pub start_url: String,
    /// Pages fetched with status 200 and an HTML body.
    pub pages_visited: usize,
    /// Dequeues whose fetch failed (HTTP error or exhausted retries).
    pub fetch_failures: usize,
    /// Dequeues that returned 200 with nothing to extract: a non-HTML
    /// content type or an empty HTML body.
    pub empty_responses: usize,
    /// Dequeues skipped as already visited or out of scope.
    pub urls_skipped: usize,
    /// Fragments appended to the corpus.
    pub fragments_written: usize,
    /// Useful fragments whose fingerprint had already been written.
    pub duplicate_fragments: usize,
    /// Fragments that failed the usefulness gates.
    pub rejected_fragments: usize,
    /// Frontier pushes, duplicates included.
    pub links_enqueued: usize,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Run time in milliseconds.
    pub duration_ms: u64,
    pub stop_reason: StopReason,
}

impl CrawlSummary {
    fn new(start_url: &CanonicalUrl) -> Self {
        Self {
            start_url: start_url.to_string(),
            pages_visited: 0,
            fetch_failures: 0,
            empty_responses: 0,
            urls_skipped: 0,
            fragments_written: 0,
            duplicate_fragments: 0,
            rejected_fragments: 0,
            links_enqueued: 0,
            started_at: Utc::now(),
            duration_ms: 0,
            stop_reason: StopReason::FrontierExhausted,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Callbacks fired by the crawl loop.
pub trait ProgressReporter {
    /// A page was fetched and processed.
    fn page_visited(&self, _url: &CanonicalUrl, _summary: &CrawlSummary) {}

    /// The run finished.
    fn done(&self, _summary: &CrawlSummary) {}
}

/// Reporter that ignores every event.
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

// ---------------------------------------------------------------------------
// Crawl state
// ---------------------------------------------------------------------------

/// A URL waiting in the frontier, with its link distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub depth: u32,
}

/// Mutable state of one crawl run.
#[derive(Debug, Default)]
pub struct CrawlState {
    frontier: VecDeque<FrontierEntry>,
    visited: HashSet<CanonicalUrl>,
    seen: HashSet<Fingerprint>,
}

impl CrawlState {
    /// Fresh state with `start` as the only frontier entry.
    pub fn seeded(start: CanonicalUrl) -> Self {
        let mut state = Self::default();
        state.frontier.push_back(FrontierEntry {
            url: start,
            depth: 0,
        });
        state
    }

    /// Frontier URLs in dequeue order.
    pub fn frontier(&self) -> impl Iterator<Item = &CanonicalUrl> {
        self.frontier.iter().map(|e| &e.url)
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Single-worker breadth-first crawler.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Fetcher,
    extractor: Extractor,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config)?;
        let extractor = Extractor::new(ContentFilter::new(&config)?, LinkPolicy::new(&config)?);

        Ok(Self {
            config,
            fetcher,
            extractor,
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl from the configured start URL with fresh state.
    ///
    /// Fails only if the start URL is malformed or the sink cannot be
    /// written; per-URL problems are logged and skipped.
    pub async fn crawl<W: Write>(
        &self,
        sink: &mut CorpusSink<W>,
        progress: &dyn ProgressReporter,
    ) -> Result<CrawlSummary> {
        let start = normalize(&self.config.start_url)?;
        let mut state = CrawlState::seeded(start);
        self.run(&mut state, sink, progress).await
    }

    /// Drive the crawl loop over `state` until the frontier empties or a
    /// limit is hit.
    #[instrument(skip_all, fields(start_url = %self.config.start_url))]
    pub async fn run<W: Write>(
        &self,
        state: &mut CrawlState,
        sink: &mut CorpusSink<W>,
        progress: &dyn ProgressReporter,
    ) -> Result<CrawlSummary> {
        let clock = Instant::now();
        let limits = self.config.limits;
        let seed = match state.frontier.front() {
            Some(entry) => entry.url.clone(),
            None => normalize(&self.config.start_url)?,
        };
        let mut summary = CrawlSummary::new(&seed);

        info!(
            domain_suffix = %self.config.domain_suffix,
            max_pages = ?limits.max_pages,
            max_depth = ?limits.max_depth,
            max_duration = ?limits.max_duration,
            output = %sink.path().display(),
            "starting crawl"
        );

        let stop_reason = loop {
            if limits
                .max_pages
                .is_some_and(|max| summary.pages_visited >= max)
            {
                break StopReason::PageLimit;
            }
            if limits
                .max_duration
                .is_some_and(|max| clock.elapsed() >= max)
            {
                break StopReason::Deadline;
            }
            let Some(entry) = state.frontier.pop_front() else {
                break StopReason::FrontierExhausted;
            };

            let url = entry.url.clone();
            if self.process(entry, state, sink, &mut summary).await? {
                progress.page_visited(&url, &summary);
                if !self.config.politeness_delay.is_zero() {
                    tokio::time::sleep(self.config.politeness_delay).await;
                }
            }
        };

        summary.stop_reason = stop_reason;
        summary.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            pages_visited = summary.pages_visited,
            fetch_failures = summary.fetch_failures,
            fragments_written = summary.fragments_written,
            duplicate_fragments = summary.duplicate_fragments,
            frontier_remaining = state.frontier.len(),
            duration_ms = summary.duration_ms,
            stop_reason = ?summary.stop_reason,
            output = %sink.path().display(),
            "crawl completed"
        );

        progress.done(&summary);
        Ok(summary)
    }

    /// Handle one dequeued entry. Returns `true` if the page was visited.
    async fn process<W: Write>(
        &self,
        entry: FrontierEntry,
        state: &mut CrawlState,
        sink: &mut CorpusSink<W>,
        summary: &mut CrawlSummary,
    ) -> Result<bool> {
        let FrontierEntry { url, depth } = entry;

        if state.visited.contains(&url) {
            debug!(%url, "already visited, skipping");
            summary.urls_skipped += 1;
            return Ok(false);
        }
        if !is_in_scope(&url, &self.config.domain_suffix) {
            debug!(%url, "out of scope, skipping");
            summary.urls_skipped += 1;
            return Ok(false);
        }

        info!(%url, depth, "crawling page");
        let fetched = self.fetcher.fetch(&url).await;

        if fetched.status == 200 && fetched.body.is_empty() {
            debug!(%url, "empty or non-HTML response, skipping");
            summary.empty_responses += 1;
            return Ok(false);
        }
        if !fetched.has_content() {
            warn!(%url, status = fetched.status, "failed to retrieve page");
            summary.fetch_failures += 1;
            return Ok(false);
        }

        state.visited.insert(url.clone());
        summary.pages_visited += 1;

        let page = self.extractor.extract(&fetched.body);

        for fragment in page.fragments {
            if !fragment.useful {
                summary.rejected_fragments += 1;
                continue;
            }
            if state.seen.insert(fragment.fingerprint) {
                sink.append(&fragment.text)?;
                summary.fragments_written += 1;
            } else {
                summary.duplicate_fragments += 1;
            }
        }

        let next_depth = depth + 1;
        if self
            .config
            .limits
            .max_depth
            .is_some_and(|max| next_depth > max)
        {
            debug!(%url, depth, "depth limit reached, not enqueuing links");
            return Ok(true);
        }

        for link in page.links {
            if !state.visited.contains(&link) {
                state.frontier.push_back(FrontierEntry {
                    url: link,
                    depth: next_depth,
                });
                summary.links_enqueued += 1;
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod crawler_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use textcrawl_shared::CrawlLimits;

    use super::*;

    fn test_config(server: &wiremock::MockServer, start_path: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: format!("{}{start_path}", server.uri()),
            site_root: server.uri(),
            domain_suffix: "127.0.0.1".into(),
            politeness_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            max_attempts: 1,
            backoff_base: Duration::from_millis(1),
            ..CrawlConfig::default()
        }
    }

    fn page(paragraphs: &[&str], links: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<p>{p}</p>"))
            .chain(links.iter().map(|l| format!(r#"<a href="{l}">{l}</a>"#)))
            .collect();
        format!("<html><body><main>{body}</main></body></html>")
    }

    async fn mount_page(server: &wiremock::MockServer, path: &str, html: String) {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(path))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"),
            )
            .mount(server)
            .await;
    }

    async fn request_paths(server: &wiremock::MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    fn memory_sink() -> CorpusSink<Vec<u8>> {
        CorpusSink::new(Vec::new(), "memory")
    }

    fn output_lines(sink: CorpusSink<Vec<u8>>) -> Vec<String> {
        let bytes = sink.into_inner().unwrap();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn frontier_is_fifo() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/B", "/wiki/C"])).await;
        mount_page(&server, "/wiki/B", page(&[], &["/wiki/D"])).await;
        mount_page(&server, "/wiki/C", page(&[], &["/wiki/D"])).await;
        mount_page(&server, "/wiki/D", page(&[], &[])).await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let mut sink = memory_sink();
        let summary = crawler.crawl(&mut sink, &NoProgress).await.unwrap();

        assert_eq!(
            request_paths(&server).await,
            vec!["/wiki/A", "/wiki/B", "/wiki/C", "/wiki/D"]
        );
        assert_eq!(summary.pages_visited, 4);
        // D was enqueued by both B and C; the second copy is dropped at dequeue.
        assert_eq!(summary.links_enqueued, 4);
        assert_eq!(summary.urls_skipped, 1);
        assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);
    }

    #[tokio::test]
    async fn visited_pages_are_fetched_once() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/B", "/wiki/C"])).await;
        mount_page(&server, "/wiki/B", page(&[], &["/wiki/C", "/wiki/A"])).await;
        mount_page(&server, "/wiki/C", page(&[], &["/wiki/B", "/wiki/C/"])).await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let summary = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap();

        assert_eq!(request_paths(&server).await, vec!["/wiki/A", "/wiki/B", "/wiki/C"]);
        assert_eq!(summary.pages_visited, 3);
        assert_eq!(summary.urls_skipped, 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_revisitable() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/B", "/wiki/C"])).await;
        mount_page(&server, "/wiki/C", page(&[], &["/wiki/B"])).await;
        wiremock::Mock::given(wiremock::matchers::path("/wiki/B"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_raw("<p>down</p>", "text/html"))
            .expect(2)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let start = normalize(&crawler.config().start_url).unwrap();
        let mut state = CrawlState::seeded(start.clone());
        let summary = crawler
            .run(&mut state, &mut memory_sink(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(
            request_paths(&server).await,
            vec!["/wiki/A", "/wiki/B", "/wiki/C", "/wiki/B"]
        );
        let b = normalize(&format!("{}/wiki/B", server.uri())).unwrap();
        assert!(!state.is_visited(&b));
        assert!(state.is_visited(&start));
        assert_eq!(state.visited_len(), 2);
        assert_eq!(summary.fetch_failures, 2);
    }

    #[tokio::test]
    async fn duplicate_fragments_are_written_once() {
        let server = wiremock::MockServer::start().await;
        let shared = "This paragraph is repeated on every single page.";
        mount_page(
            &server,
            "/wiki/A",
            page(&[shared, "Only the first page carries this sentence."], &["/wiki/B"]),
        )
        .await;
        mount_page(
            &server,
            "/wiki/B",
            page(&[&shared.to_uppercase(), "Only the second page carries this one."], &[]),
        )
        .await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let mut sink = memory_sink();
        let summary = crawler.crawl(&mut sink, &NoProgress).await.unwrap();

        assert_eq!(
            output_lines(sink),
            vec![
                "this paragraph is repeated on every single page.",
                "only the first page carries this sentence.",
                "only the second page carries this one.",
            ]
        );
        assert_eq!(summary.fragments_written, 3);
        assert_eq!(summary.duplicate_fragments, 1);
    }

    #[tokio::test]
    async fn useless_fragments_are_not_written() {
        let server = wiremock::MockServer::start().await;
        mount_page(
            &server,
            "/wiki/A",
            page(
                &["Too short.", "1990 2000 2010 2020 2030 x", "A perfectly ordinary sentence about the sea."],
                &[],
            ),
        )
        .await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let mut sink = memory_sink();
        let summary = crawler.crawl(&mut sink, &NoProgress).await.unwrap();

        assert_eq!(output_lines(sink), vec!["a perfectly ordinary sentence about the sea."]);
        assert_eq!(summary.rejected_fragments, 2);
    }

    #[tokio::test]
    async fn single_page_end_to_end() {
        let server = wiremock::MockServer::start().await;
        mount_page(
            &server,
            "/wiki/Start",
            r#"<html><body><p>Hello World. This is a test page.</p><a href="/wiki/Next">Next</a></body></html>"#
                .to_string(),
        )
        .await;

        let mut config = test_config(&server, "/wiki/Start");
        config.limits = CrawlLimits {
            max_pages: Some(1),
            ..CrawlLimits::default()
        };
        let crawler = Crawler::new(config).unwrap();
        let mut state = CrawlState::seeded(normalize(&crawler.config().start_url).unwrap());
        let mut sink = memory_sink();
        let summary = crawler.run(&mut state, &mut sink, &NoProgress).await.unwrap();

        assert_eq!(output_lines(sink), vec!["hello world. this is a test page."]);
        assert_eq!(summary.stop_reason, StopReason::PageLimit);

        let next = normalize(&format!("{}/wiki/Next/", server.uri())).unwrap();
        let frontier: Vec<&CanonicalUrl> = state.frontier().collect();
        assert_eq!(frontier, vec![&next]);
        assert_eq!(request_paths(&server).await, vec!["/wiki/Start"]);
    }

    #[tokio::test]
    async fn out_of_scope_start_is_skipped() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&["Never fetched because of scope."], &[])).await;

        let config = CrawlConfig {
            domain_suffix: "wikipedia.org".into(),
            ..test_config(&server, "/wiki/A")
        };
        let crawler = Crawler::new(config).unwrap();
        let summary = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap();

        assert!(request_paths(&server).await.is_empty());
        assert_eq!(summary.urls_skipped, 1);
        assert_eq!(summary.pages_visited, 0);
        assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);
    }

    #[tokio::test]
    async fn max_depth_stops_enqueuing() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/B"])).await;
        mount_page(&server, "/wiki/B", page(&[], &["/wiki/C"])).await;
        mount_page(&server, "/wiki/C", page(&[], &[])).await;

        let mut config = test_config(&server, "/wiki/A");
        config.limits.max_depth = Some(1);
        let crawler = Crawler::new(config).unwrap();
        let summary = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap();

        assert_eq!(request_paths(&server).await, vec!["/wiki/A", "/wiki/B"]);
        assert_eq!(summary.pages_visited, 2);
    }

    #[tokio::test]
    async fn zero_deadline_fetches_nothing() {
        let server = wiremock::MockServer::start().await;

        let mut config = test_config(&server, "/wiki/A");
        config.limits.max_duration = Some(Duration::ZERO);
        let crawler = Crawler::new(config).unwrap();
        let summary = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Deadline);
        assert!(request_paths(&server).await.is_empty());
    }

    #[tokio::test]
    async fn non_html_start_is_not_visited() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/wiki/A"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let summary = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap();

        assert_eq!(summary.empty_responses, 1);
        assert_eq!(summary.pages_visited, 0);
        assert_eq!(summary.fetch_failures, 0);
    }

    #[tokio::test]
    async fn empty_html_body_counts_as_empty_response() {
        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/Blank"])).await;
        mount_page(&server, "/wiki/Blank", String::new()).await;

        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        let mut state = CrawlState::seeded(normalize(&crawler.config().start_url).unwrap());
        let summary = crawler
            .run(&mut state, &mut memory_sink(), &NoProgress)
            .await
            .unwrap();

        let blank = normalize(&format!("{}/wiki/Blank", server.uri())).unwrap();
        assert!(!state.is_visited(&blank));
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(summary.empty_responses, 1);
        assert_eq!(summary.fetch_failures, 0);
    }

    #[tokio::test]
    async fn malformed_start_url_is_rejected() {
        let config = CrawlConfig {
            start_url: "http://[::1".into(),
            politeness_delay: Duration::ZERO,
            ..CrawlConfig::default()
        };
        let crawler = Crawler::new(config).unwrap();
        let err = crawler.crawl(&mut memory_sink(), &NoProgress).await.unwrap_err();
        assert!(err.to_string().contains("malformed URL"));
    }

    #[tokio::test]
    async fn progress_reporter_sees_each_visit() {
        struct Counting {
            visited: AtomicUsize,
            done: AtomicUsize,
        }

        impl ProgressReporter for Counting {
            fn page_visited(&self, _url: &CanonicalUrl, summary: &CrawlSummary) {
                self.visited.fetch_add(1, Ordering::SeqCst);
                assert_eq!(summary.pages_visited, self.visited.load(Ordering::SeqCst));
            }

            fn done(&self, _summary: &CrawlSummary) {
                self.done.fetch_add(1, Ordering::SeqCst);
            }
        }

        let server = wiremock::MockServer::start().await;
        mount_page(&server, "/wiki/A", page(&[], &["/wiki/B"])).await;
        mount_page(&server, "/wiki/B", page(&[], &[])).await;

        let reporter = Counting {
            visited: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        };
        let crawler = Crawler::new(test_config(&server, "/wiki/A")).unwrap();
        crawler.crawl(&mut memory_sink(), &reporter).await.unwrap();

        assert_eq!(reporter.visited.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn summary_serializes_stop_reason_in_snake_case() {
        let start = normalize("https://en.wikipedia.org/wiki/Ocean").unwrap();
        let mut summary = CrawlSummary::new(&start);
        summary.stop_reason = StopReason::PageLimit;

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stop_reason"], "page_limit");
        assert_eq!(json["start_url"], "https://en.wikipedia.org/wiki/Ocean");
    }
}
