//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use textcrawl_crawler::{CanonicalUrl, CorpusSink, CrawlSummary, Crawler, ProgressReporter};
use textcrawl_shared::{AppConfig, CrawlConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// textcrawl: turn a wiki into a deduplicated plain-text corpus.
#[derive(Parser)]
#[command(
    name = "textcrawl",
    version,
    about = "Breadth-first crawl of a wiki, appending clean paragraph text to a corpus file.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl from a start URL and append extracted text to the corpus.
    Crawl(CrawlArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `textcrawl crawl`. Each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct CrawlArgs {
    /// Start URL (defaults to `crawl.start_url`).
    pub url: Option<String>,

    /// Corpus file to append to.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Read settings from this file instead of ~/.textcrawl/textcrawl.toml.
    #[arg(short, long, env = "TEXTCRAWL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop after this many visited pages.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Do not follow links deeper than this.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Stop after this many seconds.
    #[arg(long)]
    pub max_duration_secs: Option<u64>,

    /// Politeness delay between pages, in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Config file to show instead of the default location.
        #[arg(short, long, env = "TEXTCRAWL_CONFIG")]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "textcrawl=info",
        1 => "textcrawl=debug",
        _ => "textcrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl(args) => cmd_crawl(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()).await,
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge CLI flags over the file config.
fn resolve_crawl_config(app: &AppConfig, args: &CrawlArgs) -> CrawlConfig {
    let mut config = CrawlConfig::from(app);

    if let Some(url) = &args.url {
        config.start_url = url.clone();
    }
    if let Some(out) = &args.out {
        config.output_path = out.clone();
    }
    if let Some(max) = args.max_pages {
        config.limits.max_pages = Some(max);
    }
    if let Some(max) = args.max_depth {
        config.limits.max_depth = Some(max);
    }
    if let Some(secs) = args.max_duration_secs {
        config.limits.max_duration = Some(std::time::Duration::from_secs(secs));
    }
    if let Some(ms) = args.delay_ms {
        config.politeness_delay = std::time::Duration::from_millis(ms);
    }

    config
}

async fn cmd_crawl(args: CrawlArgs) -> Result<()> {
    let app = load_app_config(args.config.as_deref())?;
    let config = resolve_crawl_config(&app, &args);

    let output_path = config.output_path.clone();
    let crawler = Crawler::new(config)?;
    let mut sink = CorpusSink::open(&output_path)?;

    info!(
        start_url = %crawler.config().start_url,
        output = %output_path.display(),
        "crawl requested"
    );

    let reporter = CliProgress::new();
    let summary = crawler.crawl(&mut sink, &reporter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  Crawl finished ({:?})", summary.stop_reason);
    println!("  Start:      {}", summary.start_url);
    println!("  Visited:    {}", summary.pages_visited);
    println!("  Failed:     {}", summary.fetch_failures);
    println!("  Written:    {}", summary.fragments_written);
    println!("  Duplicates: {}", summary.duplicate_fragments);
    println!("  Rejected:   {}", summary.rejected_fragments);
    println!("  Output:     {}", output_path.display());
    println!(
        "  Time:       {:.1}s",
        summary.duration_ms as f64 / 1000.0
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn page_visited(&self, url: &CanonicalUrl, summary: &CrawlSummary) {
        self.spinner.set_message(format!(
            "[{} pages, {} fragments] {url}",
            summary.pages_visited, summary.fragments_written
        ));
    }

    fn done(&self, _summary: &CrawlSummary) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
