//! zsxq-harvest main entry point
//!
//! This is the command-line interface for archiving a group's topic history.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use zsxq_harvest::config::{load_config_with_hash, validate, Config};
use zsxq_harvest::output::print_outcome;
use zsxq_harvest::state::{ConflictResolver, PolicyResolver, PromptResolver};
use zsxq_harvest::{CrawlConfig, Crawler};
use tracing_subscriber::EnvFilter;

/// zsxq-harvest: archive a group's topic history as monthly markdown
///
/// Walks the topic timeline from the end bound back to the start bound,
/// appends every topic to `topics/<YYYY-MM>.md` under the output root, and
/// optionally downloads the images and files the topics reference.
#[derive(Parser, Debug)]
#[command(name = "zsxq-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Archive a group's topic history", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the inclusive start bound (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    start: Option<String>,

    /// Override the inclusive end bound (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    end: Option<String>,

    /// Download images referenced by topics
    #[arg(long)]
    media: bool,

    /// Download files attached to topics
    #[arg(long)]
    attachments: bool,

    /// Override the output root directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration after command-line overrides")?;
    let crawl_config = config.crawl.resolve()?;

    if cli.dry_run {
        return handle_dry_run(&config, &crawl_config);
    }

    handle_harvest(config, crawl_config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("zsxq_harvest=info,warn"),
            1 => EnvFilter::new("zsxq_harvest=debug,info"),
            2 => EnvFilter::new("zsxq_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(start) = &cli.start {
        config.crawl.start = start.clone();
    }
    if let Some(end) = &cli.end {
        config.crawl.end = end.clone();
    }
    if cli.media {
        config.crawl.media = true;
    }
    if cli.attachments {
        config.crawl.attachments = true;
    }
    if let Some(output) = &cli.output {
        config.crawl.output = output.display().to_string();
    }
}

/// Handles the --dry-run mode: shows the resolved run without contacting the API
fn handle_dry_run(config: &Config, crawl: &CrawlConfig) -> Result<()> {
    println!("=== zsxq-harvest Dry Run ===\n");

    println!("Run:");
    println!("  Group: {}", crawl.group);
    println!(
        "  Start: {}",
        crawl.window.start.as_deref().unwrap_or("(unbounded)")
    );
    println!(
        "  End: {}",
        crawl.window.end.as_deref().unwrap_or("(unbounded)")
    );
    println!(
        "  Initial cursor: {}",
        crawl
            .window
            .initial_cursor()?
            .as_deref()
            .unwrap_or("(newest topic)")
    );
    println!("  Media: {}", crawl.media);
    println!("  Attachments: {}", crawl.attachments);
    println!("  Output: {}", crawl.output.display());

    let settings = &config.crawler;
    println!("\nCrawler:");
    println!("  API base: {}", settings.api_base);
    println!("  Page size: {}", settings.page_size);
    println!("  Media workers: {}", settings.media_workers);
    println!("  Download attempts: {}", settings.download_attempts);
    println!("  Retry delay: {}ms", settings.retry_delay_ms);
    println!("  Failure delay: {}ms", settings.failure_delay_ms);

    println!("\nConflicts:");
    println!("  On duplicate: {:?}", config.conflicts.on_duplicate);
    println!(
        "  On existing document: {:?}",
        config.conflicts.on_existing_document
    );

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, crawl: CrawlConfig) -> Result<()> {
    let resolver: Arc<dyn ConflictResolver> = if std::io::stdin().is_terminal() {
        Arc::new(PromptResolver::new(&config.conflicts))
    } else {
        tracing::debug!("stdin is not a terminal, conflict prompts fall back to policy");
        Arc::new(PolicyResolver::from_settings(&config.conflicts))
    };

    let crawler = Crawler::new(crawl, config.crawler).with_resolver(resolver);

    let cancel = crawler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            cancel.cancel();
        }
    });

    let outcome = crawler.run().await;
    print_outcome(&outcome);

    if !outcome.success {
        anyhow::bail!("harvest did not complete: {}", outcome.message);
    }
    Ok(())
}
