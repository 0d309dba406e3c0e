//! citecrawl - Google Scholar citation-graph crawler
//!
//! ## Usage
//!
//! ### Interactive
//! ```bash
//! citecrawl
//! citecrawl "quasi-newton optimization" --proxy http://127.0.0.1:7890
//! citecrawl run "quasi-newton optimization"
//! citecrawl run "/scholar?cites=1234567890&as_sdt=2005&hl=en"
//! ```
//!
//! ### Maintenance
//! ```bash
//! citecrawl cache clear
//! citecrawl cookies path
//! ```

use anyhow::{Context, Result};
use citecrawl::cache::{default_cache_dir, FileCache, NoCache, ResponseCache};
use citecrawl::challenge::InteractiveSolver;
use citecrawl::config::{CrawlConfig, UnknownTotalPolicy};
use citecrawl::cookies::CookieManager;
use citecrawl::crawl::{Crawl, CrawlController, Query};
use citecrawl::model::{Article, SortOrder};
use citecrawl::prompt::{self, PageAction};
use citecrawl::session::SessionManager;
use citecrawl::transport::{CachedTransport, HttpTransport};
use citecrawl::{display, export, CrawlError};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar citation-graph crawler
#[derive(Parser)]
#[command(name = "citecrawl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON config file
    #[arg(long, global = true, env = "CITECRAWL_CONFIG")]
    config: Option<PathBuf>,

    /// Response cache directory
    #[arg(long, global = true, env = "CITECRAWL_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Cookie jar file
    #[arg(long, global = true, env = "CITECRAWL_COOKIES")]
    cookie_file: Option<PathBuf>,

    /// Options for the default interactive run
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search and crawl citations interactively (default)
    Run(RunArgs),

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage stored cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Initial query: search keywords or a "/scholar?cites=..." reference
    query: Option<String>,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long, env = "CITECRAWL_PROXY")]
    proxy: Option<String>,

    /// Mirror site URL
    #[arg(long)]
    mirror: Option<String>,

    /// Export directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum citation pages per crawl
    #[arg(long)]
    max_pages: Option<usize>,

    /// Sort accumulated citations least-cited first
    #[arg(long)]
    ascending: bool,

    /// Fetch one page only when the citation count is unknown
    #[arg(long)]
    single_page: bool,

    /// Seconds to wait for the robot check to be solved
    #[arg(long)]
    challenge_timeout: Option<u64>,

    /// Do not read or write the response cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Clear cached responses
    Clear,
    /// Show cache directory
    Path,
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => CrawlConfig::from_file(path).context("Failed to load config")?,
        None => CrawlConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    let cookies = match &cli.cookie_file {
        Some(path) => CookieManager::with_path(path.clone()),
        None => CookieManager::new()?,
    };

    match cli.command {
        Some(Commands::Run(args)) => run(config, cookies, args).await,
        None => run(config, cookies, cli.run).await,
        Some(Commands::Cache { action }) => handle_cache(&config, action),
        Some(Commands::Cookies { action }) => handle_cookies(&cookies, action),
    }
}

fn file_cache(config: &CrawlConfig) -> FileCache {
    FileCache::new(config.cache_dir.clone().unwrap_or_else(default_cache_dir)).with_ttl(config.cache_ttl())
}

fn handle_cache(config: &CrawlConfig, action: CacheAction) -> Result<()> {
    let cache = file_cache(config);
    match action {
        CacheAction::Clear => {
            cache.clear()?;
            println!("Request cache cleared.");
        }
        CacheAction::Path => println!("Cache directory: {}", cache.dir().display()),
    }
    Ok(())
}

fn handle_cookies(cookies: &CookieManager, action: CookieAction) -> Result<()> {
    match action {
        CookieAction::Clear => {
            cookies.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => println!("Cookie file: {:?}", cookies.path()),
    }
    Ok(())
}

// ============================================================================
// Interactive Session
// ============================================================================

async fn run(mut config: CrawlConfig, cookies: CookieManager, args: RunArgs) -> Result<()> {
    if let Some(mirror) = args.mirror {
        config.base_url = mirror;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if args.ascending {
        config.sort_order = SortOrder::Ascending;
    }
    if args.single_page {
        config.unknown_total = UnknownTotalPolicy::SinglePage;
    }
    if let Some(secs) = args.challenge_timeout {
        config.challenge_timeout_secs = secs;
    }

    let cache: Box<dyn ResponseCache> = if args.no_cache {
        Box::new(NoCache)
    } else {
        Box::new(file_cache(&config))
    };
    let transport = CachedTransport::new(Box::new(HttpTransport::new(&config, args.proxy.as_deref())?), cache);
    let solver = InteractiveSolver::new(cookies, &config.cookie_name, config.scholar_url());
    let session = SessionManager::new(Box::new(solver), transport, &config)?;
    let controller = CrawlController::new(session, config)?;

    tokio::select! {
        result = interactive(controller, args.query) => match result {
            Err(CrawlError::Interrupted) => goodbye(),
            other => other.map_err(anyhow::Error::from),
        },
        _ = tokio::signal::ctrl_c() => goodbye(),
    }
}

fn goodbye() -> ! {
    println!("{}", "\nKeyboard interrupt detected. Exiting...".red());
    // A prompt may still be blocked reading stdin
    std::process::exit(0)
}

async fn interactive(mut controller: CrawlController, initial: Option<String>) -> citecrawl::Result<()> {
    println!("{}", display::BANNER);
    println!("{} to clear request cache. Watch out for rate limits!\n", "\"clear\"".red());

    let mut pending = initial;
    loop {
        let input = match pending.take() {
            Some(query) => query,
            None => match prompt::read_line(&"Google Scholar Search> ".blue().to_string()).await? {
                Some(line) => line,
                None => return Ok(()),
            },
        };

        match input.as_str() {
            "clear" => {
                controller.clear_cache()?;
                println!("{}", "Request cache cleared!".green());
                continue;
            }
            "exit" => return Ok(()),
            _ => {}
        }

        let Some(query) = Query::parse(&input) else {
            continue;
        };

        if let Err(e) = handle_query(&mut controller, query).await {
            if !e.is_recoverable() {
                return Err(e);
            }
            error!(error = %e, "Query failed");
            println!("{}", e.to_string().red());
        }
        controller.reset();
    }
}

async fn handle_query(controller: &mut CrawlController, query: Query) -> citecrawl::Result<()> {
    let mut crawl = match query {
        Query::Search(text) => {
            let results = controller.search(&text).await?;
            println!();
            println!("{}", display::render_list(&results));
            println!();

            let crawl = choose_article(controller, &results).await?;
            println!("{}", display::render_selected(crawl.seed()));
            crawl
        }
        Query::Citations(reference) => {
            println!("Crawling citations for {}", reference);
            controller.seed(&reference)
        }
    };

    crawl_pages(controller, &mut crawl).await
}

async fn choose_article(
    controller: &mut CrawlController,
    results: &[Article],
) -> citecrawl::Result<Crawl> {
    loop {
        let line = prompt::read_line(&"Choose an article to view its citations> ".blue().to_string())
            .await?
            .ok_or(CrawlError::Interrupted)?;

        match prompt::parse_index(&line, results.len()).and_then(|i| controller.select(results, i)) {
            Ok(crawl) => return Ok(crawl),
            Err(CrawlError::Selection(msg)) => println!("{}", msg.red()),
            Err(e) => return Err(e),
        }
    }
}

async fn crawl_pages(controller: &mut CrawlController, crawl: &mut Crawl) -> citecrawl::Result<()> {
    loop {
        let report = controller.next_page(crawl).await?;

        println!();
        println!("Viewing {} page(s) of citations (sorted):", crawl.pages_fetched());
        println!("{}", display::render_list(crawl.accumulated()));
        if report.is_empty() {
            println!("{}", format!("Page {} returned no results.", report.page + 1).red());
        }

        if !report.more_pages {
            println!("\nNo more pages to view.");
            return export_prompt(controller, crawl, true).await;
        }

        let line = prompt::read_line(
            &"Press enter to get next page, 'e' to export or 'q' to quit> "
                .blue()
                .to_string(),
        )
        .await?
        .ok_or(CrawlError::Interrupted)?;

        match PageAction::parse(&line) {
            PageAction::Continue => {}
            PageAction::Quit => {
                controller.finish(crawl);
                return Ok(());
            }
            PageAction::Export => return export_prompt(controller, crawl, false).await,
        }
    }
}

/// Ask how many citations to export; blank input skips when `optional`.
async fn export_prompt(
    controller: &mut CrawlController,
    crawl: &mut Crawl,
    optional: bool,
) -> citecrawl::Result<()> {
    let question = if optional {
        "Export citations? Enter a count (0 = all) or press enter to skip> "
    } else {
        "How many citations to export (0 = all)> "
    };

    let limit = loop {
        let line = prompt::read_line(&question.blue().to_string())
            .await?
            .ok_or(CrawlError::Interrupted)?;
        if optional && line.is_empty() {
            controller.finish(crawl);
            return Ok(());
        }
        match prompt::parse_count(&line) {
            Ok(n) => break n,
            Err(e) => println!("{}", e.to_string().red()),
        }
    };

    let path = export::export_path(&controller.config().output_dir, &crawl.seed().title);
    let written = controller.export(crawl, limit, &path)?;
    info!(path = %path.display(), written, "Export complete");
    println!("{}", format!("Saved {} citations to {}", written, path.display()).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_run_reads_run_options() -> Result<()> {
        let cli = Cli::try_parse_from(["citecrawl", "--proxy", "http://127.0.0.1:7890", "quasi-newton"])?;
        assert!(cli.command.is_none());
        assert_eq!(cli.run.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(cli.run.query.as_deref(), Some("quasi-newton"));

        std::env::set_var("CITECRAWL_PROXY", "http://10.0.0.1:3128");
        let cli = Cli::try_parse_from(["citecrawl"])?;
        std::env::remove_var("CITECRAWL_PROXY");
        assert_eq!(cli.run.proxy.as_deref(), Some("http://10.0.0.1:3128"));

        let cli = Cli::try_parse_from(["citecrawl", "cache", "path"])?;
        assert!(matches!(cli.command, Some(Commands::Cache { action: CacheAction::Path })));
        Ok(())
    }
}
