//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest record harvester.

use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{build_http_client, Engine, Scraper};
use sumi_harvest::output::ElasticOutput;
use sumi_harvest::selector::paginate;
use sumi_harvest::url::split_item_index;
use sumi_harvest::ScrapSelector;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a selector-driven record harvester
///
/// Sumi-Harvest crawls the pages described by a JSON selector document,
/// follows list records into their detail pages, and stores every extracted
/// record in the configured sinks.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A selector-driven record harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Path to a JSON selector document
    #[arg(short, long, value_name = "FILE")]
    selector: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Scrap the first page only and print the records instead of storing them
    #[arg(long, conflicts_with_all = ["lookup", "save", "job", "log", "dry_run"])]
    test: bool,

    /// Print the stored selector for the selector's URL and type
    #[arg(long, conflicts_with_all = ["save", "job", "log", "dry_run"])]
    lookup: bool,

    /// Validate and save the selector without crawling
    #[arg(long, conflicts_with_all = ["job", "log", "dry_run"])]
    save: bool,

    /// Print the report of a job
    #[arg(long, value_name = "ID", conflicts_with_all = ["log", "dry_run"])]
    job: Option<String>,

    /// Print the operational log
    #[arg(long, conflicts_with = "dry_run")]
    log: bool,

    /// Validate config and selector and show the pages that would be crawled
    #[arg(long)]
    dry_run: bool,

    /// Read stored records back from the search index (repeat for a multi-get)
    #[arg(
        long,
        value_name = "HOST/ID",
        conflicts_with_all = ["search", "test", "lookup", "save", "job", "log", "dry_run"]
    )]
    item: Vec<String>,

    /// Run the JSON query in FILE against the search index records of --host
    #[arg(
        long,
        value_name = "FILE",
        requires = "host",
        conflicts_with_all = ["test", "lookup", "save", "job", "log", "dry_run"]
    )]
    search: Option<PathBuf>,

    /// Site whose records --search queries
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        return handle_dry_run(&config, required_selector(&cli)?);
    }

    if !cli.item.is_empty() {
        return handle_items(&config, &cli.item).await;
    }
    if let Some(query) = &cli.search {
        let host = cli.host.as_deref().ok_or("--search needs --host")?;
        return handle_search(&config, host, query).await;
    }

    let engine = Engine::from_config(&config).await?;

    if let Some(job_id) = &cli.job {
        handle_job(&engine, job_id).await
    } else if cli.log {
        handle_log(&engine).await
    } else if cli.lookup {
        handle_lookup(&engine, required_selector(&cli)?).await
    } else if cli.save {
        handle_save(&engine, required_selector(&cli)?).await
    } else if cli.test {
        handle_test(&engine, required_selector(&cli)?).await
    } else {
        handle_scrap_and_store(&engine, required_selector(&cli)?).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

fn required_selector(cli: &Cli) -> Result<ScrapSelector, Box<dyn std::error::Error>> {
    let path = cli
        .selector
        .as_deref()
        .ok_or("this mode needs a selector document (--selector FILE)")?;
    load_selector(path)
}

fn load_selector(path: &Path) -> Result<ScrapSelector, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let selector: ScrapSelector = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded selector for {} from {}", selector.url, path.display());
    Ok(selector)
}

/// Handles the --dry-run mode: validates inputs and lists the pages to crawl
fn handle_dry_run(config: &Config, selector: ScrapSelector) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  User agent: {}", config.scraper.user_agent);
    println!("  Timeout: {}s", config.scraper.timeout_secs);
    println!("  Max connections: {}", config.scraper.max_connections);
    println!("  Max recursion depth: {}", config.scraper.max_recursion_depth);

    println!("\nStore: {:?}", config.store.backend);
    println!("Sinks: {:?}", config.output.sinks);

    selector.validate()?;
    let pages = paginate(&selector)?;

    println!(
        "\nSelector ({}, {}):",
        selector.selector_type(),
        if selector.recursive { "recursive" } else { "direct" }
    );
    for page in &pages {
        println!("  * {}", page.url);
    }

    println!("\n✓ Configuration and selector are valid");
    println!("✓ Would crawl {} page(s)", pages.len());

    Ok(())
}

/// Search index client built from the output configuration
fn elastic_reader(config: &Config) -> Result<ElasticOutput, Box<dyn std::error::Error>> {
    let client = build_http_client(&config.scraper)?;
    Ok(ElasticOutput::new(
        client,
        &config.output.elastic_url,
        &config.output.elastic_index,
    ))
}

/// Handles the --item mode: reads records back from the search index
///
/// One reference is a plain get; several must share a host and are read
/// with a single multi-get.
async fn handle_items(config: &Config, refs: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let elastic = elastic_reader(config)?;

    let mut parsed = Vec::with_capacity(refs.len());
    for reference in refs {
        let pair = split_item_index(reference)
            .ok_or_else(|| format!("expected HOST/ID, got '{}'", reference))?;
        parsed.push(pair);
    }

    let Some(&(host, _)) = parsed.first() else {
        return Ok(());
    };

    if let [(_, id)] = parsed.as_slice() {
        match elastic.get(host, id).await {
            Ok(item) => println!("{}", serde_json::to_string_pretty(&item)?),
            Err(e) if e.is_not_found() => println!("Record {}/{} not found", host, id),
            Err(e) => return Err(e.into()),
        }
        return Ok(());
    }

    if parsed.iter().any(|(h, _)| *h != host) {
        return Err("all records of a multi-get must share one host".into());
    }

    let ids: Vec<String> = parsed.iter().map(|(_, id)| id.to_string()).collect();
    let items = elastic.multi_get(host, &ids).await?;
    for (id, item) in ids.iter().zip(items) {
        match item {
            Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
            None => println!("Record {}/{} not found", host, id),
        }
    }
    Ok(())
}

/// Handles the --search mode: runs a raw query and prints the raw answer
async fn handle_search(
    config: &Config,
    host: &str,
    query_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(query_path)?;
    let query: serde_json::Value = serde_json::from_str(&contents)?;

    let response = elastic_reader(config)?.search(host, &query).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Handles the --job mode: prints a job report
async fn handle_job(engine: &Engine, job_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = match engine.data().scrap_job(job_id).await {
        Ok(report) => report,
        Err(e) if e.is_not_found() => {
            println!("Job {} not found", job_id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Job {} ({})", job_id, report.state());
    println!("  Items: {}", report.item_count());
    println!("  Errors: {}", report.error_count());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Handles the --log mode: prints the operational log, newest first
async fn handle_log(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    for line in engine.data().scrap_log().await? {
        println!("{}", line);
    }
    Ok(())
}

/// Handles the --lookup mode: prints the stored selector
async fn handle_lookup(
    engine: &Engine,
    selector: ScrapSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    match engine
        .data()
        .selector(&selector.url, selector.selector_type())
        .await
    {
        Ok(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
        Err(e) if e.is_not_found() => println!("No selector stored for {}", selector.url),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Handles the --save mode: validates and stores the selector
async fn handle_save(
    engine: &Engine,
    selector: ScrapSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    engine.data().save_selector(&selector).await?;
    println!("✓ Selector saved for {}", selector.url);
    Ok(())
}

/// Handles the --test mode: scraps one page and prints what was found
async fn handle_test(
    engine: &Engine,
    mut selector: ScrapSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    selector.page_param.clear();

    let (job_id, mut items) = engine.scraper().scrap(selector.clone()).await?;
    tracing::info!("Scrap [{}] test run", job_id);

    let mut records = Vec::new();
    while let Some(result) = items.recv().await {
        if let Some(e) = &result.error {
            tracing::warn!("Scrap [{}] record error: {}", job_id, e);
        }
        records.push(result.item);
    }

    let snippet = match engine.snippet_base(&selector).await {
        Ok(snippet) => snippet,
        Err(e) => {
            tracing::warn!("No snippet for {}: {}", selector.url, e);
            String::new()
        }
    };

    println!("=== Test run {} ===\n", job_id);
    println!("{}", serde_json::to_string_pretty(&records)?);
    println!("\nSnippet of the first container match:\n{}", snippet);
    Ok(())
}

/// Handles the main operation: crawl recursively and store every record
async fn handle_scrap_and_store(
    engine: &Engine,
    selector: ScrapSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    let (job_id, handle) = match engine.scrap_and_store(selector).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!("Scrap failed to start: {}", e);
            return Err(e.into());
        }
    };

    println!("Job {} started", job_id);
    let summary = handle.await?;

    println!("Job {} drained", job_id);
    println!("  Records: {}", summary.records);
    println!("  Record errors: {}", summary.item_errors);
    println!("  Sink writes: {}", summary.stored);
    println!("  Sink failures: {}", summary.failed);
    Ok(())
}
