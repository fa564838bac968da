//! insights-cli: send and query Insights events from the command line
//!
//! Usage:
//!   insights-cli insert [--config <yaml>] [<file>]   Batch-insert NDJSON events (stdin if no file)
//!   insights-cli post <json>                         Post one event directly
//!   insights-cli query <nrql>                        Run an NRQL query
//!   insights-cli validate                            Check endpoints and keys

use anyhow::{bail, Context, Result};
use insights_rs::config::{DEFAULT_QUERY_REQUEST_TIMEOUT, DEFAULT_QUERY_URL};
use insights_rs::query::QueryClient;
use insights_rs::{InsertClient, InsertConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "insert" => cmd_insert(&args[2..]).await,
        "post" => cmd_post(&args[2..]).await,
        "query" => cmd_query(&args[2..]).await,
        "validate" => cmd_validate(),
        "version" | "--version" | "-V" => {
            println!("insights-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"insights-cli: Insights event command line tool

USAGE:
    insights-cli <COMMAND> [OPTIONS]

COMMANDS:
    insert [--config <yaml>] [<file>]   Batch-insert newline-delimited JSON events
    post <json>                         Post a single event without batching
    query <nrql>                        Run an NRQL query and print the result
    validate                            Check endpoint and key configuration
    version                             Show version information
    help                                Show this help message

ENVIRONMENT:
    INSIGHTS_ACCOUNT_ID                 Account id (required)
    INSIGHTS_INSERT_KEY                 Insert key (insert, post)
    INSIGHTS_QUERY_KEY                  Query key (query)
    INSIGHTS_INSERT_URL                 Override insert base URL
    INSIGHTS_QUERY_URL                  Override query base URL
    INSIGHTS_BATCH_SIZE, INSIGHTS_BATCH_TIME_MS, INSIGHTS_WORKER_COUNT,
    INSIGHTS_REQUEST_TIMEOUT_MS, INSIGHTS_RETRY_COUNT, INSIGHTS_RETRY_WAIT_MS
    INSIGHTS_COMPRESSION                none (default) or gzip
    INSIGHTS_PROXY_URL                  HTTP(S) proxy for all requests
    RUST_LOG                            Log filter (default: info)"#
    );
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

fn positional(args: &[String]) -> Option<String> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = true;
            continue;
        }
        return Some(arg.clone());
    }
    None
}

fn insert_client(config: InsertConfig) -> Result<InsertClient> {
    let mut builder = InsertClient::builder(
        required_env("INSIGHTS_INSERT_KEY")?,
        required_env("INSIGHTS_ACCOUNT_ID")?,
    )
    .config(config);
    if let Ok(base) = std::env::var("INSIGHTS_INSERT_URL") {
        builder = builder.base_url_override(base);
    }
    Ok(builder.build()?)
}

fn query_client() -> Result<QueryClient> {
    let base = std::env::var("INSIGHTS_QUERY_URL").unwrap_or_else(|_| DEFAULT_QUERY_URL.to_string());
    Ok(QueryClient::with_base_url(
        required_env("INSIGHTS_QUERY_KEY")?,
        &required_env("INSIGHTS_ACCOUNT_ID")?,
        &base,
        DEFAULT_QUERY_REQUEST_TIMEOUT,
    )?)
}

async fn cmd_insert(args: &[String]) -> Result<()> {
    let config = match flag_value(args, "--config") {
        Some(path) => {
            InsertConfig::from_yaml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => InsertConfig::from_env(),
    };

    let client = insert_client(config)?;
    client.start()?;

    let sent = match positional(args).map(PathBuf::from) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            enqueue_lines(&client, BufReader::new(file)).await?
        }
        None => enqueue_lines(&client, BufReader::new(tokio::io::stdin())).await?,
    };

    client.shutdown().await?;
    let stats = client.statistics();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if stats.abandoned_event_count > 0 {
        bail!(
            "{} of {} events were abandoned after retries",
            stats.abandoned_event_count,
            sent
        );
    }
    Ok(())
}

async fn enqueue_lines<R: AsyncBufRead + Unpin>(client: &InsertClient, reader: R) -> Result<u64> {
    let mut lines = reader.lines();
    let mut sent = 0u64;
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(line) {
            warn!(line = line_no, error = %e, "skipping invalid JSON");
            continue;
        }
        client.enqueue(line.to_owned()).await?;
        sent += 1;
    }
    Ok(sent)
}

async fn cmd_post(args: &[String]) -> Result<()> {
    let Some(raw) = positional(args) else {
        bail!("post requires a JSON event argument");
    };
    let event: serde_json::Value = serde_json::from_str(&raw).context("parsing event JSON")?;
    let client = insert_client(InsertConfig::from_env())?;
    client.post_event(&event).await?;
    println!("ok");
    Ok(())
}

async fn cmd_query(args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("query requires an NRQL statement");
    }
    let nrql = args.join(" ");
    let client = query_client()?;
    let resp: serde_json::Value = client.query(&nrql).await?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

fn cmd_validate() -> Result<()> {
    let mut failures = 0;

    match insert_client(InsertConfig::from_env()).and_then(|c| Ok(c.validate()?)) {
        Ok(()) => println!("insert: ok"),
        Err(e) => {
            failures += 1;
            println!("insert: {e:#}");
        }
    }
    match query_client().and_then(|c| Ok(c.validate()?)) {
        Ok(()) => println!("query: ok"),
        Err(e) => {
            failures += 1;
            println!("query: {e:#}");
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}
