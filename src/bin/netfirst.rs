//! netfirst: drive the caching agent from the command line.
//!
//! Usage:
//!   netfirst install                     Populate the current bucket from the manifest
//!   netfirst activate                    Install, then delete buckets of other versions
//!   netfirst fetch <url> [--method M] [--header "Name: value"]...
//!                                        Run one request through the active agent
//!   netfirst keys                        List buckets and their entries

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use netfirst_cache::cache::{CacheStorage, DiskStorage};
use netfirst_cache::host::ClientRegistry;
use netfirst_cache::http::{HeaderName, HeaderValue, Method, Request};
use netfirst_cache::transport::HttpTransport;
use netfirst_cache::{AgentConfig, CacheInterceptor, FetchOutcome, ServiceWorker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "install" => cmd_install(&args[2..]).await,
        "activate" => cmd_activate(&args[2..]).await,
        "fetch" => cmd_fetch(&args[2..]).await,
        "keys" => cmd_keys(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("netfirst {}", env!("CARGO_PKG_VERSION"));
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
    }
}

fn print_usage() {
    println!(
        r#"netfirst - network-first offline cache agent

USAGE:
    netfirst <COMMAND> [OPTIONS]

COMMANDS:
    install                     Populate the current bucket from the manifest
    activate                    Install, then delete buckets of other versions
    fetch <url> [--method M]    Run one request through the active agent
          [--header "N: v"]...  Add a request header (repeatable)
    keys                        List buckets and their entries
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --config <path>             YAML or JSON agent configuration
    --store <dir>               Cache storage directory (default: .netfirst)

ENVIRONMENT:
    NETFIRST_STORE_DIR          Cache storage directory
    NETFIRST_CACHE_NAME         Override the bucket name
    NETFIRST_ORIGIN             Override the origin manifest entries resolve against
    NETFIRST_HTTP_TIMEOUT_SECS  Optional network timeout
    RUST_LOG                    Log filter (default: info)"#
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == flag)
        .filter_map(|(i, _)| args.get(i + 1))
        .map(String::as_str)
        .collect()
}

fn parse_header(raw: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header must look like \"Name: value\", got {raw}");
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("invalid header name in {raw}"))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("invalid header value in {raw}"))?;
    Ok((name, value))
}

fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
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
        out.push(arg.as_str());
    }
    out
}

fn load_config(args: &[String]) -> anyhow::Result<AgentConfig> {
    let config = match flag_value(args, "--config") {
        Some(path) => AgentConfig::from_path(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => AgentConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn store_dir(args: &[String]) -> PathBuf {
    if let Some(dir) = flag_value(args, "--store") {
        return PathBuf::from(dir);
    }
    std::env::var("NETFIRST_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".netfirst"))
}

async fn build_agent(args: &[String]) -> anyhow::Result<(CacheInterceptor, Arc<DiskStorage>)> {
    let config = load_config(args)?;
    let storage = Arc::new(DiskStorage::new(store_dir(args)).await?);
    let agent = CacheInterceptor::new(
        config,
        Arc::new(HttpTransport::new()?),
        storage.clone(),
        Arc::new(ClientRegistry::new()),
    )?;
    Ok((agent, storage))
}

async fn cmd_install(args: &[String]) -> anyhow::Result<()> {
    let (agent, storage) = build_agent(args).await?;
    agent.on_install().await?;
    let name = &agent.config().cache_name;
    println!("Installed {name}:");
    for key in storage.entries(name).await? {
        println!("  {key}");
    }
    Ok(())
}

async fn cmd_activate(args: &[String]) -> anyhow::Result<()> {
    let (agent, _) = build_agent(args).await?;
    agent.on_install().await?;
    let report = agent.on_activate().await?;
    println!("Active: {}", agent.config().cache_name);
    for name in &report.deleted {
        println!("  deleted {name}");
    }
    for name in &report.failed {
        println!("  could not delete {name}");
    }
    Ok(())
}

async fn cmd_fetch(args: &[String]) -> anyhow::Result<()> {
    let Some(target) = positional(args).first().copied() else {
        bail!("usage: netfirst fetch <url> [--method M] [--header \"Name: value\"]");
    };
    let method = match flag_value(args, "--method") {
        Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
            .with_context(|| format!("invalid method {m}"))?,
        None => Method::GET,
    };
    let mut request = Request::new(method, url::Url::parse(target)?);
    for raw in flag_values(args, "--header") {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }

    let (agent, _) = build_agent(args).await?;
    if !agent.resume().await? {
        bail!(
            "{} is not active; run `netfirst activate` first",
            agent.config().cache_name
        );
    }

    match agent.on_fetch(request).await {
        FetchOutcome::PassThrough => println!("(pass-through: not handled by the agent)"),
        FetchOutcome::Respond(resp) => {
            println!("{} {}", resp.status(), resp.status_text());
            for (name, value) in resp.headers() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            println!();
            println!("{}", resp.text());
        }
    }
    agent.settle().await;
    Ok(())
}

async fn cmd_keys(args: &[String]) -> anyhow::Result<()> {
    let storage = DiskStorage::new(store_dir(args)).await?;
    let names = storage.keys().await?;
    if names.is_empty() {
        println!("No caches in {}", storage.root().display());
    }
    for name in names {
        println!("{name}");
        for key in storage.entries(&name).await? {
            println!("  {key}");
        }
    }
    Ok(())
}
