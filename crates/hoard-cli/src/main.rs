use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hoard_store::{scan, EntryInfo, Store, StoreConfig};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hoard", version, about = "Inspect and maintain an on-disk response cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// TOML config file (defaults to `HOARD_CACHE_DIR` / `HOARD_VACUUM_INTERVAL_SECS`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Cache directory, overriding the configured one
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Emit JSON suitable for scripts
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the payload stored under a key (exit code 1 on a miss)
    Get(KeyArgs),
    /// Store a payload read from a file or stdin
    Set(SetArgs),
    /// Print the on-disk path for a key
    Path(KeyArgs),
    /// List entry files with their expiry
    Ls,
    /// Delete expired entries once and report what happened
    Vacuum,
}

#[derive(Args)]
struct KeyArgs {
    key: String,
}

#[derive(Args)]
struct SetArgs {
    key: String,
    /// Time-to-live in seconds
    #[arg(long, default_value_t = 300)]
    ttl: u64,
    /// Read the payload from this file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("HOARD_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<StoreConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => StoreConfig::from_env(),
    };
    if let Some(dir) = &cli.dir {
        config.path = dir.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    tracing::debug!(
        path = %config.path.display(),
        vacuum_interval_secs = config.vacuum_interval_secs,
        "using cache directory"
    );

    match &cli.command {
        Command::Path(args) => {
            println!("{}", hoard_store::shard_path(&config.path, &args.key).display());
            Ok(0)
        }
        Command::Ls => {
            let entries = scan(&config.path)
                .with_context(|| format!("failed to scan {}", config.path.display()))?;
            print_entries(&entries, cli.json)?;
            Ok(0)
        }
        Command::Get(args) => with_store(&config, |store| get(store, args, cli.json)),
        Command::Set(args) => with_store(&config, |store| set(store, args, cli.json)),
        Command::Vacuum => with_store(&config, |store| vacuum(store, cli.json)),
    }
}

/// Opens the store for one command and always stops its vacuum worker afterwards.
fn with_store(config: &StoreConfig, f: impl FnOnce(&Store) -> Result<i32>) -> Result<i32> {
    let store = Store::from_config(config)
        .with_context(|| format!("failed to open cache at {}", config.path.display()))?;
    let code = f(&store);
    store.shutdown();
    code
}

fn get(store: &Store, args: &KeyArgs, json: bool) -> Result<i32> {
    let payload = store.get(&args.key);
    if json {
        print_json(&GetOutput {
            key: &args.key,
            found: payload.is_some(),
            payload: payload.as_deref().map(String::from_utf8_lossy),
        })?;
    } else if let Some(payload) = &payload {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(payload)?;
        stdout.flush()?;
    }
    Ok(if payload.is_some() { 0 } else { 1 })
}

fn set(store: &Store, args: &SetArgs, json: bool) -> Result<i32> {
    let payload = match &args.file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            buf
        }
    };
    store
        .set(&args.key, &payload, Duration::from_secs(args.ttl))
        .with_context(|| format!("failed to store {:?}", args.key))?;
    if json {
        print_json(&serde_json::json!({
            "key": args.key,
            "path": store.entry_path(&args.key),
            "bytes": payload.len(),
        }))?;
    }
    Ok(0)
}

fn vacuum(store: &Store, json: bool) -> Result<i32> {
    let report = store.vacuum_now();
    if json {
        print_json(&report)?;
    } else {
        println!("vacuum: {}", store.root().display());
        println!("  scanned: {}", report.scanned);
        println!("  removed: {}", report.removed);
        println!("  skipped: {}", report.skipped);
        println!("  live: {}", report.live);
    }
    Ok(0)
}

#[derive(Serialize)]
struct GetOutput<'a> {
    key: &'a str,
    found: bool,
    payload: Option<std::borrow::Cow<'a, str>>,
}

fn print_entries(entries: &[EntryInfo], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    for entry in entries {
        let expires = entry
            .expires_at
            .map(|at| at.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = match (entry.expires_at, entry.expired) {
            (None, _) => "corrupt",
            (Some(_), true) => "expired",
            (Some(_), false) => "live",
        };
        println!(
            "{}\t{}\t{}\t{}",
            entry.path.display(),
            entry.size_bytes,
            expires,
            state
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
