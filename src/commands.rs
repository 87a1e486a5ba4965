// content-index/src/commands.rs

use anyhow::{
    Result,
    Context,
    anyhow
};
use std::{
    env,
    path::{
        Path,
        PathBuf
    },
    process::ExitCode,
    sync::Arc
};
use tracing_subscriber::EnvFilter;
use crate::{
    config::IndexConfig,
    hasher,
    index::{
        ContentIndex,
        RefreshOutcome,
        RefreshReport
    },
    util
};


pub fn run_cli() -> Result<ExitCode> {
    init_logging();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = take_config_flag(&mut args);
    let cmd = args.first().map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(1..).unwrap_or_default();

    match cmd {
        "build"   => build(&load_config(config_path.as_deref())?)?,
        "refresh" => refresh(&load_config(config_path.as_deref())?)?,
        "lookup"  => {
            let cfg = load_config(config_path.as_deref())?;
            if !lookup(&cfg, rest.first().map(|s| s.as_str()))? {
                return Ok(ExitCode::FAILURE);
            }
        }
        "hash"    => hash_files(rest)?,
        "status"  => status(&load_config(config_path.as_deref())?)?,
        _         => print_help(),
    }
    Ok(ExitCode::SUCCESS)
}

/// `RUST_LOG` wins; otherwise info for this crate.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Pull `--config=PATH` (or `--config PATH`) out of the argument list.
fn take_config_flag(args: &mut Vec<String>) -> Option<PathBuf> {
    let pos = args.iter().position(|a| a == "--config" || a.starts_with("--config="))?;
    let flag = args.remove(pos);
    if let Some(v) = flag.strip_prefix("--config=") {
        return Some(PathBuf::from(v));
    }
    if pos < args.len() {
        return Some(PathBuf::from(args.remove(pos)));
    }
    None
}

fn load_config(path: Option<&Path>) -> Result<IndexConfig> {
    let default = PathBuf::from("content-index.toml");
    let path = path.unwrap_or(&default);
    IndexConfig::load(Some(path))
        .with_context(|| format!("loading configuration from {}", path.display()))
}

fn build(cfg: &IndexConfig) -> Result<()> {
    let report = run_build(cfg)?;
    print_report(&report);
    Ok(())
}

fn run_build(cfg: &IndexConfig) -> Result<RefreshReport> {
    if cfg.roots.is_empty() {
        return Err(anyhow!("no roots configured; set `roots` in the config file"));
    }
    // load first so the report diffs against the previous build
    let idx = open_saved(cfg);
    match idx.update_cache() {
        RefreshOutcome::Completed(report) => Ok(report),
        RefreshOutcome::Aborted(err) => Err(err).context("rebuild aborted"),
        other => Err(anyhow!("rebuild did not run: {other:?}")),
    }
}

fn refresh(cfg: &IndexConfig) -> Result<()> {
    let idx = Arc::new(ContentIndex::new(cfg.clone()));
    match idx.initialize() {
        Some(handle) => {
            let outcome = handle
                .join()
                .map_err(|_| anyhow!("rebuild thread panicked"))?;
            match outcome {
                RefreshOutcome::Completed(report) => print_report(&report),
                RefreshOutcome::Aborted(err) => return Err(err).context("rebuild aborted"),
                other => println!("Nothing done: {other:?}"),
            }
        }
        None => println!(
            "Index is fresh ({} entries, built {}).",
            idx.stats().entries,
            util::format_millis(idx.stats().last_build)
        ),
    }
    Ok(())
}

/// Prints the path and returns `true` when the fingerprint is known.
fn lookup(cfg: &IndexConfig, fingerprint: Option<&str>) -> Result<bool> {
    let fp = fingerprint.ok_or_else(|| anyhow!("usage: content-index lookup <fingerprint>"))?;
    match resolve(cfg, fp) {
        Some(path) => {
            println!("{}", path.display());
            Ok(true)
        }
        None => {
            eprintln!("not found: {}", fp.trim());
            Ok(false)
        }
    }
}

fn resolve(cfg: &IndexConfig, fingerprint: &str) -> Option<PathBuf> {
    let fp = fingerprint.trim().to_ascii_lowercase();
    if !hasher::is_fingerprint(&fp) {
        tracing::warn!(fingerprint = %fp, "not a SHA-256 hex digest, lookup will miss");
    }
    open_saved(cfg).get_path(&fp)
}

fn hash_files(paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Err(anyhow!("usage: content-index hash <file>..."));
    }
    for p in paths {
        let path = Path::new(p);
        let fp = hasher::hash_file(path)
            .with_context(|| format!("hashing {}", path.display()))?;
        println!("{fp}  {}", path.display());
    }
    Ok(())
}

fn status(cfg: &IndexConfig) -> Result<()> {
    let idx = open_saved(cfg);
    let stats = idx.stats();
    let roots: Vec<String> = cfg.roots.iter().map(|r| r.display().to_string()).collect();
    println!("cache file : {}", cfg.cache_file.display());
    println!("roots      : {}", roots.join(", "));
    println!("entries    : {}", stats.entries);
    println!("last build : {}", util::format_millis(stats.last_build));
    println!("stale      : {}", idx.is_stale());
    Ok(())
}

/// Index backed by the checkpoint only; read-only commands never rebuild.
fn open_saved(cfg: &IndexConfig) -> ContentIndex {
    let idx = ContentIndex::new(cfg.clone());
    if let Err(err) = idx.load() {
        tracing::warn!(error = %err, "saved index unreadable, treating as empty");
    }
    idx
}

fn print_report(r: &RefreshReport) {
    println!(
        "Indexed {} files ({} skipped) in {:.2?}. +{} -{} moved {}. {}",
        r.indexed,
        r.skipped,
        r.elapsed,
        r.diff.added.len(),
        r.diff.removed.len(),
        r.diff.moved.len(),
        if r.persisted { "Saved." } else { "NOT saved (see log)." }
    );
}

fn print_help() {
    println!(
r#"
Content index CLI

USAGE:
    content-index [--config=PATH] <command>

COMMANDS:
    build                 # Rebuild the index now, regardless of age
    refresh               # Load the saved index; rebuild only if stale
    lookup <fingerprint>  # Print the path for a SHA-256 fingerprint (exit 1 if unknown)
    hash <file>...        # Print fingerprints for the given files
    status                # Show entry count, last build time and staleness
    help                  # Show this message

Configuration is read from content-index.toml (or --config) and
CONTENT_INDEX_* environment variables. Set RUST_LOG for log verbosity.
"#    );
}
