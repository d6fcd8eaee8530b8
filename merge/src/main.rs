use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use strider_core::config;
use strider_core::merge::{IdPrompt, MergeOptions, merge_files};
use strider_core::rules::{Rule, load_rule_directory, load_rule_file};
use strider_core::{Track, TrackPack};
use strider_types::ConflictPolicy;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strider-merge", version, about = "Merge strider track packs into one file")]
struct Args {
    /// The destination file
    dst: PathBuf,

    /// The source files to merge, in order
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Add a TOML rule file (repeatable, applied in order)
    #[arg(short = 'r', long = "rules")]
    rule_paths: Vec<PathBuf>,

    /// How to behave when an id conflict occurs: random, prompt or error
    /// (defaults to the configured policy)
    #[arg(long = "on-conflict", alias = "on_conflict")]
    on_conflict: Option<ConflictPolicy>,

    /// Merge into the existing destination file instead of replacing it
    #[arg(long)]
    append: bool,

    /// Skip the rule directories from the settings file
    #[arg(long)]
    no_default_rules: bool,

    /// Don't log each rule that fires
    #[arg(long)]
    quiet_rules: bool,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // --log-file wins over STRIDER_LOG_PATH
    let path = log_file
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("STRIDER_LOG_PATH").map(PathBuf::from));

    if let Some(path) = path
        && let Some(file_name) = path.file_name()
    {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .init();
        return Some(guard);
    }

    // Fallback to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    None
}

/// Asks on the terminal for a replacement id
struct StdinPrompt;

impl IdPrompt for StdinPrompt {
    fn replacement_id(&mut self, track: &Track, destination: &TrackPack) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "track with id {} already exists in {}, enter a new id (leave blank for auto):",
            track.id, destination.name
        )?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

fn load_rules(args: &Args, directories: &[PathBuf]) -> Result<Vec<Rule>, String> {
    let mut rules = Vec::new();

    for dir in directories {
        let loaded = load_rule_directory(dir).map_err(|e| e.to_string())?;
        println!("{} rules in {}", loaded.len(), dir.display());
        rules.extend(loaded);
    }

    for path in &args.rule_paths {
        let loaded = load_rule_file(path).map_err(|e| e.to_string())?;
        if !loaded.is_empty() {
            println!("{} rules in {}", loaded.len(), path.display());
        }
        rules.extend(loaded);
    }

    if directories.len() + args.rule_paths.len() > 1 {
        println!("{} rules total", rules.len());
    }
    Ok(rules)
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_deref());

    let settings = config::load_settings_or_default();
    let directories = if args.no_default_rules {
        Vec::new()
    } else {
        config::rule_directories(&settings)
    };
    let rules = load_rules(&args, &directories)?;

    let mut options = MergeOptions::from(&settings);
    if let Some(policy) = args.on_conflict {
        options.policy = policy;
    }
    options.append_to_existing = args.append;
    options.log_rule_hits &= !args.quiet_rules;

    let summary = merge_files(&args.dst, &args.sources, &rules, &options, &mut StdinPrompt)
        .map_err(|e| e.to_string())?;

    println!("{summary}");
    Ok(())
}
