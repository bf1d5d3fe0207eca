//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use smartnav::core::config::Config;
use smartnav::detector::Detector;
use smartnav::detector::candidate::Candidate;
use smartnav::detector::text::page_key;
use smartnav::dom::Dom;
use smartnav::dom::snapshot::PageSnapshot;
use smartnav::keys::KeyEvent;
use smartnav::logger::{ActivityLog, JsonlConfig, JsonlWriter, NullLog};
use smartnav::navigator::schedule::{Clock, ManualClock, SystemClock};
use smartnav::navigator::session::{NavigatorSession, SessionParts};
use smartnav::presenter::RecordingPresenter;
use smartnav::stats::backend::{FileStore, KeyValueStore, MemoryStore};
use smartnav::stats::export::ExportDocument;
use smartnav::stats::session_log::SessionLog;
use smartnav::stats::store::{StatsRecorder, click_rate_percent};

/// smartnav: rank the prominent buttons of a page and cycle through them.
#[derive(Debug, Parser)]
#[command(
    name = "smartnav",
    author,
    version,
    about = "Keyboard navigation over a page's most prominent buttons",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Rank the candidates of a page snapshot.
    Detect(DetectArgs),
    /// Replay key presses against a page snapshot.
    Simulate(SimulateArgs),
    /// Inspect or export usage statistics.
    Stats(StatsArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Page snapshot (JSON).
    #[arg(value_name = "SNAPSHOT")]
    snapshot: PathBuf,
    /// Show the score ledger of every candidate.
    #[arg(long)]
    explain: bool,
}

#[derive(Debug, Clone, Args)]
struct SimulateArgs {
    /// Page snapshot (JSON).
    #[arg(value_name = "SNAPSHOT")]
    snapshot: PathBuf,
    /// Comma-separated keys, e.g. `Tab,Tab,Shift+Tab,Enter`.
    #[arg(long, value_delimiter = ',', required = true, value_name = "KEYS")]
    keys: Vec<String>,
    /// Simulated time between key presses.
    #[arg(long, default_value_t = 100, value_name = "MS")]
    step_ms: u64,
    /// Keep statistics in memory instead of the storage file.
    #[arg(long)]
    ephemeral: bool,
}

#[derive(Debug, Clone, Args)]
struct StatsArgs {
    #[command(subcommand)]
    command: StatsCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum StatsCommand {
    /// Print per-page counters and click rates.
    Show {
        /// Only this page key (e.g. `mail.example.com/mail`).
        #[arg(long, value_name = "PAGE")]
        page: Option<String>,
    },
    /// Write the export document into a directory.
    Export {
        #[arg(long, default_value = ".", value_name = "DIR")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Detect(args) => run_detect(cli, args),
        Command::Simulate(args) => run_simulate(cli, args),
        Command::Stats(args) => run_stats(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn load_snapshot(path: &std::path::Path) -> Result<PageSnapshot, CliError> {
    PageSnapshot::load(path).map_err(|e| CliError::User(format!("snapshot: {e}")))
}

// ---------------------------------------------------------------------------
// detect
// ---------------------------------------------------------------------------

fn run_detect(cli: &Cli, args: &DetectArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let page = load_snapshot(&args.snapshot)?;
    let detector = Detector::new(&config).map_err(|e| CliError::Runtime(e.to_string()))?;
    let list = detector.detect(&page);
    let pass = detector.last_stats();

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{} {} candidates on {} ({} examined)",
                "detect:".bold(),
                list.real_len(),
                page_key(&page.location()),
                pass.examined
            );
            for (index, candidate) in list.iter().enumerate() {
                match candidate {
                    Candidate::Real(real) => {
                        println!(
                            "  {index:>2}. {:<28} {:>8.1}  {}",
                            real.text,
                            real.score,
                            real.selector_hint.dimmed()
                        );
                        if args.explain {
                            println!("        {}", real.breakdown.summary());
                        }
                    }
                    Candidate::Synthetic(entry) => {
                        println!("  {index:>2}. {}", entry.label.italic());
                    }
                }
            }
        }
        OutputMode::Json => {
            let candidates = list
                .iter()
                .map(|candidate| match candidate {
                    Candidate::Real(real) => Ok(json!({
                        "text": real.text,
                        "elementKey": real.element_key,
                        "selectorHint": real.selector_hint,
                        "score": real.score,
                        "rect": serde_json::to_value(real.rect)?,
                        "source": serde_json::to_value(real.source)?,
                        "breakdown": if args.explain {
                            serde_json::to_value(&real.breakdown)?
                        } else {
                            Value::Null
                        },
                    })),
                    Candidate::Synthetic(entry) => Ok(json!({
                        "text": entry.label,
                        "selectorHint": entry.selector_hint(),
                        "synthetic": true,
                    })),
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;
            write_json_line(&json!({
                "command": "detect",
                "page": page_key(&page.location()),
                "pass": serde_json::to_value(pass)?,
                "candidates": candidates,
            }))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// simulate
// ---------------------------------------------------------------------------

fn run_simulate(cli: &Cli, args: &SimulateArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut page = load_snapshot(&args.snapshot)?;
    let clock = ManualClock::default();
    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(&config.paths.storage_file))
    };
    let activity: Box<dyn ActivityLog> = if args.ephemeral {
        Box::new(NullLog)
    } else {
        Box::new(JsonlWriter::open(JsonlConfig::at(&config.paths.activity_log)))
    };
    let mut session = NavigatorSession::new(
        &config,
        SessionParts {
            store,
            clock: Arc::new(clock.clone()),
            presenter: Box::new(RecordingPresenter::new()),
            activity,
        },
    )
    .map_err(|e| CliError::Runtime(e.to_string()))?;
    session.start();

    let mode = output_mode(cli);
    let mut steps = Vec::with_capacity(args.keys.len());
    for raw in &args.keys {
        clock.advance_ms(args.step_ms);
        session.tick(&page);
        let event = KeyEvent::parse(raw);
        let disposition = session.handle_key(&mut page, &event);
        let selected = session
            .navigator()
            .selected()
            .map(|c| c.text().to_string());
        match mode {
            OutputMode::Human => {
                let verdict = if disposition.prevent_default {
                    "intercepted".green()
                } else {
                    "passed".yellow()
                };
                let target = selected.as_deref().unwrap_or("-");
                print!("{:<12} {verdict:<12} {target}", event.to_string());
                if let Some(message) = &disposition.message {
                    print!("  ({message})");
                }
                println!();
            }
            OutputMode::Json => steps.push(json!({
                "key": event.to_string(),
                "preventDefault": disposition.prevent_default,
                "selected": selected,
                "highlight": serde_json::to_value(session.highlight())?,
                "message": disposition.message,
            })),
        }
    }

    let outcome = session.end();
    match mode {
        OutputMode::Human => println!("{} {outcome:?}", "stats:".bold()),
        OutputMode::Json => write_json_line(&json!({
            "command": "simulate",
            "steps": steps,
            "tabPresses": session.session_log().tab_presses(),
            "accepted": session.session_log().accepted().len(),
            "flush": format!("{outcome:?}"),
        }))?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

fn open_recorder(config: &Config) -> StatsRecorder {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.paths.storage_file));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    StatsRecorder::new(store, clock, &config.stats)
}

fn run_stats(cli: &Cli, args: &StatsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut recorder = open_recorder(&config);
    let loaded = recorder.ensure_loaded().clone();

    match &args.command {
        StatsCommand::Show { page } => {
            let mut db = recorder.snapshot();
            if let Some(page) = page {
                db.retain(|key, _| key == page);
            }
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{} {loaded:?}", "storage:".bold());
                    for (key, stats) in &db {
                        println!("{} ({} selections)", key.bold(), stats.total_selections);
                        for (element, counts) in &stats.buttons {
                            println!(
                                "  {element:<32} shown {:>5}  clicked {:>5}  rate {:>5}%",
                                counts.shown,
                                counts.clicked,
                                click_rate_percent(counts.clicked, stats.total_selections)
                            );
                        }
                    }
                    if db.is_empty() {
                        println!("  (no statistics recorded)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "stats show",
                    "stats": serde_json::to_value(&db)?,
                }))?,
            }
        }
        StatsCommand::Export { out } => {
            let now = SystemClock::new().wall_time();
            let mut log = SessionLog::started_at(now);
            log.end(now);
            let document = ExportDocument::build(now, &log, recorder.snapshot());
            let path = document
                .write_to_dir(out)
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => println!("exported to {}", path.display()),
                OutputMode::Json => write_json_line(&json!({
                    "command": "stats export",
                    "path": path.to_string_lossy(),
                }))?,
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = config
                        .to_toml()
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        }))?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        }))?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// output
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SMARTNAV_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
