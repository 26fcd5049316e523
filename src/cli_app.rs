//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use source_rewriter::core::config::Config;
use source_rewriter::core::errors::SrwError;
use source_rewriter::core::paths::{display_relative, resolve_absolute_path};
use source_rewriter::engine::diff::unified_diff;
use source_rewriter::engine::report::RunSummary;
use source_rewriter::engine::rewriter::FileRecord;
use source_rewriter::engine::{Orchestrator, RunRequest};
use source_rewriter::logger::activity::{ActivityLoggerConfig, spawn_logger};
use source_rewriter::rules::RuleSet;

/// Source rewriter: apply an ordered rule set across a source tree.
#[derive(Debug, Parser)]
#[command(
    name = "srw",
    author,
    version,
    about = "Source Rewriter - pattern-driven tree-wide rewrites",
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
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Delete obsolete files, then rewrite every candidate file under the root.
    Run(RunArgs),
    /// List the configured rules and whether each compiles.
    Rules,
    /// View and check configuration.
    Config(ConfigArgs),
    /// Print version information.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Tree to rewrite (overrides `engine.root`).
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,
    /// Compute and report changes without touching any file.
    #[arg(long)]
    dry_run: bool,
    /// Print a unified diff for every modified file.
    #[arg(long)]
    diff: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and compile every rule.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
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
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure, including an unusable root.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
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
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<SrwError> for CliError {
    fn from(err: SrwError) -> Self {
        match err {
            SrwError::InvalidConfig { .. }
            | SrwError::MissingConfig { .. }
            | SrwError::ConfigParse { .. }
            | SrwError::InvalidRule { .. }
            | SrwError::DuplicateRule { .. } => Self::User(err.to_string()),
            SrwError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_rewrite(cli, args),
        Command::Rules => run_rules(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_rewrite(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = &args.root {
        config.engine.root.clone_from(root);
    }
    if args.dry_run {
        config.engine.dry_run = true;
    }
    let mode = output_mode(cli);
    let hash = config.stable_hash()?;
    let request = RunRequest::from_config(&config)?;
    let display_root = resolve_absolute_path(&config.engine.root);

    if cli.verbose {
        eprintln!(
            "[SRW-RUN] config={} hash={hash} rules={} dry_run={}",
            config.config_file.display(),
            request.rules.len(),
            request.dry_run
        );
    }

    let logger = if config.logging.enabled {
        match spawn_logger(ActivityLoggerConfig {
            jsonl: config.logging.jsonl_config(),
            ..ActivityLoggerConfig::default()
        }) {
            Ok(pair) => Some(pair),
            Err(e) => {
                eprintln!("[SRW-LOG] activity log disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let mut diffs: Vec<Value> = Vec::new();
    let result = {
        let mut observe = |record: &FileRecord| {
            if !args.diff || !record.is_modified() {
                return;
            }
            let path = display_relative(&display_root, &record.path);
            let diff = unified_diff(&path, &record.original_content, &record.new_content);
            match mode {
                OutputMode::Human => {
                    if !cli.quiet {
                        print!("{diff}");
                    }
                }
                OutputMode::Json => diffs.push(json!({ "path": path, "diff": diff })),
            }
        };
        Orchestrator::new()
            .with_logger(logger.as_ref().map(|(handle, _)| handle))
            .with_config_hash(hash.as_str())
            .with_observer(&mut observe)
            .run(request)
    };

    if let Some((handle, join)) = logger {
        handle.shutdown();
        if join.join().is_err() {
            eprintln!("[SRW-LOG] logger thread panicked");
        }
    }

    let summary = result?;
    match mode {
        OutputMode::Human => print_summary_human(cli, &summary),
        OutputMode::Json => {
            let mut payload = json!({
                "command": "run",
                "config_hash": hash,
                "summary": serde_json::to_value(&summary)?,
            });
            if args.diff {
                payload["diffs"] = Value::Array(diffs);
            }
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_summary_human(cli: &Cli, summary: &RunSummary) {
    if cli.quiet {
        for err in summary.errors() {
            eprintln!("[{}] {}: {}", err.code, err.path.display(), err.reason);
        }
        for err in summary.rule_errors() {
            eprintln!("[SRW-2201] rule {}: {}", err.rule_id, err.reason);
        }
        return;
    }

    print!("{}", summary.render_human());
    if summary.is_clean() {
        println!("\n{}", "Done.".green());
    } else {
        let problems = summary.errors().len() + summary.rule_errors().len() + summary.skipped_dirs().len();
        println!("\n{}", format!("Done with {problems} problem(s).").yellow());
    }
}

fn run_rules(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let rows: Vec<Value> = config
        .rules
        .iter()
        .map(|spec| {
            let error = spec.build().err().map(|e| e.to_string());
            json!({
                "id": spec.id(),
                "kind": spec.kind(),
                "description": spec.description(),
                "ok": error.is_none(),
                "error": error,
            })
        })
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            if rows.is_empty() {
                println!("No rules configured ({}).", config.config_file.display());
                return Ok(());
            }
            let width = config.rules.iter().map(|spec| spec.id().len()).max().unwrap_or(0);
            for (index, (spec, row)) in config.rules.iter().zip(&rows).enumerate() {
                println!(
                    "{:>3}. {:<width$}  {:<16}  {}",
                    index + 1,
                    spec.id(),
                    spec.kind(),
                    spec.description()
                );
                if let Some(error) = row["error"].as_str() {
                    println!("       {} {error}", "error:".red());
                }
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({ "command": "rules", "rules": rows }))?;
        }
    }
    Ok(())
}

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
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => println!("{}", config.to_toml()?),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => validate_config(cli),
    }
}

/// Unlike a run, which disables rules that fail to compile, validation
/// rejects them.
fn validate_config(cli: &Cli) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let checked = Config::load(cli.config.as_deref()).and_then(|config| {
        let rules = RuleSet::from_specs(&config.rules)?;
        let hash = config.stable_hash()?;
        Ok((config, rules, hash))
    });

    let (config, rules, hash) = match checked {
        Ok(parts) => parts,
        Err(e) => {
            report_invalid(mode, &e.to_string(), &[])?;
            return Err(CliError::User(format!("invalid config: {e}")));
        }
    };

    if !rules.disabled().is_empty() {
        let failures: Vec<String> = rules
            .disabled()
            .iter()
            .map(|diag| format!("{}: {}", diag.rule_id, diag.reason))
            .collect();
        report_invalid(mode, "rules failed to compile", &failures)?;
        return Err(CliError::User(format!(
            "invalid config: {} rule(s) failed to compile",
            failures.len()
        )));
    }

    match mode {
        OutputMode::Human => {
            println!("{}", "Configuration is valid.".green());
            println!("  Source: {}", config.config_file.display());
            println!("  Rules: {}", rules.len());
            println!("  Hash: {hash}");
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "config validate",
                "valid": true,
                "path": config.config_file.to_string_lossy(),
                "rules": rules.len(),
                "hash": hash,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn report_invalid(mode: OutputMode, error: &str, rule_failures: &[String]) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            eprintln!("{} {error}", "Configuration is INVALID:".red());
            for failure in rule_failures {
                eprintln!("  {failure}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "config validate",
                "valid": false,
                "error": error,
                "rule_errors": rule_failures,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("srw {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "srw",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SRW_OUTPUT_FORMAT").ok();
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
