//! apicheck CLI - derive and run API contract tests

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use apicheck_core::dryrun::{Validation, ValidationStatus, validate_config};
use apicheck_core::{Config, DryRunPlan, aggregate, to_http_file};
use apicheck_runner::{ExecutionEngine, load_source};

#[derive(Parser)]
#[command(name = "apicheck")]
#[command(about = "Derive and run API contract tests from OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose logging (same as RUST_LOG=debug for apicheck crates)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive test cases and run them against the API
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Output directory for report.json and reproductions.http
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show the derived cases without sending requests
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for report.json
    Schema,
}

/// What to test and with which credentials.
#[derive(Args)]
struct TargetArgs {
    /// Contract file (OpenAPI JSON/YAML or simplified suite)
    #[arg(long)]
    contract: Option<PathBuf>,

    /// Config file (default: .apicheck.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL overriding the contract's first server
    #[arg(long)]
    base_url: Option<String>,

    /// API key for apiKey-secured operations
    #[arg(long)]
    api_key: Option<String>,

    /// Bearer token for bearer-secured operations
    #[arg(long)]
    bearer: Option<String>,
}

impl TargetArgs {
    /// Load the config file and apply flag overrides on top of it.
    fn resolve(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_default()?,
        };
        if let Some(contract) = &self.contract {
            cfg.contract.clone_from(contract);
        }
        if self.base_url.is_some() {
            cfg.base_url.clone_from(&self.base_url);
        }
        if self.api_key.is_some() {
            cfg.credentials.api_key.clone_from(&self.api_key);
        }
        if self.bearer.is_some() {
            cfg.credentials.bearer.clone_from(&self.bearer);
        }
        Ok(cfg)
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

/// Logs go to stderr; stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "apicheck=debug,apicheck_core=debug,apicheck_runner=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            target,
            concurrency,
            timeout,
            output_dir,
        } => {
            let mut cfg = target.resolve()?;
            if let Some(n) = concurrency {
                cfg.concurrency = n;
            }
            if timeout.is_some() {
                cfg.timeout_secs = timeout;
            }
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }

            let engine = ExecutionEngine::from_config(&cfg)?;
            let source = load_source(&cfg.contract)
                .with_context(|| format!("loading contract {}", cfg.contract.display()))?;
            let cases = source.cases(cfg.base_url.as_deref());

            if cli.output == OutputFormat::Terminal {
                eprintln!("Config:");
                eprintln!("  contract:    {} ({})", cfg.contract.display(), source.kind());
                eprintln!(
                    "  base_url:    {}",
                    cfg.base_url.as_deref().unwrap_or(source.base_url())
                );
                eprintln!("  concurrency: {}", cfg.concurrency);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:     {} configured", cfg.headers.len());
                }
                eprintln!("  cases:       {}", cases.len());
                eprintln!();
            }

            // No cases means nothing was checked: the empty report is still
            // written, but the run is a tool error
            if cases.is_empty() {
                let report_path = write_report(&cfg.output_dir, &aggregate(Vec::new()))?;
                eprintln!(
                    "Error: No test cases derived. Check the contract's paths. Empty report: {}",
                    report_path.display()
                );
                return Ok(3);
            }

            let results = engine.execute(cases, &cfg.credentials)?;
            let report = aggregate(results);

            let report_path = write_report(&cfg.output_dir, &report)?;
            let http_path = if report.all_passed() {
                None
            } else {
                write_reproductions(&cfg.output_dir, &report)
            };

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{}", report.to_terminal());
                    println!();
                    println!("Report: {}", report_path.display());
                    if let Some(path) = http_path {
                        println!("Reproductions: {}", path.display());
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Silent => {}
            }

            Ok(u8::from(!report.all_passed()))
        }

        Commands::Plan { target } => {
            let cfg = target.resolve()?;
            let mut validations = validate_config(&cfg);

            let cases = match load_source(&cfg.contract) {
                Ok(source) => source.cases(cfg.base_url.as_deref()),
                Err(e) => {
                    validations.push(Validation {
                        check: "contract_parse".into(),
                        status: ValidationStatus::Error,
                        message: e.to_string(),
                    });
                    Vec::new()
                }
            };
            if validations.iter().all(|v| v.check != "contract_parse") {
                validations.push(Validation {
                    check: "contract_parse".into(),
                    status: if cases.is_empty() {
                        ValidationStatus::Error
                    } else {
                        ValidationStatus::Ok
                    },
                    message: format!("contract parsed: {} cases derived", cases.len()),
                });
            }

            let plan = DryRunPlan::from_cases(&cases, validations);
            match cli.output {
                OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Silent => {}
            }
            Ok(u8::from(plan.has_errors()))
        }

        Commands::Init => {
            let config_path = ".apicheck.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - contract: path to your OpenAPI document or suite");
            println!("  - base_url: server to test");
            println!("  - credentials: API key and/or bearer token");
            println!("  - headers: extra headers for every request");
            Ok(0)
        }

        Commands::Schema => {
            let schema = apicheck_core::schema::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}

/// Write `report.json`, replacing the previous run's report.
fn write_report(dir: &Path, report: &apicheck_core::Report) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join("report.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(path)
}

/// Write `reproductions.http` for non-passing cases. Failure to write is only
/// a warning; the report is already on disk.
fn write_reproductions(dir: &Path, report: &apicheck_core::Report) -> Option<PathBuf> {
    let path = dir.join("reproductions.http");
    let content = to_http_file(&report.results, "base_url");
    match std::fs::write(&path, content) {
        Ok(()) => Some(path),
        Err(e) => {
            eprintln!("Warning: failed to write .http file: {e}");
            None
        }
    }
}
