//! lamco-evdi - EVDI connection layer probe
//!
//! Entry point for the diagnostic binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use lamco_evdi::config::{default_config_path, Config};
use lamco_evdi::diagnostics::SystemReport;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lamco-evdi
#[derive(Parser, Debug)]
#[command(name = "lamco-evdi")]
#[command(version, about = "Version-adaptive EVDI connect layer", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAMCO_EVDI_CONFIG")]
    pub config: Option<String>,

    /// Explicit path to libevdi.so (overrides config and search)
    #[arg(long)]
    pub library_path: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Exit nonzero when the stack is unusable (for scripts)
    #[arg(long)]
    pub check: bool,

    /// Output format for the report (text|json)
    ///
    /// Default is human-readable text. Use json for machine parsing.
    #[arg(long, default_value = "text")]
    pub format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve config path: CLI flag, then XDG default if it exists
    let config_path = args.config.clone().unwrap_or_else(|| {
        let candidate = default_config_path();
        candidate.display().to_string()
    });

    // Silently fall back to defaults if the config doesn't exist yet
    let config = Config::load(&config_path).unwrap_or_default();
    let config = config.with_overrides(args.library_path.clone());
    config.validate()?;

    init_logging(&args, &config)?;

    info!("════════════════════════════════════════════");
    info!("  lamco-evdi v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "  Built: {}  Commit: {}",
        option_env!("BUILD_DATE").unwrap_or("unknown"),
        option_env!("GIT_HASH").unwrap_or("unknown")
    );
    info!("════════════════════════════════════════════");

    run_probe(&args, &config)
}

fn run_probe(args: &Args, config: &Config) -> Result<()> {
    let report = SystemReport::gather(config);

    if !report.usable() {
        warn!("EVDI stack is not usable on this system");
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    if args.check && !report.usable() {
        anyhow::bail!("EVDI stack is not usable (see report)");
    }
    Ok(())
}

fn init_logging(args: &Args, config: &Config) -> Result<()> {
    // CLI -v flag overrides config
    let log_level = if args.verbose > 0 {
        match args.verbose {
            1 => "debug",
            _ => "trace",
        }
    } else {
        config.logging.level.as_str()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("lamco_evdi={log_level},warn")));

    // CLI --log-format overrides config
    let log_format = args
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());

    // Reports go to stdout; logs stay on stderr so `--format json` output
    // remains parseable.
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
