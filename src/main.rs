use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routeguard::cli::Output;
use routeguard::cli::commands;

#[derive(Parser)]
#[command(name = "routeguard")]
#[command(
    version,
    about = "Multi-tenant LLM provider routing and cost governance"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize routeguard in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Manage tenant spend limits
    Limits {
        #[command(subcommand)]
        action: LimitsAction,
    },

    /// Record token usage
    Usage {
        #[command(subcommand)]
        action: UsageAction,
    },

    /// Check a tenant against its monthly limits
    Check {
        #[arg(help = "Tenant ID")]
        tenant: String,
        #[arg(long, help = "Feature key recorded on alerts")]
        feature: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Rank routing candidates for a tenant
    Rank {
        #[arg(help = "Tenant ID")]
        tenant: String,
        #[arg(
            long = "candidate",
            short = 'c',
            help = "Candidate as provider/model (repeatable; defaults to config)"
        )]
        candidates: Vec<String>,
        #[arg(long, help = "Seed for a reproducible selection")]
        seed: Option<u64>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Record the outcome of an AI call
    Record {
        #[arg(help = "Tenant ID")]
        tenant: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
        #[arg(long = "latency-ms", help = "Observed latency in milliseconds")]
        latency_ms: f64,
        #[arg(long = "cost-per-1k", help = "Observed cost per 1000 tokens")]
        cost_per_1k: f64,
        #[arg(long, help = "Quality rating, 0-100")]
        quality: f64,
        #[arg(long, help = "Mark the call as failed")]
        failed: bool,
        #[arg(long, default_value = "0", help = "Tokens to bill to the tenant")]
        tokens: u64,
    },

    /// List provider metrics
    Metrics {
        #[arg(long, short, help = "Only rows for this tenant")]
        tenant: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum LimitsAction {
    /// Set monthly limits (omitted values are kept)
    Set {
        tenant: String,
        #[arg(long, help = "Monthly token limit (0 = unlimited)")]
        tokens: Option<f64>,
        #[arg(long, help = "Monthly cost limit (0 = unlimited)")]
        cost: Option<f64>,
        #[arg(long, help = "Warning threshold percent, 1-99")]
        threshold: Option<f64>,
    },
    /// Show limits and current usage
    Show {
        tenant: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
}

#[derive(Subcommand)]
enum UsageAction {
    /// Append a usage record for the current month
    Add {
        tenant: String,
        tokens: u64,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mrouteguard encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "routeguard=debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Limits { action } => match action {
            LimitsAction::Set {
                tenant,
                tokens,
                cost,
                threshold,
            } => {
                commands::limits::set(&tenant, tokens, cost, threshold)?;
            }
            LimitsAction::Show { tenant, format } => {
                commands::limits::show(&tenant, &format)?;
            }
        },
        Commands::Usage { action } => match action {
            UsageAction::Add {
                tenant,
                tokens,
                provider,
                model,
            } => {
                commands::usage::add(&tenant, tokens, provider, model)?;
            }
        },
        Commands::Check {
            tenant,
            feature,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::check::run(&tenant, feature, &format))?;
        }
        Commands::Rank {
            tenant,
            candidates,
            seed,
            format,
        } => {
            commands::rank::run(&tenant, &candidates, seed, &format)?;
        }
        Commands::Record {
            tenant,
            provider,
            model,
            latency_ms,
            cost_per_1k,
            quality,
            failed,
            tokens,
        } => {
            commands::record::run(commands::record::RecordArgs {
                tenant,
                provider,
                model,
                latency_ms,
                cost_per_1k,
                quality,
                failed,
                tokens,
            })?;
        }
        Commands::Metrics { tenant, format } => {
            commands::metrics::run(tenant, &format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
