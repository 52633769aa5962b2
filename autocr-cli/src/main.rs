//! autocr CLI - automatic code review on commit and merge
//!
//! Watches a repository and asks the editor's assistant to review new commits
//! and merges.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ConfigArgs, Context, HooksArgs, ReviewArgs, WatchArgs};

/// autocr: automatic code review requests on commit and merge
#[derive(Parser, Debug)]
#[command(name = "autocr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the repository and global files
    #[arg(long, global = true, env = "AUTOCR_CONFIG")]
    config: Option<PathBuf>,

    /// Repository to operate on (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Review without asking for confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Watch the repository and request reviews for new commits and merges
    #[command(visible_alias = "w")]
    Watch(WatchArgs),

    /// Request a review for one commit now
    Review(ReviewArgs),

    /// Install or inspect the git hooks
    Hooks(HooksArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Keeps the log file writer alive until exit
struct LogGuard {
    _guard: Option<WorkerGuard>,
    path: Option<PathBuf>,
}

/// Log to stderr and, when the cache directory is writable, to
/// `<cache_dir>/autocr/autocr.log`
fn init_tracing(verbose: bool) -> LogGuard {
    let filter = || {
        if verbose {
            EnvFilter::new("warn,autocr=debug,autocr_core=debug")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,autocr=info,autocr_core=info"))
        }
    };

    let log_dir = dirs::cache_dir().map(|d| d.join("autocr"));
    let appender = log_dir.as_ref().and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix("autocr.log")
            .build(dir)
            .ok()
    });

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter()))
        .with(file_layer)
        .init();

    LogGuard {
        path: guard
            .as_ref()
            .and(log_dir.map(|d| d.join("autocr.log"))),
        _guard: guard,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log = init_tracing(cli.verbose);
    if cli.verbose {
        tracing::info!(log_file = ?log.path, "Verbose mode enabled");
    }

    let ctx = Context {
        verbose: cli.verbose,
        config: cli.config,
        repo: match cli.repo {
            Some(path) => path,
            None => std::env::current_dir()?,
        },
        yes: cli.yes,
        log_file: log.path.clone(),
    };

    match cli.command {
        Some(Commands::Version) => {
            println!("autocr {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Watch(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Review(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Hooks(args)) => {
            args.execute(&ctx)?;
        }
        Some(Commands::Config(args)) => {
            args.execute(&ctx)?;
        }
        None => {
            println!("autocr - automatic code review on commit and merge");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
