use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use xpm::core::CancelFlag;

mod cli;

#[derive(Parser)]
#[command(name = "xpm")]
#[command(about = "Install the packages an extension requires into its vendor directory")]
#[command(version)]
struct Cli {
    /// Directory extensions are looked up in by name
    #[arg(long, global = true)]
    extensions_dir: Option<PathBuf>,
    /// Cache directory for indexes and archives
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Config file to use instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages, following the lock file when it is current
    Install {
        /// Extension name or path
        extension: String,
        /// Resolve afresh and rewrite the lock file
        #[arg(short, long)]
        update: bool,
    },
    /// Same as `install --update`
    Update {
        /// Extension name or path
        extension: String,
    },
    /// List installed packages
    List {
        /// Extension name or path
        extension: String,
    },
    /// Verify installed packages against their recorded checksums
    Verify {
        /// Extension name or path
        extension: String,
    },
    /// Remove old or excess files from the download cache
    CleanCache {
        /// Remove files older than this many days
        #[arg(long, default_value_t = 30)]
        max_age_days: u64,
        /// Then remove oldest files until the cache is below this size
        #[arg(long, default_value_t = 1024)]
        max_size_mb: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli::GlobalOptions {
        extensions_dir: cli.extensions_dir,
        cache_dir: cli.cache_dir,
        config: cli.config,
    };

    // Ctrl-C stops the run at the next safe point
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping...");
            on_interrupt.cancel();
        }
    });

    let result = match cli.command {
        Commands::Install { extension, update } => {
            cli::install::run(&options, &extension, update, cancel).await
        }
        Commands::Update { extension } => cli::install::run(&options, &extension, true, cancel).await,
        Commands::List { extension } => cli::list::run(&options, &extension),
        Commands::Verify { extension } => cli::verify::run(&options, &extension),
        Commands::CleanCache {
            max_age_days,
            max_size_mb,
        } => cli::clean::run(&options, max_age_days, max_size_mb),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", xpm::format_error_with_help(&e));
            ExitCode::FAILURE
        }
    }
}
