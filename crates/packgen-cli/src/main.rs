//! packgen CLI - turn Kubernetes manifests into a Sherpack pack

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "packgen")]
#[command(author = "packgen Contributors")]
#[command(version)]
#[command(about = "Turn a directory of Kubernetes manifests into a Sherpack pack", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,
}

/// Options shared by every command that reads manifests
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Manifest file or directory
    pub input: PathBuf,

    /// Configuration file (default: packgen.yaml next to the manifests)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pack name (default: input directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Pack version (SemVer)
    #[arg(long = "pack-version")]
    pub pack_version: Option<String>,

    /// Payloads larger than this many bytes go to files/
    #[arg(long)]
    pub size_threshold: Option<usize>,

    /// Payloads with more lines than this go to files/
    #[arg(long)]
    pub line_threshold: Option<usize>,

    /// Process resources one at a time
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert manifests into a pack
    Convert {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory (default: <input>-pack in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write into a non-empty output directory
        #[arg(long)]
        force: bool,

        /// Show what would be generated without writing anything
        #[arg(long)]
        dry_run: bool,

        /// List every note, including informational ones
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show how each resource would be converted
    Inspect {
        #[command(flatten)]
        input: InputArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            force,
            dry_run,
            verbose,
        } => commands::convert::run(&input, output.as_deref(), force, dry_run, verbose),

        Commands::Inspect { input, json } => commands::inspect::run(&input, json),
    };

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    }
}
