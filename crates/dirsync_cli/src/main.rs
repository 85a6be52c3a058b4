//! dirsync CLI
//!
//! Command-line tools for directory synchronization.
//!
//! # Commands
//!
//! - `run` - Run one synchronization
//! - `schedule` - Run synchronizations periodically
//! - `inspect` - Display catalog statistics and contents
//! - `add-user` - Add a user to the catalog
//! - `add-group` - Add a group to the catalog

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Directory-to-catalog synchronization tools.
#[derive(Parser)]
#[command(name = "dirsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the catalog directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization
    Run {
        /// Job configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Exit with an error status if the run failed
        #[arg(long)]
        strict: bool,
    },

    /// Run synchronizations periodically
    Schedule {
        /// Job configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Seconds between the start of consecutive runs
        #[arg(short, long, default_value = "3600")]
        interval: u64,

        /// Stop after this many runs
        #[arg(short, long)]
        runs: Option<u64>,
    },

    /// Display catalog statistics and contents
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Add a user to the catalog
    AddUser {
        /// Login name
        name: String,

        /// Mark the user as directory-sourced
        #[arg(long)]
        ldap: bool,

        /// Group to add the user to
        #[arg(short, long)]
        group: Option<String>,

        /// Profile in the group
        #[arg(long, default_value = "RegisteredUser")]
        profile: String,

        /// Contact address
        #[arg(long)]
        email: Option<String>,
    },

    /// Add a group to the catalog
    AddGroup {
        /// Group name
        name: String,

        /// Group description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            format,
            strict,
        } => {
            let path = cli.path.ok_or("Catalog path required for run")?;
            commands::run::run(&path, &config, &format, strict)?;
        }
        Commands::Schedule {
            config,
            interval,
            runs,
        } => {
            let path = cli.path.ok_or("Catalog path required for schedule")?;
            commands::schedule::run(&path, &config, interval, runs)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Catalog path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::AddUser {
            name,
            ldap,
            group,
            profile,
            email,
        } => {
            let path = cli.path.ok_or("Catalog path required for add-user")?;
            let request = commands::add_user::AddUser {
                name,
                ldap,
                group,
                profile,
                email,
            };
            commands::add_user::run(&path, &request)?;
        }
        Commands::AddGroup { name, description } => {
            let path = cli.path.ok_or("Catalog path required for add-group")?;
            commands::add_group::run(&path, &name, description)?;
        }
        Commands::Version => {
            println!("dirsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("catalog format v{}", dirsync_catalog::FORMAT_VERSION);
        }
    }

    Ok(())
}
