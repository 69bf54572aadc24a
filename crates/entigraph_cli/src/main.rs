//! Entigraph CLI
//!
//! Command-line tools for exploring an entity graph loaded from a JSON
//! fixture document (`{ "<resource>": [records…] }`).
//!
//! # Commands
//!
//! - `fetch` - Decode one entity and print a summary once its relations resolve
//! - `list` - List the ids of matching records
//! - `encode project` - Print the outbound payload of a project
//! - `scopes` - Load every unit roster and print cache scope sizes

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Entigraph command-line tools.
#[derive(Parser)]
#[command(name = "entigraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON fixture document
    #[arg(global = true, short, long)]
    fixtures: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one entity and print a JSON summary
    Fetch {
        /// Resource name (campuses, users, units, projects)
        resource: String,

        /// Entity id
        id: String,
    },

    /// List the ids of matching records
    List {
        /// Resource name (campuses, users, units, projects)
        resource: String,

        /// Equality filter, repeatable (key=value)
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Print the outbound payload of an entity
    Encode {
        #[command(subcommand)]
        target: EncodeTarget,
    },

    /// Load every unit roster and print cache scope sizes
    Scopes {
        /// Include withdrawn students in rosters
        #[arg(short, long)]
        all: bool,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum EncodeTarget {
    /// Encode a project
    Project {
        /// Project id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Commands::Fetch { resource, id } => {
            let path = cli.fixtures.ok_or("Fixtures path required for fetch")?;
            let services = commands::open(&path)?;
            commands::fetch::run(&services, &resource, &id).await?
        }
        Commands::List { resource, filters } => {
            let path = cli.fixtures.ok_or("Fixtures path required for list")?;
            let services = commands::open(&path)?;
            commands::list::run(&services, &resource, &filters).await?
        }
        Commands::Encode {
            target: EncodeTarget::Project { id },
        } => {
            let path = cli.fixtures.ok_or("Fixtures path required for encode")?;
            let services = commands::open(&path)?;
            commands::encode::project(&services, &id).await?
        }
        Commands::Scopes { all } => {
            let path = cli.fixtures.ok_or("Fixtures path required for scopes")?;
            let services = commands::open(&path)?;
            commands::scopes::run(&services, all).await?
        }
        Commands::Version => format!(
            "Entigraph CLI v{}\nEntigraph Core v{}",
            env!("CARGO_PKG_VERSION"),
            entigraph_core::VERSION
        ),
    };
    println!("{output}");

    Ok(())
}
