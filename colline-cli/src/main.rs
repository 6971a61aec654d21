//! Colline CLI - Command-line interface for Colline
//!
//! Searches column-level lineage from the terminal and serves an
//! interactive lineage session to a renderer.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "colline")]
#[command(author = "Colline Contributors")]
#[command(version)]
#[command(about = "Explore column-level lineage of a dbt project", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Lineage API base URL (overrides config and COLLINE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Colline in a directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show the lineage of a table
    Search {
        /// Table to start from
        source: String,

        /// Column to open on the table (repeatable)
        #[arg(short, long = "column")]
        columns: Vec<String>,

        /// Hops to walk; -1 walks everything
        #[arg(short, long, allow_hyphen_values = true)]
        depth: Option<i64>,

        /// Table-level lineage instead of column-level
        #[arg(long)]
        table: bool,

        /// Output the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// List schemas
    Schemas,

    /// List the tables of a schema
    Sources {
        schema: String,
    },

    /// List the columns of a table
    Columns {
        schema: String,
        table: String,
    },

    /// Start the session server
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Headless mode: bind to 0.0.0.0 for remote access (WSL/Docker/Server)
        #[arg(long)]
        headless: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let api_url = cli.api_url;
    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Search {
            source,
            columns,
            depth,
            table,
            json,
        } => {
            let options = commands::SearchOptions {
                source,
                columns,
                depth,
                table,
                json,
            };
            commands::search(options, api_url).await
        }
        Commands::Schemas => commands::schemas(api_url).await,
        Commands::Sources { schema } => commands::sources(&schema, api_url).await,
        Commands::Columns { schema, table } => commands::columns(&schema, &table, api_url).await,
        Commands::Serve { port, headless } => commands::serve(port, headless, api_url).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
