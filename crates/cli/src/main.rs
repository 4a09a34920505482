//! Context graph CLI
//!
//! A command-line tool for querying the resources and relations of a
//! cluster from the context graph server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{graph, status};
use output::OutputFormat;

/// Context graph CLI
#[derive(Parser, Debug)]
#[command(name = "ctxg")]
#[command(author, version, about = "CLI for the Context Graph server", long_about = None)]
pub struct Cli {
    /// Server URL (can also be set via CTXG_SERVER_URL env var)
    #[arg(long, env = "CTXG_SERVER_URL")]
    pub server_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List resources without relations
    Resources {
        /// Only this type (e.g. pods, nodes, rc, images)
        #[arg(long, short)]
        kind: Option<String>,
    },

    /// Show the full graph
    Graph {
        /// Print the graph in Graphviz DOT
        #[arg(long)]
        dot: bool,
    },

    /// List relations
    Relations {
        /// Only this relation (contains, runs, monitors, loadBalances, createdFrom)
        #[arg(long = "type", short)]
        relation: Option<String>,
    },

    /// Show server health
    Health,

    /// Show client and server versions
    Version,
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref()?.parse().ok())
        .unwrap_or_default();

    // Initialize client
    let client = client::ApiClient::new(&config.server_url(cli.server_url.as_deref()))?;

    // Execute command
    match cli.command {
        Commands::Resources { kind } => graph::show_resources(&client, kind, format).await?,
        Commands::Graph { dot } => graph::show_graph(&client, dot, format).await?,
        Commands::Relations { relation } => graph::show_relations(&client, relation, format).await?,
        Commands::Health => status::show_health(&client, format).await?,
        Commands::Version => status::show_version(&client, format).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
