//! Server status commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_json, print_table, print_warning, OutputFormat};

/// Row for component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show server health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("{} {}", "Server health:".bold(), color_status(&health.status));
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    last_check: format_timestamp(&component.last_check),
                })
                .collect();
            print_table(&rows);

            if health.status != "healthy" {
                println!();
                print_warning("Snapshots may be missing resources from failing sources");
            }
        }
    }

    Ok(())
}

/// Show server version
pub async fn show_version(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let version = client.version().await?;

    match format {
        OutputFormat::Json => print_json(&version)?,
        OutputFormat::Table => {
            println!("ctxg:    {}", env!("CARGO_PKG_VERSION"));
            println!("server:  {}", version.version.cyan());
        }
    }

    Ok(())
}
