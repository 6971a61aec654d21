//! CLI command implementations.

use crate::config::Config;
use colline_client::HttpResolver;
use colline_core::{Depth, DisplayMode, LineageNode};
use colline_graph::{GraphSnapshot, LayeredLayout, LineageSession, NodeGeometry};
use colline_server::{ServerConfig, SessionServer};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Options of `colline search`.
pub struct SearchOptions {
    pub source: String,
    pub columns: Vec<String>,
    pub depth: Option<i64>,
    pub table: bool,
    pub json: bool,
}

fn load_config(api_url: Option<String>) -> Result<Config> {
    let root = std::env::current_dir()?;
    let mut config = Config::load(&root)?;
    config.client.override_base_url(api_url);
    config.client.validate()?;
    Ok(config)
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    Ok(spinner)
}

/// Initialize Colline in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = Config::path(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    Config::default().save(path)?;

    println!("{} Initialized Colline in {}", "✓".green(), path.display());
    println!(
        "  Edit {} to point at your lineage API",
        config_path.display().to_string().cyan()
    );

    Ok(())
}

/// Size a renderer would give a node: a header plus one row per column.
fn estimated_geometry(snapshot: &GraphSnapshot, mode: DisplayMode) -> HashMap<String, NodeGeometry> {
    snapshot
        .nodes
        .iter()
        .map(|node| {
            let rows = match mode {
                DisplayMode::Column => node.columns().len(),
                DisplayMode::Table => 0,
            };
            (node.id.clone(), NodeGeometry::new(240.0, 48.0 + 28.0 * rows as f64))
        })
        .collect()
}

fn print_node(node: &LineageNode) {
    let materialization = node
        .data
        .materialization
        .as_ref()
        .map(|m| format!(" [{}]", m))
        .unwrap_or_default();
    let mut flags = Vec::new();
    if node.data.is_source_boundary {
        flags.push("source");
    }
    if node.data.is_sink_boundary {
        flags.push("sink");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    println!(
        "  {}.{}{}{}",
        node.data.schema.dimmed(),
        node.table_name().cyan(),
        materialization.yellow(),
        flags.dimmed()
    );
    for column in node.columns().iter() {
        println!("      {}", column);
    }
}

/// Run an initial lineage search and print the result.
pub async fn search(options: SearchOptions, api_url: Option<String>) -> Result<()> {
    let config = load_config(api_url)?;
    let resolver = HttpResolver::new(&config.client)?;

    let mut session_config = config.session.clone();
    if options.table {
        session_config.mode = DisplayMode::Table;
    }
    let mut session = LineageSession::new(session_config);

    let mut columns = BTreeMap::new();
    if !options.columns.is_empty() {
        columns.insert(options.source.clone(), options.columns.clone());
    }

    let progress = spinner(&format!("Fetching lineage of {}...", options.source))?;
    let outcome = session
        .search(
            &resolver,
            vec![options.source.clone()],
            columns,
            options.depth.map(Depth::from),
        )
        .await;
    progress.finish_and_clear();
    outcome?;

    let geometry = estimated_geometry(&session.snapshot(), session.mode());
    session.apply_layout(&LayeredLayout::default(), &geometry);
    let snapshot = session.snapshot();

    if options.json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No lineage found for \"{}\"", options.source);
        return Ok(());
    }

    println!(
        "{} {} tables, {} edges ({} mode)\n",
        "✓".green(),
        snapshot.node_count().to_string().cyan(),
        snapshot.edge_count().to_string().cyan(),
        session.mode()
    );

    let mut nodes: Vec<&LineageNode> = snapshot.nodes.iter().collect();
    nodes.sort_by(|a, b| {
        a.position
            .x
            .total_cmp(&b.position.x)
            .then(a.position.y.total_cmp(&b.position.y))
    });
    for node in nodes {
        print_node(node);
    }

    Ok(())
}

/// List the schemas of the dbt project.
pub async fn schemas(api_url: Option<String>) -> Result<()> {
    let config = load_config(api_url)?;
    let resolver = HttpResolver::new(&config.client)?;

    for schema in resolver.schemas().await? {
        println!("  {}", schema.label);
    }
    Ok(())
}

/// List the tables of a schema, grouped by folder.
pub async fn sources(schema: &str, api_url: Option<String>) -> Result<()> {
    let config = load_config(api_url)?;
    let resolver = HttpResolver::new(&config.client)?;

    let groups = resolver.sources(schema).await?;
    if groups.is_empty() {
        println!("No tables in schema \"{}\"", schema);
        return Ok(());
    }

    for group in groups {
        println!("{}", group.label.yellow());
        for option in group.options {
            println!("  {}", option.label.cyan());
        }
    }
    Ok(())
}

/// List the columns of a table.
pub async fn columns(schema: &str, table: &str, api_url: Option<String>) -> Result<()> {
    let config = load_config(api_url)?;
    let resolver = HttpResolver::new(&config.client)?;

    for column in resolver.columns(schema, table).await? {
        match column.description {
            Some(description) => println!("  {} {}", column.label.cyan(), description.dimmed()),
            None => println!("  {}", column.label.cyan()),
        }
    }
    Ok(())
}

/// Start the session server.
pub async fn serve(port: Option<u16>, headless: bool, api_url: Option<String>) -> Result<()> {
    let config = load_config(api_url)?;
    let port = port.unwrap_or(config.server.port);
    let headless = headless || config.server.headless;

    if headless {
        println!("{}", "Starting Colline server in headless mode...".cyan());
    } else {
        println!("{}", "Starting Colline server...".cyan());
    }

    let resolver = HttpResolver::new(&config.client)?;
    let server_config = ServerConfig::new(port, headless);
    let addr = server_config.addr;
    let server = SessionServer::new(
        LineageSession::new(config.session.clone()),
        Arc::new(resolver),
        server_config,
    );

    println!("{} Listening on ws://{}", "✓".green(), addr);
    println!("  Lineage API: {}", config.client.api_base_url.dimmed());
    if headless {
        println!("  Headless mode: accepting connections from any host");
    }
    println!("  Press {} to stop", "Ctrl+C".cyan());

    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_grows_with_columns() {
        let wide = LineageNode::table("a", "s").with_columns(["x", "y", "z"]);
        let narrow = LineageNode::table("b", "s");
        let snapshot = GraphSnapshot::new(vec![wide.clone(), narrow.clone()], vec![]);

        let geometry = estimated_geometry(&snapshot, DisplayMode::Column);
        assert_eq!(geometry[&wide.id].height, 48.0 + 3.0 * 28.0);
        assert_eq!(geometry[&narrow.id].height, 48.0);

        let geometry = estimated_geometry(&snapshot, DisplayMode::Table);
        assert_eq!(geometry[&wide.id].height, 48.0);
    }
}
