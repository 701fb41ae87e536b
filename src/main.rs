//! mcp-ledger - expense and food card ledgers over MCP.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mcp_ledger::backend::{self, AppState};
use mcp_ledger::config::Config;
use mcp_ledger::mcp::{http, McpClient, McpServer};
use mcp_ledger::services::{ExpenseTracker, FoodCardTracker, CATEGORIES_URI};
use mcp_ledger::store::{CardActionStore, ExpenseStore};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcp-ledger")]
#[command(about = "Expense and food card ledgers over MCP, with an LLM tool-routing backend")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ExpenseTracker MCP server
    Expenses {
        /// Serve over stdio instead of HTTP
        #[arg(long)]
        stdio: bool,
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite database file
        #[arg(long)]
        database: Option<PathBuf>,
        /// Categories JSON file
        #[arg(long)]
        categories: Option<PathBuf>,
    },

    /// Run the FoodCardTracker MCP server
    FoodCard {
        /// Serve over stdio instead of HTTP
        #[arg(long)]
        stdio: bool,
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite database file
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Run the tool-routing backend
    Backend {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a scripted client session against an expense server
    Demo {
        /// MCP endpoint URL
        #[arg(long, env = "MCP_SERVER_URL", default_value = "http://127.0.0.1:8000/mcp")]
        url: String,
    },

    /// Send a natural-language request to the backend
    Ask {
        /// What to ask
        message: String,
        /// Backend base URL
        #[arg(long, env = "MCP_LEDGER_BACKEND_URL", default_value = "http://127.0.0.1:9000")]
        backend: String,
    },

    /// Print an example configuration file
    ExampleConfig,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    let candidates = [
        dirs::config_dir().map(|p| p.join("mcp-ledger/config.toml")),
        Some(PathBuf::from("/etc/mcp-ledger/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn socket_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the stdio transport keeps stdout for protocol traffic.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = get_config_path(cli.config);

    match cli.command {
        Commands::Expenses {
            stdio,
            host,
            port,
            database,
            categories,
        } => {
            let mut config = Config::load_from(&config_path)?.expenses;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(database) = database {
                config.database = database;
            }
            if let Some(categories) = categories {
                config.categories = categories;
            }

            let store = ExpenseStore::open(&config.database)?;
            let server = McpServer::new(Arc::new(ExpenseTracker::new(store, config.categories)));
            run_server(server, stdio, &config.host, config.port, &config.path).await?;
        }
        Commands::FoodCard {
            stdio,
            host,
            port,
            database,
        } => {
            let mut config = Config::load_from(&config_path)?.food_card;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(database) = database {
                config.database = database;
            }

            let store = CardActionStore::open(&config.database)?;
            let server = McpServer::new(Arc::new(FoodCardTracker::new(store)));
            run_server(server, stdio, &config.host, config.port, &config.path).await?;
        }
        Commands::Backend { host, port } => {
            let mut config = Config::load_from(&config_path)?.backend;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let addr = socket_addr(&config.host, config.port)?;
            backend::serve(AppState::from_config(&config), addr).await?;
        }
        Commands::Demo { url } => cmd_demo(&url).await?,
        Commands::Ask { message, backend } => cmd_ask(&message, &backend).await?,
        Commands::ExampleConfig => print!("{}", Config::example().to_toml()?),
    }

    Ok(())
}

async fn run_server(
    server: McpServer,
    stdio: bool,
    host: &str,
    port: u16,
    path: &str,
) -> anyhow::Result<()> {
    if stdio {
        server.run_stdio().await?;
    } else {
        http::serve(server, socket_addr(host, port)?, path).await?;
    }
    Ok(())
}

async fn cmd_demo(url: &str) -> anyhow::Result<()> {
    let client = McpClient::connect(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    client.ping().await?;
    println!("Connected to server");

    let tools = client.list_tools().await?;
    println!("Tools:");
    for tool in &tools {
        println!("  {} - {}", tool.name, tool.description);
    }

    let resources = client.list_resources().await?;
    println!("Resources:");
    for resource in &resources {
        println!("  {} ({})", resource.uri, resource.name);
    }

    let add = client
        .call_tool(
            "add_expense",
            json!({
                "date": "2025-09-30",
                "amount": 200,
                "category": "Housing",
                "subcategory": "Rent",
                "note": "September rent"
            }),
        )
        .await?;
    println!("add_expense response: {}", serde_json::to_string_pretty(&add)?);

    let range = json!({ "start_date": "2025-09-01", "end_date": "2025-09-30" });

    let list = client.call_tool("list_expenses", range.clone()).await?;
    println!("list_expenses response: {}", serde_json::to_string_pretty(&list)?);

    let summary = client.call_tool("summarize", range).await?;
    println!("summarize response: {}", serde_json::to_string_pretty(&summary)?);

    let categories = client.read_resource(CATEGORIES_URI).await?;
    let texts: Vec<&str> = categories
        .iter()
        .filter_map(|c| c.text.as_deref())
        .collect();
    println!("categories resource read: {:?}", texts);

    Ok(())
}

async fn cmd_ask(message: &str, backend: &str) -> anyhow::Result<()> {
    let url = format!("{}/interpret", backend.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({ "message": message }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if !status.is_success() {
        let detail = body
            .get("detail")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("Backend returned {}: {}", status, detail);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
