//! Configuration management for mcp-ledger.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding an extra MCP endpoint for the backend.
pub const MCP_SERVER_URL_ENV: &str = "MCP_SERVER_URL";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Expense tracker MCP server.
    #[serde(default)]
    pub expenses: ExpensesConfig,

    /// Food card MCP server.
    #[serde(default)]
    pub food_card: FoodCardConfig,

    /// Tool-routing backend.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Expense tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpensesConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_expenses_port")]
    pub port: u16,

    /// HTTP path the MCP endpoint is mounted on.
    #[serde(default = "default_mcp_path")]
    pub path: String,

    /// SQLite database file.
    #[serde(default = "default_expenses_db")]
    pub database: PathBuf,

    /// JSON file served as the `expense://categories` resource.
    #[serde(default = "default_categories")]
    pub categories: PathBuf,
}

/// Food card tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodCardConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_food_card_port")]
    pub port: u16,

    #[serde(default = "default_mcp_path")]
    pub path: String,

    #[serde(default = "default_food_card_db")]
    pub database: PathBuf,
}

/// Backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Gemini model used for tool selection.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (or environment variable name if prefixed with $).
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// MCP endpoint URLs (each may be an environment reference).
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_expenses_port() -> u16 {
    8000
}

fn default_food_card_port() -> u16 {
    8001
}

fn default_backend_port() -> u16 {
    9000
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

fn default_data_path(file: &str) -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("mcp-ledger").join(file))
        .unwrap_or_else(|| PathBuf::from(file))
}

fn default_expenses_db() -> PathBuf {
    default_data_path("expenses.db")
}

fn default_food_card_db() -> PathBuf {
    default_data_path("food_card_actions.db")
}

fn default_categories() -> PathBuf {
    PathBuf::from("categories.json")
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key() -> String {
    "$GOOGLE_API_KEY".to_string()
}

fn default_endpoints() -> Vec<String> {
    vec![
        "$FASTMCP_URL".to_string(),
        "$FASTMCP_FOODCARD_URL".to_string(),
    ]
}

impl Default for ExpensesConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_expenses_port(),
            path: default_mcp_path(),
            database: default_expenses_db(),
            categories: default_categories(),
        }
    }
}

impl Default for FoodCardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_food_card_port(),
            path: default_mcp_path(),
            database: default_food_card_db(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_backend_port(),
            model: default_model(),
            api_key: default_api_key(),
            endpoints: default_endpoints(),
        }
    }
}

impl BackendConfig {
    /// Resolved API key, if any.
    pub fn api_key(&self) -> Option<String> {
        resolve_env(&self.api_key)
    }

    /// Resolved endpoint list, in configuration order, without duplicates.
    ///
    /// `MCP_SERVER_URL` is appended when set.
    pub fn endpoints(&self) -> Vec<String> {
        let extra = format!("${}", MCP_SERVER_URL_ENV);
        let mut resolved: Vec<String> = Vec::new();

        for raw in self.endpoints.iter().chain(std::iter::once(&extra)) {
            if let Some(url) = resolve_env(raw) {
                if !resolved.contains(&url) {
                    resolved.push(url);
                }
            }
        }

        resolved
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LedgerError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("mcp-ledger").join("config.toml"))
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            expenses: ExpensesConfig {
                database: PathBuf::from("/var/lib/mcp-ledger/expenses.db"),
                categories: PathBuf::from("/etc/mcp-ledger/categories.json"),
                ..ExpensesConfig::default()
            },
            food_card: FoodCardConfig {
                database: PathBuf::from("/var/lib/mcp-ledger/food_card_actions.db"),
                ..FoodCardConfig::default()
            },
            backend: BackendConfig {
                endpoints: vec![
                    "http://127.0.0.1:8000/mcp".to_string(),
                    "http://127.0.0.1:8001/mcp".to_string(),
                ],
                ..BackendConfig::default()
            },
        }
    }
}

/// Resolve environment variable references (values starting with $).
///
/// Unset or empty variables resolve to `None`, as do empty literals.
pub fn resolve_env(value: &str) -> Option<String> {
    let resolved = match value.strip_prefix('$') {
        Some(var_name) => match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!("Environment variable {} not set", var_name);
                return None;
            }
        },
        None => value.to_string(),
    };

    let trimmed = resolved.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
