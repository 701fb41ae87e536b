//! # mcp-ledger
//!
//! Personal ledgers served over MCP (Model Context Protocol), plus a backend
//! that turns natural-language requests into MCP tool calls.
//!
//! ## Features
//!
//! - ExpenseTracker MCP server: add, list, summarize, update, delete expenses
//! - FoodCardTracker MCP server: food card reloads and spends
//! - stdio and HTTP transports, SQLite storage
//! - Backend (`POST /interpret`) that asks Gemini which tool fits a message
//!   and runs it on whichever MCP server offers it
//!
//! ## Usage
//!
//! ```bash
//! # Expense server on :8000/mcp, food card server on :8001/mcp
//! mcp-ledger expenses
//! mcp-ledger food-card
//!
//! # Scripted client session against MCP_SERVER_URL
//! mcp-ledger demo
//!
//! # Backend on :9000, then ask it something
//! GOOGLE_API_KEY=... FASTMCP_URL=http://127.0.0.1:8000/mcp mcp-ledger backend
//! mcp-ledger ask "How much did I spend on food in September?"
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{LedgerError, Result};
pub use mcp::{McpClient, McpServer};
