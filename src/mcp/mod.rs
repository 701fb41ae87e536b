//! MCP (Model Context Protocol) server, transports and client.

pub mod client;
pub mod http;
pub mod protocol;
pub mod server;

pub use client::McpClient;
pub use server::{McpServer, ToolService};
