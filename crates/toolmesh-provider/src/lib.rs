//! Toolmesh tool providers
//!
//! A provider advertises tools and executes them. [`ProviderServer`] turns any
//! [`ToolProvider`] into a JSON-RPC endpoint answering `initialize`,
//! `tools/list` and `tools/call`; [`serve_stdio`] runs that endpoint over the
//! process's stdin/stdout, and the HTTP bridge reuses the same dispatcher.

pub mod error;
pub mod provider;
pub mod providers;
pub mod server;

// Re-export key types
pub use error::{ProviderError, ProviderResult, ToolError, ToolResult};
pub use provider::{Arguments, ToolProvider};
pub use providers::{ActivityProvider, CurrencyProvider, ProviderKind};
pub use server::{serve_lines, serve_stdio, ProviderServer};
