//! The tool provider contract

use crate::error::{ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use toolmesh_core::{CallToolResult, Implementation, ToolDescriptor};

/// Something that advertises tools and executes them by name
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Name and version reported in the `initialize` handshake
    fn server_info(&self) -> Implementation;

    /// Optional free-form usage hint returned from `initialize`
    fn instructions(&self) -> Option<String> {
        None
    }

    /// Current tool set; may be empty
    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Execute a tool. The provider is authoritative about its tool set, so an
    /// unknown name is reported here as [`ToolError::UnknownTool`].
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolResult<CallToolResult>;
}

/// Typed accessors over a tool's argument object
pub struct Arguments<'a>(pub &'a Map<String, Value>);

impl<'a> Arguments<'a> {
    pub fn required_str(&self, key: &str) -> ToolResult<&'a str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(Value::String(_)) => Err(invalid(key, "not be empty")),
            Some(_) => Err(invalid(key, "be a string")),
            None => Err(missing(key)),
        }
    }

    pub fn optional_str(&self, key: &str, default: &'a str) -> ToolResult<&'a str> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(invalid(key, "be a string")),
        }
    }

    pub fn required_f64(&self, key: &str) -> ToolResult<f64> {
        match self.0.get(key) {
            Some(v) => v.as_f64().ok_or_else(|| invalid(key, "be a number")),
            None => Err(missing(key)),
        }
    }

    pub fn optional_f64(&self, key: &str, default: f64) -> ToolResult<f64> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| invalid(key, "be a number")),
        }
    }

    pub fn required_u64(&self, key: &str) -> ToolResult<u64> {
        match self.0.get(key) {
            Some(v) => v.as_u64().ok_or_else(|| invalid(key, "be a non-negative integer")),
            None => Err(missing(key)),
        }
    }

    pub fn optional_str_list(&self, key: &str) -> ToolResult<Vec<&'a str>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().ok_or_else(|| invalid(key, "be a list of strings")))
                .collect(),
            Some(_) => Err(invalid(key, "be a list of strings")),
        }
    }
}

fn missing(key: &str) -> ToolError {
    ToolError::InvalidArguments(format!("Missing required field '{}'", key))
}

fn invalid(key: &str, expectation: &str) -> ToolError {
    ToolError::InvalidArguments(format!("Field '{}' must {}", key, expectation))
}
