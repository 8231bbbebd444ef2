//! Built-in reference providers

mod activity;
mod currency;

pub use activity::ActivityProvider;
pub use currency::CurrencyProvider;

use crate::ToolProvider;
use std::str::FromStr;
use std::sync::Arc;

/// Selects one of the built-in providers by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Currency,
    Activity,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Currency => "currency",
            ProviderKind::Activity => "activity",
        }
    }

    pub fn build(&self) -> Arc<dyn ToolProvider> {
        match self {
            ProviderKind::Currency => Arc::new(CurrencyProvider::new()),
            ProviderKind::Activity => Arc::new(ActivityProvider::new()),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "currency" => Ok(ProviderKind::Currency),
            "activity" => Ok(ProviderKind::Activity),
            other => Err(format!("unknown provider '{}' (expected currency or activity)", other)),
        }
    }
}
