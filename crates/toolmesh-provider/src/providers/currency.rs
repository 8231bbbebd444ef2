use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{ToolError, ToolResult};
use crate::provider::{Arguments, ToolProvider};
use toolmesh_core::{CallToolResult, Implementation, ToolDescriptor};

pub const SERVER_NAME: &str = "currency-exchange-agent";

/// Units of each currency per 1 EUR
const EUR_RATES: &[(&str, f64)] = &[
    ("EUR", 1.0),
    ("USD", 1.08),
    ("KRW", 1470.0),
    ("JPY", 162.0),
    ("GBP", 0.85),
    ("CNY", 7.8),
    ("CAD", 1.47),
    ("AUD", 1.64),
    ("CHF", 0.95),
];

/// Exchange rates and conversions from a fixed EUR-based table
#[derive(Debug, Default)]
pub struct CurrencyProvider;

impl CurrencyProvider {
    pub fn new() -> Self {
        Self
    }

    /// Units of `to` per one unit of `from`
    pub fn rate(&self, from: &str, to: &str) -> ToolResult<f64> {
        let from_eur = lookup(from)?;
        let to_eur = lookup(to)?;
        Ok(to_eur / from_eur)
    }

    fn get_exchange_rate(&self, args: &Arguments<'_>) -> ToolResult<CallToolResult> {
        let from = args.required_str("currency_from")?.to_ascii_uppercase();
        let to = args.required_str("currency_to")?.to_ascii_uppercase();
        let date = args.optional_str("date", "latest")?;
        if date != "latest" && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(ToolError::InvalidArguments(format!(
                "Field 'date' must be 'latest' or YYYY-MM-DD, got '{}'",
                date
            )));
        }

        let rate = self.rate(&from, &to)?;
        debug!("Rate {} -> {} ({}) = {}", from, to, date, rate);
        Ok(CallToolResult::text(format!(
            "Exchange rate: 1 {} = {} {}",
            from,
            format_rate(rate),
            to
        )))
    }

    fn convert_amount(&self, args: &Arguments<'_>) -> ToolResult<CallToolResult> {
        let amount = args.required_f64("amount")?;
        let from = args.required_str("currency_from")?.to_ascii_uppercase();
        let to = args.required_str("currency_to")?.to_ascii_uppercase();
        if !amount.is_finite() || amount < 0.0 {
            return Err(ToolError::InvalidArguments(
                "Field 'amount' must be a non-negative number".into(),
            ));
        }

        let converted = amount * self.rate(&from, &to)?;
        Ok(CallToolResult::text(format!(
            "{} {} = {:.2} {}",
            amount, from, converted, to
        )))
    }
}

fn lookup(code: &str) -> ToolResult<f64> {
    EUR_RATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, r)| *r)
        .ok_or_else(|| {
            ToolError::Execution(format!("Could not retrieve rate for currency '{}'", code))
        })
}

fn format_rate(rate: f64) -> String {
    let s = format!("{:.4}", rate);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[async_trait]
impl ToolProvider for CurrencyProvider {
    fn server_info(&self) -> Implementation {
        Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn instructions(&self) -> Option<String> {
        Some("Currency codes are ISO 4217 (USD, EUR, KRW, ...).".to_string())
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "get_exchange_rate",
                "Retrieves the exchange rate between two currencies",
                json!({
                    "type": "object",
                    "properties": {
                        "currency_from": {
                            "type": "string",
                            "description": "Currency code to convert from (e.g., USD)"
                        },
                        "currency_to": {
                            "type": "string",
                            "description": "Currency code to convert to (e.g., EUR, KRW)"
                        },
                        "date": {
                            "type": "string",
                            "description": "Date in YYYY-MM-DD format or 'latest'",
                            "default": "latest"
                        }
                    },
                    "required": ["currency_from", "currency_to"]
                }),
            ),
            ToolDescriptor::new(
                "convert_amount",
                "Convert a specific amount from one currency to another",
                json!({
                    "type": "object",
                    "properties": {
                        "amount": { "type": "number", "description": "Amount to convert" },
                        "currency_from": {
                            "type": "string",
                            "description": "Currency code to convert from"
                        },
                        "currency_to": {
                            "type": "string",
                            "description": "Currency code to convert to"
                        }
                    },
                    "required": ["amount", "currency_from", "currency_to"]
                }),
            ),
        ]
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolResult<CallToolResult> {
        let args = Arguments(&arguments);
        match name {
            "get_exchange_rate" => self.get_exchange_rate(&args),
            "convert_amount" => self.convert_amount(&args),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
