//! Environment variable resolution with whitelist and default value support

use regex::Regex;
use serde_json::Value as JsonValue;
use std::env;
use thiserror::Error;

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}:]+)(?::([^}]*))?\}";

/// Errors that can occur during environment variable resolution
#[derive(Debug, Error)]
pub enum EnvResolverError {
    #[error("Environment variable '{0}' not found and no default provided")]
    VarNotFound(String),
    #[error("Environment variable '{0}' is not in whitelist. Allowed prefixes: {1:?}")]
    VarNotWhitelisted(String, Vec<String>),
    #[error("Invalid variable syntax: {0}")]
    InvalidSyntax(String),
}

/// Environment variable resolver with whitelist support
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    /// Allowed prefixes for environment variables (e.g., ["TOOLMESH_"]).
    /// Empty means no restrictions
    allowed_prefixes: Vec<String>,
}

impl EnvResolver {
    /// Create a new resolver with specified allowed prefixes
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Create a resolver with no restrictions (allow all variables)
    pub fn unrestricted() -> Self {
        Self {
            allowed_prefixes: vec![],
        }
    }

    /// Resolve environment variables in a JSON value.
    /// Supports ${VAR} and ${VAR:default} syntax
    pub fn resolve(&self, value: &JsonValue) -> Result<JsonValue, EnvResolverError> {
        let re = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|e| EnvResolverError::InvalidSyntax(e.to_string()))?;
        self.resolve_with(&re, value)
    }

    fn resolve_with(&self, re: &Regex, value: &JsonValue) -> Result<JsonValue, EnvResolverError> {
        match value {
            JsonValue::String(s) => self.resolve_string(re, s),
            JsonValue::Object(obj) => {
                let mut resolved_obj = serde_json::Map::new();
                for (key, val) in obj {
                    resolved_obj.insert(key.clone(), self.resolve_with(re, val)?);
                }
                Ok(JsonValue::Object(resolved_obj))
            }
            JsonValue::Array(arr) => arr
                .iter()
                .map(|item| self.resolve_with(re, item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            // Numbers, booleans, and null pass through unchanged
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, re: &Regex, input: &str) -> Result<JsonValue, EnvResolverError> {
        if !input.contains("${") {
            return Ok(JsonValue::String(input.to_string()));
        }

        let whole_placeholder =
            re.find(input).map(|m| m.start() == 0 && m.end() == input.len()).unwrap_or(false);

        let mut result = String::with_capacity(input.len());
        let mut last = 0;
        for caps in re.captures_iter(input) {
            let Some(full_match) = caps.get(0) else { continue };
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            self.validate_var_name(var_name)?;

            let env_value = match env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(EnvResolverError::VarNotFound(var_name.to_string())),
                },
            };

            result.push_str(&input[last..full_match.start()]);
            result.push_str(&env_value);
            last = full_match.end();
        }
        result.push_str(&input[last..]);

        // A value that is exactly one placeholder may stand for a number or bool
        if whole_placeholder {
            if let Ok(bool_val) = result.parse::<bool>() {
                return Ok(JsonValue::Bool(bool_val));
            }
            if let Ok(int_val) = result.parse::<i64>() {
                return Ok(JsonValue::Number(int_val.into()));
            }
        }
        Ok(JsonValue::String(result))
    }

    /// Validate variable name against whitelist
    fn validate_var_name(&self, var_name: &str) -> Result<(), EnvResolverError> {
        if self.allowed_prefixes.is_empty()
            || self.allowed_prefixes.iter().any(|prefix| var_name.starts_with(prefix))
        {
            return Ok(());
        }

        Err(EnvResolverError::VarNotWhitelisted(
            var_name.to_string(),
            self.allowed_prefixes.clone(),
        ))
    }
}
