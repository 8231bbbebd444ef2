use crate::env_resolver::EnvResolver;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::CoordinatorConfig;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Supported file formats for configuration
#[derive(Debug, Clone, PartialEq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Detect file format from extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }
}

/// Loads a [`CoordinatorConfig`] from YAML or JSON, resolving `${VAR}` placeholders
pub struct ConfigLoader {
    resolver: EnvResolver,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            resolver: EnvResolver::unrestricted(),
        }
    }

    pub fn with_resolver(resolver: EnvResolver) -> Self {
        Self { resolver }
    }

    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<CoordinatorConfig> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        debug!("Loading coordinator config from {}", path.display());

        self.parse_content(&content, format)
    }

    /// Parse configuration content directly
    pub fn parse_content(
        &self,
        content: &str,
        format: FileFormat,
    ) -> ConfigResult<CoordinatorConfig> {
        if content.trim().is_empty() {
            return Ok(CoordinatorConfig::default());
        }

        // Parse into a generic JSON value first so placeholders resolve before typing
        let root_json: JsonValue = match format {
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        };

        let resolved = self.resolver.resolve(&root_json)?;
        let config: CoordinatorConfig = serde_json::from_value(resolved)?;
        config.validate()?;

        debug!("Loaded {} agent definitions", config.agents.len());
        Ok(config)
    }
}
