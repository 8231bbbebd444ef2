//! Run a built-in provider on stdio or behind the HTTP bridge

use anyhow::{Context, Result};
use toolmesh_provider::ProviderKind;
use tracing::info;

pub struct ServeCommand;

impl ServeCommand {
    pub async fn stdio(kind: ProviderKind) -> Result<()> {
        info!(provider = kind.as_str(), "Serving provider on stdio");
        toolmesh_provider::serve_stdio(kind.build())
            .await
            .with_context(|| format!("{} provider stopped serving stdio", kind.as_str()))
    }

    pub async fn http(kind: ProviderKind, addr: &str) -> Result<()> {
        info!(provider = kind.as_str(), "Serving provider over HTTP");
        toolmesh_server::serve_http(kind.build(), addr)
            .await
            .with_context(|| format!("HTTP bridge for {} provider failed", kind.as_str()))
    }
}
