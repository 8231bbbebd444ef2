//! Toolmesh client
//!
//! [`AgentConnection`] owns the lifecycle of one agent behind either a subprocess
//! pipe ([`StdioTransport`]) or an HTTP bridge ([`HttpTransport`]). The
//! [`Coordinator`] keeps connections under stable names and fans discovery and
//! tool calls out to them.

pub mod connection;
pub mod error;
pub mod registry;
pub mod transport;

pub use connection::{AgentClient, AgentConnection, ConnectionStatus};
pub use error::{AgentError, AgentResult};
pub use registry::{AgentHealth, Coordinator};
pub use transport::{HttpTransport, StdioTransport, Transport};
