//! Container configuration.
//!
//! Options are set through [`ContainerBuilder`](crate::ContainerBuilder) or
//! deserialized from any serde format:
//!
//! ```rust,ignore
//! let options: ContainerOptions = serde_json::from_str(r#"{ "resolve_timeout_ms": 500 }"#)?;
//! let container = Container::builder().options(options).build()?;
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Behaviour switches shared by a container and its children.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Bound on waiting for another thread to finish building a
    /// synchronized value. `None` waits forever.
    pub resolve_timeout_ms: Option<u64>,
    /// Re-registering a contract replaces the previous registration.
    pub allow_override: bool,
    /// Run graph validation in [`ContainerBuilder::build`](crate::ContainerBuilder::build).
    pub validate_on_build: bool,
    /// Treat lifetime mismatches found by validation as errors.
    pub strict_lifetimes: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            resolve_timeout_ms: None,
            allow_override: true,
            validate_on_build: false,
            strict_lifetimes: false,
        }
    }
}

impl ContainerOptions {
    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout_ms.map(Duration::from_millis)
    }
}
