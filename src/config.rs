//! Proxy configuration.
//!
//! A configuration value is an immutable snapshot built once at proxy
//! creation: defaults overlaid with the caller's overrides. There is no
//! process-wide mutable state; verbosity and warning suppression are
//! per-session.

use serde::{Deserialize, Serialize};

fn default_command_name() -> String {
    #[cfg(windows)]
    {
        "inkscape.exe".to_owned()
    }
    #[cfg(not(windows))]
    {
        "inkscape".to_owned()
    }
}

/// Configuration for a [`Proxy`](crate::Proxy) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Executable name or path; defaults to the platform's standard name.
    pub command_name: String,
    /// Maximum number of times the shell process may be (re)spawned.
    pub max_retry: u32,
    /// Depth of the request queue and of each output channel.
    pub queue_depth: usize,
    /// Log raw command/output traffic at debug level.
    pub verbose: bool,
    /// Drop stderr lines containing `WARNING` instead of surfacing them.
    pub suppress_warning: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            command_name: default_command_name(),
            max_retry: 5,
            queue_depth: 100,
            verbose: false,
            suppress_warning: true,
        }
    }
}

impl ProxyConfig {
    /// Create a configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML string; missing fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error for malformed TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Override the executable name or path.
    #[must_use]
    pub fn command_name(mut self, name: impl Into<String>) -> Self {
        self.command_name = name.into();
        self
    }

    /// Override the maximum spawn attempt budget.
    #[must_use]
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Override the request/output queue depth.
    #[must_use]
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Toggle raw traffic logging.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Toggle stderr warning suppression.
    #[must_use]
    pub fn suppress_warning(mut self, suppress: bool) -> Self {
        self.suppress_warning = suppress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        #[cfg(not(windows))]
        assert_eq!(config.command_name, "inkscape");
        assert_eq!(config.max_retry, 5);
        assert_eq!(config.queue_depth, 100);
        assert!(!config.verbose);
        assert!(config.suppress_warning);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ProxyConfig::new()
            .command_name("/opt/inkscape/bin/inkscape")
            .max_retry(2)
            .queue_depth(10)
            .verbose(true)
            .suppress_warning(false);

        assert_eq!(config.command_name, "/opt/inkscape/bin/inkscape");
        assert_eq!(config.max_retry, 2);
        assert_eq!(config.queue_depth, 10);
        assert!(config.verbose);
        assert!(!config.suppress_warning);
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let config = ProxyConfig::from_toml_str(
            r#"
            max_retry = 3
            suppress_warning = false
            "#,
        )
        .unwrap();

        assert_eq!(config.max_retry, 3);
        assert!(!config.suppress_warning);
        assert_eq!(config.queue_depth, 100);
    }

    #[test]
    fn test_from_toml_malformed() {
        assert!(ProxyConfig::from_toml_str("max_retry = \"many\"").is_err());
    }
}
