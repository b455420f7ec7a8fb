use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use traceview_replay_router::RouterPolicyView;

pub const PORT_ENV: &str = "TRACEVIEW_PORT";
pub const TRACE_ROOT_ENV: &str = "TRACEVIEW_TRACE_ROOT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub router: RouterPolicyView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9322,
        }
    }
}

impl Config {
    /// Applies `TRACEVIEW_PORT` and `TRACEVIEW_TRACE_ROOT` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env::var(PORT_ENV).ok(), env::var(TRACE_ROOT_ENV).ok());
    }

    fn apply_overrides(&mut self, port: Option<String>, trace_root: Option<String>) {
        if let Some(raw) = port {
            match raw.trim().parse::<u16>() {
                Ok(port) => {
                    info!(port, "Using port from {PORT_ENV}");
                    self.serve.port = port;
                }
                Err(err) => warn!(value = %raw, %err, "ignoring invalid {PORT_ENV}"),
            }
        }
        if let Some(root) = trace_root.filter(|root| !root.trim().is_empty()) {
            self.router.trace_root = Some(PathBuf::from(root));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_sections_are_optional() {
        let config: Config = serde_yaml::from_str("serve:\n  port: 8000\n").unwrap();
        assert_eq!(config.serve.port, 8000);
        assert_eq!(config.serve.host, "127.0.0.1");
        assert_eq!(config.router, RouterPolicyView::default());
    }

    #[test]
    fn router_section_overrides_policy() {
        let yaml = "router:\n  gc_interval_secs: 5\n  trace_root: /srv/traces\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.router.gc_interval_secs, 5);
        assert_eq!(config.router.trace_root, Some(PathBuf::from("/srv/traces")));
        assert_eq!(config.router.session_ttl_secs, 300);
    }

    #[test]
    fn overrides_apply_and_bad_port_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(Some("not-a-port".into()), Some("/data".into()));
        assert_eq!(config.serve.port, 9322);
        assert_eq!(config.router.trace_root, Some(PathBuf::from("/data")));

        config.apply_overrides(Some("7000".into()), None);
        assert_eq!(config.serve.port, 7000);
    }
}
