//! Command-line flags for the `graphrun-server` binary.

use clap::Parser;

use crate::config::ServerConfig;
use crate::error::Result;

/// LangGraph Cloud compatible thread and streaming-run server
#[derive(Parser, Debug, Default)]
#[command(name = "graphrun-server", version, about)]
pub struct Cli {
    /// Address to bind (overrides GRAPHRUN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides GRAPHRUN_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Chat model used by the agent graph (overrides GRAPHRUN_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Seconds to wait for the next engine item before failing a run; 0 disables
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(long, env = "GRAPHRUN_DEBUG")]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Load configuration from the process environment with these flags on top.
    pub fn load_config(&self) -> Result<ServerConfig> {
        self.resolve(|key| std::env::var(key).ok())
    }

    /// Build configuration from `lookup`, flags first.
    ///
    /// A variable shadowed by a flag is never parsed, so a malformed value
    /// there does not fail startup.
    pub fn resolve(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ServerConfig> {
        ServerConfig::from_lookup(|key| self.flag_value(key).or_else(|| lookup(key)))
    }

    fn flag_value(&self, key: &str) -> Option<String> {
        match key {
            "GRAPHRUN_HOST" => self.host.clone(),
            "GRAPHRUN_PORT" => self.port.map(|port| port.to_string()),
            "GRAPHRUN_MODEL" => self.model.clone(),
            "GRAPHRUN_IDLE_TIMEOUT_SECS" => self.idle_timeout_secs.map(|secs| secs.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_defaults() {
        let cli = Cli::try_parse_from(["graphrun-server"]).unwrap();
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.model.is_none());
    }

    #[test]
    fn flags_override_loaded_config() {
        let cli = Cli::try_parse_from([
            "graphrun-server",
            "-p",
            "9001",
            "--model",
            "gpt-4o",
            "--idle-timeout-secs",
            "5",
        ])
        .unwrap();
        let config = cli
            .resolve(|key| match key {
                "GRAPHRUN_PORT" => Some("9000".into()),
                "GRAPHRUN_MODEL" => Some("gpt-4.1".into()),
                "OPENAI_API_KEY" => Some("sk-test".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.idle_timeout_secs, 5);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn port_flag_shadows_malformed_env_port() {
        let cli = Cli::try_parse_from(["graphrun-server", "--port", "9002"]).unwrap();
        let config = cli
            .resolve(|key| (key == "GRAPHRUN_PORT").then(|| "not-a-port".to_string()))
            .unwrap();
        assert_eq!(config.port, 9002);

        let without_flag = Cli::try_parse_from(["graphrun-server"]).unwrap();
        assert!(without_flag
            .resolve(|key| (key == "GRAPHRUN_PORT").then(|| "not-a-port".to_string()))
            .is_err());
    }

    #[test]
    fn invalid_port_is_error() {
        assert!(Cli::try_parse_from(["graphrun-server", "--port", "nope"]).is_err());
    }
}
