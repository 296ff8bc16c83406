//! Server configuration (layered: CLI flags > env > `.env.local` > `.env`).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bon::Builder;

use crate::error::{GraphRunError, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8123;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Runtime configuration for the server binary.
#[derive(Clone, Builder)]
pub struct ServerConfig {
    #[builder(default = DEFAULT_HOST.to_string(), into)]
    pub host: String,
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    /// Seconds the orchestrator waits for the next engine item; 0 disables.
    #[builder(default = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
    #[builder(default = DEFAULT_MODEL.to_string(), into)]
    pub model: String,
    #[builder(into)]
    pub openai_api_key: Option<String>,
    #[builder(into)]
    pub openai_base_url: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("model", &self.model)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| ".."))
            .field("openai_base_url", &self.openai_base_url)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfig {
    /// Load from environment variables, reading `.env` and then `.env.local`
    /// if present.
    pub fn from_env() -> Result<Self> {
        Self::load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load `.env` and then `.env.local` into the process environment.
    pub fn load_dotenv() {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let _ = dotenvy::from_filename_override(".env.local");
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("GRAPHRUN_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                GraphRunError::Configuration(format!("GRAPHRUN_PORT is not a valid port: {raw}"))
            })?,
            None => DEFAULT_PORT,
        };
        let idle_timeout_secs = match non_empty("GRAPHRUN_IDLE_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                GraphRunError::Configuration(format!(
                    "GRAPHRUN_IDLE_TIMEOUT_SECS is not a number of seconds: {raw}"
                ))
            })?,
            None => DEFAULT_IDLE_TIMEOUT_SECS,
        };

        Ok(Self::builder()
            .host(non_empty("GRAPHRUN_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()))
            .port(port)
            .idle_timeout_secs(idle_timeout_secs)
            .model(non_empty("GRAPHRUN_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .maybe_openai_api_key(non_empty("OPENAI_API_KEY"))
            .maybe_openai_base_url(non_empty("OPENAI_BASE_URL"))
            .build())
    }

    /// Idle timeout, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| GraphRunError::Configuration(format!("invalid bind host: {}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
