//! HTTP server configuration.

use std::env;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_address = env::var("BIND_ADDRESS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Self { bind_address }
    }
}
