//! HTTP-level configuration.

use std::net::SocketAddr;

use stockforge_infra::InfraConfig;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub infra: InfraConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_addr = default_bind_addr();
        let bind_addr = match lookup("BIND_ADDR") {
            None => default_addr,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "invalid BIND_ADDR, using {DEFAULT_BIND_ADDR}");
                default_addr
            }),
        };

        Self {
            bind_addr,
            infra: InfraConfig::from_lookup(&lookup),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
