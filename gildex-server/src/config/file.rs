//! TOML file configuration structures.
//!
//! These structs directly map to the `gildex-config.toml` file format. The
//! engine tuning sections reuse the core structs verbatim so the file
//! format and the runtime stores can never drift apart.

use gildex_core::config::{
    AggregatorConfig, ClusterSettings, EconomyConfig, JobsConfig, RateLimitConfig,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerSection,
    pub admin: AdminSection,
    pub service: ServiceSection,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub cluster: ClusterSettings,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSection {
    /// The admin secret. If this is plaintext (doesn't start with
    /// `$argon2`), it will be hashed and the config file rewritten.
    pub secret: String,
}

/// Service API configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Human-readable name of the platform gateway deployment.
    pub name: String,
    /// Shared HMAC secret for body and URL signing.
    pub secret: String,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[service]
name = "discord-gateway"
secret = "service-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.service.name, "discord-gateway");
        assert!(!config.is_admin_secret_hashed());

        // Untouched sections land on engine defaults.
        assert_eq!(config.rate_limit.window_size, 6);
        assert_eq!(config.cluster.slots, 3);
        assert_eq!(config.economy.message_length_cap, 200);
    }

    #[test]
    fn tuning_sections_override_defaults() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[service]
name = "gateway"
secret = "s"

[economy]
message_length_cap = 500
decay_rate = 0.05

[cluster]
slots = 5
total_shards = 40
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.is_admin_secret_hashed());
        assert_eq!(config.economy.message_length_cap, 500);
        assert_eq!(config.cluster.slots, 5);
        // Fields not named keep their defaults.
        assert_eq!(config.economy.message_divisor, 2);
    }
}
