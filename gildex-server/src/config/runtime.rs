//! Runtime configuration: the reloadable shape of the loaded file.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use gildex_core::config::{ClusterSettings, ConfigStore, EngineSettings, JobsConfig, RateLimitConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Server listen configuration (fixed after startup).
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin API credentials.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a plaintext secret against the stored argon2 hash.
    pub fn verify(&self, plaintext: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Service API credentials and identity.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    secret: Box<[u8]>,
}

impl ServiceConfig {
    pub fn new(name: String, secret: Box<[u8]>) -> Self {
        Self { name, secret }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// All runtime configuration, each section behind its own lock so a SIGHUP
/// reload swaps them independently.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub service: Arc<RwLock<ServiceConfig>>,
    /// Engine tuning consumed by the aggregator loop.
    pub engine: ConfigStore<EngineSettings>,
    /// Admission-gate tuning consumed per submit call.
    pub rate_limit: ConfigStore<RateLimitConfig>,
    /// Job schedule; fixed once the job loops are spawned.
    pub jobs: JobsConfig,
    /// Cluster-slot settings; fixed once the slot is claimed.
    pub cluster: ClusterSettings,
}
