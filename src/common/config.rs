//! Environment-based Configuration for the Pod Manager
//!
//! # Environment Variables
//!
//! - `BTCPOD_NETWORK` - "mainnet", "testnet", "signet" or "regtest" (default: "regtest")
//! - `BTCPOD_ADMIN` - Identity allowed to pause and unpause the manager
//! - `BTCPOD_SERVICE_MANAGER` - Identity of the signature-verification service
//! - `BTCPOD_MANAGER_ID` - Identity the manager acts as towards its pods
//! - `BTCPOD_EVENT_CAPACITY` - Event channel buffer size (default: 1024)
//! - `BTCPOD_LOG_LEVEL` - Logging level (debug, info, warn, error)
//!
//! Identities are required on mainnet and fall back to local defaults elsewhere.

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::types::AccountId;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("network mismatch: expected {0}, got {1}")]
    NetworkMismatch(String, String),

    #[error("identity {0} is assigned to more than one role")]
    SharedIdentity(String),
}

/// Bitcoin network the custody addresses live on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" | "local" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "BTCPOD_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        };
        write!(f, "{}", s)
    }
}

impl Network {
    /// Human-readable part of segwit addresses on this network
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet | Network::Signet => "tb",
            Network::Regtest => "bcrt",
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Pod manager configuration
#[derive(Debug, Clone)]
pub struct PodConfig {
    /// Bitcoin network
    pub network: Network,

    /// Administrator (pause/unpause)
    pub admin: AccountId,

    /// Signature-verification service allowed to relay operator actions
    pub service_manager: AccountId,

    /// Identity the manager presents to its pods
    pub manager_id: AccountId,

    /// Broadcast channel capacity for pod events
    pub event_capacity: usize,

    /// Log level
    pub log_level: String,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            admin: AccountId::from("admin"),
            service_manager: AccountId::from("service_manager"),
            manager_id: AccountId::from("pod_manager"),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl PodConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("BTCPOD_NETWORK")
            .unwrap_or_else(|_| "regtest".to_string())
            .parse()?;

        let defaults = Self::default();

        let admin = get_required_or_local_default("BTCPOD_ADMIN", defaults.admin.as_str(), network)?;
        let service_manager = get_required_or_local_default(
            "BTCPOD_SERVICE_MANAGER",
            defaults.service_manager.as_str(),
            network,
        )?;
        let manager_id = get_required_or_local_default(
            "BTCPOD_MANAGER_ID",
            defaults.manager_id.as_str(),
            network,
        )?;

        let event_capacity = match env::var("BTCPOD_EVENT_CAPACITY") {
            Ok(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "BTCPOD_EVENT_CAPACITY".to_string(),
                        "must be a positive number".to_string(),
                    )
                })?,
            Err(_) => DEFAULT_EVENT_CAPACITY,
        };

        let log_level = env::var("BTCPOD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            network,
            admin: AccountId::new(admin),
            service_manager: AccountId::new(service_manager),
            manager_id: AccountId::new(manager_id),
            event_capacity,
            log_level,
        })
    }

    /// Builder-style network override
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.network != Network::Mainnet {
            return Err(ConfigError::NetworkMismatch(
                "mainnet".to_string(),
                self.network.to_string(),
            ));
        }

        self.validate_roles()
    }

    /// The three privileged identities must be distinct
    pub fn validate_roles(&self) -> Result<(), ConfigError> {
        if self.admin == self.service_manager || self.admin == self.manager_id {
            return Err(ConfigError::SharedIdentity(self.admin.to_string()));
        }
        if self.service_manager == self.manager_id {
            return Err(ConfigError::SharedIdentity(self.service_manager.to_string()));
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== Pod Manager Configuration ===");
        println!("Network: {} (hrp: {})", self.network, self.network.bech32_hrp());
        println!("Admin: {}", self.admin);
        println!("Service Manager: {}", self.service_manager);
        println!("Manager ID: {}", self.manager_id);
        println!("Event Capacity: {}", self.event_capacity);
        println!("Log Level: {}", self.log_level);
        println!("=================================");
    }
}

/// Get required env var, or use a default off mainnet
fn get_required_or_local_default(
    var_name: &str,
    local_default: &str,
    network: Network,
) -> Result<String, ConfigError> {
    match env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            if network == Network::Mainnet {
                Err(ConfigError::MissingEnvVar(var_name.to_string()))
            } else {
                Ok(local_default.to_string())
            }
        }
    }
}
