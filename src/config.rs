use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix length used for create/update when the policy does not say otherwise.
pub const DEFAULT_MUTATION_PREFIX_LENGTH: u8 = 24;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub inventory: InventoryConfig,
    pub device: DeviceConfig,
    pub rules_path: PathBuf,
    pub report_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub policy: ReconcilePolicy,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InventoryConfig {
    /// API root, e.g. `https://nautobot.example.com/api/`.
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// RESTCONF data root, e.g. `https://10.0.0.1:443/restconf/data/`.
    pub url: String,
    pub username: String,
    pub password: String,
    pub accept_invalid_certs: bool,
    /// Description written on interfaces this tool creates or edits.
    pub interface_description: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            accept_invalid_certs: false,
            interface_description: "CREATE_L1_RESTCONF".into(),
        }
    }
}

/// Knobs for the engine's inherited quirks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcilePolicy {
    /// A device with a bad hostname contributes one row and nothing else.
    pub abort_device_on_invalid_hostname: bool,
    /// In force mode, stop the interface's remaining addresses after the
    /// first applied change.
    pub force_mode_processes_only_first_pending_change: bool,
    /// Also require the observed netmask to match the desired prefix.
    pub compare_prefix_length: bool,
    /// Prefix length written on create/update.
    pub mutation_prefix_length: u8,
    /// Write the inventory prefix length instead of `mutation_prefix_length`.
    pub use_desired_prefix_length: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            abort_device_on_invalid_hostname: true,
            force_mode_processes_only_first_pending_change: true,
            compare_prefix_length: false,
            mutation_prefix_length: DEFAULT_MUTATION_PREFIX_LENGTH,
            use_desired_prefix_length: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig::default(),
            device: DeviceConfig::default(),
            rules_path: PathBuf::from("rules.json"),
            report_dir: PathBuf::from("."),
            request_timeout_secs: 30,
            policy: ReconcilePolicy::default(),
        }
    }
}

impl Config {
    /// Defaults, then `ipsync.toml`/`ipsync.json` (or `path`), then `IPSYNC_*`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        figment = match path {
            Some(p) if p.extension().is_some_and(|ext| ext == "json") => {
                figment.merge(Json::file(p))
            }
            Some(p) => figment.merge(Toml::file(p)),
            None => figment
                .merge(Toml::file("ipsync.toml"))
                .merge(Json::file("ipsync.json")),
        };
        Self::from_figment(figment.merge(Env::prefixed("IPSYNC_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| Error::Configuration(format!("failed to load configuration: {}", e)))?;

        // Support Docker-style secrets
        if let Ok(token_file) = std::env::var("IPSYNC_INVENTORY_TOKEN_FILE") {
            config.inventory.token = read_secret(&token_file)?;
        }
        if let Ok(password_file) = std::env::var("IPSYNC_DEVICE_PASSWORD_FILE") {
            config.device.password = read_secret(&password_file)?;
        }

        config.check()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn check(&self) -> Result<()> {
        if self.inventory.url.is_empty() {
            return Err(Error::Configuration("inventory.url is not set".into()));
        }
        if self.device.url.is_empty() {
            return Err(Error::Configuration("device.url is not set".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.policy.mutation_prefix_length > 32 {
            return Err(Error::Configuration(format!(
                "policy.mutation_prefix_length {} is out of range",
                self.policy.mutation_prefix_length
            )));
        }
        Ok(())
    }
}

fn read_secret(path: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::Configuration(format!("cannot read secret file {}: {}", path, e)))
}
