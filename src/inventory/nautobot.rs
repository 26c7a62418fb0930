use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::Inventory;
use crate::config::InventoryConfig;
use crate::error::{Error, Result};
use crate::types::{InventoryAddress, InventoryDevice, InventoryInterface};

/// Nautobot REST API client.
pub struct NautobotInventory {
    client: Client,
    base_url: String,
}

impl NautobotInventory {
    pub fn new(config: &InventoryConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|e| Error::Configuration(format!("invalid inventory token: {}", e)))?;
        headers.insert(AUTHORIZATION, token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build inventory client: {}", e)))?;

        let mut base_url = config.url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    /// Fetches every page of a list endpoint, following `next` links.
    async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut url = Some(format!("{}{}", self.base_url, path));
        let mut items = Vec::new();

        while let Some(current) = url {
            debug!("GET {}", current);
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| Error::Inventory(format!("GET {}: {}", current, e)))?;

            if !response.status().is_success() {
                return Err(Error::Inventory(format!(
                    "GET {} returned status {}",
                    current,
                    response.status().as_u16()
                )));
            }

            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| Error::Inventory(format!("invalid response from {}: {}", current, e)))?;
            items.extend(page.results);
            url = page.next;
        }

        Ok(items)
    }
}

#[async_trait]
impl Inventory for NautobotInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>> {
        let devices: Vec<RawDevice> = self.fetch_all("dcim/devices/").await?;
        Ok(devices.into_iter().map(RawDevice::into_device).collect())
    }

    async fn list_interfaces(&self, device_id: &str) -> Result<Vec<InventoryInterface>> {
        let interfaces: Vec<RawInterface> = self
            .fetch_all(&format!("dcim/interfaces/?device_id={}", device_id))
            .await?;
        Ok(interfaces
            .into_iter()
            .map(|raw| InventoryInterface {
                id: id_string(&raw.id),
                name: raw.name,
                kind: raw.kind.and_then(|k| k.value).unwrap_or_default(),
            })
            .collect())
    }

    async fn list_ip_addresses(&self, interface_id: &str) -> Result<Vec<InventoryAddress>> {
        let addresses: Vec<RawAddress> = self
            .fetch_all(&format!("ipam/ip-addresses/?interface_id={}", interface_id))
            .await?;
        Ok(addresses
            .into_iter()
            .map(|raw| InventoryAddress {
                address: raw.address,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

/// A nested object reference such as `device_type` or `role`.
#[derive(Debug, Default, Deserialize)]
struct Nested {
    #[serde(default)]
    display: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl Nested {
    fn label(self) -> String {
        self.display.or(self.name).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    device_type: Option<Nested>,
    /// `role` on Nautobot 2.x, `device_role` on 1.x; some versions send both.
    #[serde(default)]
    role: Option<Nested>,
    #[serde(default)]
    device_role: Option<Nested>,
}

impl RawDevice {
    fn into_device(self) -> InventoryDevice {
        InventoryDevice {
            id: id_string(&self.id),
            name: self.name.unwrap_or_default(),
            role: self
                .role
                .or(self.device_role)
                .map(Nested::label)
                .unwrap_or_default(),
            device_type: self.device_type.map(Nested::label).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InterfaceKind {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    id: Value,
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<InterfaceKind>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    address: String,
}

/// Nautobot ids are UUID strings, older NetBox-style APIs use integers.
fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
