use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use super::{DeviceClient, InterfaceConfig};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::types::ObservedInterface;

const YANG_JSON: &str = "application/yang-data+json";
const INTERFACES_PATH: &str = "ietf-interfaces:interfaces";

/// RESTCONF client for the `ietf-interfaces` / `ietf-ip` models.
pub struct RestconfDevice {
    client: Client,
    /// `<data root>/ietf-interfaces:interfaces`
    interfaces_url: Url,
    username: String,
    password: String,
}

impl RestconfDevice {
    pub fn new(config: &DeviceConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(YANG_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(YANG_JSON));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build device client: {}", e)))?;

        let mut interfaces_url = Url::parse(&config.url).map_err(|e| {
            Error::Configuration(format!("invalid device.url {}: {}", config.url, e))
        })?;
        interfaces_url
            .path_segments_mut()
            .map_err(|_| Error::Configuration(format!("device.url {} has no path", config.url)))?
            .pop_if_empty()
            .push(INTERFACES_PATH);

        Ok(Self {
            client,
            interfaces_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn collection_url(&self) -> Url {
        self.interfaces_url.clone()
    }

    /// List entry resource; the key is percent-encoded as one path segment
    /// (`GigabitEthernet1/0/1` -> `interface=GigabitEthernet1%2F0%2F1`).
    fn interface_url(&self, name: &str) -> Url {
        let mut url = self.interfaces_url.clone();
        // checked to be a base URL in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&format!("interface={}", name));
        }
        url
    }
}

#[async_trait]
impl DeviceClient for RestconfDevice {
    async fn get_interfaces(&self) -> Result<Vec<ObservedInterface>> {
        let url = self.collection_url();
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(unreachable)?;

        if response.status() != StatusCode::OK {
            return Err(Error::DeviceUnreachable(format!(
                "GET {} returned status {}",
                url,
                response.status().as_u16()
            )));
        }

        let body = response.text().await.map_err(unreachable)?;
        parse_interfaces(&body)
    }

    async fn create_interface(&self, config: &InterfaceConfig) -> Result<u16> {
        let url = self.collection_url();
        debug!("POST {} for {}", url, config.name);
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .body(interface_payload(config).to_string())
            .send()
            .await
            .map_err(unreachable)?;
        Ok(response.status().as_u16())
    }

    async fn replace_interface(&self, config: &InterfaceConfig) -> Result<u16> {
        let url = self.interface_url(&config.name);
        debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .body(interface_payload(config).to_string())
            .send()
            .await
            .map_err(unreachable)?;
        Ok(response.status().as_u16())
    }

    async fn delete_interface(&self, name: &str) -> Result<u16> {
        let url = self.interface_url(name);
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(unreachable)?;
        Ok(response.status().as_u16())
    }
}

fn unreachable(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::DeviceUnreachable(format!("request timed out: {}", e))
    } else {
        Error::DeviceUnreachable(e.to_string())
    }
}

pub fn interface_payload(config: &InterfaceConfig) -> serde_json::Value {
    json!({
        "ietf-interfaces:interface": {
            "name": config.name,
            "description": config.description,
            "type": config.interface_type,
            "enabled": true,
            "ietf-ip:ipv4": {
                "address": [
                    {
                        "ip": config.address.to_string(),
                        "netmask": config.netmask,
                    }
                ]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct InterfacesDocument {
    #[serde(rename = "ietf-interfaces:interfaces")]
    interfaces: Option<InterfaceList>,
}

#[derive(Debug, Deserialize)]
struct InterfaceList {
    #[serde(default)]
    interface: Vec<RawInterface>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "ietf-ip:ipv4", default)]
    ipv4: Option<RawIpv4>,
}

#[derive(Debug, Deserialize)]
struct RawIpv4 {
    #[serde(default)]
    address: Vec<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    netmask: Option<String>,
}

/// Parses a GET of the interface collection.  Absent or empty fields
/// become `None`; only a body that is not JSON at all is an error.
pub fn parse_interfaces(body: &str) -> Result<Vec<ObservedInterface>> {
    let document: InterfacesDocument = serde_json::from_str(body)
        .map_err(|e| Error::DeviceUnreachable(format!("invalid interface document: {}", e)))?;

    let Some(list) = document.interfaces else {
        warn!("Device response has no interface collection");
        return Ok(Vec::new());
    };

    let mut observed = Vec::with_capacity(list.interface.len());
    for raw in list.interface {
        let Some(name) = raw.name.filter(|n| !n.is_empty()) else {
            warn!("Skipping interface entry without a name");
            continue;
        };

        let first = raw.ipv4.and_then(|ipv4| ipv4.address.into_iter().next());
        let (address, netmask) = match first {
            Some(addr) => (
                addr.ip.as_deref().and_then(|ip| parse_address(&name, ip)),
                addr.netmask.filter(|m| !m.is_empty()),
            ),
            None => (None, None),
        };

        observed.push(ObservedInterface {
            name,
            description: raw.description.filter(|d| !d.is_empty()),
            address,
            netmask,
        });
    }
    Ok(observed)
}

fn parse_address(interface: &str, ip: &str) -> Option<Ipv4Addr> {
    match ip.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!("Ignoring unparseable address '{}' on {}", ip, interface);
            None
        }
    }
}
