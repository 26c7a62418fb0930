//! Access to the managed device's live interface configuration.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{MutationAction, ObservedInterface};

pub mod restconf;
pub use restconf::RestconfDevice;

pub const ETHERNET_TYPE: &str = "iana-if-type:ethernetCsmacd";
pub const LOOPBACK_TYPE: &str = "iana-if-type:softwareLoopback";

/// The interface document sent on create and replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub name: String,
    pub description: String,
    pub interface_type: &'static str,
    pub address: Ipv4Addr,
    pub netmask: String,
}

#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Reads the full interface collection.
    async fn get_interfaces(&self) -> Result<Vec<ObservedInterface>>;

    /// The following return the raw HTTP status; interpreting it is up to
    /// the caller.  Transport failures are `DeviceUnreachable`.
    async fn create_interface(&self, config: &InterfaceConfig) -> Result<u16>;
    async fn replace_interface(&self, config: &InterfaceConfig) -> Result<u16>;
    async fn delete_interface(&self, name: &str) -> Result<u16>;
}

/// Reads observed state.  Nothing is cached: every lookup fetches the
/// whole collection again.
#[derive(Clone)]
pub struct DeviceStateReader {
    client: Arc<dyn DeviceClient>,
}

impl DeviceStateReader {
    pub fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self { client }
    }

    pub async fn list_interfaces(&self) -> Result<Vec<ObservedInterface>> {
        self.client.get_interfaces().await
    }

    /// `None` when the device has no interface by that name.
    pub async fn find_interface(&self, name: &str) -> Result<Option<ObservedInterface>> {
        let interfaces = self.list_interfaces().await?;
        debug!("Device reports {} interfaces", interfaces.len());
        Ok(interfaces.into_iter().find(|iface| iface.name == name))
    }
}

/// Applies interface changes on the device.
#[derive(Clone)]
pub struct DeviceMutator {
    client: Arc<dyn DeviceClient>,
    description: String,
}

impl DeviceMutator {
    pub fn new(client: Arc<dyn DeviceClient>, description: impl Into<String>) -> Self {
        Self {
            client,
            description: description.into(),
        }
    }

    /// One attempt, no retry.  Unsupported interface names fail before any
    /// request is made.
    pub async fn apply(
        &self,
        interface_name: &str,
        address: Ipv4Addr,
        netmask: &str,
        action: MutationAction,
    ) -> Result<()> {
        let interface_type = interface_type_for(interface_name)?;

        let status = match action {
            MutationAction::Create | MutationAction::Update => {
                let config = InterfaceConfig {
                    name: interface_name.to_string(),
                    description: self.description.clone(),
                    interface_type,
                    address,
                    netmask: netmask.to_string(),
                };
                if action == MutationAction::Create {
                    self.client.create_interface(&config).await?
                } else {
                    self.client.replace_interface(&config).await?
                }
            }
            MutationAction::Delete => self.client.delete_interface(interface_name).await?,
        };

        if status == expected_status(action) {
            info!(
                "Device accepted {} of {} ({} {})",
                action, interface_name, address, netmask
            );
            Ok(())
        } else {
            warn!(
                "Device rejected {} of {} with status {}",
                action, interface_name, status
            );
            Err(Error::MutationFailed {
                action,
                interface: interface_name.to_string(),
                status,
            })
        }
    }
}

/// Maps an interface name to its IANA interface type by name prefix.
pub fn interface_type_for(interface_name: &str) -> Result<&'static str> {
    if interface_name.starts_with("GigabitEthernet") {
        Ok(ETHERNET_TYPE)
    } else if interface_name.starts_with("Loopback") {
        Ok(LOOPBACK_TYPE)
    } else {
        Err(Error::UnsupportedInterfaceType(interface_name.to_string()))
    }
}

fn expected_status(action: MutationAction) -> u16 {
    match action {
        MutationAction::Create => 201,
        MutationAction::Update | MutationAction::Delete => 204,
    }
}
