//! In-memory doubles for the inventory and the device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::device::{DeviceClient, InterfaceConfig};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::types::{
    InventoryAddress, InventoryDevice, InventoryInterface, MutationAction, ObservedInterface,
};

/// Mock device.  Records every mutation and, when the configured status
/// means success, applies it to its interface list.
#[derive(Default)]
pub struct MockDevice {
    interfaces: Mutex<Vec<ObservedInterface>>,
    statuses: Mutex<HashMap<MutationAction, u16>>,
    mutations: Mutex<Vec<(MutationAction, Option<InterfaceConfig>)>>,
    get_calls: AtomicUsize,
    unreachable: AtomicBool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interface(&self, interface: ObservedInterface) {
        self.interfaces.lock().unwrap().push(interface);
    }

    /// Status returned for `action` instead of the expected one.
    pub fn set_status(&self, action: MutationAction, status: u16) {
        self.statuses.lock().unwrap().insert(action, status);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn mutations(&self) -> Vec<(MutationAction, Option<InterfaceConfig>)> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn interfaces(&self) -> Vec<ObservedInterface> {
        self.interfaces.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(Error::DeviceUnreachable("mock device unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn status_for(&self, action: MutationAction, default: u16) -> u16 {
        self.statuses
            .lock()
            .unwrap()
            .get(&action)
            .copied()
            .unwrap_or(default)
    }

    fn store(&self, config: &InterfaceConfig) {
        let observed = ObservedInterface {
            name: config.name.clone(),
            description: Some(config.description.clone()),
            address: Some(config.address),
            netmask: Some(config.netmask.clone()),
        };
        let mut interfaces = self.interfaces.lock().unwrap();
        match interfaces.iter_mut().find(|i| i.name == config.name) {
            Some(existing) => *existing = observed,
            None => interfaces.push(observed),
        }
    }
}

#[async_trait]
impl DeviceClient for MockDevice {
    async fn get_interfaces(&self) -> Result<Vec<ObservedInterface>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.interfaces())
    }

    async fn create_interface(&self, config: &InterfaceConfig) -> Result<u16> {
        self.check_reachable()?;
        self.mutations
            .lock()
            .unwrap()
            .push((MutationAction::Create, Some(config.clone())));
        let status = self.status_for(MutationAction::Create, 201);
        if status == 201 {
            self.store(config);
        }
        Ok(status)
    }

    async fn replace_interface(&self, config: &InterfaceConfig) -> Result<u16> {
        self.check_reachable()?;
        self.mutations
            .lock()
            .unwrap()
            .push((MutationAction::Update, Some(config.clone())));
        let status = self.status_for(MutationAction::Update, 204);
        if status == 204 {
            self.store(config);
        }
        Ok(status)
    }

    async fn delete_interface(&self, name: &str) -> Result<u16> {
        self.check_reachable()?;
        self.mutations
            .lock()
            .unwrap()
            .push((MutationAction::Delete, None));
        let status = self.status_for(MutationAction::Delete, 204);
        if status == 204 {
            self.interfaces.lock().unwrap().retain(|i| i.name != name);
        }
        Ok(status)
    }
}

/// Mock inventory.  Device ids are the device names, interface ids are
/// `<device>:<interface>`.
#[derive(Default)]
pub struct MockInventory {
    devices: Mutex<Vec<InventoryDevice>>,
    interfaces: Mutex<Vec<(String, InventoryInterface)>>,
    addresses: Mutex<HashMap<String, Vec<InventoryAddress>>>,
    failing: AtomicBool,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, name: &str, role: &str) {
        self.devices.lock().unwrap().push(InventoryDevice {
            id: name.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            device_type: "CSR1000v".to_string(),
        });
    }

    pub fn add_interface(&self, device: &str, name: &str, kind: &str, addresses: &[&str]) {
        let id = format!("{}:{}", device, name);
        self.interfaces.lock().unwrap().push((
            device.to_string(),
            InventoryInterface {
                id: id.clone(),
                name: name.to_string(),
                kind: kind.to_string(),
            },
        ));
        self.addresses.lock().unwrap().insert(
            id,
            addresses
                .iter()
                .map(|a| InventoryAddress {
                    address: a.to_string(),
                })
                .collect(),
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Inventory("mock inventory failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Inventory for MockInventory {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>> {
        self.check()?;
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn list_interfaces(&self, device_id: &str) -> Result<Vec<InventoryInterface>> {
        self.check()?;
        Ok(self
            .interfaces
            .lock()
            .unwrap()
            .iter()
            .filter(|(device, _)| device == device_id)
            .map(|(_, interface)| interface.clone())
            .collect())
    }

    async fn list_ip_addresses(&self, interface_id: &str) -> Result<Vec<InventoryAddress>> {
        self.check()?;
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .get(interface_id)
            .cloned()
            .unwrap_or_default())
    }
}
