//! Read access to the inventory-of-record.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InventoryAddress, InventoryDevice, InventoryInterface};

pub mod nautobot;
pub use nautobot::NautobotInventory;

/// Desired state source.  Implementations hide pagination.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>>;
    async fn list_interfaces(&self, device_id: &str) -> Result<Vec<InventoryInterface>>;
    async fn list_ip_addresses(&self, interface_id: &str) -> Result<Vec<InventoryAddress>>;
}
