//! Data structures shared by the reconciliation engine.
//!
//! Desired state comes from the inventory-of-record and is flattened into
//! one [`DesiredInterface`] per interface address.  Observed state is read
//! from the device and kept tolerant: anything the device does not report
//! is `None` rather than an error.  Every decision the engine takes ends up
//! as exactly one [`ReconciliationOutcome`], which is the unit written to
//! the report.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Reported in place of an observed address when the interface is missing.
pub const NOT_DEFINED_ON_DEVICE: &str = "Interface and IP address is not defined!";
/// Reported when the interface exists but carries no IPv4 address.
pub const NO_ADDRESS_ON_DEVICE: &str = "IP address is not defined!";

/// A device as recorded in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDevice {
    pub id: String,
    pub name: String,
    pub role: String,
    pub device_type: String,
}

/// An interface of an inventory device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryInterface {
    pub id: String,
    pub name: String,
    /// Inventory interface type value, e.g. `1000base-t` or `virtual`.
    pub kind: String,
}

/// An address assignment in `ip/prefix` notation, exactly as the
/// inventory stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAddress {
    pub address: String,
}

/// One desired interface/IP pair.  Identity is `(device_name, interface_name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredInterface {
    pub device_name: String,
    pub device_role: String,
    pub interface_name: String,
    pub interface_type: String,
    pub desired_address: Ipv4Addr,
    pub desired_prefix_length: u8,
}

impl DesiredInterface {
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.desired_address, self.desired_prefix_length)
    }
}

/// Interface state as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedInterface {
    pub name: String,
    pub description: Option<String>,
    /// First IPv4 address configured on the interface.
    pub address: Option<Ipv4Addr>,
    pub netmask: Option<String>,
}

impl ObservedInterface {
    /// Neither a description nor an address is configured.  The engine
    /// treats such an interface the same as one missing from the device.
    pub fn is_undefined(&self) -> bool {
        self.description.is_none() && self.address.is_none()
    }
}

/// A change the engine can make on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Create => write!(f, "create"),
            MutationAction::Update => write!(f, "update"),
            MutationAction::Delete => write!(f, "delete"),
        }
    }
}

/// What happened to one desired address (or to a device whose hostname
/// was rejected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    InvalidHostname,
    InvalidAddress(String),
    InSync,
    Applied(MutationAction),
    /// `action` is `None` when the device could not even be read.
    Failed {
        action: Option<MutationAction>,
        reason: String,
    },
    Skipped(MutationAction),
    Cancelled(MutationAction),
}

/// The single recorded result of one reconciliation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub device: String,
    pub role: String,
    pub interface: String,
    pub interface_type: String,
    pub desired_cidr: String,
    /// Observed address, or a status text when there is none.
    pub observed: String,
    pub kind: OutcomeKind,
}

impl ReconciliationOutcome {
    /// Outcome for a device whose hostname does not match its role rule.
    pub fn invalid_hostname(device: &InventoryDevice) -> Self {
        Self {
            device: device.name.clone(),
            role: device.role.clone(),
            interface: String::new(),
            interface_type: String::new(),
            desired_cidr: String::new(),
            observed: String::new(),
            kind: OutcomeKind::InvalidHostname,
        }
    }

    /// Human readable text for the report's Actions column.
    pub fn actions(&self) -> String {
        match &self.kind {
            OutcomeKind::InvalidHostname => {
                "The device name does not conform to the specified format!".into()
            }
            OutcomeKind::InvalidAddress(reason) => {
                format!("IP address and netmask is not valid, skipped! ({reason})")
            }
            OutcomeKind::InSync => "IP addresses are same!".into(),
            OutcomeKind::Applied(MutationAction::Create) => {
                "Interface and IP address are added!".into()
            }
            OutcomeKind::Applied(MutationAction::Update) => "IP address is edited!".into(),
            OutcomeKind::Applied(MutationAction::Delete) => "Interface is deleted!".into(),
            OutcomeKind::Failed { action, reason } => match action {
                Some(MutationAction::Create) => format!(
                    "Error occurred while adding interface and IP address! ({reason})"
                ),
                Some(MutationAction::Update) => format!(
                    "Error occurred while editing interface and IP address! ({reason})"
                ),
                Some(MutationAction::Delete) => {
                    format!("Error occurred while deleting interface! ({reason})")
                }
                None => format!("Could not read interface state from device! ({reason})"),
            },
            OutcomeKind::Skipped(_) => {
                "IP address change was not confirmed, operation was skipped.".into()
            }
            OutcomeKind::Cancelled(_) => "Approval was cancelled, run stopped.".into(),
        }
    }

    /// The report row, in report column order.
    pub fn record(&self) -> [String; 7] {
        [
            self.device.clone(),
            self.role.clone(),
            self.interface.clone(),
            self.interface_type.clone(),
            self.desired_cidr.clone(),
            self.observed.clone(),
            self.actions(),
        ]
    }
}
