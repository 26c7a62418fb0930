//! ipsync: converges device interface addressing toward the inventory-of-record.

pub mod approval;
pub mod config;
pub mod device;
pub mod error;
pub mod inventory;
pub mod netmask;
pub mod reconcile;
pub mod report;
pub mod test_utils;
pub mod types;
pub mod validate;

pub use error::{Error, Result};
