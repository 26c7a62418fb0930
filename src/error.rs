//! Error types for ipsync.

use thiserror::Error;

use crate::types::MutationAction;

/// Main error type for reconciliation runs.
#[derive(Debug, Error)]
pub enum Error {
    /// Config or rule file missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An inventory value failed validation or could not be parsed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport, auth or timeout failure talking to the device.
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("unsupported interface type for {0}")]
    UnsupportedInterfaceType(String),

    /// The device answered with a status other than the expected one.
    #[error("{action} of {interface} failed with status {status}")]
    MutationFailed {
        action: MutationAction,
        interface: String,
        status: u16,
    },

    #[error("invalid prefix length {0}, expected 0..=32")]
    InvalidPrefixLength(u32),

    /// Failure reading from the inventory-of-record.
    #[error("inventory error: {0}")]
    Inventory(String),

    /// Report file or operator prompt I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
