use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Renders a prefix length as a dotted-quad netmask, e.g. `24` -> `255.255.255.0`.
pub fn prefix_length_to_mask(prefix_length: u32) -> Result<String> {
    if prefix_length > 32 {
        return Err(Error::InvalidPrefixLength(prefix_length));
    }
    // checked_shl: a shift by 32 would overflow for /0
    let mask = u32::MAX.checked_shl(32 - prefix_length).unwrap_or(0);
    Ok(Ipv4Addr::from(mask).to_string())
}
