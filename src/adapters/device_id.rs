//! Node identity kept in non-volatile storage.
//!
//! The node ID is 8 bytes, each with the top bit set and never `0xFF`
//! (blank).  The first 6 bytes go into every TX IV, so the ID must be
//! programmed before the first secure frame is sent.  It is not secret
//! and is sent in the clear.
//!
//! Produces a short human-readable label in the form `TRV-XXYYZZ`
//! (bytes 3..6 of the ID in uppercase hex) for logs and provisioning.

use core::fmt::Write;

use log::{info, warn};

use crate::app::ports::{EntropySource, NonVolatileStore};
use crate::config::NODE_ID_LEN;
use crate::error::CounterError;
use crate::security::DeviceId;
use crate::security::counter::is_valid_id_byte;

/// Full 8-byte node ID as stored.
pub type NodeId = [u8; NODE_ID_LEN];

/// Fixed-size label string: "TRV-XXYYZZ" (10 chars).
pub type DeviceIdString = heapless::String<16>;

/// Attempts per byte before giving up on a broken entropy source.
const MAX_DRAWS_PER_BYTE: usize = 16;

/// Read the full node ID, failing if any byte is not valid.
pub fn read_node_id<S: NonVolatileStore>(store: &S, addr: usize) -> Result<NodeId, CounterError> {
    let mut id = [0u8; NODE_ID_LEN];
    store.read_block(addr, &mut id)?;
    if id.iter().all(|&b| is_valid_id_byte(b)) {
        Ok(id)
    } else {
        Err(CounterError::NoDeviceId)
    }
}

/// Make sure a valid node ID is stored, generating missing bytes.
///
/// Blank bytes (or all bytes, with `force`) are replaced with random
/// values that have the top bit set.  Changing the ID invalidates the
/// replay counter's history, so `force` must go with a counter reset.
pub fn ensure_node_id<S, E>(
    store: &mut S,
    entropy: &mut E,
    addr: usize,
    force: bool,
) -> Result<NodeId, CounterError>
where
    S: NonVolatileStore,
    E: EntropySource,
{
    let mut created = false;
    for i in 0..NODE_ID_LEN {
        let loc = addr + i;
        if force || store.read_byte(loc)? == 0xFF {
            let value = (0..MAX_DRAWS_PER_BYTE)
                .map(|_| 0x80 | entropy.secure_random_byte())
                .find(|&v| v != 0xFF)
                .ok_or(CounterError::NoDeviceId)?;
            store.update_byte_if_different(loc, value)?;
            created = true;
        }
    }
    let id = read_node_id(&*store, addr).inspect_err(|_| {
        warn!("device_id: stored node ID invalid after provisioning");
    })?;
    if created {
        info!("device_id: node ID set to {}", node_id_hex(&id));
    }
    Ok(id)
}

/// Derive the short label from bytes 3..6 of the IV device ID.
/// Format: `TRV-XXYYZZ` (e.g., `TRV-B4C5D6`).
pub fn device_label(id: &DeviceId) -> DeviceIdString {
    let mut label = DeviceIdString::new();
    let _ = write!(label, "TRV-{:02X}{:02X}{:02X}", id[3], id[4], id[5]);
    label
}

/// Whole node ID as space-separated hex pairs, for logs.
pub fn node_id_hex(id: &NodeId) -> heapless::String<24> {
    let mut s = heapless::String::<24>::new();
    for (i, b) in id.iter().enumerate() {
        let sep = if i == 0 { "" } else { " " };
        let _ = write!(s, "{}{:02x}", sep, b);
    }
    s
}
