//! Link configuration parameters
//!
//! Non-volatile layout and tuning for the secure radio link.
//! Defaults match the standard TRV node EEPROM map.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::security::record::RECORD_LEN;

/// Bytes reserved for the node ID (the first 6 go into every IV).
pub const NODE_ID_LEN: usize = 8;

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Non-volatile layout ---
    /// Offset of the 8-byte node ID
    pub node_id_addr: u16,
    /// Offset of the 8-byte restart counter record (primary + secondary)
    pub counter_record_addr: u16,

    // --- Counter policy ---
    /// Restart counter top byte below which a renew increments rather
    /// than reseeds
    pub renew_threshold: u8,

    // --- RX ---
    /// Install the trailing-zero trimming filter on the RX path
    pub trim_rx_trailing_zeros: bool,
    /// Log a hex dump of every received frame (debug builds)
    pub dump_rx_frames: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Layout
            node_id_addr: 20,
            counter_record_addr: 104,

            // Counter policy
            renew_threshold: 0x20,

            // RX
            trim_rx_trailing_zeros: false,
            dump_rx_frames: false,
        }
    }
}

impl LinkConfig {
    /// Range-check the layout against a store of `store_len` bytes.
    pub fn validate(&self, store_len: usize) -> Result<(), ConfigError> {
        let id = self.node_id_addr as usize;
        let rec = self.counter_record_addr as usize;
        if id + NODE_ID_LEN > store_len {
            return Err(ConfigError::ValidationFailed(
                "node_id_addr must leave 8 bytes inside the store",
            ));
        }
        if rec + RECORD_LEN > store_len {
            return Err(ConfigError::ValidationFailed(
                "counter_record_addr must leave 8 bytes inside the store",
            ));
        }
        if id < rec + RECORD_LEN && rec < id + NODE_ID_LEN {
            return Err(ConfigError::ValidationFailed(
                "node ID and counter record must not overlap",
            ));
        }
        if self.renew_threshold == 0 {
            return Err(ConfigError::ValidationFailed(
                "renew_threshold must be non-zero",
            ));
        }
        Ok(())
    }
}
