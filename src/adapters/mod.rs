//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                   |
//! |-------------|-------------------|-------------------------------|
//! | `eeprom`    | NonVolatileStore  | NVS blob / in-memory image    |
//! | `entropy`   | EntropySource     | Hardware RNG / host hashing   |
//! | `log_sink`  | EventSink         | Serial log output             |
//! | `device_id` | —                 | Node ID provisioning / labels |

pub mod device_id;
pub mod eeprom;
pub mod entropy;
pub mod log_sink;
