//! EEPROM adapter.
//!
//! Implements [`NonVolatileStore`] twice:
//!
//! - [`SimEeprom`] — RAM-backed byte store with per-cell erase/write
//!   accounting, used on the host and in tests
//! - `NvsEeprom` (ESP-IDF only) — a byte-addressable EEPROM image kept as
//!   one NVS blob, with a RAM mirror for reads
//!
//! Both follow the same smart-update rules: never touch a cell that
//! already holds the target value, and when only bits need clearing, do a
//! write without the preceding erase.

use log::info;

use crate::app::ports::{NonVolatileStore, StorageError};

/// Size of the emulated EEPROM.
pub const EEPROM_LEN: usize = 1024;

const BLANK: u8 = 0xFF;

/// Erase/write cycles spent so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EepromWear {
    pub erases: u32,
    pub writes: u32,
}

/// What a smart update has to do to take a cell from `old` to `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellOp {
    Nothing,
    Erase,
    Write,
    EraseWrite,
}

fn plan_update(old: u8, new: u8) -> CellOp {
    if old == new {
        CellOp::Nothing
    } else if new == BLANK {
        CellOp::Erase
    } else if old & new == new {
        // Only clearing bits: no erase needed.
        CellOp::Write
    } else {
        CellOp::EraseWrite
    }
}

impl EepromWear {
    fn apply(&mut self, op: CellOp) {
        match op {
            CellOp::Nothing => {}
            CellOp::Erase => self.erases += 1,
            CellOp::Write => self.writes += 1,
            CellOp::EraseWrite => {
                self.erases += 1;
                self.writes += 1;
            }
        }
    }
}

// ── Simulation ────────────────────────────────────────────────

/// RAM-backed EEPROM, blank (`0xFF`) when created.
pub struct SimEeprom {
    cells: [u8; EEPROM_LEN],
    wear: EepromWear,
}

impl SimEeprom {
    pub fn new() -> Self {
        Self {
            cells: [BLANK; EEPROM_LEN],
            wear: EepromWear::default(),
        }
    }

    /// Program bytes directly, as a factory image would, without wear.
    ///
    /// # Panics
    ///
    /// If the bytes run past the end of the store.
    pub fn load(&mut self, addr: usize, bytes: &[u8]) {
        self.cells[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Overwrite one cell without wear, e.g. to inject corruption.
    pub fn poke(&mut self, addr: usize, value: u8) {
        self.cells[addr] = value;
    }

    pub fn wear(&self) -> EepromWear {
        self.wear
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    fn check(addr: usize) -> Result<(), StorageError> {
        if addr < EEPROM_LEN {
            Ok(())
        } else {
            Err(StorageError::OutOfRange { addr })
        }
    }
}

impl Default for SimEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl NonVolatileStore for SimEeprom {
    fn len(&self) -> usize {
        EEPROM_LEN
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StorageError> {
        Self::check(addr)?;
        Ok(self.cells[addr])
    }

    fn update_byte_if_different(&mut self, addr: usize, value: u8) -> Result<bool, StorageError> {
        Self::check(addr)?;
        let op = plan_update(self.cells[addr], value);
        self.wear.apply(op);
        self.cells[addr] = value;
        Ok(op != CellOp::Nothing)
    }

    fn erase_byte_to_blank(&mut self, addr: usize) -> Result<bool, StorageError> {
        self.update_byte_if_different(addr, BLANK)
    }
}

// ── ESP-IDF NVS-backed EEPROM ─────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::NvsEeprom;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
    use log::{info, warn};

    use super::{BLANK, EEPROM_LEN, EepromWear, plan_update};
    use crate::app::ports::{NonVolatileStore, StorageError};

    const NAMESPACE: &str = "trvlink";
    const IMAGE_KEY: &str = "eeprom";

    /// EEPROM image persisted as a single NVS blob.
    ///
    /// NVS commits are atomic, so a power cut leaves either the old or the
    /// new image, never a torn byte.
    pub struct NvsEeprom {
        nvs: EspNvs<NvsDefault>,
        mirror: [u8; EEPROM_LEN],
        wear: EepromWear,
    }

    impl NvsEeprom {
        pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, StorageError> {
            let nvs = EspNvs::new(partition, NAMESPACE, true).map_err(|e| {
                warn!("NvsEeprom: open failed: {}", e);
                StorageError::IoError
            })?;
            let mut mirror = [BLANK; EEPROM_LEN];
            match nvs.get_blob(IMAGE_KEY, &mut mirror) {
                Ok(Some(data)) => info!("NvsEeprom: loaded {}B image", data.len()),
                Ok(None) => info!("NvsEeprom: no image, starting blank"),
                Err(e) => {
                    warn!("NvsEeprom: read failed: {}", e);
                    return Err(StorageError::IoError);
                }
            }
            Ok(Self {
                nvs,
                mirror,
                wear: EepromWear::default(),
            })
        }

        pub fn wear(&self) -> EepromWear {
            self.wear
        }

        fn check(addr: usize) -> Result<(), StorageError> {
            if addr < EEPROM_LEN {
                Ok(())
            } else {
                Err(StorageError::OutOfRange { addr })
            }
        }
    }

    impl NonVolatileStore for NvsEeprom {
        fn len(&self) -> usize {
            EEPROM_LEN
        }

        fn read_byte(&self, addr: usize) -> Result<u8, StorageError> {
            Self::check(addr)?;
            Ok(self.mirror[addr])
        }

        fn update_byte_if_different(
            &mut self,
            addr: usize,
            value: u8,
        ) -> Result<bool, StorageError> {
            Self::check(addr)?;
            let op = plan_update(self.mirror[addr], value);
            if op == super::CellOp::Nothing {
                return Ok(false);
            }
            let old = self.mirror[addr];
            self.mirror[addr] = value;
            if let Err(e) = self.nvs.set_blob(IMAGE_KEY, &self.mirror) {
                warn!("NvsEeprom: commit of byte {} failed: {}", addr, e);
                self.mirror[addr] = old;
                return Err(StorageError::IoError);
            }
            self.wear.apply(op);
            Ok(true)
        }

        fn erase_byte_to_blank(&mut self, addr: usize) -> Result<bool, StorageError> {
            self.update_byte_if_different(addr, BLANK)
        }
    }
}

/// Log wear totals, e.g. from a stats command.
pub fn log_wear(label: &str, wear: EepromWear) {
    info!(
        "{}: EEPROM wear erases={} writes={}",
        label, wear.erases, wear.writes
    );
}
