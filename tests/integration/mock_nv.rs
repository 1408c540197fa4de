//! Fault-injecting store and recording sink for integration tests.
//!
//! [`FaultyEeprom`] wraps the simulated EEPROM and can be told to fail
//! writes or to hold a cell stuck at a fixed value, so tests can check
//! how the counter reacts to a worn or failing part.

use trvlink::adapters::eeprom::SimEeprom;
use trvlink::app::events::LinkEvent;
use trvlink::app::ports::{EventSink, NonVolatileStore, StorageError};

// ── FaultyEeprom ──────────────────────────────────────────────

pub struct FaultyEeprom {
    pub inner: SimEeprom,
    /// Cell that always reads back this value, whatever was written.
    pub stuck: Option<(usize, u8)>,
    /// Number of further writes that succeed before every write fails.
    pub writes_left: Option<usize>,
    pub write_calls: usize,
}

#[allow(dead_code)]
impl FaultyEeprom {
    pub fn new(inner: SimEeprom) -> Self {
        Self {
            inner,
            stuck: None,
            writes_left: None,
            write_calls: 0,
        }
    }

    pub fn with_stuck_cell(mut self, addr: usize, value: u8) -> Self {
        self.stuck = Some((addr, value));
        self
    }

    pub fn failing_after(mut self, writes: usize) -> Self {
        self.writes_left = Some(writes);
        self
    }

    fn take_write(&mut self) -> Result<(), StorageError> {
        self.write_calls += 1;
        match self.writes_left.as_mut() {
            Some(0) => Err(StorageError::IoError),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl NonVolatileStore for FaultyEeprom {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StorageError> {
        match self.stuck {
            Some((at, value)) if at == addr => Ok(value),
            _ => self.inner.read_byte(addr),
        }
    }

    fn update_byte_if_different(&mut self, addr: usize, value: u8) -> Result<bool, StorageError> {
        self.take_write()?;
        self.inner.update_byte_if_different(addr, value)
    }

    fn erase_byte_to_blank(&mut self, addr: usize) -> Result<bool, StorageError> {
        self.take_write()?;
        self.inner.erase_byte_to_blank(addr)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<LinkEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&LinkEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LinkEvent) {
        self.events.push(*event);
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub const NODE_ID: [u8; 8] = [0x81, 0x92, 0xA3, 0xB4, 0xC5, 0xD6, 0xE7, 0xF8];
pub const NODE_ID_ADDR: usize = 20;
pub const RECORD_ADDR: usize = 104;

/// Blank EEPROM with only the node ID programmed.
pub fn provisioned_eeprom() -> SimEeprom {
    let mut ee = SimEeprom::new();
    ee.load(NODE_ID_ADDR, &NODE_ID);
    ee
}
