//! TX replay counter and IV generation.
//!
//! The 6-byte message counter is a 3-byte restart counter kept in
//! non-volatile storage followed by a 3-byte ephemeral counter kept in RAM:
//!
//! ```text
//!   ┌──────── persistent ────────┬──────── ephemeral ─────────┐
//!   │ p0        p1        p2     │ e0        e1        e2     │
//!   └────────────────────────────┴────────────────────────────┘
//!     advanced once per boot       seeded from entropy at boot,
//!     and on ephemeral carry       +1 per issued value
//! ```
//!
//! The restart counter is durably advanced (or reseeded from zero) before
//! the first value of each boot is issued, so a value can never repeat
//! across power cycles.  Durable writes happen only at boot, on ephemeral
//! overflow, and on explicit increment or reset.
//!
//! The IV for an outbound secure frame is the 6-byte node ID followed by
//! the 6-byte counter.

use core::cell::Cell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::app::ports::{EntropySource, NonVolatileStore};
use crate::config::LinkConfig;
use crate::error::CounterError;

use super::record::{self, CopySlot, PersistentRecord, RECORD_LEN, RestartCounter};

/// Bytes of node ID at the start of every IV.
pub const DEVICE_ID_LEN: usize = 6;
/// Bytes in the full message counter.
pub const COUNTER_LEN: usize = 6;
/// Bytes in an AES-GCM IV.
pub const IV_LEN: usize = DEVICE_ID_LEN + COUNTER_LEN;

pub type DeviceId = [u8; DEVICE_ID_LEN];
pub type Iv = [u8; IV_LEN];

// ── Message counter value ─────────────────────────────────────

/// A 6-byte message counter, most significant byte first.
///
/// Ordering of the byte arrays is numeric ordering of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageCounter([u8; COUNTER_LEN]);

impl MessageCounter {
    pub const fn from_bytes(bytes: [u8; COUNTER_LEN]) -> Self {
        Self(bytes)
    }

    fn from_parts(persistent: RestartCounter, ephemeral: [u8; 3]) -> Self {
        let [p0, p1, p2] = persistent;
        let [e0, e1, e2] = ephemeral;
        Self([p0, p1, p2, e0, e1, e2])
    }

    pub const fn as_bytes(&self) -> &[u8; COUNTER_LEN] {
        &self.0
    }

    pub fn persistent(&self) -> RestartCounter {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn ephemeral(&self) -> [u8; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    /// Counter as an integer (48 significant bits).
    pub fn value(&self) -> u64 {
        let mut be = [0u8; 8];
        be[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(be)
    }

    fn set_persistent(&mut self, persistent: RestartCounter) {
        self.0[..3].copy_from_slice(&persistent);
    }

    /// Advance the ephemeral part; true on carry out of its top byte.
    fn increment_ephemeral(&mut self) -> bool {
        for i in (3..COUNTER_LEN).rev() {
            self.0[i] = self.0[i].wrapping_add(1);
            if self.0[i] != 0 {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for MessageCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

// ── Manager state ─────────────────────────────────────────────

/// Lifecycle of the counter manager within one boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterState {
    /// No value issued yet this boot; the next request runs boot init.
    Uninitialized,
    /// Restart counter advanced and ephemeral part seeded.
    Initialized,
    /// The restart counter cannot advance.  Only a reset leaves this state.
    Exhausted,
}

/// Running totals since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterStats {
    /// Counter values handed out.
    pub issued: u32,
    /// Durable restart counter advances (boot and carry).
    pub persistent_rolls: u32,
    /// Reads that had to use the secondary copy.
    pub secondary_fallbacks: u32,
    /// Requests refused with an error.
    pub failures: u32,
}

/// Keep the top nibble of the most significant byte clear, so a seeded
/// value leaves most of the counter's life unused.
fn fold_top_nibble(b: u8) -> u8 {
    0x0F & (b ^ (b >> 4))
}

/// A programmed node ID byte has the top bit set and is not blank.
pub fn is_valid_id_byte(b: u8) -> bool {
    (0x80..=0xFE).contains(&b)
}

// ── TxCounter ─────────────────────────────────────────────────

/// Persistent + ephemeral TX message counter for one node ID and key.
///
/// Owns its store and entropy source.  Not for use from interrupt
/// context; the ephemeral update itself runs inside a critical section so
/// [`current`](Self::current) can be sampled from anywhere.
pub struct TxCounter<S, E> {
    store: S,
    entropy: E,
    node_id_addr: usize,
    record_addr: usize,
    renew_threshold: u8,
    state: CounterState,
    /// Last issued value.  Ephemeral part only changes under the lock.
    current: Mutex<CriticalSectionRawMutex, Cell<MessageCounter>>,
    /// An ephemeral wrap whose restart counter advance has not yet
    /// succeeded.  Nothing is issued while set.
    carry_pending: bool,
    device_id: Option<DeviceId>,
    stats: CounterStats,
}

impl<S: NonVolatileStore, E: EntropySource> TxCounter<S, E> {
    /// Manager using the default non-volatile layout.
    pub fn new(store: S, entropy: E) -> Self {
        let cfg = LinkConfig::default();
        Self::from_parts(store, entropy, &cfg)
    }

    /// Manager using the layout in `cfg`, validated against the store size.
    pub fn with_config(store: S, entropy: E, cfg: &LinkConfig) -> crate::Result<Self> {
        cfg.validate(store.len())?;
        Ok(Self::from_parts(store, entropy, cfg))
    }

    fn from_parts(store: S, entropy: E, cfg: &LinkConfig) -> Self {
        Self {
            store,
            entropy,
            node_id_addr: cfg.node_id_addr as usize,
            record_addr: cfg.counter_record_addr as usize,
            renew_threshold: cfg.renew_threshold,
            state: CounterState::Uninitialized,
            current: Mutex::new(Cell::new(MessageCounter::from_bytes([0; COUNTER_LEN]))),
            carry_pending: false,
            device_id: None,
            stats: CounterStats::default(),
        }
    }

    pub fn state(&self) -> CounterState {
        self.state
    }

    pub fn stats(&self) -> CounterStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Node ID if it has already been read this boot.
    pub fn cached_device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    /// Give back the store and entropy source, e.g. to simulate a reboot.
    pub fn into_inner(self) -> (S, E) {
        (self.store, self.entropy)
    }

    /// Most recently issued value, if any this boot.
    pub fn current(&self) -> Option<MessageCounter> {
        match self.state {
            CounterState::Initialized if !self.carry_pending => Some(self.current.lock(Cell::get)),
            _ => None,
        }
    }

    // ── Counter ───────────────────────────────────────────────

    /// Next strictly increasing message counter.
    ///
    /// The first call after boot durably advances the restart counter (or
    /// reseeds it if it is zero) and seeds the ephemeral part.  Later
    /// calls only touch RAM, except when the ephemeral part wraps.
    pub fn next_counter(&mut self) -> Result<MessageCounter, CounterError> {
        let result = self.advance();
        match result {
            Ok(_) => self.stats.issued = self.stats.issued.saturating_add(1),
            Err(e) => {
                self.stats.failures = self.stats.failures.saturating_add(1);
                if e == CounterError::Exhausted && self.state != CounterState::Exhausted {
                    error!("txctr: restart counter exhausted, refusing to issue");
                    self.state = CounterState::Exhausted;
                }
            }
        }
        result
    }

    fn advance(&mut self) -> Result<MessageCounter, CounterError> {
        match self.state {
            CounterState::Exhausted => return Err(CounterError::Exhausted),
            CounterState::Uninitialized => return self.initialise(),
            CounterState::Initialized => {}
        }

        let carry = self.current.lock(|cell| {
            let mut ctr = cell.get();
            let carry = ctr.increment_ephemeral();
            cell.set(ctr);
            carry
        });
        if carry {
            debug!("txctr: ephemeral part wrapped");
            self.carry_pending = true;
        }
        if self.carry_pending {
            self.roll_persistent()?;
            self.carry_pending = false;
        }
        Ok(self.current.lock(Cell::get))
    }

    fn initialise(&mut self) -> Result<MessageCounter, CounterError> {
        let stored = self.load_persistent()?;
        let persistent = if record::is_zero(&stored) {
            info!("txctr: restart counter is zero, reseeding");
            self.reseed()?
        } else {
            self.advance_persistent(stored)?
        };

        // Entropy may be slow, so gather it before entering the lock.
        let mut seed = [0u8; 3];
        for b in &mut seed {
            *b = self.entropy.secure_random_byte();
        }
        seed[0] = fold_top_nibble(seed[0]);

        let first = self.current.lock(|cell| {
            let mut ctr = MessageCounter::from_parts(persistent, seed);
            // Seed is at most 0x0FFFFF, so this cannot carry.
            let _ = ctr.increment_ephemeral();
            cell.set(ctr);
            ctr
        });
        self.state = CounterState::Initialized;
        self.carry_pending = false;
        info!(
            "txctr: initialised, restart counter {:02x}{:02x}{:02x}",
            persistent[0], persistent[1], persistent[2]
        );
        Ok(first)
    }

    // ── IV ────────────────────────────────────────────────────

    /// 12-byte IV for the next outbound secure frame: node ID ‖ counter.
    ///
    /// The node ID is checked first so a missing ID never consumes a
    /// counter value.
    pub fn compute_iv(&mut self) -> Result<Iv, CounterError> {
        let id = self.device_id()?;
        let ctr = self.next_counter()?;
        let mut iv = [0u8; IV_LEN];
        iv[..DEVICE_ID_LEN].copy_from_slice(&id);
        iv[DEVICE_ID_LEN..].copy_from_slice(ctr.as_bytes());
        Ok(iv)
    }

    /// Node ID, read from the store once and cached.
    pub fn device_id(&mut self) -> Result<DeviceId, CounterError> {
        if let Some(id) = self.device_id {
            return Ok(id);
        }
        let mut id = [0u8; DEVICE_ID_LEN];
        self.store.read_block(self.node_id_addr, &mut id)?;
        if !id.iter().all(|&b| is_valid_id_byte(b)) {
            warn!("txctr: node ID not programmed: {:02x?}", id);
            return Err(CounterError::NoDeviceId);
        }
        self.device_id = Some(id);
        Ok(id)
    }

    // ── Restart counter ───────────────────────────────────────

    /// Validated restart counter as currently stored.
    pub fn persistent_part(&self) -> Result<RestartCounter, CounterError> {
        Ok(self.load_record()?.decode()?.value)
    }

    /// Durably advance the restart counter by one.
    ///
    /// Use with care: every call spends counter life that can only be
    /// recovered by changing node ID or key.
    pub fn increment_persistent_part(&mut self) -> Result<RestartCounter, CounterError> {
        let result = self.roll_persistent();
        if result == Err(CounterError::Exhausted) {
            self.state = CounterState::Exhausted;
        }
        result
    }

    /// Reset the restart counter, e.g. when the node ID or key changes.
    ///
    /// `all_zeros` erases the record to blank, which reads back as a zero
    /// counter.  Otherwise the counter is seeded with a non-zero random
    /// value that leaves most of its life.  Either way the next request
    /// re-runs boot initialisation.  Only safe together with a new key:
    /// values issued under the old key may be repeated.
    pub fn reset_persistent_part(&mut self, all_zeros: bool) -> Result<(), CounterError> {
        if all_zeros {
            for i in 0..RECORD_LEN {
                self.write_verified(self.record_addr + i, 0xFF)?;
            }
        } else {
            self.reseed()?;
        }
        self.state = CounterState::Uninitialized;
        self.carry_pending = false;
        info!("txctr: restart counter reset (all_zeros={})", all_zeros);
        Ok(())
    }

    /// Make room on the restart counter for a new key: advance it while
    /// its top byte is below the renewal threshold, else reseed it.
    ///
    /// An unreadable record is reported and left untouched: a reseed could
    /// land below the lost value.
    pub fn renew_persistent_part(&mut self) -> Result<(), CounterError> {
        let value = self.persistent_part()?;
        if value[0] < self.renew_threshold {
            self.increment_persistent_part()?;
            Ok(())
        } else {
            self.reset_persistent_part(false)
        }
    }

    /// Logical (de-inverted) record bytes, for test harnesses.
    pub fn raw_record(&self) -> Result<[u8; RECORD_LEN], CounterError> {
        Ok(self.load_record()?.logical())
    }

    /// Overwrite the record with logical bytes, for test harnesses.
    pub fn write_raw_record(&mut self, logical: &[u8; RECORD_LEN]) -> Result<(), CounterError> {
        self.save_record(&PersistentRecord::from_logical(*logical))
    }

    // ── Store access ──────────────────────────────────────────

    fn load_record(&self) -> Result<PersistentRecord, CounterError> {
        let mut stored = [0u8; RECORD_LEN];
        self.store.read_block(self.record_addr, &mut stored)?;
        Ok(PersistentRecord::from_stored(stored))
    }

    /// Validated restart counter, noting any fallback to the secondary.
    fn load_persistent(&mut self) -> Result<RestartCounter, CounterError> {
        let decoded = self.load_record()?.decode().inspect_err(|e| {
            error!("txctr: restart counter unreadable: {}", e);
        })?;
        if decoded.slot == CopySlot::Secondary {
            warn!("txctr: primary restart counter copy bad, using secondary");
            self.stats.secondary_fallbacks = self.stats.secondary_fallbacks.saturating_add(1);
        }
        Ok(decoded.value)
    }

    fn roll_persistent(&mut self) -> Result<RestartCounter, CounterError> {
        let stored = self.load_persistent()?;
        self.advance_persistent(stored)
    }

    /// Durably store `stored + 1` in both copies and adopt it.
    fn advance_persistent(&mut self, stored: RestartCounter) -> Result<RestartCounter, CounterError> {
        let value = record::increment(stored).ok_or(CounterError::Exhausted)?;
        self.save_record(&PersistentRecord::with_value(value))?;
        self.stats.persistent_rolls = self.stats.persistent_rolls.saturating_add(1);
        self.current.lock(|cell| {
            let mut ctr = cell.get();
            ctr.set_persistent(value);
            cell.set(ctr);
        });
        debug!(
            "txctr: restart counter now {:02x}{:02x}{:02x}",
            value[0], value[1], value[2]
        );
        Ok(value)
    }

    fn reseed(&mut self) -> Result<RestartCounter, CounterError> {
        let mut value: RestartCounter = [0; 3];
        for b in &mut value {
            *b = self.entropy.secure_random_byte();
        }
        value[0] = fold_top_nibble(value[0]);
        if record::is_zero(&value) {
            value[2] = 1;
        }
        self.save_record(&PersistentRecord::with_value(value))?;
        Ok(value)
    }

    /// Write both copies, primary first, each byte verified.
    fn save_record(&mut self, rec: &PersistentRecord) -> Result<(), CounterError> {
        for (i, b) in rec.stored().into_iter().enumerate() {
            self.write_verified(self.record_addr + i, b)?;
        }
        Ok(())
    }

    fn write_verified(&mut self, addr: usize, value: u8) -> Result<(), CounterError> {
        if value == 0xFF {
            self.store.erase_byte_to_blank(addr)?;
        } else {
            self.store.update_byte_if_different(addr, value)?;
        }
        let readback = self.store.read_byte(addr)?;
        if readback != value {
            error!(
                "txctr: verify failed at {}: wrote {:02x}, read {:02x}",
                addr, value, readback
            );
            return Err(CounterError::WriteVerify { addr });
        }
        Ok(())
    }
}
