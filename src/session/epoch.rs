//! Shared epoch record and its coordinator.
//!
//! The epoch (timestamp + key) scopes which slots belong to the same journey.
//! Every context races to read and update one record; there is no lock, so
//! the handoff chain is advisory and last-write-wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::slot::SEPARATOR;
use crate::store::{SlotStore, StoreError};
use crate::util::Clock;

/// Classification bits of a journey nobody has analyzed yet.
pub const EMPTY_BITFIELD: &str = "0000000000";

/// Joins slot numbers in the handoff chain.
pub const CHAIN_SEPARATOR: char = '.';

const KEY_LEN: usize = 6;
const KEY_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity of one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochStamp {
    pub time_ms: u64,
    pub key: String,
}

impl EpochStamp {
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for EpochStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.time_ms, SEPARATOR, self.key)
    }
}

/// `<bitfield:10 digits>_<epochTime>_<epochKey>___<handoffChain>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpochRecord {
    /// Written only by the external analyzer; carried verbatim here.
    pub bitfield: String,
    pub stamp: EpochStamp,
    /// Slot numbers in the order contexts took over the journey.
    pub chain: Vec<u32>,
}

impl EpochRecord {
    pub fn fresh(stamp: EpochStamp) -> Self {
        Self {
            bitfield: EMPTY_BITFIELD.to_string(),
            stamp,
            chain: Vec::new(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.splitn(6, SEPARATOR);
        let bitfield = fields.next()?;
        if bitfield.len() != EMPTY_BITFIELD.len() || !bitfield.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let time_ms = fields.next()?.parse().ok()?;
        let key = fields.next()?;
        if !EpochStamp::is_valid_key(key) {
            return None;
        }
        // Two reserved fields.
        fields.next()?;
        fields.next()?;
        let chain = fields
            .next()?
            .split(CHAIN_SEPARATOR)
            .filter_map(|entry| entry.parse().ok())
            .collect();

        Some(Self {
            bitfield: bitfield.to_string(),
            stamp: EpochStamp {
                time_ms,
                key: key.to_string(),
            },
            chain,
        })
    }

    pub fn head(&self) -> Option<u32> {
        self.chain.last().copied()
    }
}

impl fmt::Display for EpochRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self.chain.iter().map(u32::to_string).collect();
        let s = SEPARATOR;
        write!(
            f,
            "{}{s}{}{s}{}{s}{s}{s}{}",
            self.bitfield,
            self.stamp.time_ms,
            self.stamp.key,
            chain.join(&CHAIN_SEPARATOR.to_string()),
        )
    }
}

fn random_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_LEN)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Reads and updates the shared epoch record.
#[derive(Clone)]
pub struct EpochCoordinator {
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    key: String,
    ttl: Duration,
}

impl EpochCoordinator {
    pub fn new(store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>, key: String, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            key,
            ttl,
        }
    }

    /// Current record; a malformed one reads as absent.
    pub fn read(&self) -> Result<Option<EpochRecord>, StoreError> {
        let Some(raw) = self.store.read(&self.key)? else {
            return Ok(None);
        };
        let parsed = EpochRecord::parse(&raw);
        if parsed.is_none() {
            tracing::warn!(key = %self.key, raw = %raw, "Ignoring malformed epoch record");
        }
        Ok(parsed)
    }

    pub fn write(&self, record: &EpochRecord) -> Result<(), StoreError> {
        self.store.write(&self.key, &record.to_string(), self.ttl)
    }

    /// Keep the record alive while the journey is in use. Returns false if
    /// it had already expired.
    pub fn touch(&self) -> Result<bool, StoreError> {
        self.store.touch(&self.key, self.ttl)
    }

    /// The current record, minting a fresh journey if there is none.
    pub fn ensure(&self) -> Result<EpochRecord, StoreError> {
        match self.read()? {
            Some(record) => Ok(record),
            None => self.mint(None),
        }
    }

    /// Start a new epoch.
    ///
    /// Rolling over from `previous` keeps its key and guarantees a different
    /// timestamp; without one a new key is drawn. Bitfield and chain start
    /// empty either way.
    pub fn mint(&self, previous: Option<&EpochStamp>) -> Result<EpochRecord, StoreError> {
        let now = self.clock.now_ms();
        let stamp = match previous {
            Some(previous) => EpochStamp {
                time_ms: now.max(previous.time_ms.saturating_add(1)),
                key: previous.key.clone(),
            },
            None => EpochStamp {
                time_ms: now,
                key: random_key(),
            },
        };
        let record = EpochRecord::fresh(stamp);
        self.write(&record)?;
        tracing::info!(epoch = %record.stamp, "Minted epoch");
        Ok(record)
    }

    /// Append `slot` to the handoff chain and return the previous head.
    ///
    /// Read-modify-write without a lock: two contexts handing off at once
    /// may lose one entry.
    pub fn append_handoff(&self, slot: u32) -> Result<Option<u32>, StoreError> {
        let Some(mut record) = self.read()? else {
            return Ok(None);
        };
        let previous = record.head();
        if previous != Some(slot) {
            record.chain.push(slot);
            self.write(&record)?;
            tracing::debug!(slot, previous = ?previous, "Appended handoff");
        }
        Ok(previous)
    }
}

impl fmt::Debug for EpochCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochCoordinator")
            .field("key", &self.key)
            .finish()
    }
}
