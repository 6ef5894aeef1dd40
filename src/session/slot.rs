//! Slot record: one session lease in the shared store.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::epoch::EpochStamp;

/// Field separator of shared records.
pub const SEPARATOR: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Stored,
    Archived,
}

impl Lifecycle {
    pub fn digit(&self) -> char {
        match self {
            Lifecycle::Active => '1',
            Lifecycle::Stored => '2',
            Lifecycle::Archived => '3',
        }
    }

    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(Lifecycle::Active),
            '2' => Some(Lifecycle::Stored),
            '3' => Some(Lifecycle::Archived),
            _ => None,
        }
    }
}

/// Device class reported by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Unknown,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "d",
            DeviceClass::Mobile => "m",
            DeviceClass::Tablet => "t",
            DeviceClass::Unknown => "u",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "d" => DeviceClass::Desktop,
            "m" => DeviceClass::Mobile,
            "t" => DeviceClass::Tablet,
            _ => DeviceClass::Unknown,
        }
    }
}

/// How the journey entered the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginClass {
    Direct,
    Search,
    Social,
    Referral,
    Internal,
    #[default]
    Unknown,
}

impl OriginClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginClass::Direct => "d",
            OriginClass::Search => "s",
            OriginClass::Social => "o",
            OriginClass::Referral => "r",
            OriginClass::Internal => "i",
            OriginClass::Unknown => "u",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "d" => OriginClass::Direct,
            "s" => OriginClass::Search,
            "o" => OriginClass::Social,
            "r" => OriginClass::Referral,
            "i" => OriginClass::Internal,
            _ => OriginClass::Unknown,
        }
    }
}

/// Parsed slot record.
///
/// `<lifecycle>_<epochTime>_<epochKey>_<device>_<origin>_<coarse>_<fine>_<duration>_<trace>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRecord {
    pub lifecycle: Lifecycle,
    pub epoch: EpochStamp,
    pub device: DeviceClass,
    pub origin: OriginClass,
    /// Coarse gestures (actions)
    pub coarse: u32,
    /// Fine gestures (positions and values)
    pub fine: u32,
    pub duration_ticks: u64,
    pub trace: String,
}

impl SlotRecord {
    /// Parse a stored record. Malformed input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.splitn(9, SEPARATOR);
        let mut lifecycle_chars = fields.next()?.chars();
        let lifecycle = Lifecycle::from_digit(lifecycle_chars.next()?)?;
        if lifecycle_chars.next().is_some() {
            return None;
        }
        let time_ms = fields.next()?.parse().ok()?;
        let key = fields.next()?;
        if !EpochStamp::is_valid_key(key) {
            return None;
        }
        let device = DeviceClass::parse(fields.next()?);
        let origin = OriginClass::parse(fields.next()?);
        let coarse = fields.next()?.parse().ok()?;
        let fine = fields.next()?.parse().ok()?;
        let duration_ticks = fields.next()?.parse().ok()?;
        let trace = fields.next()?.to_string();

        Some(Self {
            lifecycle,
            epoch: EpochStamp {
                time_ms,
                key: key.to_string(),
            },
            device,
            origin,
            coarse,
            fine,
            duration_ticks,
            trace,
        })
    }

    /// Whether this slot is part of the live journey for `epoch`.
    pub fn belongs_to(&self, epoch: &EpochStamp) -> bool {
        &self.epoch == epoch
    }
}

impl fmt::Display for SlotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = SEPARATOR;
        write!(
            f,
            "{}{s}{}{s}{}{s}{}{s}{}{s}{}{s}{}{s}{}{s}{}",
            self.lifecycle.digit(),
            self.epoch.time_ms,
            self.epoch.key,
            self.device.as_str(),
            self.origin.as_str(),
            self.coarse,
            self.fine,
            self.duration_ticks,
            self.trace,
        )
    }
}
