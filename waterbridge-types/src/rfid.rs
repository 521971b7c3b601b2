//! RFID card records
//!
//! A card carries a tag identifier (the chip UID) and a block of
//! vending data whose layout depends on the protocol profile the
//! fleet runs: prepaid cards hold a balance and an expiry date,
//! quota cards hold a validity flag and a water volume.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RFID tag identifier
///
/// ISO 14443 UIDs come in single (4 bytes), double (7 bytes) and
/// triple (10 bytes) sizes, so the tag is capped at [`RfidTag::MAX_LEN`].
///
/// # Examples
///
/// ```
/// use waterbridge_types::RfidTag;
///
/// let tag = RfidTag::new(vec![0xA3, 0x34, 0x12, 0x08]).unwrap();
/// assert_eq!(tag.len(), 4);
///
/// assert!(RfidTag::new(vec![0; 11]).is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RfidTag(Vec<u8>);

impl RfidTag {
    /// Longest tag the reader hardware reports
    pub const MAX_LEN: usize = 10;

    /// Create a tag, rejecting identifiers longer than [`Self::MAX_LEN`]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        if bytes.len() > Self::MAX_LEN {
            return Err(Error::TagTooLong {
                len: bytes.len(),
                max: Self::MAX_LEN,
            });
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<u8>> for RfidTag {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl From<RfidTag> for Vec<u8> {
    fn from(tag: RfidTag) -> Vec<u8> {
        tag.0
    }
}

impl fmt::Debug for RfidTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RfidTag({:02X?})", self.0)
    }
}

impl fmt::Display for RfidTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Date stored on a card as a (year, month, day) triple
///
/// The year is an offset from 2000. The triple is carried on the wire
/// as-is, so out-of-range values survive a round trip; use
/// [`CardDate::to_naive_date`] to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardDate {
    pub year: u8,
    pub month: u8,
    pub day: u8,
}

impl CardDate {
    pub const fn new(year: u8, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// Wire representation
    pub fn to_bytes(self) -> [u8; 3] {
        [self.year, self.month, self.day]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// Convert to a calendar date
    pub fn to_naive_date(self) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(
            2000 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .ok_or_else(|| Error::InvalidDate(self.to_string()))
    }

    /// Convert from a calendar date in the years 2000..=2255
    pub fn from_naive_date(date: NaiveDate) -> Result<Self> {
        let year = u8::try_from(date.year() - 2000)
            .map_err(|_| Error::InvalidDate(format!("year {} out of range", date.year())))?;

        // month and day always fit in a byte
        Ok(Self::new(year, date.month() as u8, date.day() as u8))
    }
}

impl fmt::Display for CardDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Vending data stored on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum CardData {
    /// Monetary balance with issue and expiry dates
    Prepaid {
        balance: u16,
        issue_date: CardDate,
        expire_date: CardDate,
    },

    /// Validity flag with a water volume allowance
    Quota {
        valid: bool,
        volume: u16,
        issue_date: CardDate,
    },
}

impl CardData {
    pub fn issue_date(&self) -> CardDate {
        match self {
            Self::Prepaid { issue_date, .. } | Self::Quota { issue_date, .. } => *issue_date,
        }
    }

    pub fn expire_date(&self) -> Option<CardDate> {
        match self {
            Self::Prepaid { expire_date, .. } => Some(*expire_date),
            Self::Quota { .. } => None,
        }
    }

    /// Check whether the card may still be used on `today`
    ///
    /// Prepaid cards expire after their expiry date, quota cards carry
    /// their own validity flag. A date that is not a calendar date
    /// makes the card unusable.
    pub fn is_usable_on(&self, today: NaiveDate) -> bool {
        match self {
            Self::Prepaid { expire_date, .. } => expire_date
                .to_naive_date()
                .map(|expiry| today <= expiry)
                .unwrap_or(false),
            Self::Quota { valid, .. } => *valid,
        }
    }
}

/// Complete card record as read or written by the RFID reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidRecord {
    pub tag: RfidTag,
    pub data: CardData,
}

impl RfidRecord {
    pub fn new(tag: RfidTag, data: CardData) -> Self {
        Self { tag, data }
    }
}

impl fmt::Display for RfidRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            CardData::Prepaid { balance, expire_date, .. } => {
                write!(f, "Card[{}](balance={}, expires={})", self.tag, balance, expire_date)
            }
            CardData::Quota { valid, volume, .. } => {
                write!(f, "Card[{}](valid={}, volume={})", self.tag, valid, volume)
            }
        }
    }
}
