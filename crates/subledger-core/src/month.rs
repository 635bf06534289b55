//! Calendar months and month ranges.
//!
//! A [`CalendarMonth`] is a (year, month) pair with no day component; it is
//! the billing granularity of the ledger. [`QueryPeriod`] is a closed range of
//! months over which costs are aggregated.
//!
//! Text encodings:
//! - `MM-YYYY` is the boundary format (`07-2025`), see [`CalendarMonth::parse_field`].
//! - `YYYY-MM` is the sortable storage format, see [`CalendarMonth::to_storage`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LedgerError, Result};

/// Smallest and largest representable years (four-digit text encodings).
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// A calendar month: year plus month number (1-12).
///
/// Ordering is chronological: year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    /// Create a calendar month, rejecting months outside 1-12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::invalid_argument(
                "month",
                month.to_string(),
                "month must be between 1 and 12",
            ));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(LedgerError::invalid_argument(
                "year",
                year.to_string(),
                format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
            ));
        }
        Ok(Self { year, month })
    }

    /// Year component.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month component (1-12).
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Signed number of months from `self` to `other`.
    ///
    /// `(other.year - self.year) * 12 + (other.month - self.month)`; negative
    /// when `other` precedes `self`.
    pub fn months_until(&self, other: &CalendarMonth) -> i64 {
        (i64::from(other.year) - i64::from(self.year)) * 12
            + (i64::from(other.month) - i64::from(self.month))
    }

    /// Parse a boundary-layer `MM-YYYY` value, naming `field` on failure.
    pub fn parse_field(field: &str, raw: &str) -> Result<Self> {
        let invalid = |message: &str| LedgerError::invalid_argument(field, raw, message);

        let (month, year) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected MM-YYYY"))?;
        if month.len() != 2 || year.len() != 4 || !all_digits(month) || !all_digits(year) {
            return Err(invalid("expected MM-YYYY"));
        }
        let month: u32 = month.parse().map_err(|_| invalid("month is not a number"))?;
        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;

        if !(1..=12).contains(&month) {
            return Err(invalid("month must be between 1 and 12"));
        }
        Self::new(year, month).map_err(|_| invalid("year out of range"))
    }

    /// Sortable storage encoding: `YYYY-MM`.
    pub fn to_storage(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Decode the storage encoding produced by [`CalendarMonth::to_storage`].
    pub fn from_storage(raw: &str) -> Result<Self> {
        let invalid = |message: &str| LedgerError::invalid_argument("stored_month", raw, message);

        let (year, month) = raw.split_once('-').ok_or_else(|| invalid("expected YYYY-MM"))?;
        if year.len() != 4 || month.len() != 2 || !all_digits(year) || !all_digits(month) {
            return Err(invalid("expected YYYY-MM"));
        }
        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;
        let month: u32 = month.parse().map_err(|_| invalid("month is not a number"))?;
        Self::new(year, month)
    }
}

/// Unsigned decimal only; integer `FromStr` would also take a leading `+`.
fn all_digits(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
}

impl Ord for CalendarMonth {
    fn cmp(&self, other: &Self) -> Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| self.month.cmp(&other.month))
    }
}

impl PartialOrd for CalendarMonth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Boundary format: `MM-YYYY`.
impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl FromStr for CalendarMonth {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_field("month", s)
    }
}

impl Serialize for CalendarMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Closed month range `[start, end]` over which costs are aggregated.
///
/// `start <= end` is not enforced; a reversed period is a valid value that
/// overlaps nothing (see [`QueryPeriod::is_empty`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPeriod {
    /// First month of the window.
    pub start: CalendarMonth,
    /// Last month of the window (inclusive).
    pub end: CalendarMonth,
}

impl QueryPeriod {
    /// Create a query period. No ordering check is applied.
    pub fn new(start: CalendarMonth, end: CalendarMonth) -> Self {
        Self { start, end }
    }

    /// Parse both bounds from `MM-YYYY` text, naming the failing bound.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: CalendarMonth::parse_field("start_period", start)?,
            end: CalendarMonth::parse_field("end_period", end)?,
        })
    }

    /// True when the start lies after the end, so no month is covered.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of months covered, 0 for a reversed period.
    pub fn len_months(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.start.months_until(&self.end) as u64 + 1
        }
    }
}
