//! Kennitala parsing, validation, decoding and formatting.
//!
//! Format: `DDMMYY-SSCR`
//!
//! - `DD` day of month, offset by 40 for companies
//! - `MM` month, `YY` two-digit year
//! - `SS` sequence digits
//! - `C` check digit over the first eight digits
//! - `R` century indicator (`8`, `9` or `0`)

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a kennitala.
pub const KENNITALA_LEN: usize = 10;

/// Offset added to the day field of a company kennitala.
pub const COMPANY_DAY_OFFSET: u8 = 40;

const CHECKSUM_WEIGHTS: [u32; 8] = [3, 2, 7, 6, 5, 4, 3, 2];

// ASCII only; `\D` would keep non-ASCII Unicode digits.
static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").unwrap());

/// Errors that can occur during kennitala operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KennitalaError {
    #[error("Kennitala needs to be provided as a String or Boolean (false)")]
    InvalidArgumentType,
    #[error("Kennitala is invalid")]
    InvalidFormat(InvalidReason),
    #[error("Invalid century indicator: {0}")]
    InvalidCentury(u8),
    #[error("Day field {0} belongs to neither a person nor a company")]
    InvalidEntityField(u8),
    #[error("Invalid month: {0}")]
    InvalidMonth(u8),
}

/// Why a normalized input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Normalized input did not contain exactly ten digits.
    Length(usize),
    /// Check digit does not match the first eight digits.
    Checksum,
    /// The first eight digits have no representable check digit.
    NoCheckDigit,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Length(_) => "length",
            Self::Checksum => "checksum",
            Self::NoCheckDigit => "no_check_digit",
        }
    }
}

/// Kind of entity a kennitala was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Person,
    Company,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "person" => Some(Self::Person),
            "company" => Some(Self::Company),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip everything that is not an ASCII digit, keeping order.
pub fn normalize(input: &str) -> String {
    NON_DIGITS.replace_all(input, "").into_owned()
}

/// Compute the check digit for the first eight digit values.
///
/// Returns `None` when `digits` is shorter than eight or when the weighted
/// sum leaves a remainder of one, for which no single check digit exists.
pub fn check_digit(digits: &[u8]) -> Option<u8> {
    let head = digits.get(..CHECKSUM_WEIGHTS.len())?;
    let sum: u32 = head
        .iter()
        .zip(CHECKSUM_WEIGHTS)
        .map(|(&d, w)| u32::from(d) * w)
        .sum();

    match 11 - sum % 11 {
        11 => Some(0),
        10 => None,
        check => Some(check as u8),
    }
}

/// Validate a kennitala string.
pub fn is_valid(input: &str) -> bool {
    Kennitala::parse(input).is_ok()
}

/// A validated Icelandic national identification number.
///
/// The digit sequence is checksum-valid and never changes after
/// construction. Date and entity information is decoded on access.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kennitala {
    // ASCII digits.
    digits: [u8; KENNITALA_LEN],
}

impl Kennitala {
    /// Parse arbitrary text, ignoring every non-digit character.
    pub fn parse(input: &str) -> Result<Self, KennitalaError> {
        let normalized = normalize(input);
        let digits: [u8; KENNITALA_LEN] = normalized
            .as_bytes()
            .try_into()
            .map_err(|_| KennitalaError::InvalidFormat(InvalidReason::Length(normalized.len())))?;

        Self::from_values(digits.map(|b| b - b'0'))
    }

    /// Validate digit values (each 0-9).
    pub(crate) fn from_values(values: [u8; KENNITALA_LEN]) -> Result<Self, KennitalaError> {
        debug_assert!(values.iter().all(|&d| d <= 9));

        let expected = check_digit(&values)
            .ok_or(KennitalaError::InvalidFormat(InvalidReason::NoCheckDigit))?;
        if expected != values[8] {
            return Err(KennitalaError::InvalidFormat(InvalidReason::Checksum));
        }

        Ok(Self {
            digits: values.map(|d| d + b'0'),
        })
    }

    /// Canonical ten-digit form.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.digits).unwrap_or_default()
    }

    /// Canonical form with `separator` between the date and sequence parts.
    pub fn pretty(&self, separator: &str) -> String {
        let s = self.as_str();
        format!("{}{}{}", &s[..6], separator, &s[6..])
    }

    /// Canonical form with a single space separator.
    pub fn pretty_default(&self) -> String {
        self.pretty(" ")
    }

    fn digit(&self, at: usize) -> u8 {
        self.digits[at] - b'0'
    }

    fn field(&self, at: usize) -> u8 {
        self.digit(at) * 10 + self.digit(at + 1)
    }

    /// Entity kind encoded in the day field.
    pub fn entity_kind(&self) -> Result<EntityKind, KennitalaError> {
        match self.field(0) {
            1..=31 => Ok(EntityKind::Person),
            41..=71 => Ok(EntityKind::Company),
            other => Err(KennitalaError::InvalidEntityField(other)),
        }
    }

    pub fn is_person(&self) -> bool {
        self.entity_kind() == Ok(EntityKind::Person)
    }

    pub fn is_company(&self) -> bool {
        self.entity_kind() == Ok(EntityKind::Company)
    }

    /// `"person"` or `"company"`.
    pub fn entity_type(&self) -> Result<&'static str, KennitalaError> {
        self.entity_kind().map(EntityKind::as_str)
    }

    /// Base year selected by the century indicator.
    pub fn century(&self) -> Result<i32, KennitalaError> {
        match self.digit(9) {
            8 => Ok(1800),
            9 => Ok(1900),
            0 => Ok(2000),
            other => Err(KennitalaError::InvalidCentury(other)),
        }
    }

    pub fn year(&self) -> Result<i32, KennitalaError> {
        Ok(self.century()? + i32::from(self.field(4)))
    }

    pub fn month(&self) -> Result<u32, KennitalaError> {
        match self.field(2) {
            m @ 1..=12 => Ok(u32::from(m)),
            other => Err(KennitalaError::InvalidMonth(other)),
        }
    }

    /// Day of month, clamped to the last day of the decoded month.
    pub fn day(&self) -> Result<u32, KennitalaError> {
        self.to_date().map(|d| d.day())
    }

    /// Decoded birth or registration date.
    pub fn to_date(&self) -> Result<NaiveDate, KennitalaError> {
        let raw_day = match self.entity_kind()? {
            EntityKind::Person => self.field(0),
            EntityKind::Company => self.field(0) - COMPANY_DAY_OFFSET,
        };
        let year = self.year()?;
        let month = self.month()?;
        let day = u32::from(raw_day).min(last_day_of_month(year, month));

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(KennitalaError::InvalidMonth(self.field(2)))
    }

    /// Age in whole years as of today.
    pub fn age(&self) -> Result<i32, KennitalaError> {
        self.age_on(Local::now().date_naive())
    }

    /// Age in whole years as of `today`. Negative for future dates.
    pub fn age_on(&self, today: NaiveDate) -> Result<i32, KennitalaError> {
        let born = self.to_date()?;
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        Ok(age)
    }
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    (29..=31)
        .rev()
        .find(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .unwrap_or(28)
}

impl fmt::Display for Kennitala {
    /// `{}` prints the canonical digits, `{:#}` the dash-separated form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.pretty("-"))
        } else {
            f.write_str(self.as_str())
        }
    }
}

impl fmt::Debug for Kennitala {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kennitala({self})")
    }
}

impl FromStr for Kennitala {
    type Err = KennitalaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Kennitala {
    type Error = KennitalaError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl Serialize for Kennitala {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct KennitalaVisitor;

impl Visitor<'_> for KennitalaVisitor {
    type Value = Kennitala;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a kennitala string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Kennitala::parse(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Kennitala {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(KennitalaVisitor)
    }
}
