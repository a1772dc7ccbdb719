//! Country code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CountryCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeError {
    /// The input string is empty.
    #[error("country code cannot be empty")]
    Empty,
    /// The input has the wrong number of characters.
    #[error("country code must be 2 or 3 letters (got {len})")]
    InvalidLength {
        /// Number of characters in the input.
        len: usize,
    },
    /// The input contains something other than ASCII letters.
    #[error("country code must contain only letters")]
    NonAlphabetic,
}

/// Countries whose addresses must carry a postal code and a region.
const POSTAL_CODE_COUNTRIES: &[&str] = &["US", "CA"];

/// Display names for the countries buyers most often check out from.
///
/// Codes missing from this table display as the raw code.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CN", "China"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("ES", "Spain"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("HK", "Hong Kong"),
    ("IE", "Ireland"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("US", "United States"),
];

/// An upper-cased country code, as used by the order service and Stripe.
///
/// Accepts ISO 3166-1 alpha-2 and alpha-3 shaped codes. The order service is
/// lenient about the exact code list (legacy orders carry `UK`), so only the
/// shape is checked.
///
/// ## Examples
///
/// ```
/// use gallery_core::CountryCode;
///
/// let us = CountryCode::parse("us").unwrap();
/// assert_eq!(us.as_str(), "US");
/// assert!(us.requires_postal_code_and_region());
///
/// let aq = CountryCode::parse("AQ").unwrap();
/// assert!(!aq.requires_postal_code_and_region());
///
/// assert!(CountryCode::parse("").is_err());
/// assert!(CountryCode::parse("U5").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// The country preselected on an empty billing form.
    pub const DEFAULT: &'static str = "US";

    /// Parse a `CountryCode` from a string, upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, is not 2-3 characters long,
    /// or contains anything other than ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CountryCodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CountryCodeError::Empty);
        }

        let len = s.chars().count();
        if !(2..=3).contains(&len) {
            return Err(CountryCodeError::InvalidLength { len });
        }

        if !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CountryCodeError::NonAlphabetic);
        }

        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether addresses in this country need a postal code and a region.
    #[must_use]
    pub fn requires_postal_code_and_region(&self) -> bool {
        POSTAL_CODE_COUNTRIES.contains(&self.0.as_str())
    }

    /// Human-readable country name, falling back to the code itself.
    #[must_use]
    pub fn display_name(&self) -> &str {
        COUNTRY_NAMES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    /// `(code, name)` pairs offered in a country select, ordered by code.
    pub fn known() -> impl Iterator<Item = (&'static str, &'static str)> {
        COUNTRY_NAMES.iter().copied()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CountryCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
