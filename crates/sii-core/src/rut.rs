//! The Chilean tax identifier (RUT).
//!
//! A RUT is a numeric body plus one check character (`0`-`9` or `K`). Callers
//! write it in many shapes (`5.126.663-3`, `5126663-3`, `51266633`), so every
//! input is normalized before use: separators are stripped, the check
//! character is upper-cased, and the last character is split off as the check.

use crate::error::RutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widest body the upstream service issues (`99.999.999`).
pub const MAX_BODY_DIGITS: usize = 8;

const MAX_BODY: u32 = 99_999_999;

/// Normalized tax identifier.
///
/// Two `Rut`s compare equal when their canonical body and check character
/// match, regardless of how the caller originally formatted them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut {
    body: String,
    check: char,
}

impl Rut {
    /// Normalize a raw identifier.
    ///
    /// Accepts `.` and `-` separators anywhere, a lower-case `k`, and leading
    /// zeros in the body, which are dropped.
    ///
    /// # Errors
    /// Returns a [`RutError`] when fewer than two characters remain after
    /// removing separators, when the body is not numeric or wider than
    /// [`MAX_BODY_DIGITS`], or when the check character is not `0`-`9`/`K`.
    pub fn parse(input: &str) -> Result<Self, RutError> {
        let cleaned: String = input
            .chars()
            .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
            .collect();

        let Some((split_at, check)) = cleaned.char_indices().next_back() else {
            return Err(RutError::Empty);
        };
        if cleaned.chars().count() < 2 {
            return Err(RutError::TooShort {
                input: input.to_string(),
            });
        }

        let body = &cleaned[..split_at];
        if !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(RutError::NonNumericBody {
                input: input.to_string(),
            });
        }
        // zero padding is not significant
        let body = match body.trim_start_matches('0') {
            "" => "0",
            significant => significant,
        };
        if body.len() > MAX_BODY_DIGITS {
            return Err(RutError::TooLong {
                input: input.to_string(),
                digits: body.len(),
                max: MAX_BODY_DIGITS,
            });
        }

        let check = check.to_ascii_uppercase();
        if !(check.is_ascii_digit() || check == 'K') {
            return Err(RutError::InvalidCheckCharacter {
                input: input.to_string(),
                check,
            });
        }

        Ok(Self {
            body: body.to_string(),
            check,
        })
    }

    /// Build the identifier for a numeric body, computing its check character.
    ///
    /// # Errors
    /// Returns [`RutError::TooLong`] if the body exceeds [`MAX_BODY_DIGITS`].
    pub fn from_body(body: u32) -> Result<Self, RutError> {
        if body > MAX_BODY {
            let digits = body.to_string();
            return Err(RutError::TooLong {
                digits: digits.len(),
                input: digits,
                max: MAX_BODY_DIGITS,
            });
        }
        Ok(Self {
            body: body.to_string(),
            check: compute_check_digit(body),
        })
    }

    /// Numeric body, without separators.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body as a number.
    #[must_use]
    pub fn body_number(&self) -> u32 {
        // at most eight ASCII digits, so this cannot overflow
        self.body
            .bytes()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    }

    /// Upper-cased check character.
    #[must_use]
    pub fn check_digit(&self) -> char {
        self.check
    }

    /// Whether the check character matches the modulo-11 check for the body.
    ///
    /// Lookups do not require this; the upstream service has the last word.
    #[must_use]
    pub fn has_valid_check_digit(&self) -> bool {
        compute_check_digit(self.body_number()) == self.check
    }
}

/// Modulo-11 check character for a RUT body.
///
/// Digits are weighted 2..=7 from the least significant end, cycling. A
/// remainder of 0 yields `0`, a remainder of 1 yields `K`.
#[must_use]
pub fn compute_check_digit(mut body: u32) -> char {
    let mut sum = 0;
    let mut weight = 2;
    while body > 0 {
        sum += (body % 10) * weight;
        body /= 10;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }

    match sum % 11 {
        0 => '0',
        1 => 'K',
        // r is 2..=10 here, so 11 - r is a single digit
        r => char::from_digit(11 - r, 10).unwrap_or('K'),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.body, self.check)
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Rut {
    type Error = RutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rut> for String {
    fn from(rut: Rut) -> Self {
        rut.to_string()
    }
}
