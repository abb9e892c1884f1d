//! Referral code type.

use core::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ReferralCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferralCodeError {
    /// The input has the wrong number of characters.
    #[error("referral code must be exactly {expected} characters")]
    WrongLength {
        /// Required length.
        expected: usize,
    },
    /// The input contains a character outside the code alphabet.
    #[error("referral code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A user's referral code.
///
/// Codes are fixed-length strings over an uppercase alphanumeric alphabet that
/// omits glyphs easily confused when read aloud or copied by hand (`0`, `O`,
/// `1`, `I`). Parsing is case-insensitive; the canonical form is uppercase.
///
/// With 32 symbols and 8 positions there are 2^40 possible codes, so a random
/// collision is unlikely but still has to be handled by the assigner.
///
/// ## Examples
///
/// ```
/// use garden_core::ReferralCode;
///
/// let code = ReferralCode::parse("abcd2345").unwrap();
/// assert_eq!(code.as_str(), "ABCD2345");
///
/// assert!(ReferralCode::parse("SHORT").is_err());
/// assert!(ReferralCode::parse("ABCD0000").is_err()); // '0' is not in the alphabet
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Number of characters in every code.
    pub const LENGTH: usize = 8;

    /// Characters a code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Generate a random code using the supplied RNG.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..Self::LENGTH)
            .filter_map(|_| Self::ALPHABET.choose(rng).map(|&b| char::from(b)))
            .collect();
        Self(code)
    }

    /// Generate a random code using the thread-local RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Parse a code, normalizing to uppercase.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is not exactly [`Self::LENGTH`]
    /// characters from [`Self::ALPHABET`].
    pub fn parse(s: &str) -> Result<Self, ReferralCodeError> {
        let normalized = s.trim().to_ascii_uppercase();

        if normalized.chars().count() != Self::LENGTH {
            return Err(ReferralCodeError::WrongLength {
                expected: Self::LENGTH,
            });
        }

        if let Some(bad) = normalized
            .chars()
            .find(|c| u8::try_from(*c).map_or(true, |b| !Self::ALPHABET.contains(&b)))
        {
            return Err(ReferralCodeError::InvalidCharacter(bad));
        }

        Ok(Self(normalized))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ReferralCode {
    type Err = ReferralCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = ReferralCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReferralCode> for String {
    fn from(code: ReferralCode) -> Self {
        code.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ReferralCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ReferralCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ReferralCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
