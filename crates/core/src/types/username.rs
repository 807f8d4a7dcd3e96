//! Login username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Shorter than [`Username::MIN_LENGTH`] after trimming.
    #[error("username must be at least {min} characters long")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than [`Username::MAX_LENGTH`].
    #[error("username must be at most {max} characters long")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains whitespace or a control character.
    #[error("username cannot contain spaces")]
    InvalidCharacter,
}

/// A trimmed, lowercased login name.
///
/// Usernames are case-insensitive: `Rahim` and `rahim` are the same account,
/// so lookups and uniqueness checks always go through this type.
///
/// ```
/// use freshbites_core::Username;
///
/// let name = Username::parse("  Rahim ").unwrap();
/// assert_eq!(name.as_str(), "rahim");
/// assert!(Username::parse("ab").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Minimum length in characters.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 32;

    /// Parse and normalize a username.
    ///
    /// # Errors
    ///
    /// Returns a [`UsernameError`] if the trimmed input is too short, too long,
    /// or contains whitespace/control characters.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let trimmed = s.trim();
        let len = trimmed.chars().count();

        if len < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(UsernameError::InvalidCharacter);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lowercases_and_trims() {
        assert_eq!(
            Username::parse(" FoodLover99 ").map(|u| u.0),
            Ok("foodlover99".to_owned())
        );
    }

    #[test]
    fn test_length_is_checked_after_trimming() {
        assert_eq!(
            Username::parse("  ab  "),
            Err(UsernameError::TooShort { min: 3 })
        );
        assert!(Username::parse("abc").is_ok());
        assert_eq!(
            Username::parse(&"x".repeat(33)),
            Err(UsernameError::TooLong { max: 32 })
        );
    }

    #[test]
    fn test_inner_whitespace_rejected() {
        assert_eq!(
            Username::parse("food lover"),
            Err(UsernameError::InvalidCharacter)
        );
    }

    #[test]
    fn test_case_variants_are_equal() {
        assert_eq!(Username::parse("Rahim"), Username::parse("RAHIM"));
    }
}
