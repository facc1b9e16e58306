//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,

    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,

    #[error("email is not a valid address ({0})")]
    Malformed(&'static str),
}

/// A trimmed, lowercased email address.
///
/// Emails are the login identity for shoppers and staff, so two spellings of
/// the same address must compare equal and hit the same unique index.
/// Deserializing goes through [`Email::parse`] as well.
///
/// ```
/// use atelier_core::Email;
///
/// assert_eq!(Email::parse(" Jane@Shop.IN ").unwrap().as_str(), "jane@shop.in");
/// assert!(Email::parse("jane@localhost").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Validate and normalize an address.
    ///
    /// The check is structural: one `@`, a non-empty local part, and a
    /// dotted domain whose labels are non-empty.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EmailError::Empty);
        }
        if raw.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(EmailError::Malformed("contains whitespace"));
        }

        let (local, domain) = raw
            .split_once('@')
            .ok_or(EmailError::Malformed("missing @"))?;
        if domain.contains('@') {
            return Err(EmailError::Malformed("more than one @"));
        }
        if local.is_empty() {
            return Err(EmailError::Malformed("nothing before @"));
        }
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return Err(EmailError::Malformed("domain needs a dot"));
        }

        Ok(Self(raw.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
