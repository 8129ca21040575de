use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroize;

/// Community strings and USM passphrases.
///
/// Debug and Display print "[REDACTED]"; the buffer is zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First two characters followed by "**", for log lines that need to
    /// tell credentials apart.
    pub fn hint(&self) -> String {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (None, _, _) => "[redacted]".to_string(),
            (Some(_), None, _) | (Some(_), Some(_), None) => "**".to_string(),
            (Some(a), Some(b), Some(_)) => format!("{}{}**", a, b),
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}
