//! Secret string wrapper for stored credentials.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

/// Sensitive string that zeroizes on drop and redacts its Debug output.
///
/// Used for the stored refresh credential. Serializes as a plain string so
/// the configuration record can persist it.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the inner value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::new("1//refresh-token");
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_serde_round_trip() {
        let secret = SecretString::new("tok");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"tok\"");

        let restored: SecretString = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.expose(), "tok");
    }
}
