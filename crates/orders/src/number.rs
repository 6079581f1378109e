use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human-readable order number: `ORD` + `YYYYMMDDHHMMSS` + 8 random hex chars.
///
/// Generation only makes collisions unlikely; uniqueness is enforced by the
/// event store through a unique claim on the number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD";

    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}{}{}",
            Self::PREFIX,
            now.format("%Y%m%d%H%M%S"),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generate_uses_timestamp_prefix_and_hex_suffix() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let number = OrderNumber::generate(now);
        let s = number.as_str();

        assert_eq!(s.len(), 3 + 14 + 8);
        assert!(s.starts_with("ORD20240309140507"));
        assert!(s[17..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_numbers_differ_within_the_same_second() {
        let now = Utc::now();
        assert_ne!(OrderNumber::generate(now), OrderNumber::generate(now));
    }
}
