//! Core data model: fixed-point price/size, levels, markets, tokens, and
//! the typed update fed into the engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CollectorError;

/// Fixed-point monetary/quantity value scaled by 10^6 (1 == $0.000001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Micros(pub i64);

const SCALE: i64 = 1_000_000;

impl Micros {
    pub const ZERO: Micros = Micros(0);

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    /// Parses a decimal string of the form `"d.dddddd"`. Extra fractional
    /// digits beyond six are truncated, never rounded.
    pub fn parse_decimal(raw: &str) -> Result<Micros, CollectorError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(CollectorError::InvalidScale("empty numeric string".to_string()));
        }

        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let mut parts = s.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(CollectorError::InvalidScale(raw.to_string()));
        }

        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| CollectorError::InvalidScale(raw.to_string()))?
        };

        let mut value = int_value
            .checked_mul(SCALE)
            .ok_or_else(|| CollectorError::InvalidScale(raw.to_string()))?;

        let mut scale = SCALE / 10;
        for c in frac_part.chars().take(6) {
            let digit = c
                .to_digit(10)
                .ok_or_else(|| CollectorError::InvalidScale(raw.to_string()))? as i64;
            value += digit * scale;
            scale /= 10;
        }
        // Any digits beyond the sixth are truncated, but must still be digits.
        for c in frac_part.chars().skip(6) {
            if !c.is_ascii_digit() {
                return Err(CollectorError::InvalidScale(raw.to_string()));
            }
        }

        if negative {
            value = -value;
        }

        Ok(Micros(value))
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let abs = self.0.unsigned_abs();
        let int_part = abs / SCALE as u64;
        let frac_part = abs % SCALE as u64;
        if negative {
            write!(f, "-")?;
        }
        write!(f, "{}.{:06}", int_part, frac_part)
    }
}

impl FromStr for Micros {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Micros::parse_decimal(s)
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => {
                Micros::parse_decimal(&s).map_err(serde::de::Error::custom)
            }
            serde_json::Value::Number(n) => {
                Micros::parse_decimal(&n.to_string()).map_err(serde::de::Error::custom)
            }
            other => Err(serde::de::Error::custom(format!(
                "expected string or number for fixed-point value, got {other}"
            ))),
        }
    }
}

/// Which side of the book a level or update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl FromStr for Side {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" | "buy" => Ok(Side::Bid),
            "ask" | "sell" => Ok(Side::Ask),
            other => Err(CollectorError::InvalidSide(other.to_string())),
        }
    }
}

/// A resting price level. Equality is on `price` alone.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Level {
    pub price: Micros,
    pub size: Micros,
    pub updated_at: DateTime<Utc>,
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.price == other.price
    }
}
impl Eq for Level {}

/// A venue identifier, e.g. `"polymarket"` or `"kalshi"`.
pub type Platform = String;

/// Persisted market record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub platform: Platform,
    pub description: String,
    pub end_date: Option<DateTime<Utc>>,
}

/// A tradable token within a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub market_id: String,
    pub outcome: String,
}

/// A unit of work consumed by a token worker.
///
/// `Level` carries an absolute set (`is_delta = false`) or a signed delta
/// (`is_delta = true`) for one price. `ReplaceSide` clears the named side
/// of the book before the caller applies the new levels, so the stored
/// book matches a full-book event's content exactly regardless of what
/// was previously resting there.
#[derive(Debug, Clone)]
pub enum Update {
    Level {
        token_id: String,
        side: Side,
        price: Micros,
        size: Micros,
        event_time: Option<DateTime<Utc>>,
        is_delta: bool,
    },
    ReplaceSide {
        token_id: String,
        side: Side,
        levels: Vec<(Micros, Micros)>,
        event_time: Option<DateTime<Utc>>,
    },
}

impl Update {
    pub fn token_id(&self) -> &str {
        match self {
            Update::Level { token_id, .. } => token_id,
            Update::ReplaceSide { token_id, .. } => token_id,
        }
    }
}

/// One row of a depth snapshot, ready for the store's bulk-insert path.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub time: DateTime<Utc>,
    pub token_id: String,
    pub side: Side,
    pub level: usize,
    pub price: i64,
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_precision_string() {
        assert_eq!(Micros::parse_decimal("0.450000").unwrap().0, 450_000);
    }

    #[test]
    fn truncates_extra_fractional_digits() {
        assert_eq!(Micros::parse_decimal("0.1234567").unwrap().0, 123_456);
    }

    #[test]
    fn round_trips_arbitrary_precision() {
        let cases = [
            ("1.5", 1_500_000),
            ("0.000001", 1),
            ("12.340000", 12_340_000),
            ("0", 0),
            ("3", 3_000_000),
        ];
        for (s, expected) in cases {
            assert_eq!(Micros::parse_decimal(s).unwrap().0, expected, "case {s}");
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Micros::parse_decimal("abc").is_err());
        assert!(Micros::parse_decimal("1.2a").is_err());
    }

    #[test]
    fn side_from_str_accepts_venue_aliases() {
        assert_eq!(Side::from_str("BUY").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("sell").unwrap(), Side::Ask);
        assert!(Side::from_str("sideways").is_err());
    }
}
