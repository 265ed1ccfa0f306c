// crates/annex-flywheel/src/serde_u128.rs
//
// Serde helpers for u128 token amounts.
//
// Amounts are written as decimal strings so that consumers whose JSON numbers
// are doubles see exact values. Reading accepts either a string or a plain
// integer up to u64::MAX, which keeps hand-written transaction scripts short.
// Larger amounts must be quoted: JSON parsers hand them over as floats.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = u128;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
        Ok(v as u128)
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
        u128::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<u128, E> {
        Err(E::custom(format!(
            "amount {} is not an exact integer; write amounts above {} as a decimal string",
            v,
            u64::MAX
        )))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
        v.parse::<u128>()
            .map_err(|e| E::custom(format!("invalid amount {:?}: {}", v, e)))
    }
}

/// A u128 that (de)serializes through this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(pub u128);

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Amount)
    }
}

/// Same encoding for the values of a `BTreeMap<K, u128>`.
pub mod map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Amount;

    pub fn serialize<K, S>(value: &BTreeMap<K, u128>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        S: Serializer,
    {
        serializer.collect_map(value.iter().map(|(k, v)| (k, Amount(*v))))
    }

    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, u128>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, Amount>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_strings() {
        let json = serde_json::to_string(&Amount(u128::MAX)).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));
    }

    #[test]
    fn test_reads_strings_and_integers() {
        let a: Amount = serde_json::from_str("\"500000000000000000\"").unwrap();
        let b: Amount = serde_json::from_str("500000000000000000").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert!(serde_json::from_str::<Amount>("\"1.5\"").is_err());
    }

    #[test]
    fn test_unquoted_amount_above_u64_asks_for_string() {
        let err = serde_json::from_str::<Amount>("20000000000000000000").unwrap_err();
        assert!(err.to_string().contains("decimal string"));

        let quoted: Amount = serde_json::from_str("\"20000000000000000000\"").unwrap();
        assert_eq!(quoted, Amount(20 * 1_000_000_000_000_000_000));
    }
}
