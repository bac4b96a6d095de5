//! Serde helpers shared by the two wire formats.
//!
//! Both platforms are loose with JSON types: ids arrive as numbers or
//! strings, money as strings or floats, dates as unix timestamps. Everything
//! is pinned down here so the typed DTOs stay honest.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Deserialize an id that may be a JSON number or string.
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected id, got {other}"
        ))),
    }
}

/// Deserialize an optional id (absent, null, number or string).
pub fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected id, got {other}"
        ))),
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::Null => Some(Decimal::ZERO),
        _ => None,
    }
}

/// Deserialize a monetary amount that may be a string or a JSON number.
pub fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected amount, got {value}")))
}

/// Deserialize an optional amount; null and absent read as zero-less None.
pub fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => decimal_from_value(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected amount, got {v}"))),
    }
}

/// Deserialize a unix-seconds timestamp.
pub fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = i64::deserialize(deserializer)?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}")))
}

/// Treat empty strings as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "de_id")]
        id: String,
        #[serde(deserialize_with = "de_decimal")]
        amount: Decimal,
    }

    #[test]
    fn numeric_id_and_string_amount() {
        let p: Row = serde_json::from_str(r#"{"id": 42, "amount": "12.30"}"#).unwrap();
        assert_eq!(p.id, "42");
        assert_eq!(p.amount, Decimal::new(1230, 2));
    }

    #[test]
    fn string_id_and_float_amount() {
        let p: Row = serde_json::from_str(r#"{"id": "42", "amount": 12.5}"#).unwrap();
        assert_eq!(p.id, "42");
        assert_eq!(p.amount, Decimal::new(125, 1));
    }
}
