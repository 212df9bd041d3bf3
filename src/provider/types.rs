//! Typed data crossing the provider boundary.

use crate::cache::SourceTier;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of market data fetched for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Quote,
    OptionsFlow,
    DarkPool,
    GreekExposure,
    NetPremium,
    Fundamentals,
}

impl DataKind {
    /// URL path segment.
    pub fn path(&self) -> &'static str {
        match self {
            DataKind::Quote => "quote",
            DataKind::OptionsFlow => "options-flow",
            DataKind::DarkPool => "darkpool",
            DataKind::GreekExposure => "greek-exposure",
            DataKind::NetPremium => "net-premium",
            DataKind::Fundamentals => "fundamentals",
        }
    }

    /// Refresh cadence of the source behind this kind.
    pub fn source_tier(&self) -> SourceTier {
        match self {
            DataKind::Quote | DataKind::OptionsFlow => SourceTier::Realtime,
            DataKind::DarkPool | DataKind::GreekExposure | DataKind::NetPremium => {
                SourceTier::Intraday
            }
            DataKind::Fundamentals => SourceTier::Daily,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Normalized response body: always a list of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    records: Vec<Value>,
}

impl Payload {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First numeric value of `field` across records.
    pub fn first_number(&self, field: &str) -> Option<f64> {
        self.records
            .iter()
            .find_map(|r| r.get(field).and_then(Value::as_f64))
    }

    /// First value of `field` that reads as a decimal, whether the vendor
    /// sent it as a number or a string.
    pub fn first_decimal(&self, field: &str) -> Option<Decimal> {
        self.records.iter().find_map(|r| match r.get(field)? {
            Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

/// Raw API body shapes seen from market-data vendors.
///
/// Tried in order:
/// 1. an object with a `data` key (holding a list or a single object)
/// 2. a bare list
/// 3. any other object, taken as a single record
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Wrapped { data: WrappedData },
    List(Vec<Value>),
    Object(Map<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WrappedData {
    Many(Vec<Value>),
    One(Value),
}

impl ApiResponse {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn into_payload(self) -> Payload {
        let records = match self {
            ApiResponse::Wrapped {
                data: WrappedData::Many(items),
            } => items,
            ApiResponse::Wrapped {
                data: WrappedData::One(Value::Null),
            } => Vec::new(),
            ApiResponse::Wrapped {
                data: WrappedData::One(item),
            } => vec![item],
            ApiResponse::List(items) => items,
            ApiResponse::Object(map) => vec![Value::Object(map)],
        };
        Payload::new(records)
    }
}

/// A detection engine's opinion about a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSignal {
    pub engine: String,
    pub symbol: String,
    pub score: Decimal,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_list() {
        let payload = ApiResponse::parse(r#"{"data": [{"price": 1.0}, {"price": 2.0}]}"#)
            .unwrap()
            .into_payload();
        assert_eq!(payload.records().len(), 2);
        assert_eq!(payload.first_number("price"), Some(1.0));
    }

    #[test]
    fn test_parse_wrapped_single_object() {
        let payload = ApiResponse::parse(r#"{"data": {"price": 3.5}}"#)
            .unwrap()
            .into_payload();
        assert_eq!(payload.records(), &[json!({"price": 3.5})]);
    }

    #[test]
    fn test_parse_wrapped_null_is_empty() {
        let payload = ApiResponse::parse(r#"{"data": null}"#).unwrap().into_payload();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_bare_list() {
        let payload = ApiResponse::parse(r#"[{"volume": 10}]"#).unwrap().into_payload();
        assert_eq!(payload.first_number("volume"), Some(10.0));
    }

    #[test]
    fn test_parse_plain_object() {
        let payload = ApiResponse::parse(r#"{"ticker": "AAPL", "price": 190.1}"#)
            .unwrap()
            .into_payload();
        assert_eq!(payload.records().len(), 1);
        assert_eq!(payload.records()[0]["ticker"], "AAPL");
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(ApiResponse::parse("42").is_err());
        assert!(ApiResponse::parse("not json").is_err());
    }

    #[test]
    fn test_source_tiers() {
        assert_eq!(DataKind::Quote.source_tier(), SourceTier::Realtime);
        assert_eq!(DataKind::DarkPool.source_tier(), SourceTier::Intraday);
        assert_eq!(DataKind::Fundamentals.source_tier(), SourceTier::Daily);
    }
}
