//! Ledger tool services exposed over MCP.

mod expenses;
mod food_card;

pub use expenses::{ExpenseTracker, CATEGORIES_URI};
pub use food_card::FoodCardTracker;

use crate::mcp::protocol::ToolCallResult;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

/// Decode tool arguments, turning failures into an error result.
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, ToolCallResult> {
    serde_json::from_value(arguments).map_err(|e| {
        ToolCallResult::error(format!("Invalid arguments for {}: {}", tool, e))
    })
}

/// Require a zero-padded `YYYY-MM-DD` date.
///
/// Dates are compared as text in SQL, so the stored form must be canonical.
pub(crate) fn check_date(field: &str, value: &str) -> Result<(), ToolCallResult> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) if date.format("%Y-%m-%d").to_string() == value => Ok(()),
        _ => Err(ToolCallResult::error(format!(
            "Invalid {}: '{}' (expected YYYY-MM-DD)",
            field, value
        ))),
    }
}

pub(crate) fn check_optional_date(field: &str, value: Option<&str>) -> Result<(), ToolCallResult> {
    match value {
        Some(v) => check_date(field, v),
        None => Ok(()),
    }
}

pub(crate) fn not_found(id: i64) -> Value {
    json!({ "status": "error", "message": format!("Record with id {} not found", id) })
}

pub(crate) fn no_fields() -> Value {
    json!({ "status": "error", "message": "No fields provided for update" })
}

/// Store failures surface as tool errors, not protocol errors.
pub(crate) fn storage_failure(tool: &str, e: crate::error::LedgerError) -> ToolCallResult {
    tracing::error!("{} failed: {}", tool, e);
    ToolCallResult::error(format!("{} failed: {}", tool, e))
}

/// Numbers that may arrive quoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn as_f64<E: serde::de::Error>(&self) -> Result<f64, E> {
        match self {
            Numeric::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| E::custom(format!("invalid number {}", n))),
            Numeric::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| E::custom(format!("expected a number, got '{}'", s))),
        }
    }

    fn into_text(self) -> String {
        match self {
            Numeric::Number(n) => n.to_string(),
            Numeric::Text(s) => s,
        }
    }

    fn as_i64<E: serde::de::Error>(&self) -> Result<i64, E> {
        match self {
            Numeric::Number(n) => n
                .as_i64()
                .ok_or_else(|| E::custom(format!("expected an integer, got {}", n))),
            Numeric::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected an integer, got '{}'", s))),
        }
    }
}

pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Numeric::deserialize(d)?.as_f64()
}

pub(crate) fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Option::<Numeric>::deserialize(d)?
        .map(|n| n.as_f64())
        .transpose()
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Numeric::deserialize(d)?.as_i64()
}

/// Identifiers such as card numbers, given as text or as a bare number.
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Numeric::deserialize(d)?.into_text())
}

pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Numeric>::deserialize(d)?.map(Numeric::into_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Args {
        #[serde(deserialize_with = "lenient_i64")]
        id: i64,
        #[serde(default, deserialize_with = "lenient_opt_f64")]
        amount: Option<f64>,
    }

    #[test]
    fn test_lenient_numbers() {
        let args: Args = parse_args("t", json!({"id": "7", "amount": "12.5"})).unwrap();
        assert_eq!(args.id, 7);
        assert_eq!(args.amount, Some(12.5));

        let args: Args = parse_args("t", json!({"id": 8, "amount": null})).unwrap();
        assert_eq!(args.id, 8);
        assert_eq!(args.amount, None);

        let args: Args = parse_args("t", json!({"id": 9})).unwrap();
        assert_eq!(args.amount, None);
    }

    #[test]
    fn test_lenient_numbers_reject_garbage() {
        let err = parse_args::<Args>("t", json!({"id": "seven"})).unwrap_err();
        assert!(err.is_error());
        assert!(err.text_content().starts_with("Invalid arguments for t"));

        assert!(parse_args::<Args>("t", json!({"id": 1.5})).is_err());
    }

    #[test]
    fn test_lenient_numbers_reject_non_finite() {
        #[derive(Debug, Deserialize)]
        struct Amount {
            #[serde(deserialize_with = "lenient_f64")]
            #[allow(dead_code)]
            amount: f64,
        }

        for raw in ["inf", "-infinity", "NaN", "1e400"] {
            assert!(
                parse_args::<Amount>("t", json!({ "amount": raw })).is_err(),
                "{} accepted",
                raw
            );
        }
        assert!(parse_args::<Amount>("t", json!({ "amount": 1e308 })).is_ok());
    }

    #[test]
    fn test_lenient_strings() {
        #[derive(Debug, Deserialize)]
        struct Card {
            #[serde(deserialize_with = "lenient_string")]
            number: String,
            #[serde(default, deserialize_with = "lenient_opt_string")]
            other: Option<String>,
        }

        let card: Card = parse_args("t", json!({"number": 4321, "other": "0042"})).unwrap();
        assert_eq!(card.number, "4321");
        assert_eq!(card.other.as_deref(), Some("0042"));

        let card: Card = parse_args("t", json!({"number": "4321", "other": null})).unwrap();
        assert_eq!(card.number, "4321");
        assert_eq!(card.other, None);

        assert!(parse_args::<Card>("t", json!({"number": true})).is_err());
    }

    #[test]
    fn test_check_date() {
        assert!(check_date("date", "2025-09-30").is_ok());
        assert!(check_date("date", "2025-02-30").is_err());
        assert!(check_date("date", "30/09/2025").is_err());
        assert!(check_optional_date("date", None).is_ok());
    }

    #[test]
    fn test_check_date_requires_canonical_form() {
        for raw in ["2025-9-3", "2025-09-3", "+2025-09-03", "12025-09-03", " 2025-09-03"] {
            assert!(check_date("date", raw).is_err(), "{} accepted", raw);
        }
        assert!(check_optional_date("date", Some("2025-9-30")).is_err());
    }
}
