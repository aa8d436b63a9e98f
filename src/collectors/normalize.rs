use crate::data::{
    DarkPoolPrint, FlowType, HistoricalPattern, InsiderTransaction, OptionFlowPrint, Position,
    ShortInterest, TransactionKind,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Institutional holder row as delivered by either provider
///
/// Providers disagree on field names and on whether numbers arrive as JSON
/// numbers or strings, so every numeric field is kept as a raw `Value` until
/// `to_position` coerces it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPosition {
    #[serde(alias = "cik", alias = "holderId", alias = "entityId", alias = "id")]
    pub entity_id: Option<Value>,

    #[serde(alias = "holderName", alias = "investorName", alias = "entityName", alias = "name")]
    pub entity_name: Option<String>,

    #[serde(alias = "shares", alias = "sharesHeld", alias = "position")]
    pub units: Option<Value>,

    #[serde(alias = "marketValue", alias = "market_value", alias = "valueUsd")]
    pub value: Option<Value>,

    #[serde(alias = "sharesChange", alias = "positionChange")]
    pub change: Option<Value>,

    #[serde(alias = "changePercent", alias = "change_pct", alias = "pctChange", alias = "percentChange")]
    pub change_percent: Option<Value>,

    #[serde(alias = "filingDate", alias = "reportDate", alias = "dateReported", alias = "date")]
    pub filing_date: Option<String>,
}

impl RawPosition {
    /// Convert to our Position type; None when the row has no usable identifier
    pub fn to_position(&self) -> Option<Position> {
        let entity_name = self.entity_name.clone().filter(|n| !n.trim().is_empty());
        let entity_id = self
            .entity_id
            .as_ref()
            .and_then(as_identifier)
            .or_else(|| entity_name.as_deref().map(normalize_name))?;

        let units = self.units.as_ref().and_then(as_decimal).unwrap_or(Decimal::ZERO);
        let value = self.value.as_ref().and_then(as_decimal).unwrap_or(Decimal::ZERO);
        let change = self.change.as_ref().and_then(as_decimal).unwrap_or(Decimal::ZERO);

        // Derive percent from the unit change when the provider omits it
        let change_percent = match self.change_percent.as_ref().and_then(as_f64) {
            Some(pct) => pct,
            None => {
                let previous = units - change;
                if previous > Decimal::ZERO {
                    (change / previous * Decimal::from(100)).to_f64().unwrap_or(0.0)
                } else {
                    0.0
                }
            }
        };

        Some(Position {
            entity_id,
            entity_name,
            units,
            value,
            change,
            change_percent,
            filing_date: self.filing_date.as_deref().and_then(parse_date),
        })
    }
}

/// Insider trade row as delivered by either provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawInsiderTransaction {
    #[serde(alias = "reportingCik", alias = "ownerCik", alias = "insiderId", alias = "id")]
    pub insider_id: Option<Value>,

    #[serde(alias = "reportingName", alias = "ownerName", alias = "insiderName", alias = "name")]
    pub insider_name: Option<String>,

    #[serde(alias = "transactionCode", alias = "transactionType", alias = "type")]
    pub code: Option<String>,

    #[serde(alias = "securitiesTransacted", alias = "shares")]
    pub amount: Option<Value>,

    #[serde(alias = "pricePerShare")]
    pub price: Option<Value>,

    #[serde(alias = "transactionDate", alias = "filingDate", alias = "date")]
    pub date: Option<String>,
}

impl RawInsiderTransaction {
    pub fn to_transaction(&self) -> Option<InsiderTransaction> {
        let insider_name = self.insider_name.clone().unwrap_or_default();
        let placeholder = insider_name.trim().is_empty()
            || insider_name.trim().eq_ignore_ascii_case("unknown");

        let insider_id = self
            .insider_id
            .as_ref()
            .and_then(as_identifier)
            .or_else(|| (!placeholder).then(|| normalize_name(&insider_name)))?;

        let date = self.date.as_deref().and_then(parse_date)?;
        let kind = TransactionKind::from_code(self.code.as_deref().unwrap_or_default());

        // Providers report dispositions both signed and unsigned
        let mut amount = self.amount.as_ref().and_then(as_decimal).unwrap_or(Decimal::ZERO);
        if kind == TransactionKind::Disposition && amount > Decimal::ZERO {
            amount = -amount;
        }

        Some(InsiderTransaction {
            insider_id,
            insider_name,
            kind,
            amount,
            price: self.price.as_ref().and_then(as_decimal).unwrap_or(Decimal::ZERO),
            date,
            identity: None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPattern {
    #[serde(alias = "patternType", alias = "pattern", alias = "key")]
    pub pattern_key: Option<String>,

    #[serde(alias = "entityId", alias = "entity", alias = "holder")]
    pub entity_id: Option<Value>,

    #[serde(alias = "flowType", alias = "direction")]
    pub flow_type: Option<String>,

    #[serde(alias = "count", alias = "occurrences")]
    pub frequency: Option<Value>,

    #[serde(alias = "avgImpact", alias = "averageImpact", alias = "impact")]
    pub average_impact: Option<Value>,

    #[serde(alias = "lastSeen", alias = "lastOccurrence")]
    pub last_occurrence: Option<String>,
}

impl RawPattern {
    pub fn to_pattern(&self) -> Option<HistoricalPattern> {
        let pattern_key = self.pattern_key.clone().filter(|k| !k.trim().is_empty())?;
        let frequency = self
            .frequency
            .as_ref()
            .and_then(as_f64)
            .map(|f| f.max(0.0).round() as u32)
            .unwrap_or(0);

        Some(HistoricalPattern {
            pattern_key,
            entity_id: self.entity_id.as_ref().and_then(as_identifier),
            frequency,
            average_impact: self.average_impact.as_ref().and_then(as_f64).unwrap_or(0.0),
            last_occurrence: self.last_occurrence.as_deref().and_then(parse_timestamp),
        })
    }

    /// Patterns without a direction apply to both
    pub fn applies_to(&self, flow_type: Option<FlowType>) -> bool {
        match (flow_type, self.flow_type.as_deref()) {
            (Some(wanted), Some(raw)) => raw.parse::<FlowType>().map(|t| t == wanted).unwrap_or(true),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawShortInterest {
    #[serde(alias = "percentReturned", alias = "shortPercentOfFloat", alias = "percent")]
    pub percent_of_float: Option<Value>,

    #[serde(alias = "totalFloat", alias = "floatShares", alias = "float")]
    pub total_float: Option<Value>,
}

impl RawShortInterest {
    pub fn to_short_interest(&self) -> Option<ShortInterest> {
        let percent_of_float = self.percent_of_float.as_ref().and_then(as_f64);
        let total_float = self.total_float.as_ref().and_then(as_decimal);
        if percent_of_float.is_none() && total_float.is_none() {
            return None;
        }

        Some(ShortInterest {
            percent_of_float: percent_of_float.unwrap_or(0.0),
            total_float: total_float.unwrap_or(Decimal::ZERO),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawOptionFlow {
    #[serde(alias = "putCall", alias = "optionType", alias = "type")]
    pub flow_type: Option<String>,

    #[serde(alias = "totalPremium", alias = "total_premium")]
    pub premium: Option<Value>,
}

impl RawOptionFlow {
    pub fn to_print(&self) -> Option<OptionFlowPrint> {
        let flow_type = self.flow_type.as_deref()?.parse::<FlowType>().ok()?;
        let premium = self.premium.as_ref().and_then(as_decimal)?;
        Some(OptionFlowPrint { flow_type, premium })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDarkPoolPrint {
    #[serde(alias = "size", alias = "shares")]
    pub volume: Option<Value>,
}

impl RawDarkPoolPrint {
    pub fn to_print(&self) -> Option<DarkPoolPrint> {
        let volume = self.volume.as_ref().and_then(as_f64)?;
        Some(DarkPoolPrint {
            volume: volume.max(0.0).round() as u64,
        })
    }
}

/// Normalize a batch of raw rows, dropping (and logging) the unusable ones
pub fn normalize_rows<R, T, F>(kind: &str, rows: &[R], convert: F) -> Vec<T>
where
    R: std::fmt::Debug,
    F: Fn(&R) -> Option<T>,
{
    rows.iter()
        .filter_map(|row| {
            let converted = convert(row);
            if converted.is_none() {
                debug!("Dropping unusable {} row: {:?}", kind, row);
            }
            converted
        })
        .collect()
}

/// Identifiers arrive as strings or bare numbers (registry ids)
fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lowercase, dash-separated form used when a provider gives only a name
pub fn normalize_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

fn clean_numeric(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%' | ' ' | '_'))
        .collect()
}

pub fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => clean_numeric(s),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean_numeric(s).parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Accepts `YYYY-MM-DD`, RFC 3339, or either followed by a time suffix
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            parse_date(raw)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_position_camel_case_provider() {
        let json = r#"{
            "cik": 1364742,
            "holderName": "BlackRock Inc.",
            "sharesHeld": "1,250,000",
            "marketValue": 50000000,
            "changePercent": "-3.5%",
            "filingDate": "2024-03-01"
        }"#;

        let raw: RawPosition = serde_json::from_str(json).unwrap();
        let position = raw.to_position().unwrap();

        assert_eq!(position.entity_id, "1364742");
        assert_eq!(position.units, dec!(1250000));
        assert_eq!(position.value, dec!(50000000));
        assert!((position.change_percent + 3.5).abs() < 1e-9);
        assert_eq!(position.filing_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_parse_position_snake_case_provider() {
        let json = r#"{
            "name": "Vanguard Group",
            "shares": 1100,
            "market_value": "12000.50",
            "sharesChange": 100,
            "date": "2024-02-15T00:00:00Z"
        }"#;

        let raw: RawPosition = serde_json::from_str(json).unwrap();
        let position = raw.to_position().unwrap();

        // Falls back to a normalized name and derives percent from the unit change
        assert_eq!(position.entity_id, "vanguard-group");
        assert!((position.change_percent - 10.0).abs() < 1e-9);
        assert_eq!(position.filing_date, NaiveDate::from_ymd_opt(2024, 2, 15));
    }

    #[test]
    fn test_position_without_identifier_dropped() {
        let raw: RawPosition = serde_json::from_str(r#"{"shares": 10}"#).unwrap();
        assert!(raw.to_position().is_none());

        let rows = vec![raw, RawPosition { entity_id: Some(Value::from("x")), ..Default::default() }];
        let positions = normalize_rows("position", &rows, RawPosition::to_position);
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn test_parse_insider_sale_is_negative() {
        let json = r#"{
            "reportingCik": "0001214156",
            "reportingName": "Doe John",
            "transactionType": "S-Sale",
            "securitiesTransacted": 5000,
            "price": 101.25,
            "transactionDate": "2024-03-04"
        }"#;

        let raw: RawInsiderTransaction = serde_json::from_str(json).unwrap();
        let tx = raw.to_transaction().unwrap();

        assert_eq!(tx.kind, TransactionKind::Disposition);
        assert_eq!(tx.amount, dec!(-5000));
        assert_eq!(tx.price, dec!(101.25));
    }

    #[test]
    fn test_unknown_insider_without_id_dropped() {
        let json = r#"{"name": "Unknown", "type": "P", "date": "2024-03-04"}"#;
        let raw: RawInsiderTransaction = serde_json::from_str(json).unwrap();
        assert!(raw.to_transaction().is_none());

        let json = r#"{"id": 42, "name": "Unknown", "type": "P", "date": "2024-03-04"}"#;
        let raw: RawInsiderTransaction = serde_json::from_str(json).unwrap();
        let tx = raw.to_transaction().unwrap();
        assert!(tx.identity_unresolved());
    }

    #[test]
    fn test_pattern_direction_filter() {
        let json = r#"{"patternType": "pre_earnings_call_sweep", "entityId": "fund-a", "flowType": "CALL", "count": "4"}"#;
        let raw: RawPattern = serde_json::from_str(json).unwrap();

        assert!(raw.applies_to(Some(FlowType::Call)));
        assert!(!raw.applies_to(Some(FlowType::Put)));
        assert!(raw.applies_to(None));
        assert_eq!(raw.to_pattern().unwrap().frequency, 4);
    }

    #[test]
    fn test_option_and_dark_pool_prints() {
        let flow: RawOptionFlow = serde_json::from_str(r#"{"putCall": "put", "totalPremium": "2500000"}"#).unwrap();
        let print = flow.to_print().unwrap();
        assert_eq!(print.flow_type, FlowType::Put);
        assert_eq!(print.premium, dec!(2500000));

        let dark: RawDarkPoolPrint = serde_json::from_str(r#"{"size": 125000}"#).unwrap();
        assert_eq!(dark.to_print().unwrap().volume, 125000);
    }

    #[test]
    fn test_scientific_and_timestamp_parsing() {
        assert_eq!(as_decimal(&Value::from("1.5e7")), Some(dec!(15000000)));
        assert!(parse_timestamp("2024-01-05").is_some());
        assert!(parse_date("not a date").is_none());
    }
}
