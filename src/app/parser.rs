//! Payload parsing
//!
//! Turns a raw JSON payload into the ordered list of items it describes,
//! using the query's [`PayloadLayout`] pointers. Upstream ordering is kept.
//! Elements missing an id or url are skipped rather than failing the pass.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::app::fetcher::RawPayload;
use crate::app::models::{Item, PayloadLayout};
use crate::constants::payload::MILLIS_THRESHOLD;
use crate::errors::{ParseError, ParseResult};

/// Parse `raw` into items, in upstream order
pub fn parse_items(
    raw: &RawPayload,
    layout: &PayloadLayout,
    observed_at: DateTime<Utc>,
) -> ParseResult<Vec<Item>> {
    let root: Value = serde_json::from_str(&raw.body)?;
    let list = root
        .pointer(&layout.items)
        .ok_or_else(|| ParseError::MissingItems {
            pointer: layout.items.clone(),
        })?;
    let elements = list.as_array().ok_or_else(|| ParseError::NotAnArray {
        pointer: layout.items.clone(),
    })?;

    let mut items = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match parse_element(element, layout, observed_at) {
            Some(item) => items.push(item),
            None => debug!(index, "Skipping element without id or url"),
        }
    }
    Ok(items)
}

fn parse_element(element: &Value, layout: &PayloadLayout, observed_at: DateTime<Utc>) -> Option<Item> {
    let id = scalar_text(element.pointer(&layout.id)?)?;
    let url = scalar_text(element.pointer(&layout.url)?)?;
    let published_at = layout
        .published_at
        .as_deref()
        .and_then(|pointer| element.pointer(pointer))
        .and_then(parse_timestamp);

    Some(Item {
        id,
        url,
        observed_at,
        published_at,
        payload: element.clone(),
    })
}

/// Strings and integers both serve as identifiers
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Unix seconds, unix milliseconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if raw > MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        Value::String(s) => {
            if let Ok(raw) = s.parse::<i64>() {
                return parse_timestamp(&Value::from(raw));
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ParseResult<Vec<Item>> {
        parse_items(&RawPayload::new(body), &PayloadLayout::default(), Utc::now())
    }

    #[test]
    fn test_parse_preserves_order_and_fields() {
        let body = r#"{"items": [
            {"id": 3, "url": "https://example.com/3", "photo": {"high_resolution": {"timestamp": 1700000000}}},
            {"id": "1", "url": "https://example.com/1", "price": "12.00"}
        ]}"#;
        let items = parse(body).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "3");
        assert_eq!(items[1].id, "1");
        assert_eq!(
            items[0].published_at,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
        assert_eq!(items[1].published_at, None);
        assert_eq!(items[1].payload["price"], "12.00");
    }

    #[test]
    fn test_skips_incomplete_elements() {
        let body = r#"{"items": [{"id": 1}, {"url": "u"}, {"id": 2, "url": "u2"}, "junk"]}"#;
        let items = parse(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "2");
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(parse("<html>"), Err(ParseError::InvalidJson(_))));
        assert!(matches!(
            parse(r#"{"results": []}"#),
            Err(ParseError::MissingItems { .. })
        ));
        assert!(matches!(
            parse(r#"{"items": {}}"#),
            Err(ParseError::NotAnArray { .. })
        ));
    }

    #[test]
    fn test_custom_layout() {
        let layout = PayloadLayout {
            items: "/data/listings".to_string(),
            id: "/listing_id".to_string(),
            url: "/link".to_string(),
            published_at: Some("/created".to_string()),
            ..Default::default()
        };
        let body = r#"{"data": {"listings": [
            {"listing_id": "x1", "link": "https://example.com/x1", "created": "2024-05-01T10:00:00Z"},
            {"listing_id": "x2", "link": "https://example.com/x2", "created": 1714557600000}
        ]}}"#;
        let items = parse_items(&RawPayload::new(body), &layout, Utc::now()).unwrap();

        assert_eq!(items.len(), 2);
        let expected = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(items[0].published_at, Some(expected));
        assert_eq!(items[1].published_at, Some(expected));
    }
}
