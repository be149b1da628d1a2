use df_types::{CurrencyPair, DepthRecord, OrderBookSnapshot};
use serde_json::{Map, Value};
use tracing::warn;

const ASKS_KEY: &str = "listUp";
const BIDS_KEY: &str = "listDown";

// Asks are left in the order the exchange sent them, only bids are sorted.
pub fn build(pair: CurrencyPair, payload: &Map<String, Value>) -> OrderBookSnapshot {
    let asks = parse_levels(payload.get(ASKS_KEY));
    let mut bids = parse_levels(payload.get(BIDS_KEY));
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));

    OrderBookSnapshot { pair, asks, bids }
}

/// Reads `[[price, amount], ..]`. Entries that are not arrays are skipped.
pub(crate) fn parse_levels(levels: Option<&Value>) -> Vec<DepthRecord> {
    let Some(levels) = levels.and_then(Value::as_array) else {
        return Vec::new();
    };

    levels
        .iter()
        .filter_map(|level| match level.as_array() {
            Some(level) => Some(DepthRecord::new(
                to_f64(level.first()),
                to_f64(level.get(1)),
            )),
            None => {
                warn!("Zb: Skipping malformed depth level: {level}");
                None
            }
        })
        .collect()
}

/// Numbers arrive both bare and quoted. Anything unparseable counts as zero.
pub(crate) fn to_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn levels(records: &[DepthRecord]) -> Vec<(f64, f64)> {
        records.iter().map(|r| (r.price, r.amount)).collect()
    }

    #[test]
    fn bids_sorted_descending_asks_untouched() {
        let snapshot = build(
            CurrencyPair::new("eth", "qc"),
            &payload(json!({
                "listUp": [[10, 1], [9, 2]],
                "listDown": [[8, 3], [8.5, 1]],
            })),
        );

        assert_eq!(snapshot.pair, CurrencyPair::new("ETH", "QC"));
        assert_eq!(levels(&snapshot.bids), vec![(8.5, 1.0), (8.0, 3.0)]);
        assert_eq!(levels(&snapshot.asks), vec![(10.0, 1.0), (9.0, 2.0)]);
    }

    #[test]
    fn quoted_and_malformed_numbers() {
        let snapshot = build(
            CurrencyPair::new("zb", "btc"),
            &payload(json!({
                "listUp": [["0.25", "622.5"], ["abc", null], [1.5]],
                "listDown": ["garbage", [0.125, "971.5"]],
            })),
        );

        assert_eq!(
            levels(&snapshot.asks),
            vec![(0.25, 622.5), (0.0, 0.0), (1.5, 0.0)]
        );
        assert_eq!(levels(&snapshot.bids), vec![(0.125, 971.5)]);
    }

    #[test]
    fn malformed_levels_are_skipped() {
        let levels = parse_levels(Some(&json!([[1, 2], {"price": 3}, 4, [5, 6]])));
        assert_eq!(
            levels,
            vec![DepthRecord::new(1.0, 2.0), DepthRecord::new(5.0, 6.0)]
        );
        assert!(parse_levels(Some(&json!("not a list"))).is_empty());
    }

    #[test]
    fn missing_lists_give_empty_book() {
        let snapshot = build(CurrencyPair::new("eth", "qc"), &Map::new());
        assert!(snapshot.asks.is_empty());
        assert!(snapshot.bids.is_empty());
    }

    #[test_case(json!(1.25), 1.25)]
    #[test_case(json!("2.5"), 2.5)]
    #[test_case(json!(" 3 "), 3.0)]
    #[test_case(json!("x"), 0.0)]
    #[test_case(json!(true), 0.0)]
    fn coerce(value: Value, expected: f64) {
        assert_eq!(to_f64(Some(&value)), expected);
    }
}
