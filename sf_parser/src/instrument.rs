use serde::Deserialize;
use serde::Serialize;
use serde_json::value::RawValue;

use crate::record::RecordParser;
use crate::serde_helpers::deserialize_fixed_point;
use crate::serde_helpers::serialize_fixed_point;

/// 24h ticker statistics for one options instrument
///
/// Prices and quantities are fixed-point with 8 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentStats {
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub price_change: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub price_change_percent: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub last_price: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub last_qty: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub open: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub high: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub low: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub volume: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub amount: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub bid_price: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub ask_price: i64,
    pub open_time: u64,
    pub close_time: u64,
    pub first_trade_id: u64,
    pub trade_count: u64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub strike_price: i64,
    #[serde(deserialize_with = "deserialize_fixed_point", serialize_with = "serialize_fixed_point")]
    pub exercise_price: i64,
}

#[inline]
fn first_significant_byte(raw: &[u8]) -> Option<u8> {
    raw.iter().copied().find(|b| !b.is_ascii_whitespace())
}

/// Parse one ticker response body
///
/// The exchange answers a single-symbol query with either the bare object or
/// a one-element array; both are accepted. Anything else is `None`.
pub fn parse_instrument_stats(raw: &[u8]) -> Option<InstrumentStats> {
    match first_significant_byte(raw)? {
        b'{' => serde_json::from_slice(raw).ok(),
        b'[' => {
            let mut items: Vec<InstrumentStats> = serde_json::from_slice(raw).ok()?;
            if items.len() == 1 { items.pop() } else { None }
        }
        _ => None,
    }
}

/// Parse a multi-instrument ticker array, dropping malformed entries
///
/// Each element is decoded on its own from a borrowed slice of the input, so
/// one bad entry costs only itself. A body that is not a JSON array gives an
/// empty result.
pub fn parse_instrument_stats_batch(raw: &[u8]) -> Vec<InstrumentStats> {
    let Ok(items) = serde_json::from_slice::<Vec<&RawValue>>(raw) else {
        return Vec::new();
    };

    items.into_iter().filter_map(|item| serde_json::from_str(item.get()).ok()).collect()
}

/// [`RecordParser`] for single-symbol ticker responses
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentStatsParser;

impl RecordParser for InstrumentStatsParser {
    type Record = InstrumentStats;

    #[inline]
    fn parse(&self, raw: &[u8]) -> Option<InstrumentStats> {
        parse_instrument_stats(raw)
    }
}
