use std::fmt;

use serde::Deserializer;
use serde::Serializer;
use serde::de::Error;
use serde::de::Visitor;

use crate::fixed_point::FIXED_POINT_MULTIPLIER;
use crate::fixed_point::format_fixed_point;
use crate::fixed_point::parse_json_decimal_to_fixed_point;
use crate::fixed_point::to_fixed_point;

struct FixedPointVisitor;

impl Visitor<'_> for FixedPointVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    // Covers borrowed and transient strings alike, neither is copied
    fn visit_str<E: Error>(self, v: &str) -> Result<i64, E> {
        parse_json_decimal_to_fixed_point(v.as_bytes()).map_err(E::custom)
    }

    fn visit_u64<E: Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).ok().and_then(|v| v.checked_mul(FIXED_POINT_MULTIPLIER)).ok_or_else(|| E::custom("integer out of fixed-point range"))
    }

    fn visit_i64<E: Error>(self, v: i64) -> Result<i64, E> {
        v.checked_mul(FIXED_POINT_MULTIPLIER).ok_or_else(|| E::custom("integer out of fixed-point range"))
    }

    fn visit_f64<E: Error>(self, v: f64) -> Result<i64, E> {
        let limit = i64::MAX as f64 / FIXED_POINT_MULTIPLIER as f64;
        if !v.is_finite() || v.abs() >= limit {
            return Err(E::custom("float out of fixed-point range"));
        }
        Ok(to_fixed_point(v))
    }
}

/// Deserialize a decimal field to i64 fixed-point
///
/// Exchanges send decimals as JSON strings to keep precision; those are parsed
/// byte by byte. Bare JSON numbers are accepted as well.
pub fn deserialize_fixed_point<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(FixedPointVisitor)
}

/// Serialize fixed-point i64 back to the exchange's decimal string form
pub fn serialize_fixed_point<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_fixed_point(*value))
}
