use crate::errors::DecodeError;
use crate::errors::Result;

pub const FIXED_POINT_MULTIPLIER: i64 = 100_000_000;
pub const DECIMAL_PLACES: u32 = 8;

#[inline(always)]
pub fn to_fixed_point(value: f64) -> i64 {
    (value * FIXED_POINT_MULTIPLIER as f64).round() as i64
}

#[inline(always)]
pub fn from_fixed_point(value: i64) -> f64 {
    value as f64 / FIXED_POINT_MULTIPLIER as f64
}

/// Parse a JSON decimal string directly to fixed-point i64
///
/// Accepts `"42250.15"`, `"-0.0162"`, `"100"`, `"1."` and `".5"`. Digits past
/// the eighth decimal place are truncated. Reads the bytes in place without
/// allocating.
pub fn parse_json_decimal_to_fixed_point(bytes: &[u8]) -> Result<i64> {
    let (negative, digits) = match bytes.split_first() {
        None => return Err(DecodeError::Empty),
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, bytes),
    };
    let offset = bytes.len() - digits.len();

    let mut value: i64 = 0;
    let mut seen_digit = false;
    let mut decimals: Option<u32> = None;

    for (i, &byte) in digits.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {
                seen_digit = true;
                if let Some(read) = decimals.as_mut() {
                    if *read == DECIMAL_PLACES {
                        continue;
                    }
                    *read += 1;
                }
                value = value.checked_mul(10).and_then(|v| v.checked_add((byte - b'0') as i64)).ok_or(DecodeError::Overflow)?;
            }
            b'.' if decimals.is_none() => decimals = Some(0),
            _ => return Err(DecodeError::InvalidByte { byte, position: offset + i }),
        }
    }

    if !seen_digit {
        return Err(DecodeError::NoDigits);
    }

    let scale = 10i64.pow(DECIMAL_PLACES - decimals.unwrap_or(0));
    let value = value.checked_mul(scale).ok_or(DecodeError::Overflow)?;

    Ok(if negative { -value } else { value })
}

/// Render a fixed-point value as a plain decimal string, trailing zeros trimmed
pub fn format_fixed_point(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let multiplier = FIXED_POINT_MULTIPLIER as u64;
    let (int, frac) = (abs / multiplier, abs % multiplier);

    if frac == 0 {
        return format!("{sign}{int}");
    }

    let frac = format!("{frac:08}");
    format!("{sign}{int}.{}", frac.trim_end_matches('0'))
}
