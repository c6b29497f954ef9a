//! # sf_parser
//!
//! Byte-level decoding of exchange ticker payloads into fixed-point records

pub mod errors;
pub mod fixed_point;
pub mod instrument;
pub mod record;
pub mod serde_helpers;

pub use errors::DecodeError;
pub use fixed_point::DECIMAL_PLACES;
pub use fixed_point::FIXED_POINT_MULTIPLIER;
pub use fixed_point::format_fixed_point;
pub use fixed_point::from_fixed_point;
pub use fixed_point::parse_json_decimal_to_fixed_point;
pub use fixed_point::to_fixed_point;
pub use instrument::InstrumentStats;
pub use instrument::InstrumentStatsParser;
pub use instrument::parse_instrument_stats;
pub use instrument::parse_instrument_stats_batch;
pub use record::RecordParser;
