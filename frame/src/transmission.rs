use serde::Serialize;

/// Immutable record produced at the end of each transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transmission {
    pub source_unit_id: i64,
    pub start_time: i64,
    pub stop_time: i64,
    pub sample_count: u64,
    pub spike_count: u64,
    pub error_count: u64,
    pub length_seconds: f64,
    pub base_filename: String,
    pub filename: String,
}
