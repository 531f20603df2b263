//! ID generation utilities for fixloop
//!
//! Provides functions for generating identifiers for runs, plans and cached plan records.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn random_suffix() -> u32 {
    rand::rng().random()
}

/// Generate a unique run ID
///
/// Format: `run-{timestamp_ms}-{random_hex}`
pub fn generate_run_id() -> String {
    format!("run-{}-{:08x}", now_ms(), random_suffix())
}

/// Generate a plan ID for a planning round
///
/// Format: `plan-{timestamp_ms}-{random_hex}`
pub fn generate_plan_id() -> String {
    format!("plan-{}-{:08x}", now_ms(), random_suffix())
}

/// Generate an ID for a persisted plan record
///
/// Format: `rec-{timestamp_ms}-{random_hex}`
pub fn generate_record_id() -> String {
    format!("rec-{}-{:08x}", now_ms(), random_suffix())
}
