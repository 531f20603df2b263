//! Plan cache storage.
//!
//! Successful plans are kept as an append-only JSONL log (source of truth)
//! and indexed into the code graph's SQLite database for lookup by issue
//! similarity and by touched file.

mod plan_store;
mod records;
pub mod similarity;

pub use plan_store::{PLANS_LOG_FILE, PlanCache, PlanStore};
pub use records::CachedPlanRecord;
