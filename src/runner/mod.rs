//! Loop runner module.
//!
//! - LoopRunner drives one issue-resolution run through planning,
//!   execution, review and persistence
//! - LoopRunnerConfig bounds the number of rounds and toggles cache lookup

mod loop_runner;

pub use loop_runner::{LoopRunner, LoopRunnerConfig};
