//! fixloop - iterative issue resolution against a working copy
//!
//! A run plans a fix as an ordered list of tool calls, executes it, has an
//! independent reviewer judge the result and, on rejection, plans again from
//! the failure. Accepted plans are cached with the files they touched so
//! later runs on similar issues can start from them.

pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod graph;
pub mod id;
pub mod llm;
pub mod planner;
pub mod prompt;
pub mod review;
pub mod runner;
pub mod store;
pub mod tools;
pub mod workspace;

pub use error::{FixloopError, Result};
