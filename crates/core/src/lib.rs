pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod links;
pub mod model;
pub mod query;
pub mod time;

pub use aggregate::{Aggregation, SkipReason, SkippedSpan, aggregate};
pub use error::{Result, SteplineError};
