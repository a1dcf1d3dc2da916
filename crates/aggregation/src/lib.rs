//! Aggregation of raw per-day records into the area statistics payload.
//!
//! The three scalar derivations (area, sum, average) run as independent
//! tokio tasks joined by the caller. The first failing derivation cancels
//! any derivation that has not started yet, and the caller discards every
//! partial result once cancellation is observed.

mod aggregate;
pub mod error;
mod result;

pub use aggregate::aggregate;
pub use error::AggregateError;
pub use result::AggregateResult;
