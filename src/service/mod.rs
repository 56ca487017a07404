//! Query execution and result shaping.

pub mod outcome;
pub mod query;

pub use outcome::{Envelope, Payload, QueryOutcome};
pub use query::QueryService;
