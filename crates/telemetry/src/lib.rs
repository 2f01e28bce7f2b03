//! Logging for the warehouse ETL.
//!
//! Structured tracing plus the operator-facing progress lines each batch
//! step prints.

pub mod progress;
pub mod tracing_setup;

pub use progress::*;
pub use tracing_setup::*;
