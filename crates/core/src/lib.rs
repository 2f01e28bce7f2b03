//! Core types for the Sparkify star-schema warehouse ETL.

pub mod error;
pub mod staging;
pub mod tables;
pub mod warehouse;

pub use error::*;
pub use staging::*;
pub use tables::*;
pub use warehouse::*;
