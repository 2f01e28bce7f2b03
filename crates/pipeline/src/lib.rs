//! Batch pipeline for the Sparkify warehouse.
//!
//! - Loader (S3 -> staging tables, null-key purge)
//! - Transform (staging -> star schema, idempotent merge per table)
//! - Verify (natural-key uniqueness after the merge)
//! - Runner (the two operator entry points)

pub mod dry_run;
pub mod loader;
pub mod runner;
pub mod source;
pub mod sql;
pub mod transform;
pub mod verify;

pub use dry_run::DryRun;
pub use loader::*;
pub use runner::*;
pub use source::*;
pub use transform::{plan_for, run_merge, MergePlan, Phase};
