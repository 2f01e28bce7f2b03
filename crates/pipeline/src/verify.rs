//! Post-merge checks.
//!
//! MergeTree does not enforce primary keys, so uniqueness of each target's
//! natural key is checked explicitly after the transform.

use clickhouse_client::query::count_duplicate_keys;
use tracing::{info, warn};
use warehouse_core::{Error, Result, Stage, Target, TransformErrorCode, Warehouse};

/// Fail with TRANSFORM_002 if any target holds a natural key more than once.
pub async fn verify_unique_keys<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    let mut offenders = Vec::new();

    for target in Target::TRANSFORM_ORDER {
        let duplicates = count_duplicate_keys(warehouse, target)
            .await
            .map_err(|e| e.in_stage(Stage::Transform))?;
        if duplicates > 0 {
            warn!(target_table = %target, duplicates = duplicates, "Duplicate natural keys");
            offenders.push(format!("{}: {} duplicate keys", target, duplicates));
        }
    }

    if !offenders.is_empty() {
        return Err(Error::transform(
            TransformErrorCode::DuplicateKeys,
            offenders.join(", "),
        ));
    }

    info!("Natural keys verified unique");
    Ok(())
}
