//! Bulk loader: object storage -> staging tables, then the null-key purge.
//!
//! Each copy is one `INSERT INTO <staging> SELECT ... FROM s3(...)`. Text
//! columns are projected through `nullIf(trimBoth(..), '')` so empty and
//! blank values land as NULL. A failed copy is fatal and is not rolled back;
//! the recovery path is a schema rebuild and a full rerun.

use clickhouse_client::query::{count_null_keys, count_rows};
use telemetry::Progress;
use tracing::info;
use warehouse_core::{
    staging::{ColumnType, StagingColumn},
    Result, Stage, Warehouse, STAGING_LOGS, STAGING_LOG_COLUMNS, STAGING_LOG_REQUIRED,
    STAGING_SONGS, STAGING_SONG_COLUMNS, STAGING_SONG_REQUIRED,
};

use crate::source::{BulkSource, LoadPlan, S3Credentials, SourceFormat};
use crate::sql::quote;

/// Render the `s3(...)` table function call for a source.
pub fn s3_table_function(
    url: &str,
    credentials: &S3Credentials,
    format: &str,
    structure: &str,
) -> String {
    match credentials {
        S3Credentials::Role(arn) => format!(
            "s3({}, {}, {}, extra_credentials(role_arn = {}))",
            quote(url),
            quote(format),
            quote(structure),
            quote(arn)
        ),
        S3Credentials::Unsigned => format!(
            "s3({}, NOSIGN, {}, {})",
            quote(url),
            quote(format),
            quote(structure)
        ),
    }
}

/// Expression extracting one staging column from a raw JSON line.
///
/// Numbers may arrive quoted (`"userId": "39"`) or empty, so numeric columns
/// are parsed from the raw token and anything unparseable becomes NULL.
fn extract_json_column(key: &str, column: &StagingColumn) -> String {
    let key = quote(key);
    let raw = format!("replaceAll(JSONExtractRaw(json, {}), '\"', '')", key);
    match column.ty {
        ColumnType::Text => format!("nullIf(trimBoth(JSONExtractString(json, {})), '')", key),
        ColumnType::Int32 => format!("toInt32OrNull({})", raw),
        ColumnType::Int64 => format!("toInt64OrNull({})", raw),
        ColumnType::Float64 => format!("toFloat64OrNull({})", raw),
    }
}

/// Projection of a column already typed by the source structure.
fn blank_as_null(column: &StagingColumn) -> String {
    if column.is_text() {
        format!("nullIf(trimBoth({}), '')", column.name)
    } else {
        column.name.to_string()
    }
}

fn column_list(columns: &[StagingColumn]) -> String {
    columns
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn staging_columns(table: &str) -> &'static [StagingColumn] {
    if table == STAGING_LOGS {
        STAGING_LOG_COLUMNS
    } else {
        STAGING_SONG_COLUMNS
    }
}

/// Render the copy statement for one source.
pub fn copy_statement(source: &BulkSource, credentials: &S3Credentials) -> String {
    let columns = staging_columns(source.table);

    let (projection, from) = match &source.format {
        SourceFormat::JsonPaths(keys) => {
            let projection = keys
                .iter()
                .zip(columns)
                .map(|(key, column)| extract_json_column(key, column))
                .collect::<Vec<_>>();
            let from = s3_table_function(&source.url, credentials, "JSONAsString", "json String");
            (projection, from)
        }
        SourceFormat::JsonAuto => {
            let projection = columns.iter().map(blank_as_null).collect::<Vec<_>>();
            let structure = warehouse_core::staging::structure(columns);
            let from = s3_table_function(&source.url, credentials, "JSONEachRow", &structure);
            (projection, from)
        }
    };

    format!(
        "INSERT INTO {} ({})\nSELECT\n    {}\nFROM {}",
        source.table,
        column_list(columns),
        projection.join(",\n    "),
        from
    )
}

/// Copy statements for both staging tables, in load order.
pub fn copy_statements(plan: &LoadPlan) -> Vec<String> {
    plan.sources()
        .iter()
        .map(|source| copy_statement(source, &plan.credentials))
        .collect()
}

fn delete_null_keys_statement(table: &str, required: &[&str]) -> String {
    let predicate = required
        .iter()
        .map(|c| format!("{} IS NULL", c))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("ALTER TABLE {} DELETE WHERE {}", table, predicate)
}

/// Statements deleting staging rows with a NULL key column.
pub fn clean_statements() -> Vec<String> {
    vec![
        delete_null_keys_statement(STAGING_LOGS, STAGING_LOG_REQUIRED),
        delete_null_keys_statement(STAGING_SONGS, STAGING_SONG_REQUIRED),
    ]
}

/// Bulk-copy both staging tables.
pub async fn load_raw<W: Warehouse + ?Sized>(warehouse: &W, plan: &LoadPlan) -> Result<()> {
    let statements = copy_statements(plan);
    let mut progress = Progress::new(
        "Extracting Data & Loading",
        "Staging Tables",
        statements.len(),
    );

    for (source, sql) in plan.sources().iter().zip(&statements) {
        progress.start();
        warehouse
            .execute(sql)
            .await
            .map_err(|e| e.in_stage(Stage::Load))?;
        let rows = count_rows(warehouse, source.table)
            .await
            .map_err(|e| e.in_stage(Stage::Load))?;
        info!(table = source.table, url = %source.url, rows = rows, "Staging table loaded");
        progress.complete();
    }

    Ok(())
}

/// Purge staging rows missing a key so every merge key downstream is non-null.
pub async fn clean_staging<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    info!("Clean Loaded Data - In Progress");

    for sql in clean_statements() {
        warehouse
            .execute(&sql)
            .await
            .map_err(|e| e.in_stage(Stage::Load))?;
    }

    for (table, required) in [
        (STAGING_LOGS, STAGING_LOG_REQUIRED),
        (STAGING_SONGS, STAGING_SONG_REQUIRED),
    ] {
        let remaining = count_null_keys(warehouse, table, required)
            .await
            .map_err(|e| e.in_stage(Stage::Load))?;
        let rows = count_rows(warehouse, table)
            .await
            .map_err(|e| e.in_stage(Stage::Load))?;
        info!(table = table, rows = rows, null_keys = remaining, "Staging table cleaned");
    }

    info!("Clean Loaded Data - Complete");
    Ok(())
}
