//! Small SQL rendering helpers.

/// Quote a value as a ClickHouse string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Render a key for `IN` comparisons: a bare column or a tuple.
pub fn key_expr(columns: &[&str]) -> String {
    match columns {
        [single] => single.to_string(),
        many => format!("({})", many.join(", ")),
    }
}

/// Render an `ORDER BY` list with every column descending.
pub fn descending(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{} DESC", c))
        .collect::<Vec<_>>()
        .join(", ")
}
