//! Warehouse backends
//!
//! `Warehouse` is the single seam between statement generation and
//! execution: the Snowflake SQL API client runs statements for real, the
//! recording backend captures them for `plan` and for tests.

pub mod error;
pub mod snowflake;

pub use error::WarehouseError;
pub use snowflake::SnowflakeClient;

/// Something that runs one SQL statement at a time
pub trait Warehouse {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError>;
}

/// Result of a single statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Inserted + updated + deleted, when the server reports DML stats
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    pub fn new(columns: &[&str], rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            rows_affected: None,
        }
    }

    pub fn with_rows_affected(mut self, count: u64) -> Self {
        self.rows_affected = Some(count);
        self
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Non-null values of one column
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        match self.column_index(name) {
            Some(idx) => self
                .rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(|v| v.as_deref()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Sum of the `rows_loaded` column of a COPY INTO result
    pub fn rows_loaded(&self) -> u64 {
        self.column_values("rows_loaded")
            .iter()
            .filter_map(|v| v.parse::<u64>().ok())
            .sum()
    }
}

/// Captures statements instead of running them
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    statements: Vec<String>,
    responses: Vec<(String, QueryResult)>,
    failures: Vec<(String, String)>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements starting with `prefix` with `result`
    pub fn with_response(mut self, prefix: impl Into<String>, result: QueryResult) -> Self {
        self.responses.push((prefix.into(), result));
        self
    }

    /// Fail statements starting with `prefix`
    pub fn fail_on(mut self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push((prefix.into(), message.into()));
        self
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl Warehouse for RecordingWarehouse {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError> {
        self.statements.push(sql.to_string());

        if let Some((_, message)) = self.failures.iter().find(|(p, _)| sql.starts_with(p.as_str())) {
            return Err(WarehouseError::Rejected(message.clone()));
        }

        Ok(self
            .responses
            .iter()
            .find(|(p, _)| sql.starts_with(p.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_rows_loaded_sums_copy_result() {
        let result = QueryResult::new(
            &["file", "status", "ROWS_LOADED"],
            vec![
                vec![text("a.csv.gz"), text("LOADED"), text("10")],
                vec![text("b.csv.gz"), text("LOADED"), text("5")],
                vec![text("c.csv.gz"), text("LOAD_FAILED"), None],
            ],
        );
        assert_eq!(result.rows_loaded(), 15);
    }

    #[test]
    fn test_recording_warehouse_matches_by_prefix() {
        let mut wh = RecordingWarehouse::new()
            .with_response("LIST", QueryResult::new(&["name"], vec![vec![text("x")]]))
            .fail_on("COPY", "file not found");

        assert_eq!(wh.execute("LIST @S").unwrap().column_values("name"), vec!["x"]);
        assert!(wh.execute("SELECT 1").unwrap().rows.is_empty());
        assert!(matches!(
            wh.execute("COPY INTO T"),
            Err(WarehouseError::Rejected(_))
        ));
        assert_eq!(wh.statements().len(), 3);
    }
}
