//! Snowflake statement generation
//!
//! Every function here is pure: it renders SQL text from the catalog and
//! the configured layout. Execution lives in `pipeline`.

pub mod ddl;
pub mod etl;
pub mod facts;

pub use ddl::*;
pub use etl::*;
pub use facts::*;

pub fn list_stage(stage: &str) -> String {
    format!("LIST @{}", stage)
}

pub fn show_tables(database: &str, schema: &str) -> String {
    format!("SHOW TABLES IN SCHEMA {}.{}", database, schema)
}

pub fn select_all(table: &str) -> String {
    format!("SELECT * FROM {}", table)
}

pub fn current_version() -> &'static str {
    "SELECT CURRENT_VERSION()"
}
