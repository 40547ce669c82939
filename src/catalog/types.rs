use std::collections::HashSet;
use std::fmt;

/// Warehouse column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Number,
    Decimal(u8, u8),
    Varchar(u16),
    Timestamp,
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Number => write!(f, "NUMBER"),
            ColumnType::Decimal(precision, scale) => write!(f, "NUMBER({},{})", precision, scale),
            ColumnType::Varchar(len) => write!(f, "VARCHAR({})", len),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// Attribute column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
        }
    }
}

/// A `<parent>_id` column pointing at another entity's natural id
#[derive(Debug, Clone)]
pub struct Reference {
    pub column: &'static str,
    pub entity: &'static str,
    /// Required references resolve with an inner join, optional ones with a left join
    pub required: bool,
}

impl Reference {
    pub const fn required(column: &'static str, entity: &'static str) -> Self {
        Self {
            column,
            entity,
            required: true,
        }
    }

    pub const fn optional(column: &'static str, entity: &'static str) -> Self {
        Self {
            column,
            entity,
            required: false,
        }
    }

    /// Working/target column holding the resolved surrogate key (`store_id` -> `store_key`)
    pub fn key_column(&self) -> String {
        match self.column.strip_suffix("_id") {
            Some(prefix) => format!("{}_key", prefix),
            None => format!("{}_key", self.column),
        }
    }
}

/// How rows absent from the latest load are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Lookup dimension: rows missing from the load are marked inactive
    Dimension,
    /// Append-style rows (sales, location hierarchy): nothing is deactivated
    Transaction,
}

/// One entity pipeline: staging, working and target table share this shape
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub name: &'static str,
    /// Upper-case stem used in table names (`STG_D_<stem>_LU`)
    pub table_stem: &'static str,
    pub surrogate_key: &'static str,
    /// CSV file name as uploaded to the stage
    pub source_file: &'static str,
    pub kind: EntityKind,
    pub references: &'static [Reference],
    pub columns: &'static [Column],
}

impl EntitySchema {
    /// Entities this one references
    pub fn dependencies(&self) -> HashSet<&'static str> {
        self.references.iter().map(|r| r.entity).collect()
    }

    /// Staging column order, which is also the CSV column order
    pub fn staging_columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["id"];
        columns.extend(self.references.iter().map(|r| r.column));
        columns.extend(self.columns.iter().map(|c| c.name));
        columns
    }

    /// Working table columns: natural ids, resolved keys, attributes
    pub fn working_columns(&self) -> Vec<String> {
        let mut columns = vec!["id".to_string()];
        for reference in self.references {
            columns.push(reference.column.to_string());
            columns.push(reference.key_column());
        }
        columns.extend(self.columns.iter().map(|c| c.name.to_string()));
        columns
    }

    /// Path of the gzip'd file inside the stage (`x.csv/x.csv.gz`)
    pub fn stage_path(&self) -> String {
        format!("{}/{}.gz", self.source_file, self.source_file)
    }
}
