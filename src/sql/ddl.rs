use crate::catalog::{get_entity, EntitySchema};
use crate::config::Layout;

/// Whether table DDL keeps existing tables or replaces them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    IfNotExists,
    Replace,
}

impl CreateMode {
    fn create_table(&self) -> &'static str {
        match self {
            CreateMode::IfNotExists => "CREATE TABLE IF NOT EXISTS",
            CreateMode::Replace => "CREATE OR REPLACE TABLE",
        }
    }
}

pub fn create_schema(name: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", name)
}

pub fn create_stage(name: &str) -> String {
    format!("CREATE STAGE IF NOT EXISTS {}", name)
}

/// The shared key sequence survives between runs so keys stay monotonic
pub fn create_sequence(name: &str) -> String {
    format!(
        "CREATE SEQUENCE IF NOT EXISTS {} START = 1 INCREMENT = 1 ORDER",
        name
    )
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", name)
}

/// Staging table: raw CSV shape, natural ids only
pub fn create_staging_table(layout: &Layout, entity: &EntitySchema, mode: CreateMode) -> String {
    let mut columns = vec!["    id NUMBER NOT NULL".to_string()];

    for reference in entity.references {
        let null_constraint = if reference.required { " NOT NULL" } else { "" };
        columns.push(format!("    {} NUMBER{}", reference.column, null_constraint));
    }
    push_attribute_columns(entity, &mut columns);
    columns.push("    PRIMARY KEY (id)".to_string());

    render_table(mode, &layout.staging_table(entity), &columns)
}

/// Working table: natural ids next to their resolved surrogate keys
pub fn create_working_table(layout: &Layout, entity: &EntitySchema, mode: CreateMode) -> String {
    let mut columns = vec!["    id NUMBER NOT NULL".to_string()];

    for reference in entity.references {
        let null_constraint = if reference.required { " NOT NULL" } else { "" };
        columns.push(format!("    {} NUMBER", reference.column));
        columns.push(format!(
            "    {} NUMBER{}",
            reference.key_column(),
            null_constraint
        ));
    }
    push_attribute_columns(entity, &mut columns);
    columns.push("    PRIMARY KEY (id)".to_string());

    render_table(mode, &layout.working_table(entity), &columns)
}

/// Target table: surrogate key, working columns and row bookkeeping
pub fn create_target_table(layout: &Layout, entity: &EntitySchema, mode: CreateMode) -> String {
    let mut columns = vec![
        format!("    {} NUMBER NOT NULL", entity.surrogate_key),
        "    id NUMBER NOT NULL".to_string(),
    ];

    for reference in entity.references {
        let null_constraint = if reference.required { " NOT NULL" } else { "" };
        columns.push(format!("    {} NUMBER", reference.column));
        columns.push(format!(
            "    {} NUMBER{}",
            reference.key_column(),
            null_constraint
        ));
    }
    push_attribute_columns(entity, &mut columns);

    columns.push("    active_flag BOOLEAN".to_string());
    columns.push("    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push("    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push(format!("    PRIMARY KEY ({})", entity.surrogate_key));

    for reference in entity.references {
        if let Some(parent) = get_entity(reference.entity) {
            columns.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {}({})",
                reference.key_column(),
                layout.target_table(parent),
                parent.surrogate_key
            ));
        }
    }

    render_table(mode, &layout.target_table(entity), &columns)
}

fn push_attribute_columns(entity: &EntitySchema, columns: &mut Vec<String>) {
    for col in entity.columns {
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        columns.push(format!("    {} {}{}", col.name, col.col_type, null_constraint));
    }
}

fn render_table(mode: CreateMode, table: &str, columns: &[String]) -> String {
    format!(
        "{} {} (\n{}\n)",
        mode.create_table(),
        table,
        columns.join(",\n")
    )
}
