use crate::catalog::{get_entity, EntityKind, EntitySchema, Reference};
use crate::config::{KeyPolicy, Layout, LoadOptions};

pub fn truncate_table(name: &str) -> String {
    format!("TRUNCATE TABLE IF EXISTS {}", name)
}

/// Bulk load the entity's gzip'd CSV from the stage into its staging table
pub fn copy_into_staging(layout: &Layout, entity: &EntitySchema, load: &LoadOptions) -> String {
    format!(
        "COPY INTO {} FROM @{}/{} FILE_FORMAT = (TYPE = 'CSV' SKIP_HEADER = {} COMPRESSION = '{}') ON_ERROR = '{}'",
        layout.staging_table(entity),
        layout.stage,
        entity.stage_path(),
        load.skip_header,
        load.compression,
        load.on_error
    )
}

fn reference_alias(reference: &Reference) -> String {
    let stem = reference.column.strip_suffix("_id").unwrap_or(reference.column);
    format!("ref_{}", stem)
}

/// Fill the working table, resolving every `<parent>_id` to the parent's surrogate key
pub fn populate_working_table(layout: &Layout, entity: &EntitySchema) -> String {
    let columns = entity.working_columns();

    let mut select = vec!["stg.id".to_string()];
    let mut joins = Vec::new();

    for reference in entity.references {
        let alias = reference_alias(reference);
        select.push(format!("stg.{}", reference.column));

        match get_entity(reference.entity) {
            Some(parent) => {
                select.push(format!("{}.{}", alias, parent.surrogate_key));
                let join = if reference.required { "INNER JOIN" } else { "LEFT JOIN" };
                joins.push(format!(
                    "{} {} AS {} ON {}.id = stg.{}",
                    join,
                    layout.target_table(parent),
                    alias,
                    alias,
                    reference.column
                ));
            }
            None => select.push("NULL".to_string()),
        }
    }

    for col in entity.columns {
        select.push(format!("stg.{}", col.name));
    }

    let mut sql = format!(
        "INSERT INTO {} ({})\nSELECT {}\nFROM {} stg",
        layout.working_table(entity),
        columns.join(", "),
        select.join(", "),
        layout.staging_table(entity)
    );
    for join in joins {
        sql.push('\n');
        sql.push_str(&join);
    }
    sql
}

/// Upsert the working table into the target, keyed on the natural id
pub fn merge_into_target(layout: &Layout, entity: &EntitySchema, policy: KeyPolicy) -> String {
    let sequence = layout.sequence_name();
    let columns = entity.working_columns();

    let mut updates = Vec::new();
    if policy == KeyPolicy::Reassign {
        updates.push(format!("{} = {}.NEXTVAL", entity.surrogate_key, sequence));
    }
    updates.extend(
        columns
            .iter()
            .filter(|c| c.as_str() != "id")
            .map(|c| format!("{} = tmp.{}", c, c)),
    );
    updates.push("active_flag = TRUE".to_string());
    updates.push("updated_at = CURRENT_TIMESTAMP".to_string());

    let mut insert_columns = vec![entity.surrogate_key.to_string()];
    insert_columns.extend(columns.iter().cloned());
    insert_columns.extend(["active_flag", "created_at", "updated_at"].map(String::from));

    let mut values = vec![format!("{}.NEXTVAL", sequence)];
    values.extend(columns.iter().map(|c| format!("tmp.{}", c)));
    values.extend(["TRUE", "CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP"].map(String::from));

    format!(
        "MERGE INTO {} AS tgt\nUSING {} AS tmp ON tgt.id = tmp.id\nWHEN MATCHED THEN UPDATE SET\n    {}\nWHEN NOT MATCHED THEN INSERT ({})\nVALUES ({})",
        layout.target_table(entity),
        layout.working_table(entity),
        updates.join(",\n    "),
        insert_columns.join(", "),
        values.join(", ")
    )
}

/// Mark dimension rows that are absent from the latest load as inactive.
/// Transaction entities accumulate, so they get no statement.
pub fn deactivate_missing(layout: &Layout, entity: &EntitySchema) -> Option<String> {
    if entity.kind != EntityKind::Dimension {
        return None;
    }

    let target = layout.target_table(entity);
    let working = layout.working_table(entity);
    Some(format!(
        "UPDATE {} SET active_flag = FALSE, updated_at = CURRENT_TIMESTAMP\nWHERE active_flag AND NOT EXISTS (SELECT 1 FROM {} WHERE {}.id = {}.id)",
        target, working, working, target
    ))
}
