use anyhow::{bail, Result};
use std::collections::BTreeSet;
use tracing::warn;

use super::{execute_logged, journal_step};
use crate::catalog::{DependencyResolver, EntitySchema};
use crate::config::Config;
use crate::journal::RunHandle;
use crate::sql::{self, CreateMode};
use crate::ui::{Phase, Ui};
use crate::warehouse::Warehouse;

/// DDL that brings the warehouse up to the catalog shape.
/// In replace mode existing tables are dropped children-first before being recreated.
pub fn provision_statements(
    config: &Config,
    entities: &[&EntitySchema],
    mode: CreateMode,
) -> Vec<String> {
    let layout = &config.layout;
    let mut statements: Vec<String> = layout
        .schemas()
        .iter()
        .map(|schema| sql::create_schema(schema))
        .collect();

    statements.push(sql::create_stage(&layout.stage));
    statements.push(sql::create_sequence(&layout.sequence_name()));

    if mode == CreateMode::Replace {
        for entity in entities.iter().rev() {
            statements.push(sql::drop_table(&layout.target_table(entity)));
            statements.push(sql::drop_table(&layout.working_table(entity)));
            statements.push(sql::drop_table(&layout.staging_table(entity)));
        }
    }

    for entity in entities {
        statements.push(sql::create_staging_table(layout, entity, mode));
        statements.push(sql::create_working_table(layout, entity, mode));
        statements.push(sql::create_target_table(layout, entity, mode));
    }

    statements
}

/// Unselected entities with a foreign key into one of the given tables.
/// Dropping those tables removes the constraint from the dependent table.
pub fn unselected_dependents(entities: &[&EntitySchema]) -> Vec<&'static str> {
    let resolver = DependencyResolver::new();
    let dependents: BTreeSet<&'static str> = entities
        .iter()
        .flat_map(|entity| resolver.dependents(entity.name))
        .filter(|child| !entities.iter().any(|e| e.name == *child))
        .collect();
    dependents.into_iter().collect()
}

/// Create schemas, stage, sequence and entity tables
pub fn provision(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    entities: &[&EntitySchema],
    mode: CreateMode,
    journal: Option<&RunHandle<'_>>,
    ui: &mut impl Ui,
) -> Result<usize> {
    ui.set_phase(Phase::Provisioning);

    if mode == CreateMode::Replace {
        let orphaned = unselected_dependents(entities);
        if !orphaned.is_empty() {
            let message = format!(
                "Replacing these tables drops the foreign keys of unselected entities: {}",
                orphaned.join(", ")
            );
            warn!("{}", message);
            ui.log(message);
        }
    }

    let statements = provision_statements(config, entities, mode);
    let total = statements.len() as u64;

    for (idx, statement) in statements.iter().enumerate() {
        let summary = statement.lines().next().unwrap_or_default();
        ui.set_progress(idx as u64, total, summary.trim_end_matches(" ("));

        let (_, elapsed) = execute_logged(warehouse, "provision", statement)?;
        journal_step(journal, "-", summary, None, elapsed);
    }

    ui.clear_progress();
    ui.log(format!("Executed {} DDL statements", statements.len()));
    Ok(statements.len())
}

/// Stage paths of the given entities that `LIST @stage` does not show
pub fn missing_stage_files(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    entities: &[&EntitySchema],
) -> Result<Vec<String>> {
    let (listing, _) = execute_logged(warehouse, "list stage", &sql::list_stage(&config.layout.stage))?;
    let names = listing.column_values("name");

    Ok(entities
        .iter()
        .map(|entity| entity.stage_path())
        .filter(|path| !names.iter().any(|name| name.ends_with(path.as_str())))
        .collect())
}

/// Fail before touching any table if a selected entity has no staged file
pub fn verify_stage(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    entities: &[&EntitySchema],
    ui: &mut impl Ui,
) -> Result<()> {
    ui.set_phase(Phase::Verifying);

    let missing = missing_stage_files(warehouse, config, entities)?;
    if !missing.is_empty() {
        bail!(
            "Stage @{} is missing {} file(s): {}",
            config.layout.stage,
            missing.len(),
            missing.join(", ")
        );
    }

    ui.log(format!(
        "All {} staged files present in @{}",
        entities.len(),
        config.layout.stage
    ));
    Ok(())
}
