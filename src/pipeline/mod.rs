//! Per-entity ETL execution
//!
//! Each entity runs the same fixed sequence: truncate staging, COPY from the
//! stage, truncate working, resolve keys into the working table, MERGE into
//! the target, then (dimensions only) deactivate rows missing from the load.
//! The first failing statement stops the run.

pub mod facts;
pub mod provision;

pub use facts::*;
pub use provision::*;

use anyhow::{bail, Context, Result};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::catalog::EntitySchema;
use crate::config::Config;
use crate::journal::RunHandle;
use crate::sql;
use crate::ui::{Phase, Ui, FAILURE_MARK};
use crate::warehouse::{QueryResult, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TruncateStaging,
    CopyIntoStaging,
    TruncateWorking,
    PopulateWorking,
    MergeTarget,
    DeactivateMissing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::TruncateStaging => "truncate staging",
            Step::CopyIntoStaging => "copy into staging",
            Step::TruncateWorking => "truncate working",
            Step::PopulateWorking => "populate working",
            Step::MergeTarget => "merge into target",
            Step::DeactivateMissing => "deactivate missing",
        };
        f.write_str(name)
    }
}

/// Statements for one entity, in execution order
pub fn entity_statements(config: &Config, entity: &EntitySchema) -> Vec<(Step, String)> {
    let layout = &config.layout;
    let mut steps = vec![
        (
            Step::TruncateStaging,
            sql::truncate_table(&layout.staging_table(entity)),
        ),
        (
            Step::CopyIntoStaging,
            sql::copy_into_staging(layout, entity, &config.load),
        ),
        (
            Step::TruncateWorking,
            sql::truncate_table(&layout.working_table(entity)),
        ),
        (
            Step::PopulateWorking,
            sql::populate_working_table(layout, entity),
        ),
        (
            Step::MergeTarget,
            sql::merge_into_target(layout, entity, config.load.key_policy),
        ),
    ];

    if let Some(statement) = sql::deactivate_missing(layout, entity) {
        steps.push((Step::DeactivateMissing, statement));
    }

    steps
}

/// Outcome of one entity pipeline
#[derive(Debug, Clone, Default)]
pub struct EntityReport {
    pub entity: &'static str,
    pub rows_loaded: u64,
    pub rows_merged: Option<u64>,
    pub rows_deactivated: Option<u64>,
    pub elapsed: Duration,
}

impl fmt::Display for EntityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} rows loaded", self.entity, self.rows_loaded)?;
        if let Some(merged) = self.rows_merged {
            write!(f, ", {} merged", merged)?;
        }
        if let Some(deactivated) = self.rows_deactivated {
            write!(f, ", {} deactivated", deactivated)?;
        }
        write!(f, " in {:.1}s", self.elapsed.as_secs_f64())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub entities: Vec<EntityReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn rows_loaded(&self) -> u64 {
        self.entities.iter().map(|e| e.rows_loaded).sum()
    }
}

/// Run one statement, logging and timing it
pub(crate) fn execute_logged(
    warehouse: &mut dyn Warehouse,
    label: &str,
    statement: &str,
) -> Result<(QueryResult, Duration)> {
    debug!(step = label, "{}", statement);
    let start = Instant::now();
    let result = warehouse
        .execute(statement)
        .with_context(|| format!("{} failed", label))?;
    Ok((result, start.elapsed()))
}

/// Record a finished statement; a journal that stops accepting writes only costs history
pub(crate) fn journal_step(
    journal: Option<&RunHandle<'_>>,
    entity: &str,
    step: &str,
    rows: Option<u64>,
    elapsed: Duration,
) {
    if let Some(run) = journal {
        if let Err(e) = run.record_step(entity, step, rows, elapsed) {
            warn!("Journal write failed for {} / {}: {:#}", entity, step, e);
        }
    }
}

/// Run the ETL steps for a single entity
pub fn run_entity(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    entity: &'static EntitySchema,
    journal: Option<&RunHandle<'_>>,
    ui: &mut impl Ui,
) -> Result<EntityReport> {
    let start = Instant::now();
    let steps = entity_statements(config, entity);
    let total = steps.len() as u64;
    let mut report = EntityReport {
        entity: entity.name,
        ..Default::default()
    };

    for (idx, (step, statement)) in steps.iter().enumerate() {
        ui.set_progress(idx as u64, total, format!("{}: {}", entity.name, step));

        let label = format!("{} / {}", entity.name, step);
        let (result, elapsed) = match execute_logged(warehouse, &label, statement) {
            Ok(done) => done,
            Err(e) => {
                ui.log(format!("{} {}: {:#}", FAILURE_MARK, label, e));
                return Err(e);
            }
        };

        let rows = match step {
            Step::CopyIntoStaging => {
                report.rows_loaded = result.rows_loaded();
                Some(report.rows_loaded)
            }
            Step::MergeTarget => {
                report.rows_merged = result.rows_affected;
                result.rows_affected
            }
            Step::DeactivateMissing => {
                report.rows_deactivated = result.rows_affected;
                result.rows_affected
            }
            _ => result.rows_affected,
        };

        journal_step(journal, entity.name, &step.to_string(), rows, elapsed);
    }

    ui.set_progress(total, total, format!("{}: done", entity.name));
    report.elapsed = start.elapsed();
    Ok(report)
}

/// Run every given entity in order. Entities must already be in dependency order.
pub fn run_pipelines(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    entities: &[&'static EntitySchema],
    journal: Option<&RunHandle<'_>>,
    ui: &mut impl Ui,
) -> Result<RunSummary> {
    let start = Instant::now();
    ui.set_phase(Phase::Loading);

    let sequence = config.layout.sequence_name();
    execute_logged(warehouse, "ensure sequence", &sql::create_sequence(&sequence))?;

    let mut summary = RunSummary::default();

    for (idx, entity) in entities.iter().enumerate() {
        if ui.cancelled() {
            bail!("Run cancelled before {}", entity.name);
        }
        ui.set_info(format!(
            "Entity {}/{}: {}",
            idx + 1,
            entities.len(),
            entity.name
        ));

        let report = run_entity(warehouse, config, entity, journal, ui)
            .with_context(|| format!("Pipeline for '{}' failed", entity.name))?;

        ui.log(report.to_string());
        summary.entities.push(report);
    }

    ui.clear_progress();
    summary.elapsed = start.elapsed();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{COUNTRY, SALES};

    #[test]
    fn test_dimension_has_six_steps() {
        let steps = entity_statements(&Config::default(), &COUNTRY);
        let kinds: Vec<Step> = steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            kinds,
            vec![
                Step::TruncateStaging,
                Step::CopyIntoStaging,
                Step::TruncateWorking,
                Step::PopulateWorking,
                Step::MergeTarget,
                Step::DeactivateMissing,
            ]
        );
        assert_eq!(steps[0].1, "TRUNCATE TABLE IF EXISTS STG.STG_D_COUNTRY_LU");
        assert_eq!(steps[2].1, "TRUNCATE TABLE IF EXISTS TMP.TMP_D_COUNTRY_LU");
    }

    #[test]
    fn test_transaction_skips_deactivation() {
        let steps = entity_statements(&Config::default(), &SALES);
        assert_eq!(steps.len(), 5);
        assert_eq!(steps.last().unwrap().0, Step::MergeTarget);
    }

    #[test]
    fn test_report_display() {
        let report = EntityReport {
            entity: "country",
            rows_loaded: 3,
            rows_merged: Some(3),
            rows_deactivated: None,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(report.to_string(), "country: 3 rows loaded, 3 merged in 1.5s");
    }
}
