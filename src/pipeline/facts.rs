use anyhow::{Context, Result};

use super::{execute_logged, journal_step};
use crate::config::Config;
use crate::journal::RunHandle;
use crate::sql;
use crate::ui::{Phase, Ui};
use crate::warehouse::Warehouse;

/// Fact table name paired with the statements that rebuild it
pub fn fact_statements(config: &Config) -> Vec<(&'static str, Vec<String>)> {
    vec![
        (
            sql::MONTHLY_SALES_TABLE,
            sql::monthly_sales_statements(&config.layout),
        ),
        (
            sql::STORE_PRODUCT_MONTH_TABLE,
            sql::store_product_month_statements(&config.layout),
        ),
    ]
}

/// Rebuild the aggregate fact tables from active sales rows
pub fn build_facts(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    journal: Option<&RunHandle<'_>>,
    ui: &mut impl Ui,
) -> Result<Vec<(&'static str, Option<u64>)>> {
    ui.set_phase(Phase::Aggregating);

    let facts = fact_statements(config);
    let total = facts.len() as u64;
    let mut built = Vec::with_capacity(facts.len());

    for (idx, (table, statements)) in facts.into_iter().enumerate() {
        ui.set_progress(idx as u64, total, table);

        let mut inserted = None;
        for statement in &statements {
            let (result, elapsed) = execute_logged(warehouse, table, statement)
                .with_context(|| format!("Building {} failed", table))?;
            if statement.starts_with("INSERT") {
                inserted = result.rows_affected;
            }
            journal_step(journal, table, first_word(statement), result.rows_affected, elapsed);
        }

        match inserted {
            Some(rows) => ui.log(format!("{}: {} rows", table, rows)),
            None => ui.log(format!("{}: rebuilt", table)),
        }
        built.push((table, inserted));
    }

    ui.clear_progress();
    Ok(built)
}

fn first_word(statement: &str) -> &str {
    statement.split_whitespace().next().unwrap_or(statement)
}
