//! Dump every table of a schema to CSV files

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::sql;
use crate::ui::{Phase, Ui};
use crate::warehouse::{QueryResult, Warehouse};

/// Export `schema` into `out_dir`, one `<table>_data.csv` per table
pub fn export_schema(
    warehouse: &mut dyn Warehouse,
    config: &Config,
    schema: &str,
    out_dir: &Path,
    ui: &mut impl Ui,
) -> Result<Vec<PathBuf>> {
    ui.set_phase(Phase::Exporting);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    let listing = warehouse
        .execute(&sql::show_tables(&config.connection.database, schema))
        .with_context(|| format!("Failed to list tables in {}", schema))?;
    let tables: Vec<String> = listing
        .column_values("name")
        .into_iter()
        .map(String::from)
        .collect();

    let total = tables.len() as u64;
    let mut written = Vec::with_capacity(tables.len());

    for (idx, table) in tables.iter().enumerate() {
        ui.set_progress(idx as u64, total, table.as_str());

        let qualified = format!("{}.{}", schema, table);
        let result = warehouse
            .execute(&sql::select_all(&qualified))
            .with_context(|| format!("Failed to read {}", qualified))?;

        let path = out_dir.join(format!("{}_data.csv", table.to_lowercase()));
        write_csv(&path, &result)?;
        debug!("Wrote {} rows to {:?}", result.rows.len(), path);

        ui.log(format!("{}: {} rows", qualified, result.rows.len()));
        written.push(path);
    }

    ui.clear_progress();
    Ok(written)
}

/// Header row then data rows; NULL is written as an empty field
pub fn write_csv(path: &Path, result: &QueryResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}
