use anyhow::{bail, Context, Result};
use retail_dwh::{
    catalog::{DependencyResolver, EntityKind},
    cli::{Cli, Commands},
    config::Config,
    export::export_schema,
    filter::resolve_entities,
    journal::{Journal, RunHandle},
    pipeline::{build_facts, provision, run_pipelines, verify_stage},
    sql::{self, CreateMode},
    ui::{LogUi, Phase, SilentUi, Ui, UiApp},
    warehouse::{RecordingWarehouse, SnowflakeClient, Warehouse},
};
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.tui);

    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Plan { filter, init } => {
            let entities = resolve_entities(filter.include.clone(), filter.exclude.clone())?;
            let mut recorder = RecordingWarehouse::new();
            let mut ui = SilentUi::new();
            if *init {
                provision(&mut recorder, &config, &entities, CreateMode::IfNotExists, None, &mut ui)?;
            } else {
                run_pipelines(&mut recorder, &config, &entities, None, &mut ui)?;
            }
            for statement in recorder.statements() {
                println!("{};\n", statement);
            }
        }

        Commands::ListEntities => {
            let resolver = DependencyResolver::new();
            for entity in resolver.all_entities_ordered() {
                let kind = match entity.kind {
                    EntityKind::Dimension => "dimension",
                    EntityKind::Transaction => "transaction",
                };
                let mut deps: Vec<_> = entity.dependencies().into_iter().collect();
                deps.sort();
                println!("{} ({})", entity.name, kind);
                println!("  stage file: {}", entity.stage_path());
                if !deps.is_empty() {
                    println!("  depends on: {}", deps.join(", "));
                }
                let dependents = resolver.dependents(entity.name);
                if !dependents.is_empty() {
                    println!("  used by:    {}", dependents.join(", "));
                }
            }
        }

        Commands::History { limit, run } => {
            let path = config.journal.resolve_path()?;
            let journal = Journal::open(&path)?;
            match run {
                Some(id) => {
                    let record = journal
                        .run(*id)?
                        .with_context(|| format!("No run with id {}", id))?;
                    println!(
                        "#{} {} [{}] started {}",
                        record.id, record.command, record.status, record.started_at
                    );
                    if let Some(error) = &record.error {
                        println!("  error: {}", error);
                    }
                    for step in journal.steps_for(*id)? {
                        let rows = step
                            .rows
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "  {:<20} {:<24} {:>10} rows {:>8} ms",
                            step.entity, step.step, rows, step.elapsed_ms
                        );
                    }
                }
                None => {
                    for record in journal.recent_runs(*limit)? {
                        println!(
                            "#{:<5} {:<8} {:<10} {} {}",
                            record.id,
                            record.command,
                            record.status,
                            record.started_at,
                            record.error.unwrap_or_default()
                        );
                    }
                }
            }
        }

        command => {
            if cli.tui {
                let mut ui = UiApp::new()?;
                match execute(command, &config, &mut ui) {
                    Ok(summary) => ui.finish(&summary)?,
                    Err(e) => {
                        ui.restore()?;
                        return Err(e);
                    }
                }
            } else {
                let mut ui = LogUi::new();
                let summary = execute(command, &config, &mut ui)?;
                println!("{}", summary);
            }
        }
    }

    Ok(())
}

/// Quiet by default; `--verbose` logs every statement, `RUST_LOG` wins over both.
/// The full-screen view owns the terminal, so only errors get through there.
fn init_tracing(verbose: bool, tui: bool) {
    let default = if tui {
        "error"
    } else if verbose {
        "retail_dwh=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_journal(config: &Config) -> Option<Journal> {
    if !config.journal.enabled {
        return None;
    }
    match config.journal.resolve_path().and_then(|path| Journal::open(&path)) {
        Ok(journal) => Some(journal),
        Err(e) => {
            warn!("Run journal unavailable: {:#}", e);
            None
        }
    }
}

fn connect(config: &Config, ui: &mut impl Ui) -> Result<SnowflakeClient> {
    ui.set_phase(Phase::Connecting);
    ui.set_info(format!("Database {}", config.connection.database));
    SnowflakeClient::connect(&config.connection)
}

/// Commands that talk to the warehouse; returns a one-line summary
fn execute(command: &Commands, config: &Config, ui: &mut impl Ui) -> Result<String> {
    match command {
        Commands::Init { replace, filter } => {
            let entities = resolve_entities(filter.include.clone(), filter.exclude.clone())?;
            let mode = if *replace {
                CreateMode::Replace
            } else {
                CreateMode::IfNotExists
            };
            journaled(config, "init", |run| {
                let mut client = connect(config, ui)?;
                let count = provision(&mut client, config, &entities, mode, run, ui)?;
                Ok(format!(
                    "Provisioned {} entities ({} statements)",
                    entities.len(),
                    count
                ))
            })
        }

        Commands::Run {
            filter,
            skip_stage_check,
            facts,
        } => {
            let entities = resolve_entities(filter.include.clone(), filter.exclude.clone())?;
            journaled(config, "run", |run| {
                let start = Instant::now();
                let mut client = connect(config, ui)?;
                if !*skip_stage_check {
                    verify_stage(&mut client, config, &entities, ui)?;
                }
                let summary = run_pipelines(&mut client, config, &entities, run, ui)?;
                if *facts {
                    build_facts(&mut client, config, run, ui)?;
                }
                Ok(format!(
                    "Loaded {} entities ({} rows) in {:.1}s",
                    summary.entities.len(),
                    summary.rows_loaded(),
                    start.elapsed().as_secs_f64()
                ))
            })
        }

        Commands::Facts => journaled(config, "facts", |run| {
            let mut client = connect(config, ui)?;
            let built = build_facts(&mut client, config, run, ui)?;
            Ok(format!("Rebuilt {} fact tables", built.len()))
        }),

        Commands::Export { schema, out_dir } => {
            let mut client = connect(config, ui)?;
            let files = export_schema(&mut client, config, schema, out_dir, ui)?;
            Ok(format!("Exported {} tables to {:?}", files.len(), out_dir))
        }

        Commands::Check => {
            let mut client = connect(config, ui)?;
            let result = client.execute(sql::current_version())?;
            let version = result
                .rows
                .first()
                .and_then(|row| row.first())
                .and_then(|v| v.clone())
                .unwrap_or_else(|| "unknown".to_string());
            Ok(format!(
                "Connected to {} (Snowflake {})",
                config.connection.database, version
            ))
        }

        Commands::Plan { .. } | Commands::ListEntities | Commands::History { .. } => {
            bail!("{:?} does not connect to the warehouse", command)
        }
    }
}

/// Run `body` inside a journal run, recording its outcome
fn journaled(
    config: &Config,
    command: &str,
    body: impl FnOnce(Option<&RunHandle<'_>>) -> Result<String>,
) -> Result<String> {
    let journal = open_journal(config);
    let run = journal.as_ref().and_then(|journal| match journal.start_run(command) {
        Ok(run) => Some(run),
        Err(e) => {
            warn!("Run will not be journaled: {:#}", e);
            None
        }
    });

    let result = body(run.as_ref());

    if let Some(run) = run {
        let error = result.as_ref().err().map(|e| format!("{:#}", e));
        if let Err(e) = run.finish(error.as_deref()) {
            warn!("Failed to record run result: {:#}", e);
        }
    }

    result
}
