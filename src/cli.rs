use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retail-dwh")]
#[command(version, about = "Provision and load the retail sales warehouse on Snowflake")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every SQL statement
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Full-screen progress view
    #[arg(long, global = true)]
    pub tui: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Entity selection shared by several commands
#[derive(Args, Debug, Clone, Default)]
pub struct EntityFilter {
    /// Only these entities plus their parents (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Skip these entities and everything that references them (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create schemas, stage, sequence and entity tables
    Init {
        /// Drop and recreate existing tables
        #[arg(long)]
        replace: bool,

        #[command(flatten)]
        filter: EntityFilter,
    },

    /// Load staged files into the target tables
    Run {
        #[command(flatten)]
        filter: EntityFilter,

        /// Don't check the stage for missing files first
        #[arg(long)]
        skip_stage_check: bool,

        /// Rebuild fact tables after loading
        #[arg(long)]
        facts: bool,
    },

    /// Print the SQL a run would execute without connecting
    Plan {
        #[command(flatten)]
        filter: EntityFilter,

        /// Print the provisioning DDL instead
        #[arg(long)]
        init: bool,
    },

    /// Rebuild the aggregate fact tables
    Facts,

    /// Dump every table of a schema to CSV
    Export {
        /// Schema to export, e.g. TGT
        schema: String,

        /// Output directory
        out_dir: PathBuf,
    },

    /// Check credentials and connectivity
    Check,

    /// List all entities with their dependencies
    ListEntities,

    /// Show past runs from the local journal
    History {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Show the steps of one run
        #[arg(long)]
        run: Option<i64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "retail-dwh",
            "--verbose",
            "run",
            "--include",
            "store,product",
            "--facts",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                filter,
                skip_stage_check,
                facts,
            } => {
                assert_eq!(
                    filter.include,
                    Some(vec!["store".to_string(), "product".to_string()])
                );
                assert!(!skip_stage_check);
                assert!(facts);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::try_parse_from(["retail-dwh", "history"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                limit: 10,
                run: None
            }
        ));
    }
}
