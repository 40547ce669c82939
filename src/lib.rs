pub mod catalog;
pub mod cli;
pub mod config;
pub mod export;
pub mod filter;
pub mod journal;
pub mod pipeline;
pub mod sql;
pub mod ui;
pub mod warehouse;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use ui::{LogUi, Phase, SilentUi, Ui, UiApp};
pub use warehouse::{RecordingWarehouse, SnowflakeClient, Warehouse};
