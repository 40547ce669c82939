//! Progress reporting
//!
//! Commands report through the `Ui` trait: the phase they are in, a detail
//! line, step progress and an activity log. Three front ends implement it:
//! `UiApp` draws a full-screen ratatui view, `LogUi` turns every event into
//! a `tracing` record and `SilentUi` drops everything (tests, `plan`).

mod components;
mod terminal;

pub use components::FAILURE_MARK;
pub use terminal::UiApp;

use std::fmt;

/// Run phases shown in the status panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Provisioning,
    Verifying,
    Loading,
    Aggregating,
    Exporting,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Connecting => "Connecting to warehouse",
            Phase::Provisioning => "Creating schemas and tables",
            Phase::Verifying => "Checking staged files",
            Phase::Loading => "Loading entities",
            Phase::Aggregating => "Building fact tables",
            Phase::Exporting => "Exporting tables",
            Phase::Complete => "Complete",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

impl Progress {
    pub fn new(current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    /// Completed fraction; 0 when the total is unknown
    pub fn ratio(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => self.current as f64 / total as f64,
        }
    }
}

pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);

    /// Whether the user asked to stop; checked between entities
    fn cancelled(&mut self) -> bool {
        false
    }
}

/// Sends UI events to `tracing`; the default when stdout is not a full-screen view
#[derive(Default)]
pub struct LogUi {
    phase: Option<Phase>,
}

impl LogUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ui for LogUi {
    fn set_phase(&mut self, phase: Phase) {
        if self.phase != Some(phase) {
            tracing::info!("== {}", phase);
            self.phase = Some(phase);
        }
    }

    fn set_info(&mut self, info: impl Into<String>) {
        tracing::info!("{}", info.into());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        tracing::debug!(current, total, "{}", label.into());
    }

    fn clear_progress(&mut self) {}

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.starts_with(FAILURE_MARK) {
            tracing::error!("{}", message);
        } else {
            tracing::info!("{}", message);
        }
    }
}

/// Discards every event
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}
