//! Full-screen progress view (`--tui`)

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;

use super::components::{LogPanel, ProgressPanel, StatusPanel};
use super::{Phase, Progress, Ui};

pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    status: StatusPanel,
    progress: ProgressPanel,
    log: LogPanel,
    stop_requested: bool,
    restored: bool,
}

impl UiApp {
    /// Switch to raw mode and the alternate screen
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            status: StatusPanel::new(),
            progress: ProgressPanel::default(),
            log: LogPanel::default(),
            stop_requested: false,
            restored: false,
        })
    }

    /// Drain pending key presses; `q`, `Esc` or `Ctrl-C` ask the run to stop
    fn poll_keys(&mut self) -> Result<()> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl_c =
                key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) || ctrl_c {
                self.request_stop();
            }
        }
        Ok(())
    }

    fn request_stop(&mut self) {
        if !self.stop_requested {
            self.stop_requested = true;
            self.log.push("Stopping after the current entity...");
        }
    }

    fn redraw(&mut self) {
        let hint = if self.stop_requested {
            " stop requested"
        } else {
            " q: stop after the current entity"
        };
        let (status, progress, log) = (&self.status, &self.progress, &self.log);

        let drawn = self.terminal.draw(|frame| {
            let [top, bar, body, footer] = Layout::vertical([
                Constraint::Length(5),
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .areas(frame.area());

            status.render(frame, top);
            progress.render(frame, bar);
            log.render(frame, body);
            frame.render_widget(Line::from(hint.dark_gray()), footer);
        });

        if let Err(e) = drawn {
            tracing::debug!("Redraw failed: {}", e);
        }
    }

    /// Show the summary, wait for a key, then restore the terminal
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.status.phase = Phase::Complete;
        self.progress.hide();
        self.log.push(summary);
        self.log.push("Press any key to exit");
        self.redraw();

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }

        self.restore()
    }

    /// Leave the alternate screen without waiting
    pub fn restore(mut self) -> Result<()> {
        self.leave()
    }

    fn leave(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        terminal::disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.status.phase = phase;
        self.redraw();
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.status.info = info.into();
        self.redraw();
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.progress.show(Progress::new(current, total, label));
        self.redraw();
    }

    fn clear_progress(&mut self) {
        self.progress.hide();
        self.redraw();
    }

    fn log(&mut self, message: impl Into<String>) {
        self.log.push(message);
        self.redraw();
    }

    fn cancelled(&mut self) -> bool {
        if let Err(e) = self.poll_keys() {
            tracing::debug!("Key polling failed: {}", e);
        }
        self.stop_requested
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        // a panic mid-run must not leave the shell in raw mode
        self.leave().ok();
    }
}
