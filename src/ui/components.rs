//! Panels for the terminal interface

use ratatui::layout::Rect;
use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use std::collections::VecDeque;
use std::time::Instant;

use super::{Phase, Progress};

/// Prefix the pipeline puts on failure messages
pub const FAILURE_MARK: &str = "✗";

const LOG_CAPACITY: usize = 500;

fn frame_block(title: &str) -> Block<'_> {
    Block::bordered().title(title).border_style(Style::new().blue())
}

/// Current phase, detail line and elapsed time
pub struct StatusPanel {
    pub phase: Phase,
    pub info: String,
    started: Instant,
}

impl StatusPanel {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            info: String::new(),
            started: Instant::now(),
        }
    }

    fn glyph(&self) -> &'static str {
        match self.phase {
            Phase::Connecting => "◐",
            Phase::Provisioning => "▦",
            Phase::Verifying => "?",
            Phase::Loading => "⇣",
            Phase::Aggregating => "Σ",
            Phase::Exporting => "⇡",
            Phase::Complete => "✓",
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let heading = if self.phase == Phase::Complete {
            Style::new().green().bold()
        } else {
            Style::new().cyan().bold()
        };
        let secs = self.started.elapsed().as_secs();

        let text = vec![
            Line::from(vec![
                Span::styled(format!(" {} {}", self.glyph(), self.phase), heading),
                Span::raw(format!("  {:02}:{:02}", secs / 60, secs % 60)).dark_gray(),
            ]),
            Line::default(),
            Line::from(Span::raw(format!("   {}", self.info)).gray()),
        ];

        frame.render_widget(Paragraph::new(text).block(frame_block(" Retail DWH ")), area);
    }
}

/// Step gauge for the entity being loaded
#[derive(Default)]
pub struct ProgressPanel {
    current: Option<Progress>,
}

impl ProgressPanel {
    pub fn show(&mut self, progress: Progress) {
        self.current = Some(progress);
    }

    pub fn hide(&mut self) {
        self.current = None;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let sides = Block::new()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::new().blue());

        match &self.current {
            None => frame.render_widget(sides, area),
            Some(p) => {
                let label = match p.total {
                    0 => p.label.clone(),
                    total => format!("{} ({}/{})", p.label, p.current, total),
                };
                let gauge = Gauge::default()
                    .block(sides)
                    .gauge_style(Style::new().cyan().on_dark_gray())
                    .ratio(p.ratio().clamp(0.0, 1.0))
                    .label(label);
                frame.render_widget(gauge, area);
            }
        }
    }
}

/// Bounded activity log; failures are highlighted
#[derive(Default)]
pub struct LogPanel {
    lines: VecDeque<String>,
}

impl LogPanel {
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let rows = area.height.saturating_sub(2) as usize;
        let newest = self.lines.len().saturating_sub(1);

        let items: Vec<ListItem> = self
            .lines
            .iter()
            .enumerate()
            .skip(self.lines.len().saturating_sub(rows))
            .map(|(i, line)| {
                let text = Span::raw(format!(" {}", line));
                let span = if line.starts_with(FAILURE_MARK) {
                    text.red()
                } else if i == newest {
                    text.white()
                } else {
                    text.dark_gray()
                };
                ListItem::new(span)
            })
            .collect();

        frame.render_widget(List::new(items).block(frame_block(" Activity ")), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_panel_is_bounded() {
        let mut log = LogPanel::default();
        for i in 0..LOG_CAPACITY + 10 {
            log.push(format!("line {}", i));
        }
        assert_eq!(log.lines.len(), LOG_CAPACITY);
        assert_eq!(log.lines.front().map(String::as_str), Some("line 10"));
    }
}
