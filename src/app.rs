//! Monitor loop: terminal lifecycle, tick cadence, failure absorption.
//!
//! One strictly sequential loop: sample, render, write, sleep. Sampling
//! failures after the first tick never kill the loop; the previous frame
//! (or a placeholder) is redisplayed and a failure counter advances.

use std::io::{stdout, Write};
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};

use crate::error::{MonitorError, Result};
use crate::render::{self, Frame, FrameContext};
use crate::sampler::Sampler;

/// Scoped ownership of the terminal display region.
///
/// Raw mode, alternate screen, and hidden cursor are acquired together and
/// restored in `Drop`, so every exit path releases the terminal: normal
/// stop, interrupt, fatal error, or unwind.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn acquire() -> Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// The sample-render-write loop and its failure policy.
pub struct Monitor {
    sampler: Sampler,
    interval: Duration,
    ticks: u64,
    failures: u64,
    last_frame: Option<Frame>,
}

impl Monitor {
    pub fn new(sampler: Sampler, interval: Duration) -> Self {
        Self { sampler, interval, ticks: 0, failures: 0, last_frame: None }
    }

    /// Count of absorbed sampling failures.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Runs until interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::QueryUnavailable`] when the query command is
    /// absent on the very first tick (nothing to monitor), or a terminal
    /// error if the display itself breaks. Interruption is the normal exit
    /// and returns `Ok`.
    pub fn run(&mut self) -> Result<()> {
        let _guard = TerminalGuard::acquire()?;
        loop {
            let tick_start = Instant::now();
            self.tick()?;
            let remaining = self.interval.saturating_sub(tick_start.elapsed());
            if wait_for_interrupt(remaining)? {
                log::info!(
                    "interrupted after {} ticks ({} sampling failures)",
                    self.ticks,
                    self.failures
                );
                return Ok(());
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        let width = terminal::size().map(|(w, _)| w).unwrap_or(render::MIN_WIDTH);
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let ctx = FrameContext { timestamp: &timestamp, refresh: self.interval };

        match self.sampler.sample() {
            Ok(devices) => {
                let frame = render::render(&devices, width, &ctx);
                draw(&frame)?;
                self.last_frame = Some(frame);
            }
            Err(e) if is_fatal(self.ticks, &e) => return Err(e),
            Err(e) => {
                self.failures += 1;
                log::warn!("tick {}: sample failed ({} total): {e}", self.ticks, self.failures);
                match &self.last_frame {
                    Some(frame) => draw(frame)?,
                    None => draw(&render::render_unavailable(width, &ctx))?,
                }
            }
        }
        Ok(())
    }
}

/// A query facility that is absent on the very first tick was never there
/// to begin with: a configuration problem, not a transient one. Any later
/// failure is absorbed.
fn is_fatal(ticks: u64, err: &MonitorError) -> bool {
    ticks == 1 && matches!(err, MonitorError::QueryUnavailable(_))
}

/// Writes a frame with a full repaint. No diffing.
fn draw(frame: &Frame) -> Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    for (row, line) in frame.lines.iter().enumerate() {
        queue!(out, cursor::MoveTo(0, row as u16))?;
        for span in &line.spans {
            if span.bold {
                queue!(out, SetAttribute(Attribute::Bold))?;
            }
            queue!(out, SetForegroundColor(span.color), Print(&span.text))?;
            if span.bold {
                queue!(out, SetAttribute(Attribute::Reset))?;
            }
        }
        queue!(out, ResetColor)?;
    }
    out.flush()?;
    Ok(())
}

/// Sleeps out the remainder of a tick while watching for an interrupt.
/// Returns true when the user asked to stop (Ctrl+C, q, or Esc).
fn wait_for_interrupt(budget: Duration) -> Result<bool> {
    let deadline = Instant::now() + budget;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if !event::poll(left)? {
            return Ok(false);
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let stop = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                || (key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL));
            if stop {
                return Ok(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_starts_with_clean_counters() {
        let monitor = Monitor::new(Sampler::new("nvidia-smi"), Duration::from_secs(2));
        assert_eq!(monitor.failures(), 0);
        assert_eq!(monitor.ticks, 0);
        assert!(monitor.last_frame.is_none());
    }

    #[test]
    fn test_first_tick_query_absence_is_fatal() {
        let err = MonitorError::QueryUnavailable("nvidia-smi: not found".to_string());
        assert!(is_fatal(1, &err));
    }

    #[test]
    fn test_later_query_absence_is_transient() {
        let err = MonitorError::QueryUnavailable("nvidia-smi: not found".to_string());
        assert!(!is_fatal(2, &err));
        assert!(!is_fatal(6, &err));
    }

    #[test]
    fn test_parse_errors_are_never_fatal() {
        let err = MonitorError::Parse("garbage".to_string());
        assert!(!is_fatal(1, &err));
        assert!(!is_fatal(100, &err));
    }
}
