//! Terminal setup for the live view.

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;

/// RAII guard for the live view: raw mode, alternate screen, hidden cursor.
/// Everything is restored on drop.
pub struct LiveViewGuard {
    _private: (),
}

impl LiveViewGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(e).context("failed to enter alternate screen");
        }
        Ok(Self { _private: () })
    }
}

impl Drop for LiveViewGuard {
    fn drop(&mut self) {
        // Best effort; nothing useful to do with a failure here
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        let _ = terminal::disable_raw_mode();
    }
}
