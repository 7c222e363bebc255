use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};
use tracing::{debug, error, warn};

/// Ask a yes/no question on the terminal; anything but `y` answers `default`.
///
/// Without a terminal (raw mode unavailable) the default is returned.
pub fn confirm(question: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", question, hint);
    io::stdout().flush()?;

    let _raw = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            warn!("No interactive terminal ({}), answering {}", e, default);
            println!();
            return Ok(default);
        }
    };

    let answer = loop {
        if let Event::Key(key_event) = event::read()? {
            if key_event.kind != KeyEventKind::Press {
                continue;
            }
            match key_event.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => break true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => break false,
                KeyCode::Enter => break default,
                other => debug!("Ignoring key {:?}", other),
            }
        }
    };

    print!("{}\r\n", if answer { "y" } else { "n" });
    io::stdout().flush()?;
    Ok(answer)
}

/// Leaves raw mode when dropped, including on early returns
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            error!("Failed to disable raw mode: {}", e);
        }
    }
}
