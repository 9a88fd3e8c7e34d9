//! Raw-terminal driver: crossterm key events in, JSON results out.
//!
//! A held mapping prefix is flushed once its deadline passes. `<C-c>` or any
//! quitting dispatch (`:q`, `ZZ`, ...) ends the loop.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use core_actions::DispatchResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use serde_json::Value;
use tracing::{debug, info};

use crate::driver::{Driver, error_json, is_quit};

const IDLE_POLL: Duration = Duration::from_millis(250);

struct RawMode;

impl RawMode {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

pub fn run(driver: &mut Driver) -> Result<()> {
    let _raw = RawMode::enter()?;
    let mut out = io::stdout().lock();
    info!(target: "runtime", mode = %driver.mode(), "interactive_start");
    loop {
        let wait = driver
            .deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL);
        if !event::poll(wait)? {
            if driver.deadline().is_some_and(|d| d <= Instant::now()) {
                debug!(target: "runtime", "mapping_timeout");
                match driver.flush_pending() {
                    Ok(result) => emit(&mut out, &result.to_json())?,
                    Err(err) => emit(&mut out, &error_json(&err))?,
                }
            }
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Press
            && key.code == KeyCode::Char('c')
            && key.modifiers.contains(KeyModifiers::CONTROL)
        {
            info!(target: "runtime", "interrupt");
            break;
        }
        let Some(press) = core_input::map_key_event(&key) else {
            continue;
        };
        match driver.feed_key(press.token) {
            Ok(DispatchResult::NeedMore) => {}
            Ok(result) => {
                emit(&mut out, &result.to_json())?;
                if is_quit(&result) {
                    break;
                }
            }
            Err(err) => emit(&mut out, &error_json(&err))?,
        }
    }
    info!(target: "runtime", "interactive_end");
    Ok(())
}

/// Raw mode does not translate `\n`, so lines end in `\r\n`.
fn emit(out: &mut impl Write, value: &Value) -> Result<()> {
    write!(out, "{value}\r\n")?;
    out.flush()?;
    Ok(())
}
