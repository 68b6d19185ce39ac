//! Standard-input button source.
//!
//! On a host there is no GPIO pin, so each line read from standard input
//! (the operator pressing Enter) counts as one raw button edge.  Lines are
//! read on a dedicated OS thread named `button-input`; the async runtime is
//! never blocked by the terminal.
//!
//! `stop()` clears a flag that the thread checks after every line.  A thread
//! blocked in `read_line` only notices after the next line or EOF, so it is
//! detached rather than joined.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::application::debouncer::ButtonInputDebouncer;

use super::{ButtonError, ButtonSource};

/// [`ButtonSource`] reading edges from standard input.
#[derive(Debug, Default)]
pub struct StdinButton {
    running: Arc<AtomicBool>,
}

impl StdinButton {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ButtonSource for StdinButton {
    fn start(&self, debouncer: Arc<ButtonInputDebouncer>) -> Result<(), ButtonError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ButtonError::AlreadyStarted);
        }

        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name("button-input".to_string())
            .spawn(move || {
                let edges = pump_lines(io::stdin().lock(), &debouncer, &running);
                info!(edges, "button input closed");
            });

        match spawned {
            Ok(_) => {
                info!("button input ready: press Enter to toggle the LED");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(ButtonError::SpawnFailed(e))
            }
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Feeds one edge per line of `reader` into `debouncer` until EOF, a read
/// error, or `running` is cleared.  Returns the number of edges delivered.
pub fn pump_lines<R: BufRead>(
    mut reader: R,
    debouncer: &ButtonInputDebouncer,
    running: &AtomicBool,
) -> usize {
    let mut line = String::new();
    let mut edges = 0;

    while running.load(Ordering::Acquire) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                edges += 1;
                let outcome = debouncer.on_edge();
                debug!(?outcome, "button edge");
                if outcome.should_yield() {
                    thread::yield_now();
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read button input");
                break;
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notification::NotificationChannel;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn test_each_line_is_one_edge() {
        // Arrange: three presses arriving faster than the debounce window.
        let channel = Arc::new(NotificationChannel::new());
        let debouncer = ButtonInputDebouncer::new(Duration::from_secs(60), Arc::clone(&channel));
        let running = AtomicBool::new(true);

        // Act
        let edges = pump_lines(Cursor::new("\n\n\n"), &debouncer, &running);

        // Assert: only the first survives debouncing.
        assert_eq!(edges, 3);
        assert!(channel.try_take());
        assert!(!channel.try_take());
    }

    #[test]
    fn test_cleared_flag_stops_before_reading() {
        let channel = Arc::new(NotificationChannel::new());
        let debouncer = ButtonInputDebouncer::new(Duration::from_millis(100), Arc::clone(&channel));
        let running = AtomicBool::new(false);

        let edges = pump_lines(Cursor::new("\n"), &debouncer, &running);

        assert_eq!(edges, 0);
        assert!(!channel.is_pending());
    }

    #[test]
    fn test_empty_input_delivers_no_edges() {
        let channel = Arc::new(NotificationChannel::new());
        let debouncer = ButtonInputDebouncer::new(Duration::from_millis(100), channel);
        let running = AtomicBool::new(true);

        assert_eq!(pump_lines(Cursor::new(""), &debouncer, &running), 0);
    }
}
