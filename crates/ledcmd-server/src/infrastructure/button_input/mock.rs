//! Mock button source for tests.
//!
//! Delivers edges at caller-chosen timestamps so debounce behaviour is
//! deterministic.

use std::sync::{Arc, Mutex, PoisonError};

use crate::application::debouncer::{ButtonInputDebouncer, EdgeOutcome};

use super::{ButtonError, ButtonSource};

/// A [`ButtonSource`] driven by explicit calls.
#[derive(Default)]
pub struct MockButtonSource {
    debouncer: Mutex<Option<Arc<ButtonInputDebouncer>>>,
}

impl MockButtonSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one edge observed `at_ms` milliseconds after start-up.
    ///
    /// # Errors
    ///
    /// Returns [`ButtonError::NotStarted`] before `start()` or after `stop()`.
    pub fn press_at(&self, at_ms: u64) -> Result<EdgeOutcome, ButtonError> {
        let guard = self.debouncer.lock().unwrap_or_else(PoisonError::into_inner);
        let debouncer = guard.as_ref().ok_or(ButtonError::NotStarted)?;
        Ok(debouncer.on_edge_at(at_ms))
    }
}

impl ButtonSource for MockButtonSource {
    fn start(&self, debouncer: Arc<ButtonInputDebouncer>) -> Result<(), ButtonError> {
        let mut guard = self.debouncer.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(ButtonError::AlreadyStarted);
        }
        *guard = Some(debouncer);
        Ok(())
    }

    fn stop(&self) {
        *self.debouncer.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notification::NotificationChannel;
    use std::time::Duration;

    fn debouncer() -> (Arc<ButtonInputDebouncer>, Arc<NotificationChannel>) {
        let channel = Arc::new(NotificationChannel::new());
        let debouncer = Arc::new(ButtonInputDebouncer::new(
            Duration::from_millis(100),
            Arc::clone(&channel),
        ));
        (debouncer, channel)
    }

    #[test]
    fn test_press_before_start_is_rejected() {
        let source = MockButtonSource::new();
        assert!(matches!(source.press_at(0), Err(ButtonError::NotStarted)));
    }

    #[test]
    fn test_press_after_start_reaches_debouncer() {
        // Arrange
        let (debouncer, channel) = debouncer();
        let source = MockButtonSource::new();
        source.start(debouncer).unwrap();

        // Act
        let outcome = source.press_at(0).unwrap();

        // Assert
        assert_eq!(outcome, EdgeOutcome::Triggered);
        assert!(channel.is_pending());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (debouncer, _) = debouncer();
        let source = MockButtonSource::new();
        source.start(Arc::clone(&debouncer)).unwrap();

        assert!(matches!(source.start(debouncer), Err(ButtonError::AlreadyStarted)));
    }

    #[test]
    fn test_stop_detaches_debouncer() {
        let (debouncer, _) = debouncer();
        let source = MockButtonSource::new();
        source.start(debouncer).unwrap();

        source.stop();

        assert!(matches!(source.press_at(500), Err(ButtonError::NotStarted)));
    }
}
