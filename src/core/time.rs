//! Time provider abstraction for testable time-dependent logic

#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Abstraction over system time for testable time-dependent logic
pub trait TimeProvider: Send + Sync {
    /// Get the current monotonic time (for measuring intervals)
    fn now(&self) -> Instant;

    /// Get the current system time (for timestamps)
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the unix epoch (for time-series points)
    fn epoch_millis(&self) -> i64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Production time provider using actual system time
#[derive(Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock time provider for deterministic testing
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
    current_system_time: Arc<Mutex<SystemTime>>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a new mock time provider starting at the current time
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
            current_system_time: Arc::new(Mutex::new(SystemTime::now())),
        }
    }

    /// Advance both monotonic and system time by the given duration
    pub fn advance_time(&self, duration: Duration) {
        *self.current_instant.lock().unwrap() += duration;
        *self.current_system_time.lock().unwrap() += duration;
    }

    /// Set the current system time (for timestamps)
    pub fn set_system_time(&self, system_time: SystemTime) {
        *self.current_system_time.lock().unwrap() = system_time;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }

    fn system_time(&self) -> SystemTime {
        *self.current_system_time.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;

        let instant1 = provider.now();
        std::thread::sleep(Duration::from_millis(1));
        let instant2 = provider.now();

        assert!(instant2 > instant1);
        assert!(provider.epoch_millis() > 0);
    }

    #[test]
    fn test_mock_time_provider_advance() {
        let provider = MockTimeProvider::new();

        let initial_instant = provider.now();
        let initial_system = provider.system_time();

        provider.advance_time(Duration::from_secs(10));

        assert_eq!(
            provider.now().duration_since(initial_instant),
            Duration::from_secs(10)
        );
        assert_eq!(
            provider.system_time().duration_since(initial_system).unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_mock_epoch_millis_follows_set_time() {
        let provider = MockTimeProvider::new();
        provider.set_system_time(UNIX_EPOCH + Duration::from_millis(1234));
        assert_eq!(provider.epoch_millis(), 1234);
    }
}
