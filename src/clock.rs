use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond clock shared by the services.
///
/// The system variant reads wall time; the manual variant is settable and
/// exists so tests can cross block-window and shard boundaries on demand.
#[derive(Clone)]
pub enum Clock {
    System,
    Manual(Arc<AtomicI64>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn manual(start_ms: i64) -> Self {
        Clock::Manual(Arc::new(AtomicI64::new(start_ms)))
    }

    pub fn now_ms(&self) -> i64 {
        match self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
            Clock::Manual(ms) => ms.load(Ordering::SeqCst),
        }
    }

    pub fn set_ms(&self, now_ms: i64) {
        if let Clock::Manual(ms) = self {
            ms.store(now_ms, Ordering::SeqCst);
        }
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        if let Clock::Manual(ms) = self {
            ms.fetch_add(delta_ms, Ordering::SeqCst);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = Clock::manual(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance_ms(360_000);
        assert_eq!(clock.now_ms(), 361_000);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = Clock::system();
        assert!(clock.now_ms() > 1_600_000_000_000);
    }
}
