use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current Unix timestamp, abstracted so tests can pin time
/// instead of racing `SystemTime::now()`.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_a_plausible_timestamp() {
        let now = SystemClock.now_unix();
        assert!(now > 1_700_000_000);
    }
}
