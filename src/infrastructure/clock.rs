use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_now_provider() -> NowProvider {
    Arc::new(Utc::now)
}

pub fn fixed_now_provider(instant: DateTime<Utc>) -> NowProvider {
    Arc::new(move || instant)
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.set(self.now() + by);
    }

    pub fn provider(&self) -> NowProvider {
        let clock = self.clone();
        Arc::new(move || clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn manual_clock_provider_tracks_updates() {
        let clock = ManualClock::new(fixed_time("2026-02-16T09:00:00Z"));
        let now = clock.provider();
        assert_eq!(now(), fixed_time("2026-02-16T09:00:00Z"));

        clock.advance(Duration::minutes(26));
        assert_eq!(now(), fixed_time("2026-02-16T09:26:00Z"));
    }

    #[test]
    fn fixed_provider_never_moves() {
        let now = fixed_now_provider(fixed_time("2026-02-16T09:00:00Z"));
        assert_eq!(now(), now());
    }
}
