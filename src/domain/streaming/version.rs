//! Version stamps for timeline `updated` frames.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::foundation::Timestamp;

/// Strictly increasing clock seeded from wall-clock nanoseconds.
///
/// Each tick returns `max(now_ns, last + 1)`, so two updates produced within
/// the same nanosecond (or after a clock step backwards) still order.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicI64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        self.next_at(Timestamp::now().unix_nanos())
    }

    fn next_at(&self, now_ns: i64) -> i64 {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ns.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_strictly_increasing() {
        let clock = VersionClock::new();
        let mut last = 0;
        for _ in 0..1000 {
            let v = clock.next();
            assert!(v > last);
            last = v;
        }
    }

    #[test]
    fn backwards_clock_still_advances() {
        let clock = VersionClock::new();
        assert_eq!(clock.next_at(100), 100);
        assert_eq!(clock.next_at(50), 101);
        assert_eq!(clock.next_at(101), 102);
        assert_eq!(clock.next_at(500), 500);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_wall_clock_sequence_yields_increasing_stamps(
                readings in proptest::collection::vec(0i64..1_000_000, 1..64)
            ) {
                let clock = VersionClock::new();
                let mut last = i64::MIN;
                for now in readings {
                    let v = clock.next_at(now);
                    prop_assert!(v > last);
                    prop_assert!(v >= now);
                    last = v;
                }
            }
        }
    }
}
