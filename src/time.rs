/// Point in time in milliseconds since an arbitrary start, wrapping at `u32::MAX`
pub type Instant = fugit::TimerInstantU32<1000>;
/// Span of time in milliseconds
pub type Duration = fugit::MillisDurationU32;

const MAX_TIMEOUT: u32 = 0x7FFF_FFFF;

/// Returns true if `time` lies before `compare_to`
///
/// Both instants must be less than half the counter range apart,
/// then the comparison stays correct when the millisecond counter wraps.
pub fn time_less_than(time: Instant, compare_to: Instant) -> bool {
    time.ticks().wrapping_sub(compare_to.ticks()) > MAX_TIMEOUT
}

/// Returns the instant `delay` after `start`, wrapping around the counter
pub fn deadline(start: Instant, delay: Duration) -> Instant {
    Instant::from_ticks(start.ticks().wrapping_add(delay.ticks()))
}

/// Source of the current time for the stack
pub trait TimerDriver {
    /// Get current time
    fn now(&self) -> Instant;
}

/// Timer driver for hosted targets
#[cfg(feature = "std")]
pub mod std {
    extern crate std;
    use super::{Instant, TimerDriver};

    /// Timer driver based on [std::time::Instant], starting at zero on creation
    #[derive(Clone, Copy)]
    pub struct StdTimerDriver(std::time::Instant);

    impl StdTimerDriver {
        /// Starts the clock
        pub fn new() -> Self {
            Self(std::time::Instant::now())
        }
    }

    impl Default for StdTimerDriver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TimerDriver for StdTimerDriver {
        fn now(&self) -> Instant {
            let duration = self.0.elapsed();
            Instant::from_ticks(duration.as_millis() as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::testtime::TestTimer;

    #[test]
    fn timer_set_time() {
        let mut timer = TestTimer::new();
        assert_eq!(timer.now(), Instant::from_ticks(0));
        timer.set_time(100);
        assert_eq!(timer.now(), Instant::from_ticks(100));
    }

    #[test]
    fn less_than() {
        assert!(time_less_than(Instant::from_ticks(5), Instant::from_ticks(10)));
        assert!(!time_less_than(Instant::from_ticks(10), Instant::from_ticks(5)));
        assert!(!time_less_than(Instant::from_ticks(10), Instant::from_ticks(10)));
    }

    #[test]
    fn less_than_wraps() {
        let before_wrap = Instant::from_ticks(u32::MAX - 2);
        let after_wrap = Instant::from_ticks(3);
        assert!(time_less_than(before_wrap, after_wrap));
        assert!(!time_less_than(after_wrap, before_wrap));
    }

    #[test]
    fn deadline_wraps() {
        let start = Instant::from_ticks(u32::MAX - 1);
        assert_eq!(
            deadline(start, Duration::from_ticks(5)),
            Instant::from_ticks(3)
        );
    }
}
