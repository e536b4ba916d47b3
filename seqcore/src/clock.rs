//! Clock & tick source: converts wall-clock to a monotonic tick counter at
//! [`crate::config::PPQN`] resolution and hands each engine a `(tick, dt)`
//! pair per frame.

use embassy_time::Duration;

/// Absolute tick counter. Wraps at `u32::MAX`; a wrap during a real playback
/// run (roughly 1.5 years at 192 PPQN and 300 BPM) is out of scope.
pub type Tick = u32;

/// Bitset returned by [`crate::engine::TrackEngine::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickResult {
    pub gate_update: bool,
    pub cv_update: bool,
}

impl TickResult {
    pub const NONE: TickResult = TickResult { gate_update: false, cv_update: false };

    pub fn merge(self, other: TickResult) -> TickResult {
        TickResult {
            gate_update: self.gate_update || other.gate_update,
            cv_update: self.cv_update || other.cv_update,
        }
    }
}

/// Duration of a single PPQN tick at `bpm` quarter notes per minute.
pub const fn tick_duration(bpm: f32, ppqn: u32) -> Duration {
    Duration::from_nanos((1_000_000_000.0 / (bpm as f64 / 60.0 * ppqn as f64)) as u64)
}

/// Monotonic tick source. Advances one tick at a time; the frame callback is
/// driven separately at a fixed ~60 Hz and is not modelled here (it is
/// whatever rate the host calls [`crate::engine::TrackEngine::update`] at).
#[derive(Clone, Copy, Debug, Default)]
pub struct ClockSource {
    tick: Tick,
    bar_tick_count: u32,
}

impl ClockSource {
    pub fn new() -> Self {
        Self { tick: 0, bar_tick_count: 0 }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Advances the tick counter by one and returns the new absolute tick.
    pub fn advance(&mut self) -> Tick {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    pub fn reset(&mut self) {
        self.tick = 0;
        self.bar_tick_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotone() {
        let mut clock = ClockSource::new();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = ClockSource::new();
        clock.advance();
        clock.advance();
        clock.reset();
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn tick_result_merge_is_union() {
        let a = TickResult { gate_update: true, cv_update: false };
        let b = TickResult { gate_update: false, cv_update: true };
        let merged = a.merge(b);
        assert!(merged.gate_update && merged.cv_update);
    }
}
