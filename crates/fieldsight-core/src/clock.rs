//! Frame-rate capping and per-second render statistics
//!
//! The render loop runs off an accumulator clock: elapsed wall time is
//! banked each tick, and a frame is emitted only once a full target
//! interval has accumulated. After a frame the accumulator keeps its
//! remainder instead of resetting to zero, so sub-interval timing error
//! does not drift the effective rate downward. The carried remainder is
//! capped at one interval, which bounds catch-up after a stall to a
//! couple of back-to-back frames instead of a burst.

use std::time::Duration;

/// Accumulator clock gating frame presentation at a target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    interval: Duration,
    accumulator: Duration,
}

impl FrameClock {
    /// Build a clock targeting `fps` frames per second. A zero rate is
    /// clamped to one.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Self::interval_for(fps),
            accumulator: Duration::ZERO,
        }
    }

    fn interval_for(fps: u32) -> Duration {
        Duration::from_secs(1) / fps.max(1)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the target rate. The banked remainder is kept but re-capped
    /// against the new interval.
    pub fn set_target_fps(&mut self, fps: u32) {
        self.interval = Self::interval_for(fps);
        self.accumulator = self.accumulator.min(self.interval);
    }

    /// Bank `elapsed` and report whether a frame is due. When a frame is
    /// due, one interval is consumed and the remainder (capped at one
    /// interval) stays banked.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.accumulator += elapsed;
        if self.accumulator < self.interval {
            return false;
        }
        self.accumulator -= self.interval;
        self.accumulator = self.accumulator.min(self.interval);
        true
    }
}

/// One completed statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSample {
    /// Frames presented during the window.
    pub fps: u32,
    /// Scene vertex count as of the last frame in the window.
    pub vertices: u64,
}

/// Rolling once-per-second frame and vertex counters.
///
/// Timestamps are durations since an arbitrary epoch supplied by the
/// caller, which keeps the accounting clock-free and testable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    window_start: Duration,
    frames: u32,
    vertices: u64,
    last: Option<StatsSample>,
}

impl RenderStats {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self::default()
    }

    /// Count a presented frame. Returns a sample when a full window has
    /// elapsed since the last one.
    pub fn record_frame(&mut self, now: Duration, vertices: u64) -> Option<StatsSample> {
        self.frames += 1;
        self.vertices = vertices;
        if now.checked_sub(self.window_start).unwrap_or_default() < Self::WINDOW {
            return None;
        }
        let sample = StatsSample {
            fps: self.frames,
            vertices: self.vertices,
        };
        self.window_start = now;
        self.frames = 0;
        self.last = Some(sample);
        Some(sample)
    }

    /// Most recently completed window, if any.
    pub fn last(&self) -> Option<StatsSample> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_no_frame_before_interval() {
        let mut clock = FrameClock::new(10);
        assert!(!clock.advance(ms(40)));
        assert!(!clock.advance(ms(40)));
        assert!(clock.advance(ms(40)));
    }

    #[test]
    fn test_remainder_carries_between_frames() {
        let mut clock = FrameClock::new(10);
        // 150ms against a 100ms interval: frame now, 50ms banked.
        assert!(clock.advance(ms(150)));
        assert!(clock.advance(ms(50)));
        assert!(!clock.advance(ms(50)));
    }

    #[test]
    fn test_stall_catchup_is_bounded() {
        let mut clock = FrameClock::new(10);
        // A long stall yields one immediate frame plus at most one banked
        // interval, never a burst proportional to the stall.
        assert!(clock.advance(ms(1000)));
        assert!(clock.advance(Duration::ZERO));
        assert!(!clock.advance(Duration::ZERO));
    }

    #[test]
    fn test_zero_fps_clamped() {
        let clock = FrameClock::new(0);
        assert_eq!(clock.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rate_change_recaps_bank() {
        let mut clock = FrameClock::new(10);
        assert!(clock.advance(ms(1000)));
        clock.set_target_fps(100);
        // Banked remainder shrinks to the new 10ms interval.
        assert!(clock.advance(Duration::ZERO));
        assert!(!clock.advance(Duration::ZERO));
    }

    #[test]
    fn test_stats_sample_once_per_second() {
        let mut stats = RenderStats::new();
        for i in 1..=9 {
            assert_eq!(stats.record_frame(ms(i * 100), 1200), None);
        }
        let sample = stats.record_frame(ms(1000), 1234).unwrap();
        assert_eq!(sample.fps, 10);
        assert_eq!(sample.vertices, 1234);
        assert_eq!(stats.last(), Some(sample));
        // Counter resets for the next window.
        assert_eq!(stats.record_frame(ms(1100), 1234), None);
    }
}
