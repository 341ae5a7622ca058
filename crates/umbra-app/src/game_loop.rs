//! Fixed-timestep frame loop.
//!
//! Camera movement runs at a fixed 60 Hz through an accumulator, rendering
//! runs once per redraw. Long frames are clamped so a stall never triggers a
//! burst of catch-up steps.

use std::time::Instant;
use tracing::warn;

/// Fixed simulation timestep: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Longest frame time fed into the accumulator.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    /// Measured frame time in seconds, before clamping.
    pub frame_time: f64,
    /// Fixed updates run this frame.
    pub updates: u32,
    /// Fraction of a step left in the accumulator, in `[0, 1)`.
    pub alpha: f64,
}

#[derive(Debug)]
pub struct GameLoop {
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl GameLoop {
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Measures the time since the previous call and runs
    /// `update(FIXED_DT)` as many times as it covers.
    pub fn tick(&mut self, update: impl FnMut(f64)) -> FrameTiming {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.step(frame_time, update)
    }

    /// [`tick`](Self::tick) with an explicit frame time.
    pub fn step(&mut self, frame_time: f64, mut update: impl FnMut(f64)) -> FrameTiming {
        let clamped = if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            MAX_FRAME_TIME
        } else {
            frame_time.max(0.0)
        };
        self.accumulator += clamped;

        let mut updates = 0;
        while self.accumulator >= FIXED_DT {
            update(FIXED_DT);
            self.total_sim_time += FIXED_DT;
            self.accumulator -= FIXED_DT;
            self.update_count += 1;
            updates += 1;
        }
        self.frame_count += 1;

        FrameTiming {
            frame_time,
            updates,
            alpha: self.alpha(),
        }
    }

    pub fn alpha(&self) -> f64 {
        (self.accumulator / FIXED_DT).max(0.0)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step() {
        let mut game_loop = GameLoop::new();
        let mut updates = 0u32;
        let timing = game_loop.step(FIXED_DT, |_| updates += 1);
        assert_eq!(updates, 1);
        assert_eq!(timing.updates, 1);
        assert!(timing.alpha < 1e-9);
    }

    #[test]
    fn test_multiple_steps_advance_sim_time() {
        let mut game_loop = GameLoop::new();
        let timing = game_loop.step(3.0 * FIXED_DT + 1e-9, |dt| assert_eq!(dt, FIXED_DT));
        assert_eq!(timing.updates, 3);
        assert!((game_loop.total_sim_time() - 3.0 * FIXED_DT).abs() < 1e-12);
    }

    #[test]
    fn test_partial_step_carries_over() {
        let mut game_loop = GameLoop::new();
        let first = game_loop.step(0.5 * FIXED_DT, |_| {});
        assert_eq!(first.updates, 0);
        assert!((first.alpha - 0.5).abs() < 1e-10);
        let second = game_loop.step(0.5 * FIXED_DT + 1e-9, |_| {});
        assert_eq!(second.updates, 1);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut game_loop = GameLoop::new();
        let timing = game_loop.step(1.0, |_| {});
        let max_updates = (MAX_FRAME_TIME / FIXED_DT).ceil() as u32;
        assert!(timing.updates > 0 && timing.updates <= max_updates);
        assert_eq!(timing.frame_time, 1.0);
    }

    #[test]
    fn test_negative_frame_time_ignored() {
        let mut game_loop = GameLoop::new();
        let timing = game_loop.step(-0.5, |_| {});
        assert_eq!(timing.updates, 0);
        assert_eq!(game_loop.alpha(), 0.0);
        assert_eq!(game_loop.frame_count(), 1);
    }

    #[test]
    fn test_deterministic_sequence() {
        let frame_times = [0.017, 0.015, 0.020, 0.016, 0.033, 0.008, 0.018];
        let mut a = GameLoop::new();
        let mut b = GameLoop::new();
        for &ft in &frame_times {
            assert_eq!(a.step(ft, |_| {}), b.step(ft, |_| {}));
        }
        assert_eq!(a.update_count(), b.update_count());
    }
}
