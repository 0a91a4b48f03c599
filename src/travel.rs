//! Travel progress along the current mission leg.

use crate::config::PhaseWeights;
use serde::{Deserialize, Serialize};

/// Source of leg progress, polled once per step.
pub trait TravelFeed: Send + std::fmt::Debug {
    /// Fraction of the current leg flown, in [0, 1].
    fn leg_progress(&self) -> f32;
    fn advance(&mut self, dt: f32);
    fn is_complete(&self) -> bool {
        self.leg_progress() >= 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegConfig {
    pub start_danger: f32,
    pub end_danger: f32,
    pub phase_weights: Option<PhaseWeights>,
    pub duration_seconds: f32,
}

impl Default for LegConfig {
    fn default() -> Self {
        Self {
            start_danger: 0.2,
            end_danger: 0.8,
            phase_weights: None,
            duration_seconds: 600.0,
        }
    }
}

/// Leg flown at constant speed over a fixed duration.
#[derive(Debug, Clone)]
pub struct TimedLeg {
    duration_seconds: f32,
    elapsed: f32,
}

impl TimedLeg {
    pub fn new(duration_seconds: f32) -> Self {
        Self {
            duration_seconds,
            elapsed: 0.0,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration_seconds
    }
}

impl TravelFeed for TimedLeg {
    fn leg_progress(&self) -> f32 {
        if self.duration_seconds <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration_seconds).clamp(0.0, 1.0)
    }

    fn advance(&mut self, dt: f32) {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration_seconds.max(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamps() {
        let mut leg = TimedLeg::new(10.0);
        assert_eq!(leg.leg_progress(), 0.0);
        leg.advance(2.5);
        assert!((leg.leg_progress() - 0.25).abs() < 1e-6);
        leg.advance(100.0);
        assert_eq!(leg.leg_progress(), 1.0);
        assert!(leg.is_complete());
    }

    #[test]
    fn test_zero_length_leg_is_complete() {
        let leg = TimedLeg::new(0.0);
        assert!(leg.is_complete());
    }
}
