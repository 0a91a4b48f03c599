use crate::command_queue::{CommandQueue, QueueStats};
use crate::crew::{ActionPhase, ActionType, Consumables, CrewMember, CrewState, HealthStatus, VisualState};
use crate::hazard::{HazardPhase, HazardScheduler, HazardStats};
use crate::scheduler::{CommandScheduler, SchedulerStats};
use crate::vehicle::{Section, VehicleState, VehicleSystem};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSnapshot {
    pub id: String,
    pub status: HealthStatus,
    pub station_id: String,
    pub action: Option<ActionType>,
    pub action_target: Option<String>,
    pub action_phase: Option<ActionPhase>,
    pub position: Vec2,
    pub visual_state: VisualState,
    pub injury_timer: f32,
}

impl From<&CrewMember> for CrewSnapshot {
    fn from(member: &CrewMember) -> Self {
        let action = member.current_action();
        Self {
            id: member.id().to_string(),
            status: member.status(),
            station_id: member.current_station_id().to_string(),
            action: action.map(|a| a.action_type),
            action_target: action.map(|a| a.target_id.clone()),
            action_phase: action.map(|a| a.phase()),
            position: member.current_position(),
            visual_state: member.visual_state(),
            injury_timer: member.injury_timer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub sequence_number: u32,
    pub step: u64,
    pub time: f32,
    pub leg_progress: f32,
    pub danger: f32,
    pub phase: HazardPhase,
    pub phase_remaining: f32,
    pub fuel_remaining: f32,
    pub altitude: f32,
    pub crashed: bool,
    pub sections: Vec<Section>,
    pub systems: Vec<VehicleSystem>,
    pub crew: Vec<CrewSnapshot>,
    pub consumables: Consumables,
    pub hazard_stats: HazardStats,
    pub queue_stats: QueueStats,
    pub scheduler_stats: SchedulerStats,
}

/// Borrowed view of everything a snapshot reads.
pub struct SnapshotSources<'a> {
    pub step: u64,
    pub time: f32,
    pub leg_progress: f32,
    pub vehicle: &'a VehicleState,
    pub crew: &'a CrewState,
    pub hazard: &'a HazardScheduler,
    pub queue: &'a CommandQueue,
    pub scheduler: &'a CommandScheduler,
}

impl SimSnapshot {
    pub fn capture(sequence_number: u32, sources: &SnapshotSources<'_>) -> Self {
        let phase = sources.hazard.phase_state();
        Self {
            sequence_number,
            step: sources.step,
            time: sources.time,
            leg_progress: sources.leg_progress,
            danger: sources.hazard.danger(),
            phase: phase.current_phase,
            phase_remaining: (phase.phase_duration - phase.phase_timer).max(0.0),
            fuel_remaining: sources.vehicle.fuel_remaining(),
            altitude: sources.vehicle.altitude(),
            crashed: sources.vehicle.is_crashed(),
            sections: sources.vehicle.sections().to_vec(),
            systems: sources.vehicle.systems().to_vec(),
            crew: sources.crew.members().iter().map(CrewSnapshot::from).collect(),
            consumables: *sources.crew.consumables(),
            hazard_stats: sources.hazard.get_stats().clone(),
            queue_stats: *sources.queue.get_stats(),
            scheduler_stats: sources.scheduler.get_stats().clone(),
        }
    }

    /// One-line digest for log output.
    pub fn summary_line(&self) -> String {
        let burning = self.sections.iter().filter(|s| s.is_on_fire()).count()
            + self.systems.iter().filter(|s| s.is_on_fire()).count();
        let busy = self.crew.iter().filter(|c| c.action.is_some()).count();
        let fit = self
            .crew
            .iter()
            .filter(|c| c.status == HealthStatus::Healthy)
            .count();

        let mut line = String::new();
        let _ = write!(
            line,
            "t={:.1}s progress={:.0}% danger={:.2} phase={:?} fuel={:.0} alt={:.0} fires={} crew={}/{} busy={}",
            self.time,
            self.leg_progress * 100.0,
            self.danger,
            self.phase,
            self.fuel_remaining,
            self.altitude,
            burning,
            fit,
            self.crew.len(),
            busy,
        );
        if self.crashed {
            line.push_str(" CRASHED");
        }
        line
    }
}

/// Emits a snapshot every `interval_seconds` of sim time.
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    interval_seconds: f32,
    since_last: f32,
    sequence_number: u32,
    last: Option<SimSnapshot>,
}

impl TelemetryCollector {
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            interval_seconds,
            since_last: 0.0,
            sequence_number: 0,
            last: None,
        }
    }

    pub fn interval_seconds(&self) -> f32 {
        self.interval_seconds
    }

    pub fn set_interval(&mut self, interval_seconds: f32) {
        self.interval_seconds = interval_seconds;
        self.since_last = 0.0;
    }

    /// Advances the collector clock; true when a sample is due.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.interval_seconds <= 0.0 {
            return false;
        }
        self.since_last += dt;
        if self.since_last + f32::EPSILON >= self.interval_seconds {
            self.since_last -= self.interval_seconds;
            // A long dt never owes more than one sample.
            self.since_last = self.since_last.min(self.interval_seconds);
            return true;
        }
        false
    }

    pub fn sample(&mut self, sources: &SnapshotSources<'_>) -> SimSnapshot {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let snapshot = SimSnapshot::capture(self.sequence_number, sources);
        self.last = Some(snapshot.clone());
        snapshot
    }

    pub fn last_snapshot(&self) -> Option<&SimSnapshot> {
        self.last.as_ref()
    }

    pub fn samples_taken(&self) -> u32 {
        self.sequence_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_cadence() {
        let mut collector = TelemetryCollector::new(1.0);
        let due: Vec<bool> = (0..25).map(|_| collector.advance(0.1)).collect();
        assert_eq!(due.iter().filter(|d| **d).count(), 2);
        assert!(due[9]);
        assert!(due[19]);
    }

    #[test]
    fn test_disabled_collector_never_fires() {
        let mut collector = TelemetryCollector::new(0.0);
        assert!(!(0..100).any(|_| collector.advance(1.0)));
    }

    #[test]
    fn test_long_step_owes_one_sample() {
        let mut collector = TelemetryCollector::new(1.0);
        assert!(collector.advance(10.0));
        assert!(collector.advance(0.0));
        assert!(!collector.advance(0.0));
    }
}
