use crate::protocol::CommandEnvelope;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_SCHEDULED_COMMANDS: usize = 32;
const MAX_READY_PER_STEP: usize = 8;
const DEFAULT_HORIZON_SECONDS: f32 = 3600.0;
// Float slack when a command is tagged for "now".
const PAST_TOLERANCE_SECONDS: f32 = 1e-3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub envelope: CommandEnvelope,
    pub execution_time: f32,
    pub scheduled_at: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub total_scheduled: u32,
    pub total_released: u32,
    pub total_rejected: u32,
    pub total_cleared: u32,
    pub currently_scheduled: u8,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("command {id} at {at}s is in the past (now {now}s)")]
    InPast { id: u32, at: f32, now: f32 },
    #[error("command {id} at {at}s is beyond the {horizon}s horizon")]
    TooFarAhead { id: u32, at: f32, horizon: f32 },
    #[error("scheduler full")]
    Full,
}

/// Time-tagged crew commands, kept in chronological order and released to
/// the command queue when sim time reaches them.
#[derive(Debug)]
pub struct CommandScheduler {
    scheduled_commands: Vec<ScheduledCommand, MAX_SCHEDULED_COMMANDS>,
    stats: SchedulerStats,
    horizon_seconds: f32,
}

impl CommandScheduler {
    pub fn new() -> Self {
        Self {
            scheduled_commands: Vec::new(),
            stats: SchedulerStats::default(),
            horizon_seconds: DEFAULT_HORIZON_SECONDS,
        }
    }

    /// Schedule a command for future execution. Untagged commands run at `now`.
    pub fn schedule_command(&mut self, envelope: CommandEnvelope, now: f32) -> Result<(), ScheduleError> {
        let execution_time = envelope.at_seconds.unwrap_or(now);

        if execution_time < now - PAST_TOLERANCE_SECONDS {
            self.stats.total_rejected += 1;
            return Err(ScheduleError::InPast {
                id: envelope.id,
                at: execution_time,
                now,
            });
        }
        if execution_time > now + self.horizon_seconds {
            self.stats.total_rejected += 1;
            return Err(ScheduleError::TooFarAhead {
                id: envelope.id,
                at: execution_time,
                horizon: self.horizon_seconds,
            });
        }

        let scheduled_command = ScheduledCommand {
            envelope,
            execution_time,
            scheduled_at: now,
        };
        if self.scheduled_commands.push(scheduled_command).is_err() {
            self.stats.total_rejected += 1;
            return Err(ScheduleError::Full);
        }

        // heapless::Vec has no insert; a stable sort keeps equal times in arrival order.
        self.scheduled_commands
            .sort_by(|a, b| a.execution_time.total_cmp(&b.execution_time));

        self.stats.total_scheduled += 1;
        self.stats.currently_scheduled = self.scheduled_commands.len() as u8;
        Ok(())
    }

    /// Removes and returns the commands due at `now`, oldest first.
    pub fn get_ready_commands(&mut self, now: f32) -> Vec<CommandEnvelope, MAX_READY_PER_STEP> {
        let mut ready: Vec<CommandEnvelope, MAX_READY_PER_STEP> = Vec::new();

        while let Some(first) = self.scheduled_commands.first() {
            if first.execution_time > now || ready.is_full() {
                // Sorted, so nothing later is due; a full batch waits for the next step.
                break;
            }
            let scheduled = self.scheduled_commands.remove(0);
            let _ = ready.push(scheduled.envelope);
            self.stats.total_released += 1;
        }

        self.stats.currently_scheduled = self.scheduled_commands.len() as u8;
        ready
    }

    /// Time of the next due command, if any.
    pub fn next_due(&self) -> Option<f32> {
        self.scheduled_commands.first().map(|c| c.execution_time)
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn get_scheduled_commands(&self) -> &[ScheduledCommand] {
        &self.scheduled_commands
    }

    pub fn clear_all_scheduled(&mut self) {
        let cleared_count = self.scheduled_commands.len();
        self.scheduled_commands.clear();
        self.stats.total_cleared += cleared_count as u32;
        self.stats.currently_scheduled = 0;
    }

    pub fn set_horizon_seconds(&mut self, horizon_seconds: f32) {
        self.horizon_seconds = horizon_seconds;
    }
}

impl Default for CommandScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_queue::CrewCommand;

    fn create_test_envelope(id: u32, at_seconds: Option<f32>) -> CommandEnvelope {
        CommandEnvelope {
            id,
            at_seconds,
            command: CrewCommand::FeatherEngine {
                crew_id: "Pilot".to_string(),
                engine_id: "Engine1".to_string(),
            },
        }
    }

    #[test]
    fn test_immediate_command_scheduling() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(create_test_envelope(1, None), 10.0).unwrap();

        let ready = scheduler.get_ready_commands(10.0);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, 1);
    }

    #[test]
    fn test_future_command_waits() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(create_test_envelope(1, Some(5.0)), 0.0).unwrap();

        assert!(scheduler.get_ready_commands(4.9).is_empty());
        assert_eq!(scheduler.next_due(), Some(5.0));
        let ready = scheduler.get_ready_commands(5.0);
        assert_eq!(ready.len(), 1);
        assert_eq!(scheduler.get_stats().total_released, 1);
    }

    #[test]
    fn test_command_ordering() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(create_test_envelope(3, Some(3.0)), 0.0).unwrap();
        scheduler.schedule_command(create_test_envelope(1, Some(1.0)), 0.0).unwrap();
        scheduler.schedule_command(create_test_envelope(2, Some(2.0)), 0.0).unwrap();

        let ready = scheduler.get_ready_commands(2.5);
        let ids: std::vec::Vec<u32> = ready.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(scheduler.get_ready_commands(3.0)[0].id, 3);
    }

    #[test]
    fn test_past_and_far_commands_rejected() {
        let mut scheduler = CommandScheduler::new();
        scheduler.set_horizon_seconds(60.0);

        assert!(matches!(
            scheduler.schedule_command(create_test_envelope(1, Some(2.0)), 10.0),
            Err(ScheduleError::InPast { id: 1, .. })
        ));
        assert!(matches!(
            scheduler.schedule_command(create_test_envelope(2, Some(100.0)), 10.0),
            Err(ScheduleError::TooFarAhead { id: 2, .. })
        ));
        assert_eq!(scheduler.get_stats().total_rejected, 2);
    }

    #[test]
    fn test_release_batch_is_bounded() {
        let mut scheduler = CommandScheduler::new();
        for id in 0..12 {
            scheduler.schedule_command(create_test_envelope(id, Some(1.0)), 0.0).unwrap();
        }

        assert_eq!(scheduler.get_ready_commands(1.0).len(), MAX_READY_PER_STEP);
        assert_eq!(scheduler.get_ready_commands(1.0).len(), 4);
    }

    #[test]
    fn test_scheduler_full() {
        let mut scheduler = CommandScheduler::new();
        for id in 0..MAX_SCHEDULED_COMMANDS as u32 {
            scheduler.schedule_command(create_test_envelope(id, Some(1.0)), 0.0).unwrap();
        }
        assert_eq!(
            scheduler.schedule_command(create_test_envelope(99, Some(1.0)), 0.0),
            Err(ScheduleError::Full)
        );
    }
}
