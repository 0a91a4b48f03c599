use crate::command_queue::{CommandEvent, CrewCommand};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_COMMAND_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 512;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;

/// A crew command as it travels over the wire or sits in a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: u32,
    /// Sim time to run at. None = as soon as possible.
    #[serde(default)]
    pub at_seconds: Option<f32>,
    pub command: CrewCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Accepted,
    Rejected,
    Scheduled,
}

/// ACK/NACK for one envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub id: u32,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("message of {len} bytes exceeds {max}")]
    MessageTooLarge { len: usize, max: usize },
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("serialization failed")]
    SerializationError,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug)]
pub struct ProtocolHandler {
    command_buffer: CommandBuffer,
    response_buffer: ResponseBuffer,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            command_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
        }
    }

    /// Parses and validates one JSON envelope.
    pub fn parse_command(&mut self, json_str: &str) -> Result<CommandEnvelope, ProtocolError> {
        self.command_buffer.clear();
        self.command_buffer
            .try_push_str(json_str.trim())
            .map_err(|_| ProtocolError::MessageTooLarge {
                len: json_str.len(),
                max: MAX_COMMAND_SIZE,
            })?;

        let envelope = serde_json::from_str::<CommandEnvelope>(&self.command_buffer)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        self.validate_command(&envelope)?;
        Ok(envelope)
    }

    /// Parses a JSON-lines script. Blank lines and `#` comments are skipped.
    pub fn parse_script(&mut self, text: &str) -> Result<Vec<CommandEnvelope>, (usize, ProtocolError)> {
        let mut envelopes = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let envelope = self.parse_command(line).map_err(|e| (index + 1, e))?;
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    pub fn validate_command(&self, envelope: &CommandEnvelope) -> Result<(), ProtocolError> {
        if envelope.id == 0 {
            return Err(ProtocolError::InvalidCommand("id must be non-zero".into()));
        }
        if let Some(at) = envelope.at_seconds {
            if !at.is_finite() || at < 0.0 {
                return Err(ProtocolError::InvalidParameter(format!("at_seconds {at}")));
            }
        }

        let (ids, duration, success_chance): (Vec<&str>, Option<f32>, Option<f32>) =
            match &envelope.command {
                CrewCommand::Move { crew_id, station_id } | CrewCommand::ManStation { crew_id, station_id } => {
                    (vec![crew_id.as_str(), station_id.as_str()], None, None)
                }
                CrewCommand::ExtinguishFire {
                    crew_id,
                    section_id,
                    duration,
                    success_chance,
                    ..
                } => (vec![crew_id.as_str(), section_id.as_str()], *duration, *success_chance),
                CrewCommand::Repair {
                    crew_id,
                    system_id,
                    duration,
                    success_chance,
                    ..
                } => (vec![crew_id.as_str(), system_id.as_str()], *duration, *success_chance),
                CrewCommand::TreatInjury {
                    medic_id,
                    target_crew_id,
                    duration,
                    success_chance,
                    ..
                } => (vec![medic_id.as_str(), target_crew_id.as_str()], *duration, *success_chance),
                CrewCommand::FeatherEngine { crew_id, engine_id }
                | CrewCommand::RestartEngine { crew_id, engine_id } => (vec![crew_id.as_str(), engine_id.as_str()], None, None),
            };

        if ids.iter().any(|id| id.is_empty()) {
            return Err(ProtocolError::InvalidParameter("empty identifier".into()));
        }
        if let Some(duration) = duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ProtocolError::InvalidParameter(format!("duration {duration}")));
            }
        }
        if let Some(chance) = success_chance {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ProtocolError::InvalidParameter(format!("success_chance {chance}")));
            }
        }
        Ok(())
    }

    pub fn serialize_outcome(&mut self, outcome: &CommandOutcome) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json_str = serde_json::to_string(outcome).map_err(|_| ProtocolError::SerializationError)?;
        self.response_buffer
            .try_push_str(&json_str)
            .map_err(|_| ProtocolError::MessageTooLarge {
                len: json_str.len(),
                max: MAX_RESPONSE_SIZE,
            })?;

        Ok(self.response_buffer.as_str())
    }

    pub fn create_outcome(&self, id: u32, status: OutcomeStatus, reason: Option<&str>) -> CommandOutcome {
        CommandOutcome {
            id,
            status,
            reason: reason.map(str::to_string),
        }
    }

    /// Outcome for a command the queue has just dispatched.
    pub fn outcome_for_event(&self, event: &CommandEvent) -> CommandOutcome {
        match event {
            CommandEvent::Accepted { id, .. } => self.create_outcome(*id, OutcomeStatus::Accepted, None),
            CommandEvent::Rejected { id, reason, .. } => {
                self.create_outcome(*id, OutcomeStatus::Rejected, Some(reason.as_str()))
            }
        }
    }

    /// Wire ACK/NACK line for a dispatched command.
    pub fn acknowledge(&mut self, event: &CommandEvent) -> Result<&str, ProtocolError> {
        let outcome = self.outcome_for_event(event);
        self.serialize_outcome(&outcome)
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}
