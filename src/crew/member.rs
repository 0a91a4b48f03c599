use super::action::CrewAction;
use crate::config::CrewConfig;
use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrewRole {
    Pilot,
    CoPilot,
    Navigator,
    Bombardier,
    FlightEngineer,
    RadioOperator,
    Medic,
    WaistGunner,
    TailGunner,
    BallTurretGunner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Light,
    Serious,
    Critical,
    Unconscious,
    Dead,
}

impl HealthStatus {
    /// Stages with a running escalation timer.
    pub fn is_injured(self) -> bool {
        matches!(self, Self::Light | Self::Serious | Self::Critical)
    }

    /// Stage reached when the injury timer runs out.
    pub fn escalated(self) -> Option<Self> {
        match self {
            Self::Light => Some(Self::Serious),
            Self::Serious => Some(Self::Critical),
            Self::Critical => Some(Self::Dead),
            _ => None,
        }
    }

    /// One step of treatment. Healthy and Dead have nowhere to go.
    pub fn healed(self) -> Option<Self> {
        match self {
            Self::Light => Some(Self::Healthy),
            Self::Serious => Some(Self::Light),
            Self::Critical => Some(Self::Serious),
            Self::Unconscious => Some(Self::Critical),
            Self::Healthy | Self::Dead => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Light => 1,
            Self::Serious => 2,
            Self::Critical => 3,
            Self::Unconscious => 4,
            Self::Dead => 5,
        }
    }

    pub fn is_worse_than(self, other: Self) -> bool {
        self.rank() > other.rank()
    }

    /// Timer armed on entering this stage. Zero for stages that do not escalate.
    pub fn stage_seconds(self, config: &CrewConfig) -> f32 {
        match self {
            Self::Light => config.light_injury_seconds,
            Self::Serious => config.serious_injury_seconds,
            Self::Critical => config.critical_injury_seconds,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjurySeverity {
    Light,
    Serious,
    Critical,
}

impl From<InjurySeverity> for HealthStatus {
    fn from(severity: InjurySeverity) -> Self {
        match severity {
            InjurySeverity::Light => HealthStatus::Light,
            InjurySeverity::Serious => HealthStatus::Serious,
            InjurySeverity::Critical => HealthStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualState {
    IdleAtStation,
    Moving,
    Working,
}

#[derive(Debug, Clone)]
pub struct CrewMember {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) role: CrewRole,
    pub(crate) status: HealthStatus,
    pub(crate) current_station_id: String,
    pub(crate) current_action: Option<CrewAction>,
    pub(crate) injury_timer: f32,
    pub(crate) home_position: Vec2,
    pub(crate) current_position: Vec2,
    pub(crate) move_speed: f32,
    pub(crate) visual_state: VisualState,
}

impl CrewMember {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> CrewRole {
        self.role
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn current_station_id(&self) -> &str {
        &self.current_station_id
    }

    pub fn current_action(&self) -> Option<&CrewAction> {
        self.current_action.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.current_action.is_some()
    }

    pub fn injury_timer(&self) -> f32 {
        self.injury_timer
    }

    pub fn home_position(&self) -> Vec2 {
        self.home_position
    }

    pub fn current_position(&self) -> Vec2 {
        self.current_position
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn visual_state(&self) -> VisualState {
        self.visual_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_ladder() {
        assert_eq!(HealthStatus::Light.escalated(), Some(HealthStatus::Serious));
        assert_eq!(HealthStatus::Serious.escalated(), Some(HealthStatus::Critical));
        assert_eq!(HealthStatus::Critical.escalated(), Some(HealthStatus::Dead));
        assert_eq!(HealthStatus::Dead.escalated(), None);
        assert_eq!(HealthStatus::Healthy.escalated(), None);
    }

    #[test]
    fn test_healing_ladder() {
        assert_eq!(HealthStatus::Critical.healed(), Some(HealthStatus::Serious));
        assert_eq!(HealthStatus::Light.healed(), Some(HealthStatus::Healthy));
        assert_eq!(HealthStatus::Healthy.healed(), None);
        assert_eq!(HealthStatus::Dead.healed(), None);
    }

    #[test]
    fn test_stage_timers() {
        let config = CrewConfig::default();
        assert_eq!(HealthStatus::Light.stage_seconds(&config), 90.0);
        assert_eq!(HealthStatus::Serious.stage_seconds(&config), 60.0);
        assert_eq!(HealthStatus::Critical.stage_seconds(&config), 45.0);
        assert_eq!(HealthStatus::Healthy.stage_seconds(&config), 0.0);
    }
}
