//! Static mission-start data: what sections, systems, stations and crew exist.

use crate::crew::CrewRole;
use crate::vehicle::SystemKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub id: String,
    #[serde(default = "full_integrity")]
    pub integrity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDef {
    pub id: String,
    pub kind: SystemKind,
    pub section_id: String,
    #[serde(default = "full_integrity")]
    pub integrity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDef {
    pub id: String,
    pub section_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewDef {
    pub id: String,
    pub name: String,
    pub role: CrewRole,
    pub station_id: String,
    #[serde(default)]
    pub move_speed: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub sections: Vec<SectionDef>,
    pub systems: Vec<SystemDef>,
    pub stations: Vec<StationDef>,
    pub crew: Vec<CrewDef>,
}

fn full_integrity() -> f32 {
    100.0
}

fn section(id: &str) -> SectionDef {
    SectionDef {
        id: id.to_string(),
        integrity: full_integrity(),
    }
}

fn system(id: &str, kind: SystemKind, section_id: &str) -> SystemDef {
    SystemDef {
        id: id.to_string(),
        kind,
        section_id: section_id.to_string(),
        integrity: full_integrity(),
    }
}

fn station(id: &str, section_id: &str) -> StationDef {
    StationDef {
        id: id.to_string(),
        section_id: section_id.to_string(),
    }
}

fn crew(id: &str, name: &str, role: CrewRole, station_id: &str) -> CrewDef {
    CrewDef {
        id: id.to_string(),
        name: name.to_string(),
        role,
        station_id: station_id.to_string(),
        move_speed: None,
    }
}

impl Roster {
    /// Ten-man heavy bomber. Fuselage sections run nose to tail; the wings hang
    /// off the bomb bay and carry two engines each.
    pub fn b17() -> Self {
        Self {
            sections: vec![
                section("Nose"),
                section("Cockpit"),
                section("BombBay"),
                section("RadioRoom"),
                section("Waist"),
                section("Tail"),
                section("LeftWing"),
                section("RightWing"),
            ],
            systems: vec![
                system("Engine1", SystemKind::Engine, "LeftWing"),
                system("Engine2", SystemKind::Engine, "LeftWing"),
                system("Engine3", SystemKind::Engine, "RightWing"),
                system("Engine4", SystemKind::Engine, "RightWing"),
                system("ChinTurret", SystemKind::Gun, "Nose"),
                system("Bombsight", SystemKind::Bombsight, "Nose"),
                system("NavTable", SystemKind::NavigatorStation, "Nose"),
                system("TopTurret", SystemKind::Gun, "Cockpit"),
                system("Oxygen", SystemKind::Oxygen, "BombBay"),
                system("Radio", SystemKind::Radio, "RadioRoom"),
                system("WaistGuns", SystemKind::Gun, "Waist"),
                system("TailGuns", SystemKind::Gun, "Tail"),
            ],
            stations: vec![
                station("BombardierStation", "Nose"),
                station("NavigatorStation", "Nose"),
                station("PilotSeat", "Cockpit"),
                station("CoPilotSeat", "Cockpit"),
                station("TopTurretStation", "Cockpit"),
                station("RadioDesk", "RadioRoom"),
                station("AidStation", "RadioRoom"),
                station("LeftWaistGun", "Waist"),
                station("RightWaistGun", "Waist"),
                station("TailGunStation", "Tail"),
            ],
            crew: vec![
                crew("Pilot", "Capt. Morgan", CrewRole::Pilot, "PilotSeat"),
                crew("CoPilot", "Lt. Verinis", CrewRole::CoPilot, "CoPilotSeat"),
                crew("Navigator", "Lt. Leighton", CrewRole::Navigator, "NavigatorStation"),
                crew("Bombardier", "Lt. Evans", CrewRole::Bombardier, "BombardierStation"),
                crew("Engineer", "Sgt. Loch", CrewRole::FlightEngineer, "TopTurretStation"),
                crew("RadioOp", "Sgt. Hanson", CrewRole::RadioOperator, "RadioDesk"),
                crew("Medic1", "Sgt. Quinlan", CrewRole::Medic, "AidStation"),
                crew("Gunner1", "Sgt. Winchell", CrewRole::WaistGunner, "LeftWaistGun"),
                crew("Gunner2", "Sgt. Scott", CrewRole::WaistGunner, "RightWaistGun"),
                crew("TailGunner", "Sgt. Nastal", CrewRole::TailGunner, "TailGunStation"),
            ],
        }
    }

    pub fn station_section(&self, station_id: &str) -> Option<&str> {
        self.stations
            .iter()
            .find(|s| s.id == station_id)
            .map(|s| s.section_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b17_roster_is_consistent() {
        let roster = Roster::b17();
        assert_eq!(roster.crew.len(), 10);
        assert_eq!(
            roster
                .systems
                .iter()
                .filter(|s| s.kind == SystemKind::Engine)
                .count(),
            4
        );

        for system in &roster.systems {
            assert!(roster.sections.iter().any(|s| s.id == system.section_id));
        }
        for member in &roster.crew {
            assert!(roster.station_section(&member.station_id).is_some());
        }
    }

    #[test]
    fn test_roster_json_defaults_integrity() {
        let json = r#"{
            "sections": [{"id": "Nose"}],
            "systems": [{"id": "Engine1", "kind": "Engine", "section_id": "Nose"}],
            "stations": [],
            "crew": []
        }"#;
        let roster: Roster = serde_json::from_str(json).unwrap();
        assert_eq!(roster.sections[0].integrity, 100.0);
        assert_eq!(roster.systems[0].integrity, 100.0);
    }
}
