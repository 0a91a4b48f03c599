//! Position Service: logical ids to 2D coordinates, plus the fuselage order
//! that defines section adjacency.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub trait PositionService: Send + Sync + std::fmt::Debug {
    fn station_position(&self, station_id: &str) -> Option<Vec2>;
    fn section_position(&self, section_id: &str) -> Option<Vec2>;
    /// Canonical linear ordering of sections. Neighbours in this list are adjacent.
    fn ordered_section_ids(&self) -> &[String];
}

/// Table-backed layout, usually loaded alongside the roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticLayout {
    pub stations: HashMap<String, Vec2>,
    pub sections: HashMap<String, Vec2>,
    pub section_order: Vec<String>,
}

impl StaticLayout {
    pub fn new(section_order: Vec<String>) -> Self {
        Self {
            section_order,
            ..Self::default()
        }
    }

    pub fn with_section(mut self, id: &str, x: f32, y: f32) -> Self {
        self.sections.insert(id.to_string(), Vec2::new(x, y));
        self
    }

    pub fn with_station(mut self, id: &str, x: f32, y: f32) -> Self {
        self.stations.insert(id.to_string(), Vec2::new(x, y));
        self
    }

    /// Coordinates matching [`crate::roster::Roster::b17`]. X runs nose to tail.
    pub fn b17() -> Self {
        let order = ["Nose", "Cockpit", "BombBay", "RadioRoom", "Waist", "Tail"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self::new(order)
            .with_section("Nose", 40.0, 0.0)
            .with_section("Cockpit", 120.0, 0.0)
            .with_section("BombBay", 220.0, 0.0)
            .with_section("RadioRoom", 300.0, 0.0)
            .with_section("Waist", 400.0, 0.0)
            .with_section("Tail", 520.0, 0.0)
            .with_section("LeftWing", 200.0, -160.0)
            .with_section("RightWing", 200.0, 160.0)
            .with_station("BombardierStation", 25.0, 0.0)
            .with_station("NavigatorStation", 60.0, 10.0)
            .with_station("PilotSeat", 115.0, -10.0)
            .with_station("CoPilotSeat", 115.0, 10.0)
            .with_station("TopTurretStation", 145.0, 0.0)
            .with_station("RadioDesk", 295.0, -8.0)
            .with_station("AidStation", 310.0, 8.0)
            .with_station("LeftWaistGun", 410.0, -12.0)
            .with_station("RightWaistGun", 410.0, 12.0)
            .with_station("TailGunStation", 545.0, 0.0)
    }
}

impl PositionService for StaticLayout {
    fn station_position(&self, station_id: &str) -> Option<Vec2> {
        self.stations.get(station_id).copied()
    }

    fn section_position(&self, section_id: &str) -> Option<Vec2> {
        self.sections.get(section_id).copied()
    }

    fn ordered_section_ids(&self) -> &[String] {
        &self.section_order
    }
}
