//! Section fires and the structural queries built on the fuselage ordering.

use super::components::apply_damage;
use super::{VehicleEvent, VehicleState};
use rand::Rng;
use tracing::{info, warn};

impl VehicleState {
    pub(super) fn tick_section_fires(&mut self, dt: f32) {
        let rate = self.config.fire_damage_per_second;
        let chance = self.config.fire_damage_chance_per_second;
        let floor = self.config.destroyed_threshold;

        for idx in 0..self.sections.len() {
            let section = &mut self.sections[idx];
            let Some(damage) = section.fire.accumulate(rate, dt, chance, &mut self.rng) else {
                continue;
            };

            let was_destroyed = section.is_destroyed(floor);
            section.integrity = apply_damage(section.integrity, damage, floor);
            let destroyed_now = !was_destroyed && section.is_destroyed(floor);
            let crossed = section.fire.crossed_band_downward(section.integrity);

            if crossed || destroyed_now {
                info!(section = %section.id, integrity = section.integrity, "fire damage");
                self.events.push(VehicleEvent::SectionDamaged {
                    section: section.id.clone(),
                    integrity: section.integrity,
                });
            }
            if destroyed_now {
                warn!(section = %section.id, "section burned out");
                self.events.push(VehicleEvent::SectionDestroyed {
                    section: section.id.clone(),
                });
            }
        }
    }

    /// Each section burning at the start of the tick may ignite one neighbour.
    pub(super) fn tick_fire_spread(&mut self, dt: f32) {
        let chance = self.config.fire_spread_chance_per_second * dt;
        if chance <= 0.0 {
            return;
        }

        let burning: Vec<String> = self
            .sections
            .iter()
            .filter(|s| s.fire.on_fire)
            .map(|s| s.id.clone())
            .collect();

        for source in burning {
            if self.rng.gen::<f32>() >= chance {
                continue;
            }
            let candidates: Vec<usize> = self
                .adjacent_sections(&source)
                .into_iter()
                .filter_map(|id| self.section_index(id))
                .filter(|&i| {
                    let s = &self.sections[i];
                    !s.fire.on_fire && !s.is_destroyed(self.config.destroyed_threshold)
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let target = candidates[self.rng.gen_range(0..candidates.len())];
            if self.sections[target].fire.ignite() {
                let section = self.sections[target].id.clone();
                warn!(from = %source, to = %section, "fire spread");
                self.events.push(VehicleEvent::FireStarted { section });
            }
        }
    }

    fn order_position(&self, id: &str) -> Option<usize> {
        self.section_order.iter().position(|s| s == id)
    }

    /// Neighbours of a section in the fuselage ordering. Sections outside
    /// the ordering have none.
    pub fn adjacent_sections(&self, id: &str) -> Vec<&str> {
        let Some(pos) = self.order_position(id) else {
            return Vec::new();
        };
        let mut neighbours = Vec::with_capacity(2);
        if pos > 0 {
            neighbours.push(self.section_order[pos - 1].as_str());
        }
        if let Some(next) = self.section_order.get(pos + 1) {
            neighbours.push(next.as_str());
        }
        neighbours
    }

    /// Any fire strictly between `start` and `end` blocks the walk. A burning
    /// destination blocks too, unless `extinguish_target` names that same
    /// section.
    pub fn is_path_blocked_by_fire(
        &self,
        start: &str,
        end: &str,
        extinguish_target: Option<&str>,
    ) -> bool {
        let (Some(a), Some(b)) = (self.order_position(start), self.order_position(end)) else {
            return false;
        };
        let (lo, hi) = (a.min(b), a.max(b));

        let between_burning = self.section_order[lo + 1..hi.max(lo + 1)]
            .iter()
            .any(|id| self.is_section_on_fire(id));
        if between_burning {
            return true;
        }

        a != b && extinguish_target != Some(end) && self.is_section_on_fire(end)
    }

    /// Every neighbour is burning. A section with no neighbours never traps.
    pub fn is_crew_trapped_by_fire(&self, section_id: &str) -> bool {
        let neighbours = self.adjacent_sections(section_id);
        !neighbours.is_empty() && neighbours.iter().all(|id| self.is_section_on_fire(id))
    }

    /// Healthiest neighbour that is neither burning nor destroyed.
    pub fn get_nearest_safe_adjacent_section(&self, section_id: &str) -> Option<&str> {
        let floor = self.config.destroyed_threshold;
        self.adjacent_sections(section_id)
            .into_iter()
            .filter_map(|id| self.section(id))
            .filter(|s| !s.is_on_fire() && !s.is_destroyed(floor))
            .max_by(|a, b| a.integrity.total_cmp(&b.integrity))
            .map(|s| s.id())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VehicleConfig;
    use crate::layout::{PositionService, StaticLayout};
    use crate::roster::Roster;
    use crate::vehicle::{VehicleEvent, VehicleState};

    fn vehicle_with(config: VehicleConfig) -> VehicleState {
        let layout = StaticLayout::b17();
        VehicleState::new(&Roster::b17(), layout.ordered_section_ids().to_vec(), config, 5)
    }

    fn ignite(vehicle: &mut VehicleState, id: &str) {
        vehicle.apply_hit_to_section(id, 0.0, true, 1.0);
    }

    #[test]
    fn test_adjacency_follows_ordering() {
        let vehicle = vehicle_with(VehicleConfig::default());
        assert_eq!(vehicle.adjacent_sections("Nose"), vec!["Cockpit"]);
        assert_eq!(vehicle.adjacent_sections("BombBay"), vec!["Cockpit", "RadioRoom"]);
        assert!(vehicle.adjacent_sections("LeftWing").is_empty());
        assert!(vehicle.adjacent_sections("Galley").is_empty());
    }

    #[test]
    fn test_path_blocked_by_fire_between() {
        let mut vehicle = vehicle_with(VehicleConfig::default());
        ignite(&mut vehicle, "BombBay");

        assert!(vehicle.is_path_blocked_by_fire("Cockpit", "Waist", None));
        assert!(vehicle.is_path_blocked_by_fire("Waist", "Cockpit", Some("Cockpit")));
        assert!(!vehicle.is_path_blocked_by_fire("Waist", "Tail", None));
        assert!(!vehicle.is_path_blocked_by_fire("Galley", "Tail", None));
    }

    #[test]
    fn test_burning_destination_only_open_to_its_own_extinguish() {
        let mut vehicle = vehicle_with(VehicleConfig::default());
        ignite(&mut vehicle, "Tail");

        assert!(vehicle.is_path_blocked_by_fire("Waist", "Tail", None));
        assert!(!vehicle.is_path_blocked_by_fire("Waist", "Tail", Some("Tail")));
        // Putting out some other fire does not open a burning destination.
        assert!(vehicle.is_path_blocked_by_fire("Waist", "Tail", Some("Waist")));
        assert!(vehicle.is_path_blocked_by_fire("Waist", "Tail", Some("Engine4")));
    }

    #[test]
    fn test_trapped_and_nearest_safe() {
        let mut vehicle = vehicle_with(VehicleConfig::default());
        ignite(&mut vehicle, "Cockpit");
        ignite(&mut vehicle, "RadioRoom");

        assert!(vehicle.is_crew_trapped_by_fire("BombBay"));
        assert!(vehicle.get_nearest_safe_adjacent_section("BombBay").is_none());
        assert!(!vehicle.is_crew_trapped_by_fire("Waist"));

        vehicle.apply_hit_to_section("Waist", 30.0, false, 0.0);
        assert_eq!(vehicle.get_nearest_safe_adjacent_section("RadioRoom"), Some("BombBay"));
        assert!(!vehicle.is_crew_trapped_by_fire("LeftWing"));
    }

    #[test]
    fn test_fire_damage_reports_band_crossings() {
        let mut config = VehicleConfig::default();
        config.fire_damage_per_second = 1.0;
        config.fire_damage_chance_per_second = 1.0;
        config.fire_spread_chance_per_second = 0.0;
        let mut vehicle = vehicle_with(config);
        ignite(&mut vehicle, "Waist");
        vehicle.drain_events();

        for _ in 0..10 {
            vehicle.tick(1.0);
        }

        assert_eq!(vehicle.section("Waist").unwrap().integrity(), 90.0);
        let damaged = vehicle
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, VehicleEvent::SectionDamaged { section, .. } if section == "Waist"))
            .count();
        assert_eq!(damaged, 1);
    }

    #[test]
    fn test_fire_spreads_to_a_neighbour() {
        let mut config = VehicleConfig::default();
        config.fire_damage_per_second = 0.0;
        config.fire_spread_chance_per_second = 1.0;
        let mut vehicle = vehicle_with(config);
        ignite(&mut vehicle, "Nose");

        vehicle.tick(1.0);

        assert!(vehicle.is_section_on_fire("Cockpit"));
        assert!(!vehicle.is_section_on_fire("BombBay"));
    }
}
