//! Signal bus.
//!
//! Components buffer their own signals during a step; the simulation drains
//! them afterwards, in component order, stamps them and hands them to every
//! listener. The most recent records are kept for inspection.

use crate::command_queue::CommandEvent;
use crate::crew::CrewEvent;
use crate::hazard::HazardEvent;
use crate::vehicle::VehicleEvent;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_EVENT_HISTORY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Vehicle(VehicleEvent),
    Crew(CrewEvent),
    Hazard(HazardEvent),
    Command(CommandEvent),
}

impl SimEvent {
    pub fn source(&self) -> &'static str {
        match self {
            SimEvent::Vehicle(_) => "vehicle",
            SimEvent::Crew(_) => "crew",
            SimEvent::Hazard(_) => "hazard",
            SimEvent::Command(_) => "command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEventRecord {
    pub step: u64,
    pub time: f32,
    pub event: SimEvent,
}

pub type Listener = Box<dyn FnMut(&SimEventRecord) + Send>;

pub struct EventBus {
    listeners: std::vec::Vec<Listener>,
    history: Vec<SimEventRecord, MAX_EVENT_HISTORY>,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: std::vec::Vec::new(),
            history: Vec::new(),
            published: 0,
        }
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers one record to every listener and keeps it in history.
    pub fn publish(&mut self, record: SimEventRecord) {
        for listener in &mut self.listeners {
            listener(&record);
        }

        // Oldest record drops out once the ring is full.
        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(record);
        self.published += 1;
    }

    pub fn publish_all<I>(&mut self, step: u64, time: f32, events: I)
    where
        I: IntoIterator<Item = SimEvent>,
    {
        for event in events {
            self.publish(SimEventRecord { step, time, event });
        }
    }

    /// Most recent records, oldest first.
    pub fn recent(&self) -> &[SimEventRecord] {
        &self.history
    }

    pub fn total_published(&self) -> u64 {
        self.published
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("history", &self.history.len())
            .field("published", &self.published)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn fuel_event(fuel: f32) -> SimEvent {
        SimEvent::Vehicle(VehicleEvent::FuelChanged { fuel })
    }

    #[test]
    fn test_listeners_see_every_record() {
        let seen = Arc::new(Mutex::new(std::vec::Vec::new()));
        let sink = Arc::clone(&seen);

        let mut bus = EventBus::new();
        bus.subscribe(Box::new(move |record| {
            sink.lock().unwrap().push(record.step);
        }));
        bus.publish_all(3, 0.3, vec![fuel_event(10.0), fuel_event(9.0)]);

        assert_eq!(*seen.lock().unwrap(), vec![3, 3]);
        assert_eq!(bus.recent().len(), 2);
        assert_eq!(bus.recent()[0].event.source(), "vehicle");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut bus = EventBus::new();
        for step in 0..(MAX_EVENT_HISTORY as u64 + 10) {
            bus.publish_all(step, step as f32, [fuel_event(1.0)]);
        }

        assert_eq!(bus.recent().len(), MAX_EVENT_HISTORY);
        assert_eq!(bus.recent()[0].step, 10);
        assert_eq!(bus.total_published(), MAX_EVENT_HISTORY as u64 + 10);

        bus.clear_history();
        assert!(bus.recent().is_empty());
    }
}
