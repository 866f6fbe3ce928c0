use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

/// One gameplay occurrence (coin pickup, death, level completion...).
#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub seq: u64,
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
}

/// Ring buffer of recent gameplay events, read by audio and the HTTP API.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub next_seq: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.next_seq = self.next_seq.saturating_add(1);
        self.recent.push_back(GameEvent {
            seq: self.next_seq,
            name: name.into(),
            data,
            frame: self.frame,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Markie events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    /// Events emitted after `seq`, oldest first.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &GameEvent> {
        self.recent.iter().filter(move |ev| ev.seq > seq)
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default()).add_systems(
            FixedUpdate,
            tick_event_frame.run_if(crate::game_runtime::gameplay_active),
        );
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }));
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert!(bus.dropped_events >= 25);
    }

    #[test]
    fn since_skips_already_seen_events() {
        let mut bus = GameEventBus::default();
        bus.emit("coin_collected", serde_json::json!({}));
        let seen = bus.next_seq;
        bus.emit("player_died", serde_json::json!({}));
        let names: Vec<_> = bus.since(seen).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["player_died"]);
    }
}
