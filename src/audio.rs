use std::collections::HashMap;

use bevy::audio::{PlaybackSettings, Volume};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::{GameEvent, GameEventBus};
use crate::gameplay::detune_to_speed;

const MAX_AUDIO_EVENTS: usize = 256;

fn default_volume() -> f32 {
    1.0
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SfxDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AudioEventLog {
    pub frame: u64,
    pub name: String,
    pub volume: f32,
    /// Playback speed; 1.0 is the recorded pitch.
    pub speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_event: Option<String>,
}

#[derive(Resource)]
pub struct AudioManager {
    pub sfx: HashMap<String, SfxDefinition>,
    /// Gameplay event name -> sfx name.
    pub triggers: HashMap<String, String>,
    pub master_volume: f32,
    pub recent_events: Vec<AudioEventLog>,
    /// Sounds to start this frame (consumed by the playback system).
    pending: Vec<AudioEventLog>,
}

impl Default for AudioManager {
    fn default() -> Self {
        let sfx = [
            ("coin", "sounds/score.ogg"),
            ("powerup", "sounds/powerup.ogg"),
            ("blip", "sounds/blip.ogg"),
            ("hit", "sounds/hit.ogg"),
            ("portal", "sounds/portal.ogg"),
        ]
        .into_iter()
        .map(|(name, path)| {
            (
                name.to_string(),
                SfxDefinition {
                    path: path.to_string(),
                    volume: 1.0,
                },
            )
        })
        .collect();
        let triggers = [
            ("coin_collected", "coin"),
            ("enemy_stomped", "powerup"),
            ("apple_eaten", "powerup"),
            ("apple_released", "blip"),
            ("player_died", "hit"),
            ("level_completed", "portal"),
        ]
        .into_iter()
        .map(|(event, sfx)| (event.to_string(), sfx.to_string()))
        .collect();
        Self {
            sfx,
            triggers,
            master_volume: 1.0,
            recent_events: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl AudioManager {
    pub fn play_sfx(
        &mut self,
        name: &str,
        frame: u64,
        speed: f32,
        source_event: Option<String>,
    ) -> Result<(), String> {
        let Some(def) = self.sfx.get(name) else {
            return Err(format!("Unknown sfx: {name}"));
        };
        let event = AudioEventLog {
            frame,
            name: name.to_string(),
            volume: def.volume * self.master_volume,
            speed,
            source_event,
        };
        self.pending.push(event.clone());
        self.recent_events.push(event);
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
        Ok(())
    }

    fn handle_event(&mut self, ev: &GameEvent) {
        let Some(sfx) = self.triggers.get(&ev.name).cloned() else {
            return;
        };
        // Coin pickups carry a pitch ramp in cents.
        let speed = ev
            .data
            .get("detune")
            .and_then(|v| v.as_f64())
            .map(|cents| detune_to_speed(cents as f32))
            .unwrap_or(1.0);
        if let Err(e) = self.play_sfx(&sfx, ev.frame, speed, Some(ev.name.clone())) {
            warn!("[Markie audio] {e}");
        }
    }
}

#[derive(Resource, Default)]
struct AudioEventCursor {
    last_seq: u64,
}

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(AudioManager::default())
            .insert_resource(AudioEventCursor::default())
            .add_systems(
                Update,
                (
                    auto_audio_from_events,
                    play_pending.run_if(resource_exists::<AssetServer>),
                )
                    .chain(),
            );
    }
}

fn auto_audio_from_events(
    mut audio: ResMut<AudioManager>,
    bus: Res<GameEventBus>,
    mut cursor: ResMut<AudioEventCursor>,
) {
    for ev in bus.since(cursor.last_seq) {
        audio.handle_event(ev);
    }
    cursor.last_seq = bus.next_seq;
}

fn play_pending(
    mut commands: Commands,
    mut audio: ResMut<AudioManager>,
    asset_server: Res<AssetServer>,
) {
    let pending = std::mem::take(&mut audio.pending);
    for event in pending {
        let Some(def) = audio.sfx.get(&event.name) else {
            continue;
        };
        commands.spawn((
            AudioPlayer::<AudioSource>(asset_server.load(def.path.clone())),
            PlaybackSettings::DESPAWN
                .with_volume(Volume::new(event.volume))
                .with_speed(event.speed),
        ));
    }
}
