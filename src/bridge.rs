//! Typed publish/subscribe channel between the HTTP side and the game runtime.
//!
//! Level-load commands flow into the runtime; navigation requests and UI
//! prompts flow out of it. Each subscriber owns a crossbeam receiver and is
//! removed when its [`Subscription`] is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde::Serialize;

use crate::game_runtime::{apply_scene_requests, Playlist, SceneRequest};
use crate::level::Level;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeEvent {
    /// Play a single level from a fresh score.
    LoadLevel { level: Level },
    /// Play an ordered list of levels, starting at `start_index`.
    SetLevels {
        levels: Vec<Level>,
        start_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        set_id: Option<String>,
    },
    ShowAiPrompt,
    HideAiPrompt,
    LevelReady,
    PlayerDied,
    Navigate { url: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards the game runtime.
    Inbound,
    /// Out of the game runtime, towards whoever drives the UI.
    Outbound,
}

impl BridgeEvent {
    pub fn direction(&self) -> Direction {
        match self {
            BridgeEvent::LoadLevel { .. } | BridgeEvent::SetLevels { .. } => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::LoadLevel { .. } => "load-level",
            BridgeEvent::SetLevels { .. } => "set-levels",
            BridgeEvent::ShowAiPrompt => "show-ai-prompt",
            BridgeEvent::HideAiPrompt => "hide-ai-prompt",
            BridgeEvent::LevelReady => "level-ready",
            BridgeEvent::PlayerDied => "player-died",
            BridgeEvent::Navigate { .. } => "navigate",
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, Sender<BridgeEvent>>,
}

#[derive(Resource, Clone, Default)]
pub struct EventBridge {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut subs = self.lock();
        subs.next_id = subs.next_id.saturating_add(1);
        let id = subs.next_id;
        subs.senders.insert(id, tx);
        Subscription {
            id,
            receiver: rx,
            bridge: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber. Returns how many received it.
    pub fn emit(&self, event: BridgeEvent) -> usize {
        let mut subs = self.lock();
        subs.senders.retain(|_, tx| tx.send(event.clone()).is_ok());
        subs.senders.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }
}

pub struct Subscription {
    id: u64,
    receiver: Receiver<BridgeEvent>,
    bridge: std::sync::Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<BridgeEvent> {
        match self.receiver.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<BridgeEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bridge.upgrade() {
            if let Ok(mut subs) = inner.lock() {
                subs.senders.remove(&self.id);
            }
        }
    }
}

/// The runtime's own subscription, drained once per frame.
#[derive(Resource)]
struct RuntimeInbox(Subscription);

pub struct BridgePlugin {
    pub bridge: EventBridge,
}

impl Plugin for BridgePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.bridge.clone())
            .insert_resource(RuntimeInbox(self.bridge.subscribe()))
            .add_systems(PreUpdate, drain_inbound.before(apply_scene_requests));
    }
}

/// Turn inbound bridge events into scene requests. Outbound events that loop
/// back through the runtime's own subscription are discarded.
fn drain_inbound(
    inbox: Res<RuntimeInbox>,
    bridge: Res<EventBridge>,
    mut requests: EventWriter<SceneRequest>,
) {
    for event in inbox.0.drain() {
        match event {
            BridgeEvent::LoadLevel { level } => {
                bridge.emit(BridgeEvent::HideAiPrompt);
                requests.send(SceneRequest::PlayLevels {
                    playlist: Playlist::single(level),
                    start_index: 0,
                });
            }
            BridgeEvent::SetLevels {
                levels,
                start_index,
                set_id,
            } => {
                if levels.is_empty() {
                    warn!("[Markie runtime] set-levels with no levels ignored");
                    continue;
                }
                requests.send(SceneRequest::PlayLevels {
                    playlist: Playlist::authored(levels, set_id),
                    start_index,
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_fans_out_to_every_subscriber() {
        let bridge = EventBridge::new();
        let a = bridge.subscribe();
        let b = bridge.subscribe();
        assert_eq!(bridge.emit(BridgeEvent::ShowAiPrompt), 2);
        assert_eq!(a.try_recv(), Some(BridgeEvent::ShowAiPrompt));
        assert_eq!(b.try_recv(), Some(BridgeEvent::ShowAiPrompt));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bridge = EventBridge::new();
        let a = bridge.subscribe();
        {
            let _b = bridge.subscribe();
            assert_eq!(bridge.subscriber_count(), 2);
        }
        assert_eq!(bridge.subscriber_count(), 1);
        bridge.emit(BridgeEvent::Navigate {
            url: "/sets/abc".to_string(),
        });
        assert_eq!(
            a.drain(),
            vec![BridgeEvent::Navigate {
                url: "/sets/abc".to_string()
            }]
        );
    }

    #[test]
    fn events_know_their_direction() {
        let level = Level::default_for_theme("cave");
        assert_eq!(
            BridgeEvent::LoadLevel { level }.direction(),
            Direction::Inbound
        );
        assert_eq!(BridgeEvent::PlayerDied.direction(), Direction::Outbound);
        let json = serde_json::to_value(BridgeEvent::Navigate {
            url: "/".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "navigate");
        assert_eq!(json["url"], "/");
    }

    #[test]
    fn runtime_plays_levels_pushed_across_the_bridge() {
        use crate::game_runtime::{PlaySession, RuntimeStatePlugin, Scene};

        let bridge = EventBridge::new();
        let ui = bridge.subscribe();
        let mut app = App::new();
        app.add_plugins(bevy::state::app::StatesPlugin)
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(BridgePlugin {
                bridge: bridge.clone(),
            });
        app.update();

        bridge.emit(BridgeEvent::SetLevels {
            levels: Vec::new(),
            start_index: 0,
            set_id: None,
        });
        app.update();
        app.update();
        assert_eq!(
            app.world().resource::<State<Scene>>().get(),
            &Scene::MainMenu
        );

        bridge.emit(BridgeEvent::LoadLevel {
            level: Level::default_for_theme("cave"),
        });
        app.update();
        app.update();
        assert_eq!(app.world().resource::<State<Scene>>().get(), &Scene::Play);
        let session = app.world().resource::<PlaySession>();
        assert_eq!(session.level_count(), 1);
        assert_eq!(session.hud_label(), "AI LEVEL");
        assert!(ui.drain().contains(&BridgeEvent::HideAiPrompt));
    }
}
