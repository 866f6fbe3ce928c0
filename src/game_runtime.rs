use bevy::prelude::*;
use serde::Serialize;

use crate::bridge::{BridgeEvent, EventBridge};
use crate::campaign;
use crate::gameplay::Attempt;
use crate::level::{Level, TileLegend};

#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize)]
pub enum Scene {
    #[default]
    MainMenu,
    Play,
    Lose,
    Win,
}

impl Scene {
    pub fn as_str(self) -> &'static str {
        match self {
            Scene::MainMenu => "main_menu",
            Scene::Play => "play",
            Scene::Lose => "lose",
            Scene::Win => "win",
        }
    }
}

/// Where a playlist came from. Decides the HUD label and where Win exits to.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "set_id", rename_all = "snake_case")]
pub enum PlaylistSource {
    Campaign,
    Set(String),
    /// A single freshly generated level.
    Generated,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Playlist {
    pub levels: Vec<Level>,
    pub legend: TileLegend,
    pub source: PlaylistSource,
}

impl Playlist {
    pub fn campaign() -> Self {
        Self {
            levels: campaign::campaign_levels(),
            legend: campaign::campaign_legend(),
            source: PlaylistSource::Campaign,
        }
    }

    pub fn single(level: Level) -> Self {
        Self {
            levels: vec![level],
            legend: TileLegend::Authored,
            source: PlaylistSource::Generated,
        }
    }

    pub fn authored(levels: Vec<Level>, set_id: Option<String>) -> Self {
        Self {
            levels,
            legend: TileLegend::Authored,
            source: match set_id {
                Some(id) => PlaylistSource::Set(id),
                None => PlaylistSource::Generated,
            },
        }
    }

    pub fn set_id(&self) -> Option<&str> {
        match &self.source {
            PlaylistSource::Set(id) => Some(id),
            _ => None,
        }
    }
}

/// Where leaving the Win screen goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitTarget {
    Menu,
    Navigate(String),
}

/// Progress through the active playlist.
///
/// `generation` bumps every time the current level must be (re)spawned, so the
/// level loader can tell a retry apart from a frame where nothing changed.
#[derive(Resource, Clone, Default)]
pub struct PlaySession {
    pub playlist: Option<Playlist>,
    pub level_index: usize,
    /// Coins carried into the current level.
    pub coins: u32,
    pub generation: u64,
    /// Live state of the level being played.
    pub run: Attempt,
}

impl PlaySession {
    /// Start a playlist from `start_index` (clamped) with a fresh score.
    /// Returns false and leaves the session alone when the playlist is empty.
    pub fn begin(&mut self, playlist: Playlist, start_index: usize) -> bool {
        if playlist.levels.is_empty() {
            return false;
        }
        self.level_index = start_index.min(playlist.levels.len() - 1);
        self.playlist = Some(playlist);
        self.coins = 0;
        self.reload();
        true
    }

    pub fn current_level(&self) -> Option<&Level> {
        self.playlist
            .as_ref()
            .and_then(|p| p.levels.get(self.level_index))
    }

    pub fn legend(&self) -> TileLegend {
        self.playlist
            .as_ref()
            .map(|p| p.legend)
            .unwrap_or_default()
    }

    pub fn level_count(&self) -> usize {
        self.playlist.as_ref().map(|p| p.levels.len()).unwrap_or(0)
    }

    /// Portal reached: move to the next level keeping the coins, or report Win.
    pub fn complete_level(&mut self) -> Scene {
        self.coins = self.run.coins;
        if self.level_index + 1 < self.level_count() {
            self.level_index += 1;
            self.reload();
            Scene::Play
        } else {
            Scene::Win
        }
    }

    /// Same level again, from zero coins.
    pub fn retry(&mut self) {
        self.coins = 0;
        self.reload();
    }

    /// Whole playlist again, from the first level.
    pub fn play_again(&mut self) {
        self.level_index = 0;
        self.coins = 0;
        self.reload();
    }

    pub fn exit_target(&self) -> ExitTarget {
        match self.playlist.as_ref().and_then(Playlist::set_id) {
            Some(id) => ExitTarget::Navigate(format!("/sets/{id}")),
            None => ExitTarget::Menu,
        }
    }

    pub fn hud_label(&self) -> String {
        match self.playlist.as_ref().map(|p| &p.source) {
            Some(PlaylistSource::Generated) => "AI LEVEL".to_string(),
            _ => format!("LEVEL {}", self.level_index + 1),
        }
    }

    fn reload(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.run = Attempt::with_coins(self.coins);
    }
}

/// Transitions requested by input, UI, gameplay and the bridge. Applied in
/// order by [`apply_scene_requests`].
#[derive(Event, Clone, Debug, PartialEq)]
pub enum SceneRequest {
    PlayCampaign,
    PlayLevels { playlist: Playlist, start_index: usize },
    /// Enter/space on the Lose or Win screen.
    Retry,
    Escape,
    LevelCompleted,
    PlayerDied,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RuntimeSnapshot {
    pub scene: Scene,
    pub level_index: usize,
    pub level_count: usize,
    pub coins: u32,
    pub hud_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    pub generation: u64,
}

pub fn snapshot(scene: Scene, session: &PlaySession) -> RuntimeSnapshot {
    RuntimeSnapshot {
        scene,
        level_index: session.level_index,
        level_count: session.level_count(),
        coins: if scene == Scene::Play {
            session.run.coins
        } else {
            session.coins.max(session.run.coins)
        },
        hud_label: session.hud_label(),
        set_id: session
            .playlist
            .as_ref()
            .and_then(Playlist::set_id)
            .map(str::to_string),
        generation: session.generation,
    }
}

pub fn gameplay_active(scene: Option<Res<State<Scene>>>) -> bool {
    scene.map(|s| *s.get() == Scene::Play).unwrap_or(false)
}

pub fn apply_scene_requests(
    mut requests: EventReader<SceneRequest>,
    scene: Res<State<Scene>>,
    mut next_scene: ResMut<NextState<Scene>>,
    mut session: ResMut<PlaySession>,
    bridge: Option<Res<EventBridge>>,
) {
    let mut current = *scene.get();
    let start = current;
    for request in requests.read() {
        let target = match (request, current) {
            (SceneRequest::PlayCampaign, Scene::MainMenu) => {
                session.begin(Playlist::campaign(), 0);
                Some(Scene::Play)
            }
            (
                SceneRequest::PlayLevels {
                    playlist,
                    start_index,
                },
                _,
            ) => {
                if session.begin(playlist.clone(), *start_index) {
                    Some(Scene::Play)
                } else {
                    warn!("[Markie runtime] Ignoring empty playlist");
                    None
                }
            }
            (SceneRequest::Retry, Scene::Lose) => {
                session.retry();
                Some(Scene::Play)
            }
            (SceneRequest::Retry, Scene::Win) => {
                session.play_again();
                Some(Scene::Play)
            }
            (SceneRequest::Escape, Scene::Play | Scene::Lose) => Some(Scene::MainMenu),
            (SceneRequest::Escape, Scene::Win) => {
                if let ExitTarget::Navigate(url) = session.exit_target() {
                    if let Some(bridge) = bridge.as_ref() {
                        bridge.emit(BridgeEvent::Navigate { url });
                    }
                }
                Some(Scene::MainMenu)
            }
            (SceneRequest::LevelCompleted, Scene::Play) => Some(session.complete_level()),
            (SceneRequest::PlayerDied, Scene::Play) => {
                if let Some(bridge) = bridge.as_ref() {
                    bridge.emit(BridgeEvent::PlayerDied);
                }
                Some(Scene::Lose)
            }
            _ => None,
        };
        if let Some(target) = target {
            current = target;
        }
    }
    if current != start {
        info!(
            "[Markie runtime] {} -> {} (level {}/{})",
            start.as_str(),
            current.as_str(),
            session.level_index + 1,
            session.level_count()
        );
        next_scene.set(current);
    }
}

pub struct RuntimeStatePlugin;

impl Plugin for RuntimeStatePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(PlaySession::default())
            .init_state::<Scene>()
            .add_event::<SceneRequest>()
            .add_systems(PreUpdate, apply_scene_requests);
    }
}
