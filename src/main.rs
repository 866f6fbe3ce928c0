mod api;
mod audio;
mod bridge;
mod camera;
mod campaign;
mod components;
mod designer;
mod events;
mod game_runtime;
mod gameplay;
mod input;
mod level;
mod physics;
mod physics_core;
mod player;
mod render;
mod storage;
mod tilemap;
mod ui;

use std::sync::Arc;

use bevy::prelude::*;
use bridge::EventBridge;
use components::{GameConfig, HeadlessMode};
use designer::{Designer, ProceduralModel};
use game_runtime::SceneRequest;
use storage::Store;

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    assets_dir: Option<String>,
    api_addr: Option<String>,
    data_dir: Option<String>,
    /// `main_menu` (default) or `play` to drop straight into the campaign.
    start_scene: Option<String>,
}

fn load_startup_config() -> StartupConfig {
    let path = env_override("MARKIE_GAME_CONFIG").unwrap_or_else(|| "markie.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Markie] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Markie] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn open_store(data_dir: Option<String>) -> Store {
    let Some(dir) = data_dir else {
        println!("[Markie] No data dir configured; sets live in memory only");
        return Store::in_memory();
    };
    match Store::open(&dir) {
        Ok(store) => {
            println!("[Markie] Store opened at {}", dir);
            store
        }
        Err(e) => {
            eprintln!("[Markie] Failed to open store at {}: {}; using memory", dir, e);
            Store::in_memory()
        }
    }
}

fn start_campaign(mut requests: EventWriter<SceneRequest>) {
    requests.send(SceneRequest::PlayCampaign);
}

fn main() {
    let headless = std::env::args().any(|a| a == "--headless");
    let startup_config = load_startup_config();
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        println!("[Markie] Starting in HEADLESS mode");
    } else {
        let assets_dir = env_override("MARKIE_ASSETS_DIR")
            .or(startup_config.assets_dir)
            .unwrap_or_else(|| "assets".to_string());
        if assets_dir != "assets" {
            println!("[Markie] Using game assets dir: {}", assets_dir);
        }
        let window_title = startup_config
            .window_title
            .unwrap_or_else(|| "Markie".to_string());
        let window_width = startup_config.window_width.unwrap_or(960.0);
        let window_height = startup_config.window_height.unwrap_or(640.0);

        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: window_title,
                        resolution: (window_width, window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::asset::AssetPlugin {
                    file_path: assets_dir,
                    ..default()
                }),
        );
        app.insert_resource(ClearColor(render::theme_color("#8db7ff")));
        app.add_plugins(render::RenderPlugin);
        println!("[Markie] Starting in WINDOWED mode");
    }

    let bridge = EventBridge::new();
    let store = open_store(env_override("MARKIE_DATA_DIR").or(startup_config.data_dir));
    let designer = Designer::new(Arc::new(ProceduralModel::new()), store);
    let addr = env_override("MARKIE_API_ADDR")
        .or(startup_config.api_addr)
        .unwrap_or_else(|| api::DEFAULT_API_ADDR.to_string());

    app.insert_resource(GameConfig::default())
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .add_plugins(input::InputPlugin)
        .add_plugins(game_runtime::RuntimeStatePlugin)
        .add_plugins(bridge::BridgePlugin {
            bridge: bridge.clone(),
        })
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(tilemap::TilemapPlugin)
        .add_plugins(physics::PhysicsPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(audio::AudioPlugin)
        .add_plugins(camera::CameraPlugin)
        .add_plugins(ui::UiPlugin)
        .add_plugins(api::ApiPlugin {
            addr,
            designer,
            bridge,
        });

    if startup_config.start_scene.as_deref() == Some("play") {
        app.add_systems(Startup, start_campaign);
    }

    app.run();
}
