use bevy::prelude::*;

use crate::components::{GameConfig, GamePosition, HeadlessMode, Player};
use crate::events::GameEventBus;
use crate::game_runtime::Scene;
use crate::tilemap::Tilemap;

#[derive(Resource, Clone)]
pub struct CameraConfig {
    pub follow_speed: f32,
    pub deadzone: Vec2,
    /// Keep the view inside the level horizontally.
    pub clamp_to_level: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_speed: 0.15,
            deadzone: Vec2::new(4.0, 4.0),
            clamp_to_level: true,
        }
    }
}

/// Decaying screen shake triggered by stomps and deaths.
#[derive(Resource, Clone, Default)]
pub struct CameraShakeState {
    pub intensity: f32,
    pub remaining: f32,
    pub duration: f32,
}

impl CameraShakeState {
    fn start(&mut self, intensity: f32, duration: f32) {
        self.intensity = intensity;
        self.duration = duration;
        self.remaining = duration;
    }
}

#[derive(Resource, Default)]
struct CameraRuntimeState {
    base: Vec2,
}

#[derive(Resource, Default)]
struct CameraEventCursor {
    last_seq: u64,
}

#[derive(Component)]
pub struct MainCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CameraConfig::default())
            .insert_resource(CameraShakeState::default())
            .insert_resource(CameraRuntimeState::default())
            .insert_resource(CameraEventCursor::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(OnEnter(Scene::MainMenu), recenter_camera)
            .add_systems(
                Update,
                (
                    shake_from_events,
                    camera_follow.run_if(in_state(Scene::Play)),
                    camera_shake,
                )
                    .chain(),
            );
    }
}

fn shake_from_events(
    bus: Res<GameEventBus>,
    mut shake: ResMut<CameraShakeState>,
    mut cursor: ResMut<CameraEventCursor>,
) {
    for ev in bus.since(cursor.last_seq) {
        match ev.name.as_str() {
            "enemy_stomped" => shake.start(4.0, 0.15),
            "player_died" => shake.start(12.0, 0.3),
            _ => {}
        }
    }
    cursor.last_seq = bus.next_seq;
}

fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((MainCamera, Camera2d, Transform::from_xyz(0.0, 0.0, 100.0)));
}

fn recenter_camera(mut runtime: ResMut<CameraRuntimeState>) {
    runtime.base = Vec2::ZERO;
}

/// Horizontal camera target that keeps a `view_width` window inside a level
/// `world_width` wide. Levels narrower than the view are centered.
pub fn clamp_to_level(target_x: f32, view_width: f32, world_width: f32) -> f32 {
    let half = view_width / 2.0;
    if world_width <= view_width {
        return world_width / 2.0;
    }
    target_x.clamp(half, world_width - half)
}

fn camera_follow(
    time: Res<Time>,
    config: Res<CameraConfig>,
    game: Res<GameConfig>,
    tilemap: Res<Tilemap>,
    mut runtime: ResMut<CameraRuntimeState>,
    player_query: Query<&GamePosition, With<Player>>,
    windows: Query<&Window>,
) {
    let Ok(player) = player_query.get_single() else {
        return;
    };
    let mut target = Vec2::new(player.x, player.y);
    let current = runtime.base;

    if config.clamp_to_level {
        let view_width = windows.iter().next().map(|w| w.width()).unwrap_or(960.0);
        target.x = clamp_to_level(target.x, view_width, tilemap.world_width(game.tile_size));
    }
    if (target.x - current.x).abs() < config.deadzone.x {
        target.x = current.x;
    }
    if (target.y - current.y).abs() < config.deadzone.y {
        target.y = current.y;
    }

    let alpha = (config.follow_speed * time.delta_secs() * 60.0).clamp(0.0, 1.0);
    runtime.base = current.lerp(target, alpha);
}

fn camera_shake(
    time: Res<Time>,
    mut shake: ResMut<CameraShakeState>,
    runtime: Res<CameraRuntimeState>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(mut cam_transform) = camera_query.get_single_mut() else {
        return;
    };

    let mut offset = Vec2::ZERO;
    if shake.remaining > 0.0 && shake.intensity > 0.0 {
        shake.remaining = (shake.remaining - time.delta_secs()).max(0.0);
        let t = time.elapsed_secs();
        let life = if shake.duration > 0.0 {
            (shake.remaining / shake.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let strength = shake.intensity * life;
        offset.x = (t * 31.0).sin() * strength;
        offset.y = (t * 43.0).cos() * strength;
    }

    cam_transform.translation.x = runtime.base.x + offset.x;
    cam_transform.translation.y = runtime.base.y + offset.y;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_and_stomp_events_shake_the_camera() {
        let mut app = App::new();
        app.insert_resource(GameEventBus::default())
            .insert_resource(CameraShakeState::default())
            .insert_resource(CameraEventCursor::default())
            .add_systems(Update, shake_from_events);

        app.world_mut()
            .resource_mut::<GameEventBus>()
            .emit("player_died", serde_json::json!({"cause": "danger"}));
        app.update();

        let shake = app.world().resource::<CameraShakeState>().clone();
        assert!((shake.intensity - 12.0).abs() < 0.001);
        assert!((shake.remaining - 0.3).abs() < 0.001);

        app.world_mut().resource_mut::<CameraShakeState>().remaining = 0.0;
        app.update();
        assert_eq!(app.world().resource::<CameraShakeState>().remaining, 0.0);
    }

    #[test]
    fn camera_stays_inside_the_level() {
        assert_eq!(clamp_to_level(10.0, 960.0, 1536.0), 480.0);
        assert_eq!(clamp_to_level(1500.0, 960.0, 1536.0), 1056.0);
        assert_eq!(clamp_to_level(700.0, 960.0, 1536.0), 700.0);
        assert_eq!(clamp_to_level(100.0, 960.0, 640.0), 320.0);
    }
}
