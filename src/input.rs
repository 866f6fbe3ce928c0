use bevy::prelude::*;
use bevy::window::{MonitorSelection, PrimaryWindow, WindowMode};
use std::collections::HashSet;

use crate::game_runtime::{Scene, SceneRequest};

/// Stick deflection needed before it counts as a direction.
const STICK_DEADZONE: f32 = 0.35;

/// Abstraction layer between raw input and game systems.
/// Keyboard and gamepads (windowed) or API-driven tests (headless) write to this.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    pub active: HashSet<String>,
    pub just_pressed: HashSet<String>,
    pub just_released: HashSet<String>,
}

impl VirtualInput {
    pub fn pressed(&self, action: &str) -> bool {
        self.active.contains(action)
    }

    pub fn just_pressed(&self, action: &str) -> bool {
        self.just_pressed.contains(action)
    }

    pub fn press(&mut self, action: &str) {
        if self.active.insert(action.to_string()) {
            self.just_pressed.insert(action.to_string());
        }
    }

    pub fn release(&mut self, action: &str) {
        if self.active.remove(action) {
            self.just_released.insert(action.to_string());
        }
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_systems(
                PreUpdate,
                (
                    devices_to_virtual,
                    input_to_scene_requests,
                    toggle_fullscreen.run_if(any_with_component::<PrimaryWindow>),
                )
                    .chain()
                    .before(crate::game_runtime::apply_scene_requests),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

const KEY_BINDINGS: &[(&str, &[KeyCode])] = &[
    ("left", &[KeyCode::KeyA, KeyCode::ArrowLeft]),
    ("right", &[KeyCode::KeyD, KeyCode::ArrowRight]),
    ("jump", &[KeyCode::Space, KeyCode::KeyW, KeyCode::ArrowUp]),
    ("down", &[KeyCode::KeyS, KeyCode::ArrowDown]),
    ("escape", &[KeyCode::Escape]),
    ("fullscreen", &[KeyCode::KeyF]),
    ("confirm", &[KeyCode::Enter, KeyCode::Space]),
];

/// Translate keyboard and gamepad state to VirtualInput action names.
/// Without any device resource (headless) the actions are left to whoever
/// drives the world.
fn devices_to_virtual(
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    gamepads: Query<&Gamepad>,
    mut vinput: ResMut<VirtualInput>,
) {
    if keyboard.is_none() && gamepads.is_empty() {
        return;
    }

    let mut held: HashSet<&'static str> = HashSet::new();
    if let Some(keyboard) = keyboard.as_ref() {
        for (action, keys) in KEY_BINDINGS {
            if keyboard.any_pressed(keys.iter().copied()) {
                held.insert(*action);
            }
        }
    }
    for gamepad in gamepads.iter() {
        let stick = gamepad.left_stick();
        if stick.x < -STICK_DEADZONE || gamepad.pressed(GamepadButton::DPadLeft) {
            held.insert("left");
        }
        if stick.x > STICK_DEADZONE || gamepad.pressed(GamepadButton::DPadRight) {
            held.insert("right");
        }
        if stick.y < -STICK_DEADZONE || gamepad.pressed(GamepadButton::DPadDown) {
            held.insert("down");
        }
        if gamepad.pressed(GamepadButton::South) {
            held.insert("jump");
            held.insert("confirm");
        }
        if gamepad.pressed(GamepadButton::Start) {
            held.insert("escape");
        }
    }

    let released: Vec<String> = vinput
        .active
        .iter()
        .filter(|a| !held.contains(a.as_str()))
        .cloned()
        .collect();
    for action in released {
        vinput.release(&action);
    }
    for action in held {
        vinput.press(action);
    }
}

fn input_to_scene_requests(
    vinput: Res<VirtualInput>,
    scene: Res<State<Scene>>,
    mut requests: EventWriter<SceneRequest>,
) {
    let scene = *scene.get();
    if vinput.just_pressed("escape") && scene != Scene::MainMenu {
        requests.send(SceneRequest::Escape);
    } else if vinput.just_pressed("confirm") && matches!(scene, Scene::Lose | Scene::Win) {
        requests.send(SceneRequest::Retry);
    }
}

fn toggle_fullscreen(
    vinput: Res<VirtualInput>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
) {
    if !vinput.just_pressed("fullscreen") {
        return;
    }
    for mut window in windows.iter_mut() {
        window.mode = match window.mode {
            WindowMode::Windowed => WindowMode::BorderlessFullscreen(MonitorSelection::Current),
            _ => WindowMode::Windowed,
        };
    }
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.just_pressed.clear();
    vinput.just_released.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::RuntimeStatePlugin;

    #[test]
    fn press_and_release_track_edges() {
        let mut input = VirtualInput::default();
        input.press("jump");
        assert!(input.pressed("jump"));
        assert!(input.just_pressed("jump"));
        input.just_pressed.clear();
        input.press("jump");
        assert!(!input.just_pressed("jump"));
        input.release("jump");
        assert!(!input.pressed("jump"));
        assert!(input.just_released.contains("jump"));
    }

    #[test]
    fn escape_leaves_play_for_the_menu() {
        let mut app = App::new();
        app.add_plugins(bevy::state::app::StatesPlugin)
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(InputPlugin);
        app.update();
        app.world_mut().send_event(SceneRequest::PlayCampaign);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<State<Scene>>().get(), &Scene::Play);

        app.world_mut()
            .resource_mut::<VirtualInput>()
            .press("escape");
        app.update();
        app.update();
        assert_eq!(
            app.world().resource::<State<Scene>>().get(),
            &Scene::MainMenu
        );
    }
}
