use bevy::prelude::*;

use crate::bridge::{BridgeEvent, EventBridge};
use crate::components::HeadlessMode;
use crate::game_runtime::{PlaySession, Scene, SceneRequest};
use crate::render::theme_color;

const BUTTON_IDLE: Color = Color::srgb(0.16, 0.16, 0.22);
const BUTTON_HOVER: Color = Color::srgb(0.3, 0.3, 0.42);
const DEFAULT_HUD: &str = "#ffffff";

/// Root of whatever the current scene put on screen.
#[derive(Component)]
struct ScreenRoot;

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuButton {
    PlayLevels,
    AiLevel,
}

impl MenuButton {
    fn label(self) -> &'static str {
        match self {
            MenuButton::PlayLevels => "PLAY LEVELS",
            MenuButton::AiLevel => "AI LEVEL",
        }
    }
}

#[derive(Component)]
struct CoinsLabel;

#[derive(Component)]
struct LevelLabel;

pub fn coins_text(coins: u32) -> String {
    format!("COINS: {coins}")
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(Scene::MainMenu), spawn_menu)
            .add_systems(OnEnter(Scene::Play), spawn_hud)
            .add_systems(OnEnter(Scene::Lose), spawn_lose_screen)
            .add_systems(OnEnter(Scene::Win), spawn_win_screen)
            .add_systems(OnExit(Scene::MainMenu), despawn_screen)
            .add_systems(OnExit(Scene::Play), despawn_screen)
            .add_systems(OnExit(Scene::Lose), despawn_screen)
            .add_systems(OnExit(Scene::Win), despawn_screen)
            .add_systems(
                Update,
                (
                    menu_buttons.run_if(in_state(Scene::MainMenu)),
                    update_hud.run_if(in_state(Scene::Play)),
                ),
            );
    }
}

fn full_screen_column() -> Node {
    Node {
        width: Val::Percent(100.0),
        height: Val::Percent(100.0),
        position_type: PositionType::Absolute,
        flex_direction: FlexDirection::Column,
        align_items: AlignItems::Center,
        justify_content: JustifyContent::Center,
        row_gap: Val::Px(16.0),
        ..default()
    }
}

fn text(value: impl Into<String>, size: f32, color: Color) -> (Text, TextFont, TextColor) {
    (
        Text::new(value),
        TextFont {
            font_size: size,
            ..default()
        },
        TextColor(color),
    )
}

fn spawn_menu(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands
        .spawn((full_screen_column(), ScreenRoot))
        .with_children(|root| {
            root.spawn(text("MARKIE", 64.0, Color::WHITE));
            for button in [MenuButton::PlayLevels, MenuButton::AiLevel] {
                root.spawn((
                    Button,
                    button,
                    Node {
                        width: Val::Px(260.0),
                        height: Val::Px(56.0),
                        align_items: AlignItems::Center,
                        justify_content: JustifyContent::Center,
                        ..default()
                    },
                    BackgroundColor(BUTTON_IDLE),
                ))
                .with_children(|b| {
                    b.spawn(text(button.label(), 28.0, Color::WHITE));
                });
            }
        });
}

fn menu_buttons(
    mut buttons: Query<(&Interaction, &MenuButton, &mut BackgroundColor), Changed<Interaction>>,
    mut requests: EventWriter<SceneRequest>,
    bridge: Option<Res<EventBridge>>,
) {
    for (interaction, button, mut color) in buttons.iter_mut() {
        match interaction {
            Interaction::Pressed => match button {
                MenuButton::PlayLevels => {
                    requests.send(SceneRequest::PlayCampaign);
                }
                MenuButton::AiLevel => {
                    if let Some(bridge) = bridge.as_ref() {
                        bridge.emit(BridgeEvent::ShowAiPrompt);
                    }
                }
            },
            Interaction::Hovered => color.0 = BUTTON_HOVER,
            Interaction::None => color.0 = BUTTON_IDLE,
        }
    }
}

fn spawn_hud(mut commands: Commands, headless: Res<HeadlessMode>, session: Res<PlaySession>) {
    if headless.0 {
        return;
    }
    let hud = theme_color(
        session
            .current_level()
            .map(|l| l.hud_color.as_str())
            .unwrap_or(DEFAULT_HUD),
    );
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                justify_content: JustifyContent::SpaceBetween,
                padding: UiRect::all(Val::Px(16.0)),
                ..default()
            },
            ScreenRoot,
        ))
        .with_children(|root| {
            root.spawn((text(coins_text(session.run.coins), 32.0, hud), CoinsLabel));
            root.spawn((text(session.hud_label(), 32.0, hud), LevelLabel));
        });
}

fn update_hud(
    session: Res<PlaySession>,
    mut coins: Query<(&mut Text, &mut TextColor), (With<CoinsLabel>, Without<LevelLabel>)>,
    mut level: Query<(&mut Text, &mut TextColor), (With<LevelLabel>, Without<CoinsLabel>)>,
) {
    if !session.is_changed() {
        return;
    }
    let hud = session
        .current_level()
        .map(|l| theme_color(&l.hud_color))
        .unwrap_or(Color::WHITE);
    for (mut text, mut color) in coins.iter_mut() {
        text.0 = coins_text(session.run.coins);
        color.0 = hud;
    }
    for (mut text, mut color) in level.iter_mut() {
        text.0 = session.hud_label();
        color.0 = hud;
    }
}

fn spawn_end_screen(commands: &mut Commands, title: &str, coins: u32, hint: &str) {
    commands
        .spawn((full_screen_column(), ScreenRoot))
        .with_children(|root| {
            root.spawn(text(title, 64.0, Color::WHITE));
            root.spawn(text(coins_text(coins), 32.0, Color::WHITE));
            root.spawn(text(hint, 20.0, Color::srgb(0.8, 0.8, 0.8)));
        });
}

fn spawn_lose_screen(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    session: Res<PlaySession>,
) {
    if headless.0 {
        return;
    }
    spawn_end_screen(
        &mut commands,
        "YOU LOSE",
        session.run.coins,
        "ENTER to retry, ESC for menu",
    );
}

fn spawn_win_screen(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    session: Res<PlaySession>,
) {
    if headless.0 {
        return;
    }
    spawn_end_screen(
        &mut commands,
        "YOU WIN",
        session.run.coins,
        "ENTER to play again, ESC to leave",
    );
}

fn despawn_screen(mut commands: Commands, roots: Query<Entity, With<ScreenRoot>>) {
    for entity in roots.iter() {
        commands.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::RuntimeStatePlugin;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(bevy::state::app::StatesPlugin)
            .insert_resource(HeadlessMode(false))
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(UiPlugin);
        app.update();
        app
    }

    fn press(app: &mut App, which: MenuButton) {
        let world = app.world_mut();
        let mut query = world.query::<(Entity, &MenuButton)>();
        let entity = query
            .iter(world)
            .find(|(_, b)| **b == which)
            .map(|(e, _)| e)
            .expect("menu button");
        world.entity_mut(entity).insert(Interaction::Pressed);
    }

    #[test]
    fn play_levels_button_starts_the_campaign() {
        let mut app = app();
        press(&mut app, MenuButton::PlayLevels);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<State<Scene>>().get(), &Scene::Play);
        assert_eq!(app.world().resource::<PlaySession>().level_count(), 3);

        let world = app.world_mut();
        let mut labels = world.query_filtered::<&Text, With<CoinsLabel>>();
        let texts: Vec<String> = labels.iter(world).map(|t| t.0.clone()).collect();
        assert_eq!(texts, vec!["COINS: 0".to_string()]);
        let mut buttons = world.query::<&MenuButton>();
        assert_eq!(buttons.iter(world).count(), 0);
    }

    #[test]
    fn ai_level_button_asks_for_a_prompt() {
        let mut app = app();
        let bridge = EventBridge::new();
        let sub = bridge.subscribe();
        app.insert_resource(bridge);
        press(&mut app, MenuButton::AiLevel);
        app.update();
        assert_eq!(sub.drain(), vec![BridgeEvent::ShowAiPrompt]);
        assert_eq!(
            app.world().resource::<State<Scene>>().get(),
            &Scene::MainMenu
        );
    }
}
