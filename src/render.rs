use bevy::prelude::*;

use crate::components::*;
use crate::game_runtime::{PlaySession, Scene};
use crate::level::{Level, Rgb, TileKind};

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                sync_game_position_to_transform,
                sync_big_scale,
                apply_theme_background.run_if(in_state(Scene::Play)),
            ),
        )
        .add_systems(OnEnter(Scene::MainMenu), reset_background);
    }
}

const MENU_BACKGROUND: &str = "#8db7ff";

/// Parse a level color, falling back to magenta so broken themes are visible.
pub fn theme_color(hex: &str) -> Color {
    match Rgb::parse_hex(hex) {
        Some(rgb) => Color::srgb_u8(rgb.r, rgb.g, rgb.b),
        None => Color::srgb(1.0, 0.0, 1.0),
    }
}

pub fn tile_color(kind: TileKind, level: &Level) -> Color {
    match kind {
        TileKind::Grass => theme_color(level.effective_platform_tint()),
        TileKind::Steel => theme_color(level.effective_platform_tint()).mix(&Color::srgb(0.6, 0.6, 0.65), 0.6),
        TileKind::Bag => Color::srgb(0.55, 0.38, 0.2),
        TileKind::Coin => Color::srgb(1.0, 0.84, 0.0),
        TileKind::Prize => theme_color(&level.accent_color),
        TileKind::Spike => Color::srgb(0.85, 0.15, 0.15),
        TileKind::Enemy => Color::srgba(0.95, 0.95, 1.0, 0.85),
        TileKind::Apple => Color::srgb(0.9, 0.1, 0.2),
        TileKind::Portal => theme_color(&level.accent_color).mix(&Color::WHITE, 0.3),
        TileKind::Spawn | TileKind::Empty => Color::NONE,
    }
}

/// Sync GamePosition → Transform for all entities that have both
fn sync_game_position_to_transform(
    mut query: Query<(&GamePosition, &mut Transform), Changed<GamePosition>>,
) {
    for (pos, mut transform) in query.iter_mut() {
        transform.translation.x = pos.x;
        transform.translation.y = pos.y;
    }
}

fn sync_big_scale(mut query: Query<(&Big, &mut Transform), Changed<Big>>) {
    for (big, mut transform) in query.iter_mut() {
        transform.scale = Vec3::new(big.scale, big.scale, 1.0);
    }
}

fn apply_theme_background(session: Res<PlaySession>, clear: Option<ResMut<ClearColor>>) {
    if !session.is_changed() {
        return;
    }
    let (Some(level), Some(mut clear)) = (session.current_level(), clear) else {
        return;
    };
    clear.0 = theme_color(&level.background_color);
}

fn reset_background(clear: Option<ResMut<ClearColor>>) {
    if let Some(mut clear) = clear {
        clear.0 = theme_color(MENU_BACKGROUND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_colors_parse_level_hex() {
        let c = theme_color("#ff0000").to_srgba();
        assert!((c.red - 1.0).abs() < 1e-4);
        assert!(c.green.abs() < 1e-4);
        let fallback = theme_color("red").to_srgba();
        assert!((fallback.blue - 1.0).abs() < 1e-4);
    }

    #[test]
    fn grass_uses_platform_tint_when_present() {
        let mut level = Level::default_for_theme("jungle");
        level.platform_tint = Some("#00ff00".to_string());
        let grass = tile_color(TileKind::Grass, &level).to_srgba();
        assert!((grass.green - 1.0).abs() < 1e-4);
        assert!(grass.red.abs() < 1e-4);
    }
}
