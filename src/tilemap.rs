use bevy::prelude::*;
use serde::Serialize;

use crate::bridge::{BridgeEvent, EventBridge};
use crate::campaign::CAMPAIGN_SPAWN_TILE;
use crate::components::*;
use crate::game_runtime::{PlaySession, Scene};
use crate::level::{Level, TileKind, TileLegend};

/// Static collision grid for the level being played.
///
/// Rows are stored bottom-up so that tile `(x, y)` covers world
/// `[x * ts, (x + 1) * ts) x [y * ts, (y + 1) * ts)` with y pointing up.
#[derive(Resource, Clone, Default, Serialize)]
pub struct Tilemap {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<TileKind>,
    /// Spawn tile in grid coordinates, if the map carried a marker.
    pub spawn: Option<(i32, i32)>,
    /// Exit portal tile in grid coordinates, if present.
    pub exit: Option<(i32, i32)>,
}

impl Tilemap {
    /// Build the static grid. Dynamic tiles (enemies) and pickups are left out of
    /// the grid; they become entities via [`blueprints`]. Short rows are padded
    /// with empty space.
    pub fn from_level(level: &Level, legend: TileLegend) -> Self {
        let height = level.height();
        let width = level.width();
        let mut tiles = vec![TileKind::Empty; width * height];
        let mut spawn = None;
        let mut exit = None;

        for (col, row, ch) in level.cells() {
            let Some(kind) = TileKind::from_char(ch, legend) else {
                continue;
            };
            let y = (height - 1 - row) as i32;
            let x = col as i32;
            match kind {
                TileKind::Spawn => {
                    if spawn.is_none() {
                        spawn = Some((x, y));
                    }
                }
                TileKind::Portal => {
                    if exit.is_none() {
                        exit = Some((x, y));
                    }
                }
                _ => {}
            }
            if kind.is_solid() {
                tiles[y as usize * width + x as usize] = kind;
            }
        }

        Self {
            width,
            height,
            tiles,
            spawn,
            exit,
        }
    }

    pub fn get(&self, x: i32, y: i32) -> TileKind {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return TileKind::Empty;
        }
        self.tiles[y as usize * self.width + x as usize]
    }

    /// Remove a static tile from the grid (used when something breaks it).
    pub fn clear(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32 {
            self.tiles[y as usize * self.width + x as usize] = TileKind::Empty;
        }
    }

    pub fn world_width(&self, tile_size: f32) -> f32 {
        self.width as f32 * tile_size
    }

    pub fn world_height(&self, tile_size: f32) -> f32 {
        self.height as f32 * tile_size
    }

    /// Where the player starts: the spawn marker, the fixed campaign start
    /// point, or the top-left tile as a last resort.
    pub fn player_start(&self, legend: TileLegend, tile_size: f32) -> Vec2 {
        let (x, y) = match (self.spawn, legend) {
            (Some(spawn), _) => spawn,
            (None, TileLegend::Campaign) => {
                let (col, row) = CAMPAIGN_SPAWN_TILE;
                (col as i32, self.height as i32 - 1 - row as i32)
            }
            (None, TileLegend::Authored) => (0, self.height as i32 - 1),
        };
        Self::tile_center(x, y, tile_size)
    }

    /// World position (center) of a tile.
    pub fn tile_center(x: i32, y: i32, tile_size: f32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) * tile_size,
            (y as f32 + 0.5) * tile_size,
        )
    }
}

/// What to spawn for one tile of the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileBlueprint {
    pub kind: TileKind,
    pub tile: (i32, i32),
    pub position: (f32, f32),
    pub size: (f32, f32),
    pub solid: bool,
    pub tags: Vec<&'static str>,
}

/// Tile -> entity mapping for a level. Empty cells and spawn markers produce
/// nothing; every other legend character yields one blueprint.
pub fn blueprints(level: &Level, legend: TileLegend, tile_size: f32) -> Vec<TileBlueprint> {
    let height = level.height();
    level
        .cells()
        .filter_map(|(col, row, ch)| {
            let kind = TileKind::from_char(ch, legend)?;
            if matches!(kind, TileKind::Empty | TileKind::Spawn) {
                return None;
            }
            let tile = (col as i32, (height - 1 - row) as i32);
            let center = Tilemap::tile_center(tile.0, tile.1, tile_size);
            let size = match kind {
                TileKind::Coin => (tile_size * 0.5, tile_size * 0.5),
                TileKind::Enemy => (tile_size * 0.75, tile_size * 0.75),
                TileKind::Portal => (tile_size * 0.5, tile_size * 0.75),
                TileKind::Spike => (tile_size, tile_size * 0.5),
                _ => (tile_size, tile_size),
            };
            Some(TileBlueprint {
                kind,
                tile,
                position: (center.x, center.y),
                size,
                solid: kind.is_solid(),
                tags: kind.tags().to_vec(),
            })
        })
        .collect()
}

/// Generation of [`PlaySession`] whose level is currently spawned.
#[derive(Resource, Default)]
pub struct LoadedLevel(pub Option<u64>);

/// True once the entities for the session's current generation exist.
pub fn level_spawned(session: Option<Res<PlaySession>>, loaded: Option<Res<LoadedLevel>>) -> bool {
    match (session, loaded) {
        (Some(session), Some(loaded)) => loaded.0 == Some(session.generation),
        _ => false,
    }
}

pub struct TilemapPlugin;

impl Plugin for TilemapPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Tilemap::default())
            .insert_resource(LoadedLevel::default())
            .add_systems(Update, load_current_level.run_if(in_state(Scene::Play)))
            .add_systems(OnExit(Scene::Play), unload_level);
    }
}

/// (Re)spawn the session's current level whenever its generation moves on.
pub fn load_current_level(
    mut commands: Commands,
    session: Res<PlaySession>,
    mut loaded: ResMut<LoadedLevel>,
    mut tilemap: ResMut<Tilemap>,
    config: Res<GameConfig>,
    headless: Res<HeadlessMode>,
    existing: Query<Entity, With<LevelEntity>>,
    bridge: Option<Res<EventBridge>>,
) {
    if loaded.0 == Some(session.generation) {
        return;
    }
    let Some(level) = session.current_level() else {
        return;
    };
    for entity in existing.iter() {
        commands.entity(entity).despawn_recursive();
    }

    let ts = config.tile_size;
    let legend = session.legend();
    *tilemap = Tilemap::from_level(level, legend);

    let bps = blueprints(level, legend, ts);
    for bp in &bps {
        let mut entity = commands.spawn((
            LevelEntity,
            TileBody {
                kind: bp.kind,
                tile: bp.tile,
            },
            GamePosition {
                x: bp.position.0,
                y: bp.position.1,
            },
            Collider {
                width: bp.size.0,
                height: bp.size.1,
            },
            Transform::from_xyz(bp.position.0, bp.position.1, 1.0),
        ));
        match bp.kind {
            TileKind::Enemy => {
                entity.insert((
                    Velocity::default(),
                    Grounded(false),
                    GravityBody::default(),
                    StepContacts::default(),
                    Patrol {
                        speed: config.enemy_speed,
                        dir: 1.0,
                    },
                ));
            }
            TileKind::Prize => {
                entity.insert(PrizeBox);
            }
            _ => {}
        }
        if !headless.0 {
            entity.insert(Sprite::from_color(
                crate::render::tile_color(bp.kind, level),
                Vec2::new(bp.size.0, bp.size.1),
            ));
        }
    }

    let start = tilemap.player_start(legend, ts);
    crate::player::spawn_player(&mut commands, start, &config, headless.0);

    loaded.0 = Some(session.generation);
    info!(
        "[Markie runtime] Loaded level {} ({}x{}, {} entities)",
        session.level_index + 1,
        tilemap.width,
        tilemap.height,
        bps.len()
    );
    if let Some(bridge) = bridge {
        bridge.emit(BridgeEvent::LevelReady);
    }
}

fn unload_level(
    mut commands: Commands,
    mut loaded: ResMut<LoadedLevel>,
    existing: Query<Entity, With<LevelEntity>>,
) {
    for entity in existing.iter() {
        commands.entity(entity).despawn_recursive();
    }
    loaded.0 = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(rows: &[&str]) -> Level {
        let mut level = Level::default_for_theme("jungle");
        level.level_map = rows.iter().map(|r| r.to_string()).collect();
        level
    }

    #[test]
    fn grid_is_stored_bottom_up() {
        let lvl = level(&["@  !", " -  ", "===="]);
        let map = Tilemap::from_level(&lvl, TileLegend::Authored);
        assert_eq!(map.width, 4);
        assert_eq!(map.height, 3);
        assert_eq!(map.get(0, 0), TileKind::Grass);
        assert_eq!(map.get(1, 1), TileKind::Steel);
        assert_eq!(map.get(0, 2), TileKind::Empty);
        assert_eq!(map.spawn, Some((0, 2)));
        assert_eq!(map.exit, Some((3, 2)));
        assert_eq!(map.get(-1, 0), TileKind::Empty);
        assert_eq!(map.get(4, 0), TileKind::Empty);
    }

    #[test]
    fn blueprints_skip_empty_and_spawn() {
        let lvl = level(&["@ $>", "%^!-", "===="]);
        let bps = blueprints(&lvl, TileLegend::Authored, 64.0);
        assert_eq!(bps.len(), 10);
        assert!(bps.iter().all(|b| b.kind != TileKind::Spawn));
        let coin = bps.iter().find(|b| b.kind == TileKind::Coin).expect("coin");
        assert_eq!(coin.tile, (2, 2));
        assert_eq!(coin.position, (160.0, 160.0));
        assert_eq!(coin.tags, vec!["coin"]);
        assert!(!coin.solid);
        let spike = bps.iter().find(|b| b.kind == TileKind::Spike).expect("spike");
        assert!(spike.solid);
        assert_eq!(spike.tags, vec!["danger"]);
    }

    #[test]
    fn campaign_legend_turns_at_sign_into_portal() {
        let lvl = level(&["  0@", "===="]);
        let map = Tilemap::from_level(&lvl, TileLegend::Campaign);
        assert_eq!(map.spawn, None);
        assert_eq!(map.exit, Some((3, 1)));
        assert_eq!(map.get(2, 1), TileKind::Bag);
    }

    #[test]
    fn player_start_prefers_spawn_marker() {
        let lvl = level(&["   ", " @ ", "==="]);
        let map = Tilemap::from_level(&lvl, TileLegend::Authored);
        assert_eq!(map.player_start(TileLegend::Authored, 64.0), Vec2::new(96.0, 96.0));

        let campaign = level(&["   @", "===="]);
        let map = Tilemap::from_level(&campaign, TileLegend::Campaign);
        assert_eq!(map.player_start(TileLegend::Campaign, 64.0), Vec2::new(96.0, 96.0));
    }

    #[test]
    fn ragged_rows_are_padded() {
        let lvl = level(&["@", "===="]);
        let map = Tilemap::from_level(&lvl, TileLegend::Authored);
        assert_eq!(map.width, 4);
        assert_eq!(map.get(3, 1), TileKind::Empty);
        assert_eq!(map.get(3, 0), TileKind::Grass);
    }
}
