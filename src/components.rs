use bevy::prelude::*;

use crate::level::TileKind;
use crate::physics_core::MotionHits;

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Anything spawned for the level being played; despawned on reload or when
/// leaving the Play scene.
#[derive(Component)]
pub struct LevelEntity;

/// Entity created from a level tile (static or dynamic).
#[derive(Component, Clone, Copy)]
pub struct TileBody {
    pub kind: TileKind,
    pub tile: (i32, i32),
}

/// Sub-tile precision position (world units, y up, tile (0,0) at bottom-left)
#[derive(Component, Clone, Copy, Default, Debug, PartialEq)]
pub struct GamePosition {
    pub x: f32,
    pub y: f32,
}

/// Velocity in world units per second
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Component, Clone, Copy)]
pub struct Collider {
    pub width: f32,
    pub height: f32,
}

/// Whether the entity is on the ground
#[derive(Component, Clone, Copy, Default)]
pub struct Grounded(pub bool);

/// Affected by gravity; `scale` multiplies the configured gravity.
#[derive(Component, Clone, Copy)]
pub struct GravityBody {
    pub scale: f32,
}

impl Default for GravityBody {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Where the body was before the last physics step and what it bumped into.
#[derive(Component, Clone, Copy, Default)]
pub struct StepContacts {
    pub prev: Vec2,
    pub hits: MotionHits,
}

/// Walks left and right, reversing when blocked sideways.
#[derive(Component, Clone, Copy)]
pub struct Patrol {
    pub speed: f32,
    pub dir: f32,
}

/// Prize box that releases an apple when headbutted.
#[derive(Component, Clone, Copy, Default)]
pub struct PrizeBox;

/// Temporary growth granted by an apple.
#[derive(Component, Clone, Copy, Default)]
pub struct Big {
    pub timer: f32,
    pub dest_scale: f32,
    pub scale: f32,
}

impl Big {
    pub fn new() -> Self {
        Self {
            timer: 0.0,
            dest_scale: 1.0,
            scale: 1.0,
        }
    }

    pub fn is_big(&self) -> bool {
        self.timer > 0.0
    }

    pub fn biggify(&mut self, seconds: f32) {
        self.dest_scale = 2.0;
        self.timer = seconds;
    }

    pub fn smallify(&mut self) {
        self.dest_scale = 1.0;
        self.timer = 0.0;
    }

    /// Count down the growth timer and ease the scale towards its target.
    pub fn tick(&mut self, dt: f32) {
        if self.timer > 0.0 {
            self.timer -= dt;
            if self.timer <= 0.0 {
                self.smallify();
            }
        }
        let t = (dt * 6.0).clamp(0.0, 1.0);
        self.scale += (self.dest_scale - self.scale) * t;
    }
}

/// Headless mode flag
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Physics and feel constants (as a resource so they can be tuned)
#[derive(Resource, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GameConfig {
    pub tile_size: f32,
    pub gravity: f32,
    pub jump_force: f32,
    pub move_speed: f32,
    /// Distance below the top of the map at which a falling player dies.
    pub fall_death: f32,
    pub enemy_speed: f32,
    pub stomp_bounce: f32,
    pub fast_fall_scale: f32,
    pub big_seconds: f32,
    pub player_width: f32,
    pub player_height: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_size: 64.0,
            gravity: 3200.0,
            jump_force: 1320.0,
            move_speed: 480.0,
            fall_death: 2400.0,
            enemy_speed: 60.0,
            stomp_bounce: 1.5,
            fast_fall_scale: 3.0,
            big_seconds: 3.0,
            player_width: 40.0,
            player_height: 48.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_wears_off_after_timer() {
        let mut big = Big::new();
        big.biggify(3.0);
        assert!(big.is_big());
        for _ in 0..120 {
            big.tick(1.0 / 60.0);
        }
        assert!(big.is_big());
        assert!(big.scale > 1.5);
        for _ in 0..70 {
            big.tick(1.0 / 60.0);
        }
        assert!(!big.is_big());
        assert_eq!(big.dest_scale, 1.0);
    }
}
