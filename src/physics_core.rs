use crate::level::TileKind;
use crate::tilemap::Tilemap;

/// Maximum downward velocity to prevent tunneling through floors at extreme speeds.
pub const MAX_FALL_SPEED: f32 = 3000.0;

const SKIN: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self {
            min_x: x - hw,
            min_y: y - hh,
            max_x: x + hw,
            max_y: y + hh,
        }
    }

    pub fn tile(tx: i32, ty: i32, tile_size: f32) -> Self {
        let x = tx as f32 * tile_size;
        let y = ty as f32 * tile_size;
        Self {
            min_x: x,
            min_y: y,
            max_x: x + tile_size,
            max_y: y + tile_size,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.max_x > other.min_x
            && self.min_x < other.max_x
            && self.max_y > other.min_y
            && self.min_y < other.max_y
    }

    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) * 0.5
    }
}

/// Which side of the moving body the contact happened on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactSide {
    /// The mover's feet touched the other body (it landed on top of it).
    Bottom,
    /// The mover's head touched the other body.
    Top,
    Left,
    Right,
}

/// Classify a contact between a moving body and another body using the mover's
/// box from the previous step.
pub fn classify_contact(mover_prev: &Aabb, other: &Aabb) -> ContactSide {
    const TOLERANCE: f32 = 4.0;
    if mover_prev.min_y >= other.max_y - TOLERANCE {
        ContactSide::Bottom
    } else if mover_prev.max_y <= other.min_y + TOLERANCE {
        ContactSide::Top
    } else if mover_prev.center_x() < other.center_x() {
        ContactSide::Right
    } else {
        ContactSide::Left
    }
}

#[derive(Clone, Copy)]
pub struct MotionParams {
    pub tile_size: f32,
    pub dt: f32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct MotionHits {
    pub left: bool,
    pub right: bool,
    pub floor: bool,
    /// Static tile bumped by the mover's head, if any.
    pub ceiling: Option<(i32, i32)>,
}

#[derive(Clone, Copy, Debug)]
pub struct MotionResult {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hits: MotionHits,
}

pub fn apply_gravity(vy: &mut f32, grounded: bool, gravity: f32, dt: f32) {
    if grounded && *vy <= 0.0 {
        *vy = 0.0;
        return;
    }
    *vy -= gravity * dt;
    *vy = vy.max(-MAX_FALL_SPEED);
}

pub fn horizontal_velocity(left: bool, right: bool, speed: f32) -> f32 {
    let mut dir = 0.0;
    if left {
        dir -= 1.0;
    }
    if right {
        dir += 1.0;
    }
    dir * speed
}

/// Jump only from the ground. Returns true when the jump happened.
pub fn try_jump(grounded: bool, jump_pressed: bool, jump_force: f32, vy: &mut f32) -> bool {
    if grounded && jump_pressed {
        *vy = jump_force;
        return true;
    }
    false
}

/// Whether `tile` blocks a body that occupied `prev` and is rising or not.
/// Grass lets rising bodies through, and never traps a body that already
/// overlapped it.
fn blocks(kind: TileKind, tile_box: &Aabb, prev: &Aabb, rising: bool) -> bool {
    if !kind.is_solid() {
        return false;
    }
    if kind.is_jump_through() {
        return !rising && !prev.overlaps(tile_box);
    }
    true
}

/// First blocking tile overlapping `aabb`, scanning bottom-up.
fn first_blocking(
    tilemap: &Tilemap,
    aabb: &Aabb,
    prev: &Aabb,
    rising: bool,
    tile_size: f32,
) -> Option<(i32, i32)> {
    let min_tx = (aabb.min_x / tile_size).floor() as i32;
    let max_tx = ((aabb.max_x - SKIN) / tile_size).floor() as i32;
    let min_ty = (aabb.min_y / tile_size).floor() as i32;
    let max_ty = ((aabb.max_y - SKIN) / tile_size).floor() as i32;

    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            let kind = tilemap.get(tx, ty);
            let tile_box = Aabb::tile(tx, ty, tile_size);
            if blocks(kind, &tile_box, prev, rising) && aabb.overlaps(&tile_box) {
                return Some((tx, ty));
            }
        }
    }
    None
}

/// Move a box through the tile grid, resolving X then Y (separate axis).
pub fn resolve_motion(tilemap: &Tilemap, params: MotionParams) -> MotionResult {
    let MotionParams {
        tile_size,
        dt,
        x,
        y,
        vx,
        vy,
        width,
        height,
    } = params;
    let mut out_x = x;
    let mut out_y = y;
    let mut out_vx = vx;
    let mut out_vy = vy;
    let mut hits = MotionHits::default();
    let rising = vy > 0.0;

    let dx = vx * dt;
    let dy = vy * dt;

    let prev = Aabb::from_center(x, y, width, height);
    let new_x = out_x + dx;
    let x_aabb = Aabb::from_center(new_x, out_y, width, height);
    match first_blocking(tilemap, &x_aabb, &prev, rising, tile_size) {
        None => out_x = new_x,
        Some(_) => {
            if dx > 0.0 {
                let tile_x = ((x_aabb.max_x - SKIN) / tile_size).floor() as i32;
                out_x = tile_x as f32 * tile_size - width / 2.0 - SKIN;
                hits.right = true;
            } else if dx < 0.0 {
                let tile_x = (x_aabb.min_x / tile_size).floor() as i32;
                out_x = (tile_x + 1) as f32 * tile_size + width / 2.0 + SKIN;
                hits.left = true;
            }
            out_vx = 0.0;
        }
    }

    let prev = Aabb::from_center(out_x, y, width, height);
    let new_y = out_y + dy;
    let y_aabb = Aabb::from_center(out_x, new_y, width, height);
    match first_blocking(tilemap, &y_aabb, &prev, rising, tile_size) {
        None => out_y = new_y,
        Some(tile) => {
            if dy < 0.0 {
                let tile_y = (y_aabb.min_y / tile_size).floor() as i32;
                out_y = (tile_y + 1) as f32 * tile_size + height / 2.0;
                hits.floor = true;
            } else if dy > 0.0 {
                let tile_y = ((y_aabb.max_y - SKIN) / tile_size).floor() as i32;
                out_y = tile_y as f32 * tile_size - height / 2.0 - SKIN;
                hits.ceiling = Some(tile);
            }
            out_vy = 0.0;
        }
    }

    MotionResult {
        x: out_x,
        y: out_y,
        vx: out_vx,
        vy: out_vy,
        hits,
    }
}

/// Probe just below the feet for something to stand on.
pub fn compute_grounded(
    tilemap: &Tilemap,
    tile_size: f32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> bool {
    let check_y = y - height / 2.0 - 0.5;
    let left_x = x - width / 2.0 + 1.0;
    let right_x = x + width / 2.0 - 1.0;

    let left_tile_x = (left_x / tile_size).floor() as i32;
    let right_tile_x = (right_x / tile_size).floor() as i32;
    let tile_y = (check_y / tile_size).floor() as i32;
    let feet = y - height / 2.0;

    (left_tile_x..=right_tile_x).any(|tx| {
        let kind = tilemap.get(tx, tile_y);
        if kind.is_jump_through() {
            let top = (tile_y + 1) as f32 * tile_size;
            return feet >= top - 1.0;
        }
        kind.is_solid()
    })
}

/// First static tile of `target` kind touching the box (within `margin`).
pub fn touching_tile(
    tilemap: &Tilemap,
    aabb: &Aabb,
    target: TileKind,
    margin: f32,
    tile_size: f32,
) -> Option<(i32, i32)> {
    let probe = aabb.expand(margin);
    let min_tx = (probe.min_x / tile_size).floor() as i32;
    let max_tx = ((probe.max_x - SKIN) / tile_size).floor() as i32;
    let min_ty = (probe.min_y / tile_size).floor() as i32;
    let max_ty = ((probe.max_y - SKIN) / tile_size).floor() as i32;

    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            if tilemap.get(tx, ty) == target && probe.overlaps(&Aabb::tile(tx, ty, tile_size)) {
                return Some((tx, ty));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Level, TileLegend};

    const TS: f32 = 64.0;

    fn map(rows: &[&str]) -> Tilemap {
        let mut level = Level::default_for_theme("jungle");
        level.level_map = rows.iter().map(|r| r.to_string()).collect();
        Tilemap::from_level(&level, TileLegend::Authored)
    }

    fn params(x: f32, y: f32, vx: f32, vy: f32) -> MotionParams {
        MotionParams {
            tile_size: TS,
            dt: 1.0 / 60.0,
            x,
            y,
            vx,
            vy,
            width: 40.0,
            height: 48.0,
        }
    }

    #[test]
    fn falling_body_lands_on_grass() {
        let tm = map(&["    ", "    ", "===="]);
        // Feet slightly above the grass top (y = 64).
        let out = resolve_motion(&tm, params(96.0, 64.0 + 24.0 + 2.0, 0.0, -600.0));
        assert!(out.hits.floor);
        assert_eq!(out.vy, 0.0);
        assert!((out.y - (64.0 + 24.0)).abs() < 0.001);
        assert!(compute_grounded(&tm, TS, out.x, out.y, 40.0, 48.0));
    }

    #[test]
    fn rising_body_passes_through_grass_but_not_steel() {
        let grass = map(&["    ", " == ", "    ", "----"]);
        let below = 64.0 + 64.0 - 24.0 - 1.0; // head just under the grass row
        let out = resolve_motion(&grass, params(96.0, below, 0.0, 900.0));
        assert!(out.hits.ceiling.is_none());
        assert!(out.y > below);

        let steel = map(&["    ", " -- ", "    ", "----"]);
        let out = resolve_motion(&steel, params(96.0, below, 0.0, 900.0));
        assert_eq!(out.hits.ceiling, Some((1, 2)));
        assert_eq!(out.vy, 0.0);
    }

    #[test]
    fn walls_stop_horizontal_motion() {
        let tm = map(&["   -", "   -", "----"]);
        let out = resolve_motion(&tm, params(170.0, 64.0 + 24.0 + 0.5, 600.0, 0.0));
        assert!(out.hits.right);
        assert_eq!(out.vx, 0.0);
        assert!(out.x + 20.0 <= 192.0);
    }

    #[test]
    fn gravity_is_clamped() {
        let mut vy = -2990.0;
        apply_gravity(&mut vy, false, 3200.0, 1.0 / 60.0);
        assert_eq!(vy, -MAX_FALL_SPEED);
        let mut grounded_vy = -10.0;
        apply_gravity(&mut grounded_vy, true, 3200.0, 1.0 / 60.0);
        assert_eq!(grounded_vy, 0.0);
    }

    #[test]
    fn jump_requires_ground() {
        let mut vy = 0.0;
        assert!(!try_jump(false, true, 1320.0, &mut vy));
        assert_eq!(vy, 0.0);
        assert!(try_jump(true, true, 1320.0, &mut vy));
        assert_eq!(vy, 1320.0);
    }

    #[test]
    fn contact_sides_follow_previous_position() {
        let enemy = Aabb::from_center(100.0, 100.0, 48.0, 48.0);
        let above = Aabb::from_center(100.0, 150.0, 40.0, 48.0);
        assert_eq!(classify_contact(&above, &enemy), ContactSide::Bottom);
        let beside = Aabb::from_center(60.0, 100.0, 40.0, 48.0);
        assert_eq!(classify_contact(&beside, &enemy), ContactSide::Right);
        let other_side = Aabb::from_center(140.0, 100.0, 40.0, 48.0);
        assert_eq!(classify_contact(&other_side, &enemy), ContactSide::Left);
        let below = Aabb::from_center(100.0, 52.0, 40.0, 48.0);
        assert_eq!(classify_contact(&below, &enemy), ContactSide::Top);
    }

    #[test]
    fn spike_contact_is_detected_from_the_side() {
        let tm = map(&["    ", "  ^ ", "===="]);
        let player = Aabb::from_center(128.0 - 20.0 - 0.5, 96.0, 40.0, 48.0);
        assert_eq!(touching_tile(&tm, &player, TileKind::Spike, 1.0, TS), Some((2, 1)));
        let far = Aabb::from_center(40.0, 96.0, 40.0, 48.0);
        assert_eq!(touching_tile(&tm, &far, TileKind::Spike, 1.0, TS), None);
    }
}
