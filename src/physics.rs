use bevy::prelude::*;

use crate::components::*;
use crate::game_runtime::gameplay_active;
use crate::physics_core::{self, MotionParams};
use crate::tilemap::{level_spawned, Tilemap};

/// Order of one fixed simulation step.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepSet {
    /// Input turned into velocities.
    Control,
    Physics,
    /// Contacts turned into gameplay reactions.
    Reactions,
}

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            FixedUpdate,
            (StepSet::Control, StepSet::Physics, StepSet::Reactions)
                .chain()
                .run_if(gameplay_active)
                .run_if(level_spawned),
        )
        .add_systems(
            FixedUpdate,
            (apply_gravity, patrol, move_bodies, check_grounded)
                .chain()
                .in_set(StepSet::Physics),
        );
    }
}

fn body_size(collider: &Collider, big: Option<&Big>) -> (f32, f32) {
    let scale = big.map(|b| b.scale).unwrap_or(1.0);
    (collider.width * scale, collider.height * scale)
}

fn apply_gravity(
    config: Res<GameConfig>,
    time: Res<Time<Fixed>>,
    mut query: Query<(&mut Velocity, &Grounded, &GravityBody)>,
) {
    let dt = time.delta_secs();
    for (mut vel, grounded, body) in query.iter_mut() {
        physics_core::apply_gravity(&mut vel.y, grounded.0, config.gravity * body.scale, dt);
    }
}

/// Walk in the current direction, turning around after bumping into a wall.
fn patrol(mut query: Query<(&mut Velocity, &mut Patrol, &StepContacts)>) {
    for (mut vel, mut patrol, contacts) in query.iter_mut() {
        if contacts.hits.left {
            patrol.dir = 1.0;
        } else if contacts.hits.right {
            patrol.dir = -1.0;
        }
        vel.x = patrol.dir * patrol.speed;
    }
}

fn move_bodies(
    config: Res<GameConfig>,
    time: Res<Time<Fixed>>,
    tilemap: Res<Tilemap>,
    mut query: Query<(
        &mut GamePosition,
        &mut Velocity,
        &Collider,
        &mut StepContacts,
        Option<&Big>,
    )>,
) {
    let dt = time.delta_secs();
    for (mut pos, mut vel, collider, mut contacts, big) in query.iter_mut() {
        let (width, height) = body_size(collider, big);
        let out = physics_core::resolve_motion(
            &tilemap,
            MotionParams {
                tile_size: config.tile_size,
                dt,
                x: pos.x,
                y: pos.y,
                vx: vel.x,
                vy: vel.y,
                width,
                height,
            },
        );
        contacts.prev = Vec2::new(pos.x, pos.y);
        contacts.hits = out.hits;
        pos.x = out.x;
        pos.y = out.y;
        vel.x = out.vx;
        vel.y = out.vy;
    }
}

fn check_grounded(
    config: Res<GameConfig>,
    tilemap: Res<Tilemap>,
    mut query: Query<(&GamePosition, &Velocity, &Collider, &mut Grounded, Option<&Big>)>,
) {
    for (pos, vel, collider, mut grounded, big) in query.iter_mut() {
        let (width, height) = body_size(collider, big);
        let on_ground = vel.y <= 0.0
            && physics_core::compute_grounded(
                &tilemap,
                config.tile_size,
                pos.x,
                pos.y,
                width,
                height,
            );
        if grounded.0 != on_ground {
            grounded.0 = on_ground;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::{PlaySession, RuntimeStatePlugin, Scene, SceneRequest};
    use crate::level::{Level, TileLegend};
    use crate::tilemap::LoadedLevel;
    use std::time::Duration;

    fn world_with(rows: &[&str]) -> App {
        let mut level = Level::default_for_theme("jungle");
        level.level_map = rows.iter().map(|r| r.to_string()).collect();
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(bevy::state::app::StatesPlugin)
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(PhysicsPlugin)
            .insert_resource(GameConfig::default())
            .insert_resource(Tilemap::from_level(&level, TileLegend::Authored))
            .insert_resource(Time::<Fixed>::from_hz(60.0));
        app.world_mut().send_event(SceneRequest::PlayCampaign);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<State<Scene>>().get(), &Scene::Play);
        let generation = app.world().resource::<PlaySession>().generation;
        app.insert_resource(LoadedLevel(Some(generation)));
        app
    }

    fn step(app: &mut App, steps: usize) {
        for _ in 0..steps {
            app.world_mut()
                .resource_mut::<Time<Fixed>>()
                .advance_by(Duration::from_secs_f64(1.0 / 60.0));
            app.world_mut().run_schedule(FixedUpdate);
        }
    }

    #[test]
    fn enemy_falls_to_floor_and_turns_at_walls() {
        let mut app = world_with(&["-    -", "-    -", "------"]);
        let enemy = app
            .world_mut()
            .spawn((
                GamePosition { x: 160.0, y: 110.0 },
                Velocity::default(),
                Collider {
                    width: 48.0,
                    height: 48.0,
                },
                Grounded(false),
                GravityBody::default(),
                StepContacts::default(),
                Patrol {
                    speed: 600.0,
                    dir: 1.0,
                },
            ))
            .id();

        step(&mut app, 30);
        let pos = *app.world().get::<GamePosition>(enemy).expect("position");
        assert!((pos.y - (64.0 + 24.0)).abs() < 0.01);
        assert!(app.world().get::<Grounded>(enemy).expect("grounded").0);
        assert!(app.world().get::<Patrol>(enemy).expect("patrol").dir < 0.0);
    }
}
