use bevy::app::{RunFixedMainLoop, RunFixedMainLoopSystem};
use bevy::prelude::*;

use crate::components::*;
use crate::events::GameEventBus;
use crate::game_runtime::{gameplay_active, PlaySession, SceneRequest};
use crate::gameplay::{Contact, Reaction};
use crate::input::VirtualInput;
use crate::level::TileKind;
use crate::physics::StepSet;
use crate::physics_core::{self, Aabb};
use crate::tilemap::Tilemap;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<JumpLatch>()
            .add_systems(
                RunFixedMainLoop,
                latch_jump
                    .run_if(gameplay_active)
                    .in_set(RunFixedMainLoopSystem::BeforeFixedMainLoop),
            )
            .add_systems(FixedUpdate, player_controls.in_set(StepSet::Control))
            .add_systems(
                FixedUpdate,
                (player_contacts, cull_fallen_apples, tick_timers)
                    .chain()
                    .in_set(StepSet::Reactions),
            );
    }
}

pub fn spawn_player(commands: &mut Commands, start: Vec2, config: &GameConfig, headless: bool) {
    let mut entity = commands.spawn((
        LevelEntity,
        Player,
        GamePosition {
            x: start.x,
            y: start.y,
        },
        Velocity::default(),
        Grounded(false),
        GravityBody::default(),
        StepContacts {
            prev: start,
            ..default()
        },
        Big::new(),
        Collider {
            width: config.player_width,
            height: config.player_height,
        },
        Transform::from_xyz(start.x, start.y, 10.0),
    ));

    if !headless {
        entity.insert(Sprite::from_color(
            Color::srgb(0.95, 0.45, 0.6),
            Vec2::new(config.player_width, config.player_height),
        ));
    }
}

/// A jump press seen by a rendered frame, held until a fixed step consumes it.
#[derive(Resource, Default)]
pub struct JumpLatch(pub bool);

fn latch_jump(vinput: Res<VirtualInput>, mut latch: ResMut<JumpLatch>) {
    if vinput.just_pressed("jump") {
        latch.0 = true;
    }
}

fn player_controls(
    config: Res<GameConfig>,
    vinput: Res<VirtualInput>,
    mut latch: ResMut<JumpLatch>,
    mut query: Query<(&mut Velocity, &Grounded, &mut GravityBody), With<Player>>,
) {
    let jump = std::mem::take(&mut latch.0);
    for (mut vel, grounded, mut gravity) in query.iter_mut() {
        vel.x = physics_core::horizontal_velocity(
            vinput.pressed("left"),
            vinput.pressed("right"),
            config.move_speed,
        );
        physics_core::try_jump(grounded.0, jump, config.jump_force, &mut vel.y);
        gravity.scale = if vinput.pressed("down") {
            config.fast_fall_scale
        } else {
            1.0
        };
    }
}

fn player_contacts(
    mut commands: Commands,
    config: Res<GameConfig>,
    tilemap: Res<Tilemap>,
    headless: Res<HeadlessMode>,
    mut session: ResMut<PlaySession>,
    mut bus: ResMut<GameEventBus>,
    mut requests: EventWriter<SceneRequest>,
    mut players: Query<
        (&GamePosition, &mut Velocity, &Collider, &StepContacts, &mut Big),
        With<Player>,
    >,
    bodies: Query<(Entity, &TileBody, &GamePosition, &Collider), Without<Player>>,
) {
    let ts = config.tile_size;
    for (pos, mut vel, collider, contacts, mut big) in players.iter_mut() {
        let width = collider.width * big.scale;
        let height = collider.height * big.scale;
        let aabb = Aabb::from_center(pos.x, pos.y, width, height);
        let prev = Aabb::from_center(contacts.prev.x, contacts.prev.y, width, height);

        let mut touched: Vec<(Contact, Option<Entity>)> = Vec::new();
        let probe = aabb.expand(1.0);
        for (entity, body, body_pos, body_collider) in bodies.iter() {
            let other = Aabb::from_center(
                body_pos.x,
                body_pos.y,
                body_collider.width,
                body_collider.height,
            );
            if !probe.overlaps(&other) {
                continue;
            }
            let contact = match body.kind {
                TileKind::Coin => Contact::Coin,
                TileKind::Apple => Contact::Apple,
                TileKind::Enemy => Contact::Enemy(physics_core::classify_contact(&prev, &other)),
                TileKind::Portal => Contact::Portal,
                _ => continue,
            };
            touched.push((contact, Some(entity)));
        }

        let mut headbutted = None;
        if let Some((tx, ty)) = contacts.hits.ceiling {
            if tilemap.get(tx, ty) == TileKind::Prize {
                headbutted = Some((tx, ty));
                touched.push((Contact::PrizeHeadbutt, None));
            }
        }
        if physics_core::touching_tile(&tilemap, &aabb, TileKind::Spike, 1.0, ts).is_some() {
            touched.push((Contact::Danger, None));
        }
        if pos.y < tilemap.world_height(ts) - config.fall_death {
            touched.push((Contact::FellOut, None));
        }
        if tilemap.exit.is_none() && tilemap.width > 0 && pos.x >= (tilemap.width - 1) as f32 * ts {
            touched.push((Contact::ReachedEnd, None));
        }

        for (contact, entity) in touched {
            let reaction = session.run.react(contact);
            match reaction {
                Reaction::CollectCoin { coins, detune } => {
                    if let Some(entity) = entity {
                        commands.entity(entity).despawn_recursive();
                    }
                    bus.emit(
                        "coin_collected",
                        serde_json::json!({ "coins": coins, "detune": detune }),
                    );
                }
                Reaction::StompEnemy => {
                    if let Some(entity) = entity {
                        commands.entity(entity).despawn_recursive();
                    }
                    vel.y = config.jump_force * config.stomp_bounce;
                    bus.emit("enemy_stomped", serde_json::json!({}));
                }
                Reaction::ReleaseApple => {
                    if let Some((tx, ty)) = headbutted {
                        spawn_apple(&mut commands, &session, &config, headless.0, tx, ty + 1);
                    }
                    bus.emit("apple_released", serde_json::json!({}));
                }
                Reaction::EatApple => {
                    if let Some(entity) = entity {
                        commands.entity(entity).despawn_recursive();
                    }
                    big.biggify(config.big_seconds);
                    bus.emit("apple_eaten", serde_json::json!({}));
                }
                Reaction::Die => {
                    bus.emit(
                        "player_died",
                        serde_json::json!({ "cause": death_cause(contact) }),
                    );
                    requests.send(SceneRequest::PlayerDied);
                }
                Reaction::CompleteLevel => {
                    bus.emit(
                        "level_completed",
                        serde_json::json!({
                            "level_index": session.level_index,
                            "coins": session.run.coins,
                        }),
                    );
                    requests.send(SceneRequest::LevelCompleted);
                }
                Reaction::Nothing => {}
            }
        }
    }
}

fn death_cause(contact: Contact) -> &'static str {
    match contact {
        Contact::Enemy(_) => "enemy",
        Contact::FellOut => "fell",
        _ => "danger",
    }
}

fn spawn_apple(
    commands: &mut Commands,
    session: &PlaySession,
    config: &GameConfig,
    headless: bool,
    tx: i32,
    ty: i32,
) {
    let center = Tilemap::tile_center(tx, ty, config.tile_size);
    let size = config.tile_size * 0.6;
    let mut entity = commands.spawn((
        LevelEntity,
        TileBody {
            kind: TileKind::Apple,
            tile: (tx, ty),
        },
        GamePosition {
            x: center.x,
            y: center.y,
        },
        Velocity {
            x: 0.0,
            y: config.jump_force * 0.5,
        },
        Grounded(false),
        GravityBody::default(),
        StepContacts {
            prev: center,
            ..default()
        },
        Collider {
            width: size,
            height: size,
        },
        Transform::from_xyz(center.x, center.y, 2.0),
    ));
    if let (false, Some(level)) = (headless, session.current_level()) {
        entity.insert(Sprite::from_color(
            crate::render::tile_color(TileKind::Apple, level),
            Vec2::splat(size),
        ));
    }
}

fn cull_fallen_apples(
    mut commands: Commands,
    config: Res<GameConfig>,
    tilemap: Res<Tilemap>,
    mut session: ResMut<PlaySession>,
    apples: Query<(Entity, &TileBody, &GamePosition)>,
) {
    let floor = tilemap.world_height(config.tile_size) - config.fall_death;
    for (entity, body, pos) in apples.iter() {
        if body.kind == TileKind::Apple && pos.y < floor {
            commands.entity(entity).despawn_recursive();
            session.run.apple_lost();
        }
    }
}

fn tick_timers(
    time: Res<Time<Fixed>>,
    mut session: ResMut<PlaySession>,
    mut bigs: Query<&mut Big>,
) {
    let dt = time.delta_secs();
    session.run.tick(dt);
    for mut big in bigs.iter_mut() {
        big.tick(dt);
    }
}
