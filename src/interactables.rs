//! World objects the player touches or looks at: bounce pads, item pickups
//! and anything carrying a [`Describable`] label.
use std::time::Duration;

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::camera::FirstPersonCamera;
use crate::character::Damageable;
use crate::character_controller::components::{Stat, TimedModifier};
use crate::character_controller::CharacterSet;
use crate::error::DescribeError;
use crate::game_states::AppState;
use crate::physics::GameLayer;
use crate::player::{Player, PlayerHandle};

/// How far ahead of the eye a target can be described.
pub const LOOK_RANGE: f32 = 4.0;

pub struct InteractablesPlugin;

impl Plugin for InteractablesPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<Describable>()
            .register_type::<BouncePad>()
            .register_type::<Pickup>()
            .init_resource::<LookTarget>()
            .add_systems(
                Update,
                (bounce_pads, collect_pickups, respawn_pickups, update_look_target)
                    .chain()
                    .in_set(CharacterSet::React)
                    .run_if(in_state(AppState::InGame)),
            );
    }
}

/// Name and blurb shown when the player looks at an entity.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct Describable {
    pub name: String,
    pub description: String,
}

impl Describable {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Display text, or an error if there is no name to show.
    pub fn describe(&self) -> Result<String, DescribeError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DescribeError::EmptyName);
        }
        let description = self.description.trim();
        if description.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{name}\n{description}"))
        }
    }
}

/// What the eye ray currently rests on.
#[derive(Resource, Debug, Default, Clone, PartialEq)]
pub struct LookTarget {
    pub entity: Option<Entity>,
    pub text: Option<String>,
}

/// Trigger that throws the player forward and up on entry.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct BouncePad {
    pub force: f32,
    touching: bool,
}

impl BouncePad {
    pub fn new(force: f32) -> Self {
        Self { force, touching: false }
    }

    /// Launch velocity for a unit-mass body facing `forward`.
    pub fn launch_velocity(forward: Vec3, force: f32) -> Vec3 {
        (forward + Vec3::Y).normalize_or_zero() * force
    }

    /// Records contact for this frame. Returns `true` only on entry.
    fn enter(&mut self, touching: bool) -> bool {
        let entered = touching && !self.touching;
        self.touching = touching;
        entered
    }
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub enum ItemEffect {
    /// Raises walk and run speed.
    SpeedBoost { amount: f32, duration: f32 },
    StaminaRegen { amount: f32, duration: f32 },
}

impl Default for ItemEffect {
    fn default() -> Self {
        ItemEffect::SpeedBoost { amount: 0.0, duration: 0.0 }
    }
}

impl ItemEffect {
    pub fn modifiers(&self) -> Vec<TimedModifier> {
        match *self {
            ItemEffect::SpeedBoost { amount, duration } => vec![
                TimedModifier::new(Stat::WalkSpeed, amount, duration),
                TimedModifier::new(Stat::RunSpeed, amount, duration),
            ],
            ItemEffect::StaminaRegen { amount, duration } => {
                vec![TimedModifier::new(Stat::StaminaRegen, amount, duration)]
            }
        }
    }
}

/// Consumable that grants an [`ItemEffect`] and comes back after
/// `respawn_time` seconds.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct Pickup {
    pub effect: ItemEffect,
    pub respawn_time: f32,
    cooldown: Option<Timer>,
}

impl Pickup {
    pub fn new(effect: ItemEffect, respawn_time: f32) -> Self {
        Self {
            effect,
            respawn_time,
            cooldown: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.cooldown.is_none()
    }

    fn consume(&mut self) {
        self.cooldown = Some(Timer::from_seconds(self.respawn_time, TimerMode::Once));
    }

    /// Advances the respawn timer. Returns `true` when the pickup comes back.
    fn tick(&mut self, delta: Duration) -> bool {
        let Some(timer) = self.cooldown.as_mut() else {
            return false;
        };
        if timer.tick(delta).finished() {
            self.cooldown = None;
            return true;
        }
        false
    }
}

/// Components shared by every trigger volume the player can walk into.
pub fn trigger_volume(collider: Collider) -> impl Bundle {
    (
        RigidBody::Static,
        collider,
        Sensor,
        CollidingEntities::default(),
        CollisionLayers::new(GameLayer::Trigger, GameLayer::Player),
    )
}

fn bounce_pads(
    mut pads: Query<(&mut BouncePad, &CollidingEntities)>,
    players: Query<(Entity, &PlayerHandle), With<Player>>,
) {
    for (mut pad, colliding) in &mut pads {
        let touching = players.iter().find(|(entity, _)| colliding.contains(entity));
        if !pad.enter(touching.is_some()) {
            continue;
        }
        let Some((_, handle)) = touching else { continue };
        let mut character = handle.lock();
        let forward = character.locomotion.body().forward();
        if character.force_jump(BouncePad::launch_velocity(forward, pad.force)) {
            info!("bounce pad launched the player");
        }
    }
}

fn collect_pickups(
    mut pickups: Query<(&mut Pickup, &CollidingEntities, &mut Visibility, Option<&Name>)>,
    players: Query<(Entity, &PlayerHandle), With<Player>>,
) {
    for (mut pickup, colliding, mut visibility, name) in &mut pickups {
        if !pickup.is_available() {
            continue;
        }
        for (entity, handle) in &players {
            if !colliding.contains(&entity) {
                continue;
            }
            let mut character = handle.lock();
            if character.resources.is_dead() {
                continue;
            }
            for modifier in pickup.effect.modifiers() {
                character.add_modifier(modifier);
            }
            pickup.consume();
            *visibility = Visibility::Hidden;
            info!(
                "picked up {} ({:?})",
                name.map_or("item", |name| name.as_str()),
                pickup.effect
            );
            break;
        }
    }
}

fn respawn_pickups(time: Res<Time>, mut pickups: Query<(&mut Pickup, &mut Visibility)>) {
    for (mut pickup, mut visibility) in &mut pickups {
        if pickup.tick(time.delta()) {
            *visibility = Visibility::Inherited;
        }
    }
}

fn update_look_target(
    spatial_query: SpatialQuery,
    cameras: Query<&GlobalTransform, With<FirstPersonCamera>>,
    players: Query<Entity, With<Player>>,
    describables: Query<&Describable>,
    mut target: ResMut<LookTarget>,
) {
    let Ok(eye) = cameras.single() else { return };
    let filter = SpatialQueryFilter::default().with_excluded_entities(players.iter());
    let hit = spatial_query
        .cast_ray(eye.translation(), eye.forward(), LOOK_RANGE, true, &filter)
        .map(|hit| hit.entity)
        .filter(|entity| describables.contains(*entity));

    if hit == target.entity {
        return;
    }
    target.entity = hit;
    target.text = hit
        .and_then(|entity| describables.get(entity).ok())
        .and_then(|describable| match describable.describe() {
            Ok(text) => Some(text),
            Err(err) => {
                warn!("not displaying look target: {err}");
                None
            }
        });
}
