use avian3d::prelude::*;
use bevy::prelude::*;

use crate::physics::GameLayer;

/// A marker component indicating that an entity is driven by the character controller.
#[derive(Component)]
pub struct CharacterController;

impl CharacterController {
    /// Components needed for a dynamic, upright, frictionless player body.
    pub fn new(collider: Collider, gravity_scale: f32) -> (
        Self,
        RigidBody,
        Collider,
        LockedAxes,
        GravityScale,
        Friction,
        Restitution,
        CollisionLayers,
    ) {
        (
            CharacterController,
            RigidBody::Dynamic,
            collider,
            LockedAxes::ROTATION_LOCKED,
            GravityScale(gravity_scale),
            Friction::ZERO.with_combine_rule(CoefficientCombine::Min),
            Restitution::ZERO.with_combine_rule(CoefficientCombine::Min),
            CollisionLayers::new(GameLayer::Player, LayerMask::ALL),
        )
    }
}

/// Mirror of the physics body owned by the locomotion controller.
///
/// Pulled from the physics engine at the start of a schedule and pushed back
/// at the end, so everything in between works on plain values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Heading around +Y, radians.
    pub yaw: f32,
    pub gravity_enabled: bool,
    pub kinematic: bool,
    /// Set when the position was changed directly and must be written back.
    pub teleported: bool,
}

impl Body {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            gravity_enabled: true,
            kinematic: false,
            teleported: false,
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.teleported = true;
    }
}

/// Result of the side wall probes. Normals point away from the wall.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum WallContact {
    #[default]
    None,
    Left(Vec3),
    Right(Vec3),
}

impl WallContact {
    pub fn normal(&self) -> Option<Vec3> {
        match self {
            WallContact::None => None,
            WallContact::Left(normal) | WallContact::Right(normal) => Some(*normal),
        }
    }

    pub fn is_on_wall(&self) -> bool {
        !matches!(self, WallContact::None)
    }
}

/// Environment probe results for one frame. Never mutated after creation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeSnapshot {
    /// Increases by one every refresh. Zero means "never probed".
    pub frame: u64,
    pub grounded: bool,
    pub wall: WallContact,
    pub ledge: Option<Vec3>,
}

/// Source of ground, wall and ledge contacts.
///
/// The game queries avian's spatial index; tests script the answers.
pub trait EnvironmentProbe {
    fn ground(&self, body: &Body) -> bool;
    fn wall(&self, body: &Body) -> WallContact;
    /// First hit of a short downward ray cast in front of the chest.
    fn ledge(&self, body: &Body) -> Option<Vec3>;
}

/// Last sampled input. Last value wins, nothing is queued.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    pub move_input: Vec2,
    pub look_input: Vec2,
    pub sprint_held: bool,
    pub zoom_held: bool,
}

impl InputSnapshot {
    pub fn has_move_input(&self) -> bool {
        self.move_input != Vec2::ZERO
    }
}

/// Tunable that item effects may boost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum Stat {
    WalkSpeed,
    RunSpeed,
    StaminaRegen,
}

/// Additive bonus on a [`Stat`] that expires after `remaining` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedModifier {
    pub stat: Stat,
    pub amount: f32,
    pub remaining: f32,
}

impl TimedModifier {
    pub fn new(stat: Stat, amount: f32, duration: f32) -> Self {
        Self { stat, amount, remaining: duration }
    }

    /// Counts down. Returns `false` once expired.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn body_axes_follow_yaw() {
        let mut body = Body::new(Vec3::ZERO);
        assert!((body.forward() - Vec3::NEG_Z).length() < 1e-5);
        assert!((body.right() - Vec3::X).length() < 1e-5);

        body.yaw = FRAC_PI_2;
        assert!((body.forward() - Vec3::NEG_X).length() < 1e-5);
        assert!((body.right() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn teleport_marks_body() {
        let mut body = Body::new(Vec3::ZERO);
        body.teleport(Vec3::Y);
        assert!(body.teleported);
        assert_eq!(body.position, Vec3::Y);
    }

    #[test]
    fn wall_contact_normal() {
        assert_eq!(WallContact::None.normal(), None);
        assert!(!WallContact::None.is_on_wall());
        let right = WallContact::Right(Vec3::NEG_X);
        assert_eq!(right.normal(), Some(Vec3::NEG_X));
        assert!(right.is_on_wall());
    }

    #[test]
    fn timed_modifier_expires() {
        let mut modifier = TimedModifier::new(Stat::RunSpeed, 2.0, 0.5);
        assert!(modifier.tick(0.25));
        assert!(!modifier.tick(0.25));
    }
}
