//! Bridge between the locomotion body mirror and avian.
//!
//! Every schedule that touches the character starts with [`pull_body`] and
//! ends with [`push_body`]. In between, systems only work on the mirror.
use avian3d::prelude::*;
use bevy::prelude::*;

use crate::character_controller::components::*;
use crate::physics::GameLayer;
use crate::player::PlayerHandle;
use crate::settings::{GroundProbeShape, PlayerSettings, ProbeSettings};

/// [`EnvironmentProbe`] backed by avian's spatial query pipeline.
pub struct SpatialProbe<'a, 'w, 's> {
    spatial_query: &'a SpatialQuery<'w, 's>,
    settings: &'a ProbeSettings,
    filter: SpatialQueryFilter,
}

impl<'a, 'w, 's> SpatialProbe<'a, 'w, 's> {
    pub fn new(
        spatial_query: &'a SpatialQuery<'w, 's>,
        settings: &'a ProbeSettings,
        player: Entity,
    ) -> Self {
        let filter = SpatialQueryFilter::from_mask(GameLayer::terrain())
            .with_excluded_entities([player]);
        Self { spatial_query, settings, filter }
    }

    fn ray(&self, origin: Vec3, direction: Vec3, distance: f32) -> Option<RayHitData> {
        let direction = Dir3::new(direction).ok()?;
        self.spatial_query
            .cast_ray(origin, direction, distance, true, &self.filter)
    }
}

impl EnvironmentProbe for SpatialProbe<'_, '_, '_> {
    fn ground(&self, body: &Body) -> bool {
        match self.settings.ground {
            GroundProbeShape::Sphere { offset, radius } => !self
                .spatial_query
                .shape_intersections(
                    &Collider::sphere(radius),
                    body.position - Vec3::Y * offset,
                    Quat::IDENTITY,
                    &self.filter,
                )
                .is_empty(),
            GroundProbeShape::Ray { distance } => {
                self.ray(body.position, Vec3::NEG_Y, distance).is_some()
            }
        }
    }

    fn wall(&self, body: &Body) -> WallContact {
        let distance = self.settings.wall_ray_distance;
        let right = body.right();
        if let Some(hit) = self.ray(body.position, right, distance) {
            return WallContact::Right(hit.normal);
        }
        if let Some(hit) = self.ray(body.position, -right, distance) {
            return WallContact::Left(hit.normal);
        }
        WallContact::None
    }

    fn ledge(&self, body: &Body) -> Option<Vec3> {
        let origin = body.position
            + Vec3::Y * self.settings.ledge_origin_height
            + body.forward() * self.settings.ledge_origin_forward;
        self.ray(origin, Vec3::NEG_Y, self.settings.hang_ray_distance)
            .map(|hit| origin + Vec3::NEG_Y * hit.distance)
    }
}

/// Copies the simulated pose and velocity into the body mirror.
pub fn pull_body(
    players: Query<(&PlayerHandle, &Transform, &LinearVelocity), With<CharacterController>>,
) {
    for (handle, transform, velocity) in &players {
        let mut character = handle.lock();
        let locomotion = &mut character.locomotion;
        if !locomotion.is_attached() {
            let mut body = Body::new(transform.translation);
            body.yaw = transform.rotation.to_euler(EulerRot::YXZ).0;
            locomotion.attach_body(body);
        }
        let body = locomotion.body_mut("pull_body");
        body.position = transform.translation;
        body.velocity = velocity.0;
    }
}

/// Writes the body mirror back into avian.
pub fn push_body(
    settings: Res<PlayerSettings>,
    mut players: Query<
        (
            &PlayerHandle,
            &mut Transform,
            &mut LinearVelocity,
            &mut GravityScale,
            &mut RigidBody,
        ),
        With<CharacterController>,
    >,
) {
    for (handle, mut transform, mut velocity, mut gravity, mut rigid_body) in &mut players {
        let mut character = handle.lock();
        let body = character.locomotion.body_mut("push_body");

        velocity.0 = body.velocity;
        transform.rotation = body.rotation();
        if body.teleported {
            transform.translation = body.position;
            body.teleported = false;
        }
        gravity.0 = if body.gravity_enabled {
            settings.movement.gravity_scale
        } else {
            0.0
        };
        rigid_body.set_if_neq(if body.kinematic {
            RigidBody::Kinematic
        } else {
            RigidBody::Dynamic
        });
    }
}

/// Early phase: samples ground, wall and ledge probes for this frame.
pub fn refresh_probes(
    spatial_query: SpatialQuery,
    settings: Res<PlayerSettings>,
    players: Query<(Entity, &PlayerHandle)>,
) {
    for (entity, handle) in &players {
        let probe = SpatialProbe::new(&spatial_query, &settings.probes, entity);
        handle.lock().refresh_probes(&probe);
    }
}

/// Fixed-rate phase: lets the active state drive the body.
pub fn dispatch_physics(time: Res<Time>, players: Query<&PlayerHandle>) {
    let dt = time.delta_secs();
    for handle in &players {
        handle.lock().fixed_update(dt);
    }
}

#[cfg(debug_assertions)]
pub fn debug_visualize_probes(
    mut gizmos: Gizmos,
    settings: Res<PlayerSettings>,
    players: Query<&PlayerHandle>,
) {
    for handle in &players {
        let character = handle.lock();
        if !character.locomotion.is_attached() {
            continue;
        }
        let body = character.locomotion.body();
        let probes = character.locomotion.probes();

        let ground_color = if probes.grounded {
            Color::srgb(0.0, 1.0, 0.0)
        } else {
            Color::srgb(1.0, 0.0, 0.0)
        };
        if let GroundProbeShape::Sphere { offset, radius } = settings.probes.ground {
            gizmos.sphere(body.position - Vec3::Y * offset, radius, ground_color);
        }

        if let Some(normal) = probes.wall.normal() {
            gizmos.arrow(body.position, body.position + normal, Color::srgb(0.0, 0.4, 1.0));
        }
        if let Some(ledge) = probes.ledge {
            gizmos.sphere(ledge, 0.1, Color::srgb(1.0, 1.0, 0.0));
        }
    }
}
