use std::f32::consts::PI;

use avian3d::prelude::*;
use bevy::pbr::CascadeShadowConfigBuilder;
use bevy::prelude::*;

use crate::interactables::{trigger_volume, BouncePad, Describable, ItemEffect, Pickup};
use crate::physics::GameLayer;

pub(crate) struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup);
    }
}

/// Static box on the given terrain layer.
fn block(
    meshes: &mut Assets<Mesh>,
    material: Handle<StandardMaterial>,
    size: Vec3,
    center: Vec3,
    layer: GameLayer,
) -> impl Bundle + use<> {
    (
        RigidBody::Static,
        Collider::cuboid(size.x, size.y, size.z),
        CollisionLayers::new(layer, LayerMask::ALL),
        Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
        MeshMaterial3d(material),
        Transform::from_translation(center),
    )
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let floor = materials.add(Color::srgb(0.3, 0.5, 0.3));
    let wall = materials.add(Color::srgb(0.8, 0.7, 0.6));
    let pad = materials.add(Color::srgb(0.9, 0.4, 0.1));

    commands.spawn((
        Name::new("Floor"),
        block(
            &mut meshes,
            floor,
            Vec3::new(80.0, 1.0, 80.0),
            Vec3::new(0.0, -0.5, 0.0),
            GameLayer::Ground,
        ),
    ));

    // A corridor of two long walls for wall-running.
    for x in [-4.0, 4.0] {
        commands.spawn((
            Name::new("Run wall"),
            block(
                &mut meshes,
                wall.clone(),
                Vec3::new(0.5, 6.0, 24.0),
                Vec3::new(x, 3.0, -18.0),
                GameLayer::Wall,
            ),
            Describable::new("Wall", "Jump at it while moving to run along it"),
        ));
    }

    // Ledges at reachable heights.
    for (i, height) in [2.2, 3.0].into_iter().enumerate() {
        let z = 8.0 + i as f32 * 6.0;
        commands.spawn((
            Name::new("Ledge"),
            block(
                &mut meshes,
                wall.clone(),
                Vec3::new(6.0, height, 2.0),
                Vec3::new(8.0, height * 0.5, z),
                GameLayer::Wall,
            ),
            Describable::new("Ledge", "Jump, then press jump again to grab and climb"),
        ));
    }

    commands.spawn((
        Name::new("Bounce pad"),
        BouncePad::new(14.0),
        trigger_volume(Collider::cuboid(2.0, 0.3, 2.0)),
        Mesh3d(meshes.add(Cuboid::new(2.0, 0.3, 2.0))),
        MeshMaterial3d(pad),
        Transform::from_xyz(-8.0, 0.15, 4.0),
        Describable::new("Bounce pad", "Launches whoever steps on it"),
    ));

    let pickups = [
        (
            "Speed boost",
            Color::srgb(0.2, 0.6, 1.0),
            ItemEffect::SpeedBoost { amount: 3.0, duration: 5.0 },
            Vec3::new(-3.0, 1.0, -6.0),
        ),
        (
            "Stamina regen",
            Color::srgb(1.0, 0.9, 0.2),
            ItemEffect::StaminaRegen { amount: 30.0, duration: 8.0 },
            Vec3::new(3.0, 1.0, 4.0),
        ),
    ];
    for (name, color, effect, position) in pickups {
        commands.spawn((
            Name::new(name),
            Pickup::new(effect, 10.0),
            trigger_volume(Collider::sphere(0.4)),
            Mesh3d(meshes.add(Sphere::new(0.4))),
            MeshMaterial3d(materials.add(color)),
            Transform::from_translation(position),
            Visibility::default(),
            Describable::new(name, "Walk into it to pick it up"),
        ));
    }

    // Light
    commands.spawn((
        Transform::from_rotation(Quat::from_euler(EulerRot::ZYX, 0.0, 1.0, -PI / 4.)),
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        CascadeShadowConfigBuilder {
            first_cascade_far_bound: 200.0,
            maximum_distance: 400.0,
            ..default()
        }
        .build(),
    ));
}
