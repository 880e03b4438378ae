use bevy::{
    core_pipeline::{bloom::Bloom, tonemapping::Tonemapping},
    prelude::*,
    render::camera::PerspectiveProjection,
};

use crate::character_controller::CharacterSet;
use crate::game_states::AppState;
use crate::player::PlayerHandle;
use crate::settings::CameraSettings;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_first_person_camera
                .after(CharacterSet::Late)
                .run_if(in_state(AppState::InGame)),
        );
    }
}

/// Eye camera, spawned as a child of the player body. Yaw comes from the
/// parent; this entity only carries pitch and field of view.
#[derive(Component)]
pub struct FirstPersonCamera;

pub fn first_person_camera(settings: &CameraSettings) -> impl Bundle + use<> {
    (
        Name::new("Eye camera"),
        FirstPersonCamera,
        Camera3d::default(),
        Camera {
            hdr: true,
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: settings.normal_fov.to_radians(),
            ..default()
        }),
        Transform::from_xyz(0.0, settings.eye_height, 0.0),
        DistanceFog {
            color: Color::srgb_u8(43, 44, 100),
            falloff: FogFalloff::Exponential { density: 15e-3 },
            ..default()
        },
        Bloom {
            intensity: 0.03,
            ..default()
        },
        Tonemapping::TonyMcMapface,
    )
}

/// Copies the late-phase look and FOV results onto the eye camera.
pub fn sync_first_person_camera(
    players: Query<&PlayerHandle>,
    mut cameras: Query<(&mut Transform, &mut Projection), With<FirstPersonCamera>>,
) {
    let Ok(handle) = players.single() else { return };
    let (pitch, fov) = {
        let character = handle.lock();
        (character.locomotion.pitch(), character.locomotion.fov())
    };
    for (mut transform, mut projection) in &mut cameras {
        transform.rotation = Quat::from_rotation_x(pitch.to_radians());
        if let Projection::Perspective(perspective) = projection.as_mut() {
            perspective.fov = fov.to_radians();
        }
    }
}
