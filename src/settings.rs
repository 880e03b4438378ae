//! Per-character tunables.
//!
//! Settings live in `assets/settings/player.ron`. Every field has a serde
//! default so a partial file only overrides what it names. A missing or
//! malformed file falls back to [`PlayerSettings::default`].
use std::fs;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const SETTINGS_PATH: &str = "assets/settings/player.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSettings {
    #[serde(default = "MovementSettings::default_walk_speed")]
    pub walk_speed: f32,
    #[serde(default = "MovementSettings::default_run_speed")]
    pub run_speed: f32,
    #[serde(default = "MovementSettings::default_zoom_speed_multiplier")]
    pub zoom_speed_multiplier: f32, // Fraction of walk speed while aiming
    #[serde(default = "MovementSettings::default_jump_force")]
    pub jump_force: f32,
    #[serde(default = "MovementSettings::default_wall_run_speed")]
    pub wall_run_speed: f32,
    #[serde(default = "MovementSettings::default_wall_stick_force")]
    pub wall_stick_force: f32, // Inward push keeping the body on the wall
    #[serde(default = "MovementSettings::default_wall_reattach_delay")]
    pub wall_reattach_delay: f32, // Seconds after a wall jump before wall-running again
    #[serde(default = "MovementSettings::default_gravity_scale")]
    pub gravity_scale: f32,
}

impl MovementSettings {
    fn default_walk_speed() -> f32 { 5.0 }
    fn default_run_speed() -> f32 { 9.0 }
    fn default_zoom_speed_multiplier() -> f32 { 0.5 }
    fn default_jump_force() -> f32 { 7.0 }
    fn default_wall_run_speed() -> f32 { 8.0 }
    fn default_wall_stick_force() -> f32 { 20.0 }
    fn default_wall_reattach_delay() -> f32 { 0.3 }
    fn default_gravity_scale() -> f32 { 2.0 }
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            walk_speed: Self::default_walk_speed(),
            run_speed: Self::default_run_speed(),
            zoom_speed_multiplier: Self::default_zoom_speed_multiplier(),
            jump_force: Self::default_jump_force(),
            wall_run_speed: Self::default_wall_run_speed(),
            wall_stick_force: Self::default_wall_stick_force(),
            wall_reattach_delay: Self::default_wall_reattach_delay(),
            gravity_scale: Self::default_gravity_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaminaSettings {
    #[serde(default = "StaminaSettings::default_max_health")]
    pub max_health: f32,
    #[serde(default = "StaminaSettings::default_max_stamina")]
    pub max_stamina: f32,
    #[serde(default = "StaminaSettings::default_run_cost")]
    pub run_cost: f32, // Per second
    #[serde(default = "StaminaSettings::default_wall_run_cost")]
    pub wall_run_cost: f32, // Per second
    #[serde(default = "StaminaSettings::default_jump_cost")]
    pub jump_cost: f32, // Per jump, also charged for wall jumps
    #[serde(default = "StaminaSettings::default_regen_rate")]
    pub regen_rate: f32, // Per second
}

impl StaminaSettings {
    fn default_max_health() -> f32 { 100.0 }
    fn default_max_stamina() -> f32 { 100.0 }
    fn default_run_cost() -> f32 { 15.0 }
    fn default_wall_run_cost() -> f32 { 20.0 }
    fn default_jump_cost() -> f32 { 10.0 }
    fn default_regen_rate() -> f32 { 25.0 }
}

impl Default for StaminaSettings {
    fn default() -> Self {
        Self {
            max_health: Self::default_max_health(),
            max_stamina: Self::default_max_stamina(),
            run_cost: Self::default_run_cost(),
            wall_run_cost: Self::default_wall_run_cost(),
            jump_cost: Self::default_jump_cost(),
            regen_rate: Self::default_regen_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "TimerSettings::default_attack_duration")]
    pub attack_duration: f32,
    #[serde(default = "TimerSettings::default_interact_duration")]
    pub interact_duration: f32,
    #[serde(default = "TimerSettings::default_landing_grace")]
    pub landing_grace: f32, // Lets a jump that never left the ground still land
}

impl TimerSettings {
    fn default_attack_duration() -> f32 { 0.5 }
    fn default_interact_duration() -> f32 { 1.0 }
    fn default_landing_grace() -> f32 { 0.25 }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            attack_duration: Self::default_attack_duration(),
            interact_duration: Self::default_interact_duration(),
            landing_grace: Self::default_landing_grace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "CameraSettings::default_mouse_sensitivity")]
    pub mouse_sensitivity: f32, // Degrees per unit of look input
    #[serde(default = "CameraSettings::default_normal_fov")]
    pub normal_fov: f32, // Degrees
    #[serde(default = "CameraSettings::default_zoom_fov")]
    pub zoom_fov: f32, // Degrees
    #[serde(default = "CameraSettings::default_fov_blend_rate")]
    pub fov_blend_rate: f32,
    #[serde(default = "CameraSettings::default_eye_height")]
    pub eye_height: f32,
    #[serde(default)]
    pub invert_y: bool,
}

impl CameraSettings {
    fn default_mouse_sensitivity() -> f32 { 0.1 }
    fn default_normal_fov() -> f32 { 70.0 }
    fn default_zoom_fov() -> f32 { 35.0 }
    fn default_fov_blend_rate() -> f32 { 10.0 }
    fn default_eye_height() -> f32 { 0.7 }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            mouse_sensitivity: Self::default_mouse_sensitivity(),
            normal_fov: Self::default_normal_fov(),
            zoom_fov: Self::default_zoom_fov(),
            fov_blend_rate: Self::default_fov_blend_rate(),
            eye_height: Self::default_eye_height(),
            invert_y: false,
        }
    }
}

/// How the ground contact is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GroundProbeShape {
    /// Overlap test with a sphere placed `offset` below the body origin.
    Sphere { offset: f32, radius: f32 },
    /// Straight ray down from the body origin.
    Ray { distance: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "ProbeSettings::default_ground")]
    pub ground: GroundProbeShape,
    #[serde(default = "ProbeSettings::default_wall_ray_distance")]
    pub wall_ray_distance: f32,
    #[serde(default = "ProbeSettings::default_hang_ray_distance")]
    pub hang_ray_distance: f32,
    #[serde(default = "ProbeSettings::default_ledge_origin_height")]
    pub ledge_origin_height: f32,
    #[serde(default = "ProbeSettings::default_ledge_origin_forward")]
    pub ledge_origin_forward: f32,
    #[serde(default = "ProbeSettings::default_climb_height")]
    pub climb_height: f32,
    #[serde(default = "ProbeSettings::default_climb_forward")]
    pub climb_forward: f32,
    #[serde(default = "ProbeSettings::default_drop_threshold")]
    pub drop_threshold: f32, // Backward stick deflection that lets go of a ledge
}

impl ProbeSettings {
    fn default_ground() -> GroundProbeShape {
        GroundProbeShape::Sphere { offset: 0.95, radius: 0.3 }
    }
    fn default_wall_ray_distance() -> f32 { 0.8 }
    fn default_hang_ray_distance() -> f32 { 0.6 }
    fn default_ledge_origin_height() -> f32 { 1.5 }
    fn default_ledge_origin_forward() -> f32 { 0.3 }
    fn default_climb_height() -> f32 { 2.0 }
    fn default_climb_forward() -> f32 { 0.5 }
    fn default_drop_threshold() -> f32 { 0.5 }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ground: Self::default_ground(),
            wall_ray_distance: Self::default_wall_ray_distance(),
            hang_ray_distance: Self::default_hang_ray_distance(),
            ledge_origin_height: Self::default_ledge_origin_height(),
            ledge_origin_forward: Self::default_ledge_origin_forward(),
            climb_height: Self::default_climb_height(),
            climb_forward: Self::default_climb_forward(),
            drop_threshold: Self::default_drop_threshold(),
        }
    }
}

#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default)]
    pub movement: MovementSettings,
    #[serde(default)]
    pub stamina: StaminaSettings,
    #[serde(default)]
    pub timers: TimerSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub probes: ProbeSettings,
}

impl PlayerSettings {
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Loads `path`, logging and falling back to defaults on any error.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => {
                info!("loaded player settings from {}", path.display());
                settings
            }
            Err(err) => {
                warn!("{err}; using default player settings ({})", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = PlayerSettings::from_ron(
            "(movement: (walk_speed: 3.5), stamina: (jump_cost: 40.0))",
        )
        .unwrap();

        assert_eq!(settings.movement.walk_speed, 3.5);
        assert_eq!(settings.movement.run_speed, 9.0);
        assert_eq!(settings.stamina.jump_cost, 40.0);
        assert_eq!(settings.camera, CameraSettings::default());
    }

    #[test]
    fn ground_probe_shape_variants_parse() {
        let settings =
            PlayerSettings::from_ron("(probes: (ground: Ray(distance: 1.0)))").unwrap();
        assert_eq!(settings.probes.ground, GroundProbeShape::Ray { distance: 1.0 });
    }

    #[test]
    fn empty_struct_is_all_defaults() {
        assert_eq!(PlayerSettings::from_ron("()").unwrap(), PlayerSettings::default());
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(PlayerSettings::from_ron("(movement: 12)").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = PlayerSettings::load_or_default("does/not/exist.ron");
        assert_eq!(settings, PlayerSettings::default());
    }

    #[test]
    fn shipped_settings_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(SETTINGS_PATH);
        PlayerSettings::load(path).unwrap();
    }
}
