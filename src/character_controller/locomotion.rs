//! Physics-space side of the player: body commands, probes and camera look.
//!
//! Only the state machine calls the motion primitives. Every primitive panics
//! if no [`Body`] has been attached yet, since writing into an absent body
//! would silently lose the command.
use bevy::prelude::*;

use crate::character_controller::components::*;
use crate::error::ControllerError;
use crate::settings::PlayerSettings;

/// Camera pitch limit in degrees.
pub const MAX_PITCH: f32 = 90.0;

/// Plain tunables. Item effects and other systems may write these directly.
#[derive(Debug, Clone, PartialEq)]
pub struct LocomotionTuning {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub zoom_speed_multiplier: f32,
    pub jump_force: f32,
    pub wall_run_speed: f32,
    pub wall_stick_force: f32,
    pub stamina_regen_rate: f32,
    pub mouse_sensitivity: f32,
    pub invert_y: bool,
    pub normal_fov: f32,
    pub zoom_fov: f32,
    pub fov_blend_rate: f32,
    pub climb_height: f32,
    pub climb_forward: f32,
    pub drop_threshold: f32,
}

impl From<&PlayerSettings> for LocomotionTuning {
    fn from(settings: &PlayerSettings) -> Self {
        Self {
            walk_speed: settings.movement.walk_speed,
            run_speed: settings.movement.run_speed,
            zoom_speed_multiplier: settings.movement.zoom_speed_multiplier,
            jump_force: settings.movement.jump_force,
            wall_run_speed: settings.movement.wall_run_speed,
            wall_stick_force: settings.movement.wall_stick_force,
            stamina_regen_rate: settings.stamina.regen_rate,
            mouse_sensitivity: settings.camera.mouse_sensitivity,
            invert_y: settings.camera.invert_y,
            normal_fov: settings.camera.normal_fov,
            zoom_fov: settings.camera.zoom_fov,
            fov_blend_rate: settings.camera.fov_blend_rate,
            climb_height: settings.probes.climb_height,
            climb_forward: settings.probes.climb_forward,
            drop_threshold: settings.probes.drop_threshold,
        }
    }
}

impl Default for LocomotionTuning {
    fn default() -> Self {
        Self::from(&PlayerSettings::default())
    }
}

/// Along-wall running direction for a wall `normal`.
///
/// Of the two tangents `normal × up` and its negation, returns the one with
/// the smaller angle to `forward`.
pub fn wall_run_direction(normal: Vec3, forward: Vec3) -> Vec3 {
    let along = normal.cross(Vec3::Y).normalize_or_zero();
    if forward.dot(along) >= forward.dot(-along) {
        along
    } else {
        -along
    }
}

pub struct LocomotionController {
    pub tuning: LocomotionTuning,
    body: Option<Body>,
    input: InputSnapshot,
    probes: ProbeSnapshot,
    hang_anchor: Option<Vec3>,
    pitch: f32,
    fov: f32,
    zoomed: bool,
    modifiers: Vec<TimedModifier>,
}

impl LocomotionController {
    pub fn new(tuning: LocomotionTuning) -> Self {
        let fov = tuning.normal_fov;
        Self {
            tuning,
            body: None,
            input: InputSnapshot::default(),
            probes: ProbeSnapshot::default(),
            hang_anchor: None,
            pitch: 0.0,
            fov,
            zoomed: false,
            modifiers: Vec::new(),
        }
    }

    pub fn attach_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    pub fn is_attached(&self) -> bool {
        self.body.is_some()
    }

    pub fn body(&self) -> &Body {
        self.body
            .as_ref()
            .unwrap_or_else(|| panic!("{}", ControllerError::BodyUnavailable("body")))
    }

    pub fn body_mut(&mut self, primitive: &'static str) -> &mut Body {
        self.body
            .as_mut()
            .unwrap_or_else(|| panic!("{}", ControllerError::BodyUnavailable(primitive)))
    }

    // --- input snapshot ---

    pub fn set_move_input(&mut self, value: Vec2) {
        self.input.move_input = value;
    }

    pub fn set_look_input(&mut self, value: Vec2) {
        self.input.look_input = value;
    }

    pub fn set_sprint_held(&mut self, held: bool) {
        self.input.sprint_held = held;
    }

    pub fn set_zoom_held(&mut self, held: bool) {
        self.input.zoom_held = held;
    }

    pub fn has_move_input(&self) -> bool {
        self.input.has_move_input()
    }

    pub fn has_down_input(&self) -> bool {
        self.input.move_input.y < -self.tuning.drop_threshold
    }

    pub fn is_sprinting(&self) -> bool {
        self.input.sprint_held
    }

    pub fn is_zoom_pressed(&self) -> bool {
        self.input.zoom_held
    }

    // --- probes ---

    /// Early phase: samples every probe against the current body pose.
    pub fn refresh_probes(&mut self, probe: &impl EnvironmentProbe) -> ProbeSnapshot {
        let body = *self.body();
        self.probes = ProbeSnapshot {
            frame: self.probes.frame + 1,
            grounded: probe.ground(&body),
            wall: probe.wall(&body),
            ledge: probe.ledge(&body),
        };
        self.probes
    }

    pub fn probes(&self) -> ProbeSnapshot {
        self.probes
    }

    pub fn ground_probe(&self) -> bool {
        self.probes.grounded
    }

    pub fn wall_probe(&self) -> WallContact {
        self.probes.wall
    }

    pub fn ledge_probe(&self) -> Option<Vec3> {
        self.probes.ledge
    }

    pub fn is_grounded(&self) -> bool {
        self.probes.grounded
    }

    pub fn is_on_wall(&self) -> bool {
        self.probes.wall.is_on_wall()
    }

    pub fn can_wall_run(&self) -> bool {
        !self.probes.grounded && self.is_on_wall() && self.has_move_input()
    }

    /// Latches the current ledge hit as the hang anchor.
    pub fn grab_ledge(&mut self) -> Option<Vec3> {
        self.hang_anchor = self.probes.ledge;
        self.hang_anchor
    }

    pub fn release_ledge(&mut self) {
        self.hang_anchor = None;
    }

    pub fn hang_anchor(&self) -> Option<Vec3> {
        self.hang_anchor
    }

    // --- motion primitives ---

    /// Sets horizontal velocity from the move input, keeping vertical velocity.
    pub fn move_at(&mut self, speed: f32) {
        let input = self.input.move_input;
        let body = self.body_mut("move");
        let direction = body.right() * input.x + body.forward() * input.y;
        let horizontal = if input == Vec2::ZERO {
            Vec3::ZERO
        } else {
            direction.normalize_or_zero() * speed
        };
        body.velocity.x = horizontal.x;
        body.velocity.z = horizontal.z;
    }

    /// Zeroes horizontal velocity and adds an upward impulse (unit mass).
    pub fn jump(&mut self, force: f32) {
        let body = self.body_mut("jump");
        body.velocity.x = 0.0;
        body.velocity.z = 0.0;
        body.velocity.y += force;
    }

    /// Runs along the current wall. Returns `false` when there is no wall.
    pub fn wall_run(&mut self, speed: f32, dt: f32) -> bool {
        let Some(normal) = self.probes.wall.normal() else {
            return false;
        };
        let stick = self.tuning.wall_stick_force;
        let body = self.body_mut("wall_run");
        let along = wall_run_direction(normal, body.forward());
        body.velocity = Vec3::new(along.x * speed, 0.0, along.z * speed);
        body.velocity += -normal * stick * dt;
        true
    }

    /// Launches off the current wall. Returns `false` when there is no wall.
    pub fn wall_jump(&mut self, force: f32) -> bool {
        let Some(normal) = self.probes.wall.normal() else {
            return false;
        };
        let body = self.body_mut("wall_jump");
        body.velocity = (normal + Vec3::Y).normalize_or_zero() * force;
        true
    }

    /// Pulls the body up onto the hang anchor. Returns `false` without one.
    pub fn climb_up(&mut self) -> bool {
        let Some(anchor) = self.hang_anchor else {
            return false;
        };
        let (height, forward) = (self.tuning.climb_height, self.tuning.climb_forward);
        let body = self.body_mut("climb_up");
        body.velocity = Vec3::ZERO;
        let target = anchor + Vec3::Y * height + body.forward() * forward;
        body.teleport(target);
        true
    }

    /// Zeroes horizontal velocity, keeping vertical.
    pub fn stop(&mut self) {
        let body = self.body_mut("stop");
        body.velocity.x = 0.0;
        body.velocity.z = 0.0;
    }

    /// Zeroes all velocity.
    pub fn halt(&mut self) {
        self.body_mut("halt").velocity = Vec3::ZERO;
    }

    /// Replaces velocity outright. Used by environmental launchers.
    pub fn launch(&mut self, velocity: Vec3) {
        self.body_mut("launch").velocity = velocity;
    }

    pub fn teleport(&mut self, position: Vec3) {
        self.body_mut("teleport").teleport(position);
    }

    pub fn set_gravity(&mut self, enabled: bool) {
        self.body_mut("set_gravity").gravity_enabled = enabled;
    }

    pub fn set_kinematic(&mut self, kinematic: bool) {
        self.body_mut("set_kinematic").kinematic = kinematic;
    }

    // --- timed modifiers ---

    pub fn add_modifier(&mut self, modifier: TimedModifier) {
        self.modifiers.push(modifier);
    }

    pub fn tick_modifiers(&mut self, dt: f32) {
        self.modifiers.retain_mut(|modifier| modifier.tick(dt));
    }

    pub fn active_modifiers(&self) -> &[TimedModifier] {
        &self.modifiers
    }

    fn bonus(&self, stat: Stat) -> f32 {
        self.modifiers
            .iter()
            .filter(|modifier| modifier.stat == stat)
            .map(|modifier| modifier.amount)
            .sum()
    }

    pub fn walk_speed(&self) -> f32 {
        self.tuning.walk_speed + self.bonus(Stat::WalkSpeed)
    }

    pub fn run_speed(&self) -> f32 {
        self.tuning.run_speed + self.bonus(Stat::RunSpeed)
    }

    pub fn zoom_speed(&self) -> f32 {
        self.walk_speed() * self.tuning.zoom_speed_multiplier
    }

    pub fn stamina_regen_rate(&self) -> f32 {
        self.tuning.stamina_regen_rate + self.bonus(Stat::StaminaRegen)
    }

    // --- late phase: camera ---

    pub fn set_zoomed(&mut self, zoomed: bool) {
        self.zoomed = zoomed;
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoomed
    }

    /// Camera pitch in degrees, positive looks up.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Current field of view in degrees.
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn fov_target(&self) -> f32 {
        if self.zoomed { self.tuning.zoom_fov } else { self.tuning.normal_fov }
    }

    /// Yaw goes to the body, pitch to the camera only.
    ///
    /// Look input follows mouse conventions: +x right, +y down.
    pub fn apply_look(&mut self) {
        let look = self.input.look_input * self.tuning.mouse_sensitivity;
        let dy = if self.tuning.invert_y { -look.y } else { look.y };
        self.pitch = (self.pitch - dy).clamp(-MAX_PITCH, MAX_PITCH);
        if look.x != 0.0 {
            self.body_mut("apply_look").yaw -= look.x.to_radians();
        }
    }

    /// Exponential approach towards the zoom or normal FOV.
    pub fn update_fov(&mut self, dt: f32) {
        let target = self.fov_target();
        let blend = 1.0 - (-self.tuning.fov_blend_rate * dt).exp();
        self.fov += (target - self.fov) * blend;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;

    fn controller() -> LocomotionController {
        let mut controller = LocomotionController::new(LocomotionTuning::default());
        controller.attach_body(Body::new(Vec3::ZERO));
        controller
    }

    #[test]
    fn move_preserves_vertical_velocity() {
        let mut ctl = controller();
        ctl.body_mut("test").velocity = Vec3::new(3.0, -4.0, 1.0);
        ctl.set_move_input(Vec2::new(1.0, 1.0));

        ctl.move_at(5.0);
        let velocity = ctl.body().velocity;
        assert_eq!(velocity.y, -4.0);
        assert!((Vec2::new(velocity.x, velocity.z).length() - 5.0).abs() < 1e-4);
        // Right is +X and forward is -Z at zero yaw.
        assert!(velocity.x > 0.0 && velocity.z < 0.0);
    }

    #[test]
    fn move_without_input_zeroes_horizontal() {
        let mut ctl = controller();
        ctl.body_mut("test").velocity = Vec3::new(3.0, 2.0, 1.0);
        ctl.move_at(5.0);
        assert_eq!(ctl.body().velocity, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn jump_kills_horizontal_speed() {
        let mut ctl = controller();
        ctl.body_mut("test").velocity = Vec3::new(3.0, 0.0, 1.0);
        ctl.jump(7.0);
        assert_eq!(ctl.body().velocity, Vec3::new(0.0, 7.0, 0.0));
    }

    #[test]
    fn wall_run_direction_prefers_forward_candidate() {
        let cases = [
            (Vec3::X, Vec3::NEG_Z),
            (Vec3::X, Vec3::Z),
            (Vec3::NEG_X, Vec3::new(0.3, 0.0, -0.9).normalize()),
            (Vec3::new(1.0, 0.0, 1.0).normalize(), Vec3::NEG_X),
            (Vec3::Z, Vec3::new(-0.2, 0.0, 0.5).normalize()),
        ];
        for (normal, forward) in cases {
            let chosen = wall_run_direction(normal, forward);
            let rejected = -chosen;
            assert!(forward.dot(chosen) >= forward.dot(rejected));
            assert!(chosen.dot(normal).abs() < 1e-5);
            assert!(chosen.y.abs() < 1e-5);
        }
    }

    #[test]
    fn wall_run_sets_along_wall_velocity_and_pushes_in() {
        let mut ctl = controller();
        ctl.refresh_probes(&ScriptedProbe::airborne().with_wall(WallContact::Right(Vec3::NEG_X)));
        ctl.body_mut("test").velocity.y = -3.0;

        assert!(ctl.wall_run(8.0, 0.1));
        let velocity = ctl.body().velocity;
        assert_eq!(velocity.y, 0.0);
        // Facing -Z: the wall tangent closest to forward is -Z.
        assert!((velocity.z + 8.0).abs() < 1e-4);
        // Pushed towards the wall (+X, opposite the normal).
        assert!(velocity.x > 0.0);
    }

    #[test]
    fn wall_run_without_wall_does_nothing() {
        let mut ctl = controller();
        ctl.body_mut("test").velocity = Vec3::ONE;
        assert!(!ctl.wall_run(8.0, 0.1));
        assert_eq!(ctl.body().velocity, Vec3::ONE);
    }

    #[test]
    fn wall_jump_launches_off_the_wall() {
        let mut ctl = controller();
        ctl.refresh_probes(&ScriptedProbe::airborne().with_wall(WallContact::Left(Vec3::X)));
        assert!(ctl.wall_jump(10.0));
        let expected = (Vec3::X + Vec3::Y).normalize() * 10.0;
        assert!((ctl.body().velocity - expected).length() < 1e-4);
    }

    #[test]
    fn climb_up_teleports_above_anchor() {
        let mut ctl = controller();
        let anchor = Vec3::new(0.0, 2.0, -0.5);
        ctl.refresh_probes(&ScriptedProbe::airborne().with_ledge(anchor));
        assert_eq!(ctl.grab_ledge(), Some(anchor));
        ctl.body_mut("test").velocity = Vec3::new(0.0, -2.0, 0.0);

        assert!(ctl.climb_up());
        let body = ctl.body();
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(body.teleported);
        let expected = anchor + Vec3::Y * 2.0 + Vec3::NEG_Z * 0.5;
        assert!((body.position - expected).length() < 1e-5);
    }

    #[test]
    fn climb_up_needs_an_anchor() {
        let mut ctl = controller();
        assert!(!ctl.climb_up());
        assert!(!ctl.body().teleported);
    }

    #[test]
    fn stop_keeps_vertical() {
        let mut ctl = controller();
        ctl.body_mut("test").velocity = Vec3::new(1.0, -9.0, 1.0);
        ctl.stop();
        assert_eq!(ctl.body().velocity, Vec3::new(0.0, -9.0, 0.0));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut ctl = controller();
        ctl.tuning.mouse_sensitivity = 1.0;
        ctl.set_look_input(Vec2::new(0.0, -500.0));
        ctl.apply_look();
        assert_eq!(ctl.pitch(), MAX_PITCH);

        ctl.set_look_input(Vec2::new(0.0, 1000.0));
        ctl.apply_look();
        assert_eq!(ctl.pitch(), -MAX_PITCH);
    }

    #[test]
    fn look_yaw_turns_body_not_pitch() {
        let mut ctl = controller();
        ctl.tuning.mouse_sensitivity = 1.0;
        ctl.set_look_input(Vec2::new(90.0, 0.0));
        ctl.apply_look();
        assert_eq!(ctl.pitch(), 0.0);
        // Looking right from -Z faces +X.
        assert!((ctl.body().forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn fov_approach_is_exponential_and_frame_rate_independent() {
        let mut coarse = controller();
        let mut fine = controller();
        coarse.set_zoomed(true);
        fine.set_zoomed(true);

        coarse.update_fov(0.1);
        for _ in 0..10 {
            fine.update_fov(0.01);
        }
        assert!((coarse.fov() - fine.fov()).abs() < 1e-3);

        let target = coarse.tuning.zoom_fov;
        let start = coarse.tuning.normal_fov;
        assert!(coarse.fov() < start && coarse.fov() > target);
    }

    #[test]
    fn modifiers_stack_and_expire() {
        let mut ctl = controller();
        let base = ctl.walk_speed();
        ctl.add_modifier(TimedModifier::new(Stat::WalkSpeed, 2.0, 1.0));
        ctl.add_modifier(TimedModifier::new(Stat::WalkSpeed, 1.0, 3.0));
        ctl.add_modifier(TimedModifier::new(Stat::StaminaRegen, 10.0, 1.0));
        assert_eq!(ctl.walk_speed(), base + 3.0);

        ctl.tick_modifiers(1.5);
        assert_eq!(ctl.walk_speed(), base + 1.0);
        assert_eq!(ctl.stamina_regen_rate(), ctl.tuning.stamina_regen_rate);

        ctl.tick_modifiers(2.0);
        assert_eq!(ctl.walk_speed(), base);
        assert!(ctl.active_modifiers().is_empty());
    }

    #[test]
    fn probe_frames_increase() {
        let mut ctl = controller();
        assert_eq!(ctl.probes().frame, 0);
        ctl.refresh_probes(&ScriptedProbe::grounded());
        ctl.refresh_probes(&ScriptedProbe::grounded());
        assert_eq!(ctl.probes().frame, 2);
        assert!(ctl.is_grounded());
    }

    #[test]
    #[should_panic(expected = "before a body was attached")]
    fn primitives_fail_fast_without_body() {
        let mut ctl = LocomotionController::new(LocomotionTuning::default());
        ctl.jump(5.0);
    }
}
