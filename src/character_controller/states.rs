//! Player state machine.
//!
//! Exactly one [`PlayerState`] is active. Input signals and per-tick checks
//! request transitions; every transition runs the old state's exit hook and
//! then the new state's enter hook. A failing hook drops the machine back to
//! [`PlayerState::Idle`] with gravity restored.
use bevy::prelude::*;

use crate::character::{CharacterResources, Damageable, StaminaUser};
use crate::character_controller::locomotion::LocomotionController;
use crate::error::TransitionError;
use crate::event_bus::{EventBus, Signal, SignalArg};
use crate::settings::PlayerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum PlayerState {
    #[default]
    Idle,
    Move,
    Run,
    Jump,
    WallRun,
    Hang,
    Zoom,
    Attack,
    Interact,
    Dead,
}

/// Why the machine is entering [`PlayerState::Jump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Launch {
    /// Walked off an edge, lost the wall or let go of a ledge.
    #[default]
    Fall,
    Ground,
    Wall,
    /// Velocity was already set by something in the world.
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsmTuning {
    pub run_cost: f32,
    pub wall_run_cost: f32,
    pub jump_cost: f32,
    pub jump_force: f32,
    pub attack_duration: f32,
    pub interact_duration: f32,
    pub landing_grace: f32,
    pub wall_reattach_delay: f32,
}

impl From<&PlayerSettings> for FsmTuning {
    fn from(settings: &PlayerSettings) -> Self {
        Self {
            run_cost: settings.stamina.run_cost,
            wall_run_cost: settings.stamina.wall_run_cost,
            jump_cost: settings.stamina.jump_cost,
            jump_force: settings.movement.jump_force,
            attack_duration: settings.timers.attack_duration,
            interact_duration: settings.timers.interact_duration,
            landing_grace: settings.timers.landing_grace,
            wall_reattach_delay: settings.movement.wall_reattach_delay,
        }
    }
}

impl Default for FsmTuning {
    fn default() -> Self {
        Self::from(&PlayerSettings::default())
    }
}

/// Everything the machine drives, borrowed for the duration of one call.
pub struct Actor<'a> {
    pub locomotion: &'a mut LocomotionController,
    pub resources: &'a mut CharacterResources,
    pub bus: &'a EventBus,
}

/// Bookkeeping for the airborne phase, used to tell a real landing from the
/// stale ground contact left over from the takeoff frame.
#[derive(Debug, Clone, Copy, Default)]
struct Airtime {
    takeoff_frame: u64,
    left_ground: bool,
    elapsed: f32,
}

pub struct PlayerFsm {
    pub tuning: FsmTuning,
    state: PlayerState,
    pending_launch: Launch,
    airtime: Airtime,
    wall_cooldown: f32,
    attack_elapsed: f32,
    interact_elapsed: f32,
}

impl PlayerFsm {
    pub fn new(tuning: FsmTuning) -> Self {
        Self {
            tuning,
            state: PlayerState::Idle,
            pending_launch: Launch::Fall,
            airtime: Airtime::default(),
            wall_cooldown: 0.0,
            attack_elapsed: 0.0,
            interact_elapsed: 0.0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn attack_elapsed(&self) -> f32 {
        self.attack_elapsed
    }

    pub fn interact_elapsed(&self) -> f32 {
        self.interact_elapsed
    }

    /// Playback speed for the locomotion animation of the current state.
    pub fn animation_speed(&self, locomotion: &LocomotionController) -> f32 {
        if !locomotion.has_move_input() {
            return 0.0;
        }
        match self.state {
            PlayerState::Move => 0.5,
            PlayerState::Run => 1.0,
            PlayerState::Zoom => 0.3,
            _ => 0.0,
        }
    }

    /// Switches to `next`, running exit then enter hooks. Same-state requests
    /// are ignored.
    pub fn change_state(&mut self, next: PlayerState, actor: &mut Actor) {
        let previous = self.state;
        if previous == next {
            return;
        }
        let outcome = match self.exit(previous, next, actor) {
            Ok(()) => {
                self.state = next;
                self.enter(next, actor)
            }
            Err(err) => Err(err),
        };
        self.pending_launch = Launch::Fall;
        match outcome {
            Ok(()) => debug!("player state {previous:?} -> {next:?}"),
            Err(err) => {
                error!("player transition {previous:?} -> {next:?} failed: {err}");
                self.recover(actor);
            }
        }
    }

    fn recover(&mut self, actor: &mut Actor) {
        self.state = PlayerState::Idle;
        actor.locomotion.release_ledge();
        actor.locomotion.set_zoomed(false);
        actor.locomotion.set_gravity(true);
        actor.locomotion.set_kinematic(false);
    }

    fn launch(&mut self, launch: Launch, actor: &mut Actor) {
        self.pending_launch = launch;
        self.change_state(PlayerState::Jump, actor);
    }

    /// Starts a new airborne arc. Landing is judged against probes taken
    /// after this call.
    fn begin_airtime(
        &mut self,
        launch: Launch,
        actor: &mut Actor,
    ) -> Result<(), TransitionError> {
        self.airtime = Airtime {
            takeoff_frame: actor.locomotion.probes().frame,
            ..default()
        };
        match launch {
            Launch::Fall => {}
            Launch::Ground => {
                actor.locomotion.jump(self.tuning.jump_force);
                actor.resources.consume_stamina(self.tuning.jump_cost);
                actor.bus.publish(Signal::Jumped);
            }
            Launch::Wall => {
                if !actor.locomotion.wall_jump(self.tuning.jump_force) {
                    return Err(TransitionError::NoWallContact(PlayerState::Jump));
                }
                actor.resources.consume_stamina(self.tuning.jump_cost);
                self.wall_cooldown = self.tuning.wall_reattach_delay;
                actor.bus.publish(Signal::Jumped);
            }
            Launch::External => {
                actor.bus.publish(Signal::Jumped);
            }
        }
        Ok(())
    }

    fn enter(&mut self, state: PlayerState, actor: &mut Actor) -> Result<(), TransitionError> {
        match state {
            PlayerState::Idle => actor.locomotion.stop(),
            PlayerState::Jump => self.begin_airtime(self.pending_launch, actor)?,
            PlayerState::WallRun => {
                if !actor.locomotion.is_on_wall() {
                    return Err(TransitionError::NoWallContact(state));
                }
                actor.locomotion.set_gravity(false);
            }
            PlayerState::Hang => {
                if actor.locomotion.grab_ledge().is_none() {
                    return Err(TransitionError::NoLedgeAnchor(state));
                }
                actor.locomotion.halt();
                actor.locomotion.set_gravity(false);
            }
            PlayerState::Zoom => actor.locomotion.set_zoomed(true),
            PlayerState::Attack => {
                self.attack_elapsed = 0.0;
                if actor.locomotion.is_grounded() {
                    actor.locomotion.stop();
                }
                actor.bus.publish(Signal::WeaponFired);
            }
            PlayerState::Interact => {
                self.interact_elapsed = 0.0;
                actor.locomotion.stop();
            }
            PlayerState::Dead => {
                actor.locomotion.halt();
                actor.locomotion.set_kinematic(true);
                actor.bus.publish(Signal::Dead);
            }
            PlayerState::Move | PlayerState::Run => {}
        }
        Ok(())
    }

    fn exit(
        &mut self,
        state: PlayerState,
        next: PlayerState,
        actor: &mut Actor,
    ) -> Result<(), TransitionError> {
        match state {
            PlayerState::WallRun => actor.locomotion.set_gravity(true),
            PlayerState::Hang => {
                let climbed = next != PlayerState::Idle || actor.locomotion.climb_up();
                actor.locomotion.release_ledge();
                actor.locomotion.set_gravity(true);
                if !climbed {
                    return Err(TransitionError::NoLedgeAnchor(state));
                }
            }
            PlayerState::Zoom => actor.locomotion.set_zoomed(false),
            PlayerState::Dead => actor.locomotion.set_kinematic(false),
            _ => {}
        }
        Ok(())
    }

    /// Grounded state matching the current input.
    fn grounded_state(&self, actor: &Actor) -> PlayerState {
        if !actor.locomotion.has_move_input() {
            PlayerState::Idle
        } else if self.can_sprint(actor) {
            PlayerState::Run
        } else {
            PlayerState::Move
        }
    }

    fn can_sprint(&self, actor: &Actor) -> bool {
        actor.locomotion.is_sprinting() && actor.resources.stamina() > 0.0
    }

    // --- signal handlers ---

    /// Reacts to an input signal published on the bus.
    pub fn handle_signal(&mut self, signal: Signal, arg: SignalArg, actor: &mut Actor) {
        if self.state == PlayerState::Dead {
            return;
        }
        match signal {
            Signal::JumpRequested => self.on_jump_requested(actor),
            Signal::AttackRequested => self.on_attack_requested(actor),
            Signal::InteractRequested => self.on_interact_requested(actor),
            Signal::SprintToggled => {
                let held = arg.unwrap_or_else(|| actor.locomotion.is_sprinting());
                self.on_sprint_toggled(held, actor);
            }
            Signal::ZoomToggled => {
                let held = arg.unwrap_or_else(|| actor.locomotion.is_zoom_pressed());
                self.on_zoom_toggled(held, actor);
            }
            _ => {}
        }
    }

    fn on_jump_requested(&mut self, actor: &mut Actor) {
        let affordable = actor.resources.has_stamina(self.tuning.jump_cost);
        match self.state {
            PlayerState::Idle | PlayerState::Move | PlayerState::Run | PlayerState::Zoom => {
                if actor.locomotion.is_grounded() && affordable {
                    self.launch(Launch::Ground, actor);
                }
            }
            PlayerState::Jump => {
                if !actor.locomotion.is_grounded() && actor.locomotion.ledge_probe().is_some() {
                    self.change_state(PlayerState::Hang, actor);
                }
            }
            PlayerState::WallRun => {
                if affordable {
                    self.launch(Launch::Wall, actor);
                }
            }
            PlayerState::Hang => self.change_state(PlayerState::Idle, actor),
            _ => {}
        }
    }

    fn on_attack_requested(&mut self, actor: &mut Actor) {
        if !matches!(
            self.state,
            PlayerState::Dead | PlayerState::Attack | PlayerState::WallRun | PlayerState::Hang
        ) {
            self.change_state(PlayerState::Attack, actor);
        }
    }

    fn on_interact_requested(&mut self, actor: &mut Actor) {
        if matches!(self.state, PlayerState::Idle | PlayerState::Move) {
            self.change_state(PlayerState::Interact, actor);
        }
    }

    fn on_sprint_toggled(&mut self, held: bool, actor: &mut Actor) {
        match (self.state, held) {
            (PlayerState::Zoom, true) => self.change_state(PlayerState::Move, actor),
            (PlayerState::Move, true) if actor.resources.stamina() > 0.0 => {
                self.change_state(PlayerState::Run, actor);
            }
            (PlayerState::Run, false) => self.change_state(PlayerState::Move, actor),
            _ => {}
        }
    }

    fn on_zoom_toggled(&mut self, held: bool, actor: &mut Actor) {
        match (self.state, held) {
            (PlayerState::Idle | PlayerState::Move | PlayerState::Run, true) => {
                self.change_state(PlayerState::Zoom, actor);
            }
            (PlayerState::Zoom, false) => {
                let next = if actor.locomotion.has_move_input() {
                    PlayerState::Move
                } else {
                    PlayerState::Idle
                };
                self.change_state(next, actor);
            }
            _ => {}
        }
    }

    /// Launch requested by the world (bounce pads and the like). The caller
    /// has already set the velocity. Refused while dead.
    pub fn force_jump(&mut self, actor: &mut Actor) -> bool {
        match self.state {
            PlayerState::Dead => return false,
            // Already airborne: restart the arc in place.
            PlayerState::Jump => {
                if let Err(err) = self.begin_airtime(Launch::External, actor) {
                    error!("player relaunch failed: {err}");
                    self.recover(actor);
                }
            }
            _ => self.launch(Launch::External, actor),
        }
        true
    }

    // --- per-tick logic ---

    /// Frame-rate tick. Expects probes to have been refreshed this frame.
    pub fn update(&mut self, dt: f32, actor: &mut Actor) {
        if actor.resources.is_dead() {
            if self.state != PlayerState::Dead {
                self.change_state(PlayerState::Dead, actor);
            }
            return;
        }
        if self.state == PlayerState::Dead {
            return;
        }
        self.wall_cooldown = (self.wall_cooldown - dt).max(0.0);

        match self.state {
            PlayerState::Idle | PlayerState::Move => {
                let next = self.grounded_state(actor);
                self.change_state(next, actor);
            }
            PlayerState::Run => self.update_run(dt, actor),
            PlayerState::Jump => self.update_jump(dt, actor),
            PlayerState::WallRun => self.update_wall_run(dt, actor),
            PlayerState::Hang => {
                if actor.locomotion.has_down_input() {
                    self.change_state(PlayerState::Jump, actor);
                }
            }
            PlayerState::Zoom => {
                if !actor.locomotion.is_zoom_pressed() {
                    self.on_zoom_toggled(false, actor);
                }
            }
            PlayerState::Attack => {
                self.attack_elapsed += dt;
                if self.attack_elapsed >= self.tuning.attack_duration {
                    let next = self.grounded_state(actor);
                    self.change_state(next, actor);
                }
            }
            PlayerState::Interact => {
                self.interact_elapsed += dt;
                if self.interact_elapsed >= self.tuning.interact_duration {
                    actor.bus.publish(Signal::InteractionCompleted);
                    self.change_state(PlayerState::Idle, actor);
                }
            }
            PlayerState::Dead => {}
        }

        self.recover_stamina(dt, actor);
    }

    fn update_run(&mut self, dt: f32, actor: &mut Actor) {
        if !actor.locomotion.has_move_input() {
            self.change_state(PlayerState::Idle, actor);
            return;
        }
        if !actor.locomotion.is_sprinting() {
            self.change_state(PlayerState::Move, actor);
            return;
        }
        actor.resources.consume_stamina(self.tuning.run_cost * dt);
        if actor.resources.stamina() <= 0.0 {
            self.change_state(PlayerState::Move, actor);
        }
    }

    fn update_jump(&mut self, dt: f32, actor: &mut Actor) {
        self.airtime.elapsed += dt;
        let probes = actor.locomotion.probes();
        if probes.frame <= self.airtime.takeoff_frame {
            return;
        }
        if !probes.grounded {
            self.airtime.left_ground = true;
            if self.wall_cooldown <= 0.0
                && actor.locomotion.can_wall_run()
                && actor.resources.stamina() > 0.0
            {
                self.change_state(PlayerState::WallRun, actor);
            }
            return;
        }
        if self.airtime.left_ground || self.airtime.elapsed >= self.tuning.landing_grace {
            actor.bus.publish(Signal::Landed);
            let next = self.grounded_state(actor);
            self.change_state(next, actor);
        }
    }

    fn update_wall_run(&mut self, dt: f32, actor: &mut Actor) {
        if !actor.locomotion.is_on_wall() || actor.locomotion.is_grounded() {
            self.change_state(PlayerState::Jump, actor);
            return;
        }
        actor.resources.consume_stamina(self.tuning.wall_run_cost * dt);
        if actor.resources.stamina() <= 0.0 {
            self.change_state(PlayerState::Jump, actor);
        }
    }

    fn recover_stamina(&mut self, dt: f32, actor: &mut Actor) {
        let draining = matches!(self.state, PlayerState::Run | PlayerState::WallRun);
        if draining || actor.locomotion.is_sprinting() {
            return;
        }
        if actor.resources.stamina() < actor.resources.max_stamina() {
            let rate = actor.locomotion.stamina_regen_rate();
            actor.resources.restore_stamina(rate * dt);
        }
    }

    /// Fixed-rate tick: turns the current state into body velocity.
    pub fn handle_physics(&self, dt: f32, locomotion: &mut LocomotionController) {
        match self.state {
            PlayerState::Move => {
                let speed = locomotion.walk_speed();
                locomotion.move_at(speed);
            }
            PlayerState::Run => {
                let speed = locomotion.run_speed();
                locomotion.move_at(speed);
            }
            PlayerState::Zoom => {
                let speed = locomotion.zoom_speed();
                locomotion.move_at(speed);
            }
            PlayerState::WallRun => {
                let speed = locomotion.tuning.wall_run_speed;
                locomotion.wall_run(speed, dt);
            }
            _ => {}
        }
    }
}
