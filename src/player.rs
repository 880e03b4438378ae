//! The player character: a state machine, a locomotion controller and a
//! health/stamina pool wired to the shared [`EventBus`].
//!
//! The three parts live together in a [`PlayerCharacter`] behind a mutex so
//! that bus handlers (which only receive a signal) and ECS systems (which only
//! see components) reach the same instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::camera::first_person_camera;
use crate::character::{CharacterResources, Damageable, StaminaUser};
use crate::character_controller::components::{
    Body, CharacterController, EnvironmentProbe, TimedModifier,
};
use crate::character_controller::locomotion::{LocomotionController, LocomotionTuning};
use crate::character_controller::states::{Actor, FsmTuning, PlayerFsm, PlayerState};
use crate::character_controller::CharacterSet;
use crate::error::HandlerError;
use crate::event_bus::{EventBus, HandlerId, Signal, SignalArg};
use crate::game_states::AppState;
use crate::settings::PlayerSettings;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SpawnPoint(Vec3::new(0.0, 1.5, 0.0)))
            .insert_resource(KillPlane(-20.0))
            .add_systems(Startup, setup)
            .add_systems(
                Update,
                (apply_kill_plane, respawn_on_key)
                    .in_set(CharacterSet::React)
                    .run_if(in_state(AppState::InGame)),
            );
    }
}

/// Input signals the character reacts to.
const HANDLED_SIGNALS: [Signal; 5] = [
    Signal::JumpRequested,
    Signal::AttackRequested,
    Signal::InteractRequested,
    Signal::SprintToggled,
    Signal::ZoomToggled,
];

#[derive(Component)]
pub struct Player;

#[derive(Resource, Debug, Clone, Copy)]
pub struct SpawnPoint(pub Vec3);

/// Falling below this height is lethal.
#[derive(Resource, Debug, Clone, Copy)]
pub struct KillPlane(pub f32);

pub struct PlayerCharacter {
    pub fsm: PlayerFsm,
    pub locomotion: LocomotionController,
    pub resources: CharacterResources,
    bus: EventBus,
}

impl PlayerCharacter {
    pub fn new(settings: &PlayerSettings, bus: EventBus) -> Self {
        Self {
            fsm: PlayerFsm::new(FsmTuning::from(settings)),
            locomotion: LocomotionController::new(LocomotionTuning::from(settings)),
            resources: CharacterResources::from_settings(&settings.stamina, bus.clone()),
            bus,
        }
    }

    /// Same as [`PlayerCharacter::new`], with the body already attached.
    pub fn with_body(settings: &PlayerSettings, bus: EventBus, body: Body) -> Self {
        let mut character = Self::new(settings, bus);
        character.locomotion.attach_body(body);
        character
    }

    fn split(&mut self) -> (&mut PlayerFsm, Actor<'_>) {
        (
            &mut self.fsm,
            Actor {
                locomotion: &mut self.locomotion,
                resources: &mut self.resources,
                bus: &self.bus,
            },
        )
    }

    pub fn state(&self) -> PlayerState {
        self.fsm.state()
    }

    pub fn is_grounded(&self) -> bool {
        self.locomotion.is_grounded()
    }

    pub fn is_sprinting(&self) -> bool {
        self.locomotion.is_sprinting()
    }

    pub fn is_zoom_pressed(&self) -> bool {
        self.locomotion.is_zoom_pressed()
    }

    pub fn has_move_input(&self) -> bool {
        self.locomotion.has_move_input()
    }

    pub fn animation_speed(&self) -> f32 {
        self.fsm.animation_speed(&self.locomotion)
    }

    pub fn handle_signal(&mut self, signal: Signal, arg: SignalArg) {
        let (fsm, mut actor) = self.split();
        fsm.handle_signal(signal, arg, &mut actor);
    }

    pub fn refresh_probes(&mut self, probe: &impl EnvironmentProbe) {
        self.locomotion.refresh_probes(probe);
    }

    pub fn update(&mut self, dt: f32) {
        self.locomotion.tick_modifiers(dt);
        let (fsm, mut actor) = self.split();
        fsm.update(dt, &mut actor);
    }

    pub fn fixed_update(&mut self, dt: f32) {
        self.fsm.handle_physics(dt, &mut self.locomotion);
    }

    pub fn late_update(&mut self, dt: f32) {
        self.locomotion.apply_look();
        self.locomotion.update_fov(dt);
    }

    /// Returns `true` if this hit killed the character.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        let killed = self.resources.take_damage(amount);
        if killed {
            let (fsm, mut actor) = self.split();
            fsm.change_state(PlayerState::Dead, &mut actor);
        }
        killed
    }

    /// Restores resources and moves the body to `position`.
    pub fn respawn(&mut self, position: Vec3) {
        self.resources.respawn();
        self.locomotion.teleport(position);
        self.locomotion.halt();
        let (fsm, mut actor) = self.split();
        fsm.change_state(PlayerState::Idle, &mut actor);
        self.locomotion.set_gravity(true);
        self.locomotion.set_kinematic(false);
        info!("player respawned at {position}");
    }

    /// Launch from the world with the given velocity. Refused while dead.
    pub fn force_jump(&mut self, velocity: Vec3) -> bool {
        if self.state() == PlayerState::Dead {
            return false;
        }
        self.locomotion.launch(velocity);
        let (fsm, mut actor) = self.split();
        fsm.force_jump(&mut actor)
    }

    pub fn add_modifier(&mut self, modifier: TimedModifier) {
        self.locomotion.add_modifier(modifier);
    }
}

pub type SharedCharacter = Arc<Mutex<PlayerCharacter>>;

/// Subscribes the character to its input signals. Handlers hold a weak
/// reference and go quiet once the character is dropped.
pub fn connect_input(character: &SharedCharacter, bus: &EventBus) -> Vec<(Signal, HandlerId)> {
    HANDLED_SIGNALS
        .into_iter()
        .map(|signal| {
            let weak = Arc::downgrade(character);
            let id = bus.subscribe(signal, move |signal, arg| {
                let Some(character) = weak.upgrade() else {
                    return Ok(());
                };
                let mut character = match character.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::WouldBlock) => return Err(HandlerError::Reentrant(signal)),
                    Err(TryLockError::Poisoned(_)) => return Err(HandlerError::Poisoned(signal)),
                };
                character.handle_signal(signal, arg);
                Ok(())
            });
            (signal, id)
        })
        .collect()
}

/// Owns the shared character and its bus subscriptions.
#[derive(Component)]
pub struct PlayerHandle {
    character: SharedCharacter,
    bus: EventBus,
    subscriptions: Vec<(Signal, HandlerId)>,
}

impl PlayerHandle {
    pub fn new(character: PlayerCharacter, bus: &EventBus) -> Self {
        let character = Arc::new(Mutex::new(character));
        let subscriptions = connect_input(&character, bus);
        Self {
            character,
            bus: bus.clone(),
            subscriptions,
        }
    }

    /// Locks the character, recovering from a poisoned lock.
    pub fn lock(&self) -> MutexGuard<'_, PlayerCharacter> {
        self.character.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        for (signal, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(signal, id);
        }
    }
}

fn setup(
    mut commands: Commands,
    settings: Res<PlayerSettings>,
    bus: Res<EventBus>,
    spawn: Res<SpawnPoint>,
) {
    let character = PlayerCharacter::with_body(&settings, bus.clone(), Body::new(spawn.0));

    commands
        .spawn((
            Name::new("Player"),
            Transform::from_translation(spawn.0),
            Player,
            PlayerHandle::new(character, &bus),
            CharacterController::new(
                Collider::capsule(0.4, 1.0),
                settings.movement.gravity_scale,
            ),
        ))
        .with_children(|parent| {
            parent.spawn(first_person_camera(&settings.camera));
        });
}

fn apply_kill_plane(kill_plane: Res<KillPlane>, players: Query<&PlayerHandle, With<Player>>) {
    for handle in &players {
        let mut character = handle.lock();
        if character.resources.is_dead() || !character.locomotion.is_attached() {
            continue;
        }
        if character.locomotion.body().position.y < kill_plane.0 {
            let lethal = character.resources.max_health();
            if character.take_damage(lethal) {
                warn!("player fell out of the world");
            }
        }
    }
}

fn respawn_on_key(
    keyboard: Res<ButtonInput<KeyCode>>,
    spawn: Res<SpawnPoint>,
    players: Query<&PlayerHandle, With<Player>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }
    for handle in &players {
        let mut character = handle.lock();
        if character.resources.is_dead() {
            character.respawn(spawn.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProbe, SignalRecorder};

    fn spawn() -> (SharedCharacter, EventBus, Vec<(Signal, HandlerId)>) {
        let bus = EventBus::new();
        let character = PlayerCharacter::with_body(
            &PlayerSettings::default(),
            bus.clone(),
            Body::new(Vec3::ZERO),
        );
        let shared = Arc::new(Mutex::new(character));
        let subscriptions = connect_input(&shared, &bus);
        shared.lock().unwrap().refresh_probes(&ScriptedProbe::grounded());
        (shared, bus, subscriptions)
    }

    #[test]
    fn bus_signals_reach_the_state_machine() {
        let (character, bus, _) = spawn();
        let delivery = bus.publish(Signal::JumpRequested);
        assert!(delivery.is_clean());
        assert_eq!(character.lock().unwrap().state(), PlayerState::Jump);
    }

    #[test]
    fn busy_character_reports_reentrancy() {
        let (character, bus, _) = spawn();
        let _guard = character.lock().unwrap();
        let delivery = bus.publish(Signal::JumpRequested);
        assert_eq!(delivery.failures, vec![HandlerError::Reentrant(Signal::JumpRequested)]);
    }

    #[test]
    fn dropped_character_is_ignored() {
        let (character, bus, _) = spawn();
        drop(character);
        let delivery = bus.publish(Signal::AttackRequested);
        assert!(delivery.is_clean());
    }

    #[test]
    fn handle_unsubscribes_on_drop() {
        let bus = EventBus::new();
        let character = PlayerCharacter::new(&PlayerSettings::default(), bus.clone());
        let handle = PlayerHandle::new(character, &bus);
        assert_eq!(bus.handler_count(Signal::JumpRequested), 1);
        drop(handle);
        for signal in HANDLED_SIGNALS {
            assert_eq!(bus.handler_count(signal), 0);
        }
    }

    #[test]
    fn lethal_damage_kills_immediately() {
        let (character, bus, _) = spawn();
        let recorder = SignalRecorder::attach(&bus);
        let mut character = character.lock().unwrap();
        assert!(!character.take_damage(30.0));
        assert!(character.take_damage(500.0));
        assert_eq!(character.state(), PlayerState::Dead);
        assert!(character.locomotion.body().kinematic);
        assert_eq!(recorder.count(Signal::Dead), 1);
    }

    #[test]
    fn respawn_returns_to_idle_at_spawn() {
        let (character, bus, _) = spawn();
        let recorder = SignalRecorder::attach(&bus);
        let mut character = character.lock().unwrap();
        character.take_damage(500.0);

        let spawn_point = Vec3::new(1.0, 2.0, 3.0);
        character.respawn(spawn_point);
        assert_eq!(character.state(), PlayerState::Idle);
        assert_eq!(character.resources.health(), 100.0);
        let body = character.locomotion.body();
        assert_eq!(body.position, spawn_point);
        assert!(body.teleported);
        assert!(!body.kinematic);
        assert!(body.gravity_enabled);
        assert_eq!(recorder.count(Signal::StaminaChanged), 1);
        assert_eq!(recorder.count(Signal::Respawned), 1);
    }

    #[test]
    fn force_jump_sets_velocity_and_skips_stamina() {
        let (character, _, _) = spawn();
        let mut character = character.lock().unwrap();
        assert!(character.force_jump(Vec3::Y * 15.0));
        assert_eq!(character.state(), PlayerState::Jump);
        assert_eq!(character.locomotion.body().velocity, Vec3::Y * 15.0);
        assert_eq!(character.resources.stamina(), 100.0);

        character.take_damage(500.0);
        assert!(!character.force_jump(Vec3::Y * 15.0));
        assert_eq!(character.locomotion.body().velocity, Vec3::ZERO);
    }

    #[test]
    fn modifiers_expire_through_update() {
        let (character, _, _) = spawn();
        let mut character = character.lock().unwrap();
        let base = character.locomotion.walk_speed();
        character.add_modifier(TimedModifier::new(
            crate::character_controller::components::Stat::WalkSpeed,
            3.0,
            1.0,
        ));
        assert_eq!(character.locomotion.walk_speed(), base + 3.0);
        character.update(1.5);
        assert_eq!(character.locomotion.walk_speed(), base);
    }
}
