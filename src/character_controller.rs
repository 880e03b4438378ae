pub mod components;
pub mod input;
pub mod locomotion;
pub mod physics;
pub mod states;

use bevy::prelude::*;

use crate::game_states::AppState;
use crate::player::PlayerHandle;
pub use components::*;
use input::sample_input;
use physics::*;

pub struct CharacterControllerPlugin;

/// Frame-rate phases of the character, in order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterSet {
    /// Body pull and environment probes.
    Sense,
    /// Input sampling; bus handlers run the state machine inline.
    Input,
    /// State machine tick.
    Logic,
    /// Systems reacting to the new state (pickups, pads, damage).
    React,
    /// Look and field of view, then body push.
    Late,
}

impl Plugin for CharacterControllerPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                CharacterSet::Sense,
                CharacterSet::Input,
                CharacterSet::Logic,
                CharacterSet::React,
                CharacterSet::Late,
            )
                .chain()
                .run_if(in_state(AppState::InGame)),
        )
        .add_systems(
            Update,
            (
                (pull_body, refresh_probes).chain().in_set(CharacterSet::Sense),
                sample_input.in_set(CharacterSet::Input),
                update_characters.in_set(CharacterSet::Logic),
                (late_update_characters, push_body)
                    .chain()
                    .in_set(CharacterSet::Late),
            ),
        )
        .add_systems(
            FixedUpdate,
            (pull_body, dispatch_physics, push_body)
                .chain()
                .run_if(in_state(AppState::InGame)),
        );

        #[cfg(debug_assertions)]
        app.add_systems(
            Update,
            debug_visualize_probes.after(CharacterSet::Sense),
        );
    }
}

/// Timed modifiers and the state machine tick.
fn update_characters(time: Res<Time>, players: Query<&PlayerHandle>) {
    let dt = time.delta_secs();
    for handle in &players {
        handle.lock().update(dt);
    }
}

/// Mouse look and field of view. Runs after everything else has moved.
fn late_update_characters(time: Res<Time>, players: Query<&PlayerHandle>) {
    let dt = time.delta_secs();
    for handle in &players {
        handle.lock().late_update(dt);
    }
}
