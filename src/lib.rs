//! First-person parkour controller: walk, sprint, jump, wall-run, ledge-hang,
//! aim, attack and interact, driven by a state machine over a physics body.
pub mod camera;
pub mod character;
pub mod character_controller;
pub mod error;
pub mod event_bus;
pub mod game_states;
pub mod hud;
pub mod interactables;
pub mod physics;
pub mod player;
pub mod settings;
pub mod world;

#[cfg(test)]
mod testing;

use bevy::prelude::*;

use crate::event_bus::EventBus;
use crate::settings::{PlayerSettings, SETTINGS_PATH};

/// Everything the game needs on top of `DefaultPlugins`.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(PlayerSettings::load_or_default(SETTINGS_PATH))
            .insert_resource(EventBus::new())
            .add_plugins((
                game_states::GameStatePlugin,
                physics::PhysicsPlugin,
                world::WorldPlugin,
                character_controller::CharacterControllerPlugin,
                player::PlayerPlugin,
                camera::CameraPlugin,
                interactables::InteractablesPlugin,
                hud::HudPlugin,
            ));
    }
}
