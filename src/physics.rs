use avian3d::prelude::*;
use bevy::prelude::*;

pub(crate) struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PhysicsPlugins::default());
    }
}

/// Collision layers. Probes only look at [`GameLayer::Ground`] and
/// [`GameLayer::Wall`], so triggers and the player never count as terrain.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    #[default]
    Default,
    Ground,
    Wall,
    Player,
    /// Sensors such as pickups and bounce pads
    Trigger,
}

impl GameLayer {
    /// Layers the environment probes report hits against.
    pub fn terrain() -> LayerMask {
        LayerMask::from([GameLayer::Ground, GameLayer::Wall])
    }
}
