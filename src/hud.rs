//! Stamina bar, status line, look prompt and pause overlay.
//!
//! The HUD never polls the bus. It subscribes once and records what happened;
//! the systems below redraw from that record.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bevy::prelude::*;

use crate::character::{Damageable, StaminaUser};
use crate::event_bus::{EventBus, Signal};
use crate::game_states::AppState;
use crate::interactables::LookTarget;
use crate::player::{Player, PlayerHandle};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (connect_feed, setup))
            .add_systems(
                Update,
                (update_stamina_bar, update_status_text, update_look_prompt)
                    .run_if(in_state(AppState::InGame)),
            )
            .add_systems(OnEnter(AppState::Paused), setup_pause_overlay)
            .add_systems(OnExit(AppState::Paused), cleanup_pause_overlay);
    }
}

const BAR_BACKGROUND: Color = Color::srgb(0.15, 0.15, 0.15);
const STAMINA_COLOR: Color = Color::srgb(0.35, 0.75, 0.35);
const TEXT_COLOR: Color = Color::srgb(0.9, 0.9, 0.9);

/// Notifications the status line reports as "last event".
const REPORTED: [Signal; 6] = [
    Signal::Jumped,
    Signal::Landed,
    Signal::Dead,
    Signal::Respawned,
    Signal::WeaponFired,
    Signal::InteractionCompleted,
];

/// What the HUD has heard on the bus since it last looked.
#[derive(Resource, Clone, Default)]
pub struct HudFeed {
    stamina_dirty: Arc<AtomicBool>,
    last_event: Arc<Mutex<Option<Signal>>>,
}

impl HudFeed {
    pub fn attach(bus: &EventBus) -> Self {
        let feed = Self::default();
        // Draw once on startup.
        feed.stamina_dirty.store(true, Ordering::Relaxed);

        let dirty = Arc::clone(&feed.stamina_dirty);
        bus.subscribe(Signal::StaminaChanged, move |_, _| {
            dirty.store(true, Ordering::Relaxed);
            Ok(())
        });
        for signal in REPORTED {
            let last_event = Arc::clone(&feed.last_event);
            bus.subscribe(signal, move |signal, _| {
                *last_event.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
                Ok(())
            });
        }
        feed
    }

    /// Returns whether stamina changed, clearing the flag.
    pub fn take_stamina_dirty(&self) -> bool {
        self.stamina_dirty.swap(false, Ordering::Relaxed)
    }

    pub fn last_event(&self) -> Option<Signal> {
        *self.last_event.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Component)]
struct StaminaFill;

#[derive(Component)]
struct StatusText;

#[derive(Component)]
struct LookPrompt;

#[derive(Resource)]
struct PauseOverlay {
    root: Entity,
}

fn connect_feed(mut commands: Commands, bus: Res<EventBus>) {
    commands.insert_resource(HudFeed::attach(&bus));
}

fn setup(mut commands: Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.),
            height: Val::Percent(100.),
            flex_direction: FlexDirection::Column,
            justify_content: JustifyContent::SpaceBetween,
            padding: UiRect::all(Val::Px(16.)),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                StatusText,
                Text::new(""),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
            ));
            parent.spawn((
                LookPrompt,
                Text::new(""),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
                Node {
                    align_self: AlignSelf::Center,
                    ..default()
                },
            ));
            parent
                .spawn((
                    Node {
                        width: Val::Px(240.),
                        height: Val::Px(14.),
                        ..default()
                    },
                    BackgroundColor(BAR_BACKGROUND),
                ))
                .with_children(|parent| {
                    parent.spawn((
                        StaminaFill,
                        Node {
                            width: Val::Percent(100.),
                            height: Val::Percent(100.),
                            ..default()
                        },
                        BackgroundColor(STAMINA_COLOR),
                    ));
                });
        });
}

fn update_stamina_bar(
    feed: Res<HudFeed>,
    players: Query<&PlayerHandle, With<Player>>,
    mut fills: Query<&mut Node, With<StaminaFill>>,
) {
    if !feed.take_stamina_dirty() {
        return;
    }
    let Ok(handle) = players.single() else { return };
    let fraction = {
        let character = handle.lock();
        let max = character.resources.max_stamina();
        if max > 0.0 { character.resources.stamina() / max } else { 0.0 }
    };
    for mut node in &mut fills {
        node.width = Val::Percent(fraction * 100.);
    }
}

fn update_status_text(
    feed: Res<HudFeed>,
    players: Query<&PlayerHandle, With<Player>>,
    mut texts: Query<&mut Text, With<StatusText>>,
) {
    let Ok(handle) = players.single() else { return };
    let status = {
        let character = handle.lock();
        let mut status = format!(
            "HP {:.0}  SP {:.0}  {:?}",
            character.resources.health(),
            character.resources.stamina(),
            character.state(),
        );
        if character.resources.is_dead() {
            status.push_str("  (press R to respawn)");
        }
        status
    };
    let status = match feed.last_event() {
        Some(signal) => format!("{status}\nlast: {signal:?}"),
        None => status,
    };
    for mut text in &mut texts {
        if text.0 != status {
            text.0.clone_from(&status);
        }
    }
}

fn update_look_prompt(target: Res<LookTarget>, mut prompts: Query<&mut Text, With<LookPrompt>>) {
    if !target.is_changed() {
        return;
    }
    let prompt = target.text.clone().unwrap_or_default();
    for mut text in &mut prompts {
        text.0.clone_from(&prompt);
    }
}

fn setup_pause_overlay(mut commands: Commands) {
    let root = commands
        .spawn((
            Node {
                width: Val::Percent(100.),
                height: Val::Percent(100.),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("Paused\nEsc to resume"),
                TextFont {
                    font_size: 33.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
            ));
        })
        .id();
    commands.insert_resource(PauseOverlay { root });
}

fn cleanup_pause_overlay(mut commands: Commands, overlay: Res<PauseOverlay>) {
    commands.entity(overlay.root).despawn();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamina_changes_mark_the_feed_dirty() {
        let bus = EventBus::new();
        let feed = HudFeed::attach(&bus);
        assert!(feed.take_stamina_dirty());
        assert!(!feed.take_stamina_dirty());

        bus.publish(Signal::StaminaChanged);
        bus.publish(Signal::StaminaChanged);
        assert!(feed.take_stamina_dirty());
        assert!(!feed.take_stamina_dirty());
    }

    #[test]
    fn respawn_redraws_the_stamina_bar() {
        let bus = EventBus::new();
        let mut resources = crate::character::CharacterResources::new(100.0, 100.0, bus.clone());
        resources.consume_stamina(80.0);
        resources.take_damage(500.0);
        let feed = HudFeed::attach(&bus);
        feed.take_stamina_dirty();

        resources.respawn();
        assert!(feed.take_stamina_dirty());
        assert_eq!(feed.last_event(), Some(Signal::Respawned));
    }

    #[test]
    fn last_event_tracks_reported_signals() {
        let bus = EventBus::new();
        let feed = HudFeed::attach(&bus);
        assert_eq!(feed.last_event(), None);

        bus.publish(Signal::Jumped);
        bus.publish(Signal::StaminaChanged);
        assert_eq!(feed.last_event(), Some(Signal::Jumped));

        bus.publish(Signal::Landed);
        assert_eq!(feed.last_event(), Some(Signal::Landed));
    }
}
