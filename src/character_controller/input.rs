//! Samples keyboard, mouse and gamepad into the character's input snapshot
//! and publishes the discrete requests on the [`EventBus`].
use bevy::input::ButtonInput;
use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;

use crate::character::Damageable;
use crate::event_bus::{EventBus, Signal};
use crate::player::PlayerHandle;

const STICK_DEADZONE: f32 = 0.1;
/// Right-stick look speed, in mouse-delta units per frame at full tilt.
const STICK_LOOK_SCALE: f32 = 12.0;

/// WASD / arrow keys as a unit-clamped vector, +y forward.
pub fn keyboard_axis(keyboard: &ButtonInput<KeyCode>) -> Vec2 {
    let up = keyboard.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]);
    let down = keyboard.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]);
    let left = keyboard.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]);
    let right = keyboard.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]);

    let horizontal = right as i8 - left as i8;
    let vertical = up as i8 - down as i8;
    Vec2::new(horizontal as f32, vertical as f32).clamp_length_max(1.0)
}

fn stick(x: Option<f32>, y: Option<f32>) -> Vec2 {
    let value = Vec2::new(x.unwrap_or(0.0), y.unwrap_or(0.0));
    if value.length() < STICK_DEADZONE {
        Vec2::ZERO
    } else {
        value.clamp_length_max(1.0)
    }
}

/// Buttons sampled for one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ButtonFrame {
    pub sprint_held: bool,
    pub zoom_held: bool,
    pub jump: bool,
    pub attack: bool,
    pub interact: bool,
    pub inventory: bool,
}

impl ButtonFrame {
    /// Discrete requests to publish this frame, in a fixed order.
    pub fn requests(&self) -> impl Iterator<Item = Signal> + '_ {
        [
            (self.jump, Signal::JumpRequested),
            (self.attack, Signal::AttackRequested),
            (self.interact, Signal::InteractRequested),
            (self.inventory, Signal::InventoryRequested),
        ]
        .into_iter()
        .filter_map(|(pressed, signal)| pressed.then_some(signal))
    }
}

pub fn sample_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    gamepads: Query<&Gamepad>,
    bus: Res<EventBus>,
    players: Query<&PlayerHandle>,
) {
    let mut move_input = keyboard_axis(&keyboard);
    let mut look_input: Vec2 = mouse_motion.read().map(|motion| motion.delta).sum();

    let mut buttons = ButtonFrame {
        sprint_held: keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]),
        zoom_held: mouse_buttons.pressed(MouseButton::Right),
        jump: keyboard.just_pressed(KeyCode::Space),
        attack: mouse_buttons.just_pressed(MouseButton::Left),
        interact: keyboard.just_pressed(KeyCode::KeyE),
        inventory: keyboard.just_pressed(KeyCode::Tab),
    };

    for gamepad in gamepads.iter() {
        let left = stick(
            gamepad.get(GamepadAxis::LeftStickX),
            gamepad.get(GamepadAxis::LeftStickY),
        );
        if left != Vec2::ZERO {
            move_input = left;
        }
        let right = stick(
            gamepad.get(GamepadAxis::RightStickX),
            gamepad.get(GamepadAxis::RightStickY),
        );
        // Stick up is +y, mouse up is -y.
        look_input += Vec2::new(right.x, -right.y) * STICK_LOOK_SCALE;

        buttons.sprint_held |= gamepad.pressed(GamepadButton::LeftThumb);
        buttons.zoom_held |= gamepad.pressed(GamepadButton::LeftTrigger2);
        buttons.jump |= gamepad.just_pressed(GamepadButton::South);
        buttons.attack |= gamepad.just_pressed(GamepadButton::RightTrigger2);
        buttons.interact |= gamepad.just_pressed(GamepadButton::West);
        buttons.inventory |= gamepad.just_pressed(GamepadButton::Select);
    }

    for handle in &players {
        let (sprint_changed, zoom_changed) = {
            let mut character = handle.lock();
            if character.resources.is_dead() {
                continue;
            }
            let locomotion = &mut character.locomotion;
            let sprint_changed = locomotion.is_sprinting() != buttons.sprint_held;
            let zoom_changed = locomotion.is_zoom_pressed() != buttons.zoom_held;
            locomotion.set_move_input(move_input);
            locomotion.set_look_input(look_input);
            locomotion.set_sprint_held(buttons.sprint_held);
            locomotion.set_zoom_held(buttons.zoom_held);
            (sprint_changed, zoom_changed)
        };

        // The character lock is released: handlers take it themselves.
        if sprint_changed {
            bus.publish_flag(Signal::SprintToggled, buttons.sprint_held);
        }
        if zoom_changed {
            bus.publish_flag(Signal::ZoomToggled, buttons.zoom_held);
        }
        for signal in buttons.requests() {
            bus.publish(signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_axis_is_clamped() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyW);
        keyboard.press(KeyCode::KeyD);
        let axis = keyboard_axis(&keyboard);
        assert!((axis.length() - 1.0).abs() < 1e-5);
        assert!(axis.x > 0.0 && axis.y > 0.0);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyA);
        keyboard.press(KeyCode::ArrowRight);
        assert_eq!(keyboard_axis(&keyboard), Vec2::ZERO);
    }

    #[test]
    fn stick_deadzone() {
        assert_eq!(stick(Some(0.05), Some(-0.05)), Vec2::ZERO);
        assert_eq!(stick(None, None), Vec2::ZERO);
        assert_eq!(stick(Some(0.0), Some(0.5)), Vec2::new(0.0, 0.5));
    }

    #[test]
    fn requests_follow_pressed_buttons() {
        let buttons = ButtonFrame {
            jump: true,
            inventory: true,
            ..default()
        };
        let requests: Vec<Signal> = buttons.requests().collect();
        assert_eq!(requests, vec![Signal::JumpRequested, Signal::InventoryRequested]);
    }
}
