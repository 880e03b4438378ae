//! Error types shared by the controller, the state machine and the bus.
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`ControllerError`] | locomotion primitives | fatal, panics at the call site |
//! | [`TransitionError`] | state enter/exit hooks | logged, machine falls back to `Idle` |
//! | [`HandlerError`] | bus handlers | logged, other handlers still run |
//! | [`DescribeError`] | display-facing consumers | logged, display skipped |
//! | [`SettingsError`] | settings loader | logged, defaults used |

use thiserror::Error;

use crate::character_controller::states::PlayerState;
use crate::event_bus::Signal;

/// Misconfiguration of the locomotion controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("locomotion primitive `{0}` invoked before a body was attached")]
    BodyUnavailable(&'static str),
}

/// Failure inside a state hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no wall contact while switching through {0:?}")]
    NoWallContact(PlayerState),
    #[error("no ledge anchor while switching through {0:?}")]
    NoLedgeAnchor(PlayerState),
}

/// Failure reported by a bus handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("handler for {0:?} re-entered a character that is already busy")]
    Reentrant(Signal),
    #[error("handler for {0:?} found its character lock poisoned")]
    Poisoned(Signal),
    #[error("handler for {signal:?} failed: {reason}")]
    Failed { signal: Signal, reason: String },
}

/// Malformed descriptive data reaching a display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescribeError {
    #[error("describable entity has an empty name")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_unavailable_names_the_primitive() {
        let err = ControllerError::BodyUnavailable("jump");
        assert!(err.to_string().contains("`jump`"));
    }

    #[test]
    fn handler_failure_mentions_signal() {
        let err = HandlerError::Failed {
            signal: Signal::Jumped,
            reason: "speaker offline".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Jumped"));
        assert!(text.contains("speaker offline"));
    }

    #[test]
    fn settings_parse_error_converts() {
        let parse = ron::from_str::<u32>("not a number").unwrap_err();
        let err: SettingsError = parse.into();
        assert!(err.to_string().starts_with("could not parse settings"));
    }
}
