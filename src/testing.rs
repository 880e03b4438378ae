//! Shared fixtures for unit tests.
use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use crate::character_controller::components::{Body, EnvironmentProbe, WallContact};
use crate::event_bus::{EventBus, Signal, SignalArg};

/// Records every signal published on a bus, in order.
#[derive(Clone, Default)]
pub struct SignalRecorder {
    log: Arc<Mutex<Vec<(Signal, SignalArg)>>>,
}

impl SignalRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        for signal in Signal::INPUT.into_iter().chain(Signal::NOTIFICATIONS) {
            let log = Arc::clone(&recorder.log);
            bus.subscribe(signal, move |signal, arg| {
                log.lock().unwrap().push((signal, arg));
                Ok(())
            });
        }
        recorder
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(seen, _)| *seen == signal)
            .count()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.log.lock().unwrap().iter().map(|(signal, _)| *signal).collect()
    }
}

/// Probe that answers with fixed values regardless of the body pose.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedProbe {
    pub grounded: bool,
    pub wall: WallContact,
    pub ledge: Option<Vec3>,
}

impl ScriptedProbe {
    pub fn grounded() -> Self {
        Self { grounded: true, ..default() }
    }

    pub fn airborne() -> Self {
        Self::default()
    }

    pub fn with_wall(mut self, wall: WallContact) -> Self {
        self.wall = wall;
        self
    }

    pub fn with_ledge(mut self, ledge: Vec3) -> Self {
        self.ledge = Some(ledge);
        self
    }
}

impl EnvironmentProbe for ScriptedProbe {
    fn ground(&self, _body: &Body) -> bool {
        self.grounded
    }

    fn wall(&self, _body: &Body) -> WallContact {
        self.wall
    }

    fn ledge(&self, _body: &Body) -> Option<Vec3> {
        self.ledge
    }
}
