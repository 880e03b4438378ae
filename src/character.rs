//! Health and stamina bookkeeping, reusable by any actor.
use crate::event_bus::{EventBus, Signal};
use crate::settings::StaminaSettings;

/// Anything that can be hurt and killed.
pub trait Damageable {
    /// Applies damage. Returns `true` only on the call that kills.
    fn take_damage(&mut self, amount: f32) -> bool;
    fn health(&self) -> f32;
    fn is_dead(&self) -> bool;
}

/// Anything that spends stamina.
pub trait StaminaUser {
    fn consume_stamina(&mut self, amount: f32);
    fn restore_stamina(&mut self, amount: f32);
    fn stamina(&self) -> f32;
    fn max_stamina(&self) -> f32;

    fn has_stamina(&self, cost: f32) -> bool {
        self.stamina() >= cost
    }
}

/// Negative and non-finite amounts count as zero.
fn sanitize(amount: f32) -> f32 {
    if amount.is_finite() { amount.max(0.0) } else { 0.0 }
}

#[derive(Clone)]
pub struct CharacterResources {
    health: f32,
    max_health: f32,
    stamina: f32,
    max_stamina: f32,
    dead: bool,
    bus: EventBus,
}

impl CharacterResources {
    pub fn new(max_health: f32, max_stamina: f32, bus: EventBus) -> Self {
        let max_health = sanitize(max_health);
        let max_stamina = sanitize(max_stamina);
        Self {
            health: max_health,
            max_health,
            stamina: max_stamina,
            max_stamina,
            dead: false,
            bus,
        }
    }

    pub fn from_settings(settings: &StaminaSettings, bus: EventBus) -> Self {
        Self::new(settings.max_health, settings.max_stamina, bus)
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Restores everything to full and clears the dead flag.
    pub fn respawn(&mut self) {
        self.health = self.max_health;
        self.stamina = self.max_stamina;
        self.dead = false;
        self.bus.publish(Signal::StaminaChanged);
        self.bus.publish(Signal::Respawned);
    }
}

impl Damageable for CharacterResources {
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.dead {
            return false;
        }
        self.health = (self.health - sanitize(amount)).max(0.0);
        if self.health <= 0.0 {
            self.dead = true;
            return true;
        }
        false
    }

    fn health(&self) -> f32 {
        self.health
    }

    fn is_dead(&self) -> bool {
        self.dead
    }
}

impl StaminaUser for CharacterResources {
    fn consume_stamina(&mut self, amount: f32) {
        if self.dead {
            return;
        }
        self.stamina = (self.stamina - sanitize(amount)).max(0.0);
        self.bus.publish(Signal::StaminaChanged);
    }

    fn restore_stamina(&mut self, amount: f32) {
        if self.dead {
            return;
        }
        self.stamina = (self.stamina + sanitize(amount)).min(self.max_stamina);
        self.bus.publish(Signal::StaminaChanged);
    }

    fn stamina(&self) -> f32 {
        self.stamina
    }

    fn max_stamina(&self) -> f32 {
        self.max_stamina
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SignalRecorder;

    fn resources() -> (CharacterResources, SignalRecorder) {
        let bus = EventBus::new();
        let recorder = SignalRecorder::attach(&bus);
        (CharacterResources::new(100.0, 50.0, bus), recorder)
    }

    #[test]
    fn stamina_stays_within_bounds() {
        let (mut res, _) = resources();
        let ops: [(bool, f32); 8] = [
            (true, 30.0),
            (true, 30.0),
            (false, 5.0),
            (false, 500.0),
            (true, 49.5),
            (true, f32::INFINITY),
            (false, -20.0),
            (true, f32::NAN),
        ];
        for (consume, amount) in ops {
            if consume {
                res.consume_stamina(amount);
            } else {
                res.restore_stamina(amount);
            }
            assert!((0.0..=res.max_stamina()).contains(&res.stamina()));
        }
    }

    #[test]
    fn every_stamina_change_is_published() {
        let (mut res, recorder) = resources();
        res.consume_stamina(10.0);
        res.restore_stamina(3.0);
        res.consume_stamina(0.0);
        assert_eq!(recorder.count(Signal::StaminaChanged), 3);
    }

    #[test]
    fn lethal_damage_kills_once() {
        let (mut res, _) = resources();
        assert!(!res.take_damage(60.0));
        assert!(res.take_damage(60.0));
        assert_eq!(res.health(), 0.0);
        assert!(res.is_dead());
        assert!(!res.take_damage(10.0));
    }

    #[test]
    fn dead_characters_ignore_stamina_changes() {
        let (mut res, recorder) = resources();
        res.consume_stamina(20.0);
        res.take_damage(1000.0);
        res.restore_stamina(20.0);
        res.consume_stamina(5.0);
        assert_eq!(res.stamina(), 30.0);
        assert_eq!(recorder.count(Signal::StaminaChanged), 1);
    }

    #[test]
    fn respawn_restores_everything() {
        let (mut res, recorder) = resources();
        res.consume_stamina(50.0);
        res.take_damage(100.0);
        assert_eq!(recorder.count(Signal::StaminaChanged), 1);

        res.respawn();
        assert!(!res.is_dead());
        assert_eq!(res.health(), 100.0);
        assert_eq!(res.stamina(), 50.0);
        assert_eq!(recorder.count(Signal::StaminaChanged), 2);
        assert_eq!(
            recorder.signals(),
            vec![Signal::StaminaChanged, Signal::StaminaChanged, Signal::Respawned]
        );
    }

    #[test]
    fn has_stamina_compares_inclusively() {
        let (mut res, _) = resources();
        res.consume_stamina(40.0);
        assert!(res.has_stamina(10.0));
        assert!(!res.has_stamina(10.5));
    }
}
