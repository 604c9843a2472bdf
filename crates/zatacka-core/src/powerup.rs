use serde::{Deserialize, Serialize};

use crate::player::PowerKind;

/// A power that is currently in effect, counted down in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePower {
    pub kind: PowerKind,
    pub remaining: u32,
}

impl ActivePower {
    pub fn new(kind: PowerKind, ticks: u32) -> Self {
        Self {
            kind,
            remaining: ticks,
        }
    }

    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hole_expires_after_its_ticks() {
        let mut p = ActivePower::new(PowerKind::HoleMaker, 2);
        assert!(!p.is_expired());
        p.tick();
        assert!(!p.is_expired());
        p.tick();
        assert!(p.is_expired());
        p.tick();
        assert_eq!(p.remaining, 0, "Countdown saturates at zero");
    }
}
