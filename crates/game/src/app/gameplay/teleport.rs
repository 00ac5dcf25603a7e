use engine::Vec2;

use super::map::Teleporter;

/// Map switch captured by a teleporter overlap and held until the per-tick
/// commit point. At most one switch can be pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PendingTransition {
    #[default]
    Idle,
    PendingSwitch {
        destination: String,
        position: Vec2,
    },
}

impl PendingTransition {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingSwitch { .. })
    }

    /// Captures the teleporter's destination by value. Ignored while another
    /// switch is already pending.
    pub fn request(&mut self, teleporter: &Teleporter) -> bool {
        if self.is_pending() {
            return false;
        }
        *self = Self::PendingSwitch {
            destination: teleporter.destination.clone(),
            position: teleporter.target,
        };
        true
    }

    /// Clears the pending switch and hands it to the caller to apply.
    pub fn take(&mut self) -> Option<(String, Vec2)> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::PendingSwitch {
                destination,
                position,
            } => Some((destination, position)),
        }
    }
}
