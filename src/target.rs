use crate::content::Statement;
use crate::scoring::Side;

/// Normalized screen placement in percent space, kept clear of the HUD by
/// the spawner's band constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A spawned, time-limited instance of a statement awaiting a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: u64,
    pub statement: Statement,
    pub side: Side,
    pub position: Position,
    pub spawned_at_ms: u64,
    pub expires_at_ms: u64,
}

/// The authoritative live set of targets. Interaction and TTL expiry race to
/// `remove_if_present`; whichever arrives first takes the target and the
/// loser sees `None`. A given id therefore leaves the registry at most once.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: Target) {
        self.targets.push(target);
    }

    pub fn remove_if_present(&mut self, id: u64) -> Option<Target> {
        let idx = self.targets.iter().position(|t| t.id == id)?;
        Some(self.targets.remove(idx))
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// Live targets belonging to one player's stream, in spawn order.
    pub fn on_side(&self, side: Side) -> Vec<&Target> {
        self.targets.iter().filter(|t| t.side == side).collect()
    }
}
