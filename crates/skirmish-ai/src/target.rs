//! Target tracking.
//!
//! The host resolves the pursued entity once and hands out `TargetHandle`s.
//! The host writes the position each frame through `TargetWriter`; enemies
//! only read it.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use skirmish_common::EntityId;

#[derive(Debug)]
struct TargetSlot {
    position: Vec3,
    alive: bool,
}

/// Write side of a target, owned by the host.
#[derive(Debug)]
pub struct TargetWriter {
    id: EntityId,
    slot: Arc<RwLock<TargetSlot>>,
}

impl TargetWriter {
    /// Creates a live target at `position`.
    #[must_use]
    pub fn new(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            slot: Arc::new(RwLock::new(TargetSlot {
                position,
                alive: true,
            })),
        }
    }

    /// Target entity ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Moves the target.
    pub fn set_position(&self, position: Vec3) {
        self.slot.write().position = position;
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.slot.read().position
    }

    /// Marks the target gone; handles stop resolving.
    pub fn remove(&self) {
        self.slot.write().alive = false;
    }

    /// Creates a read handle.
    #[must_use]
    pub fn handle(&self) -> TargetHandle {
        TargetHandle {
            id: self.id,
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Read-only reference to the pursued entity.
#[derive(Debug, Clone)]
pub struct TargetHandle {
    id: EntityId,
    slot: Arc<RwLock<TargetSlot>>,
}

impl TargetHandle {
    /// Target entity ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Current position, or `None` once the target is gone.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        let slot = self.slot.read();
        slot.alive.then_some(slot.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_sees_writes() {
        let writer = TargetWriter::new(EntityId::new(), Vec3::ZERO);
        let handle = writer.handle();
        writer.set_position(Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(handle.position(), Some(Vec3::new(1.0, 0.0, 2.0)));
        assert_eq!(handle.id(), writer.id());
    }

    #[test]
    fn test_removed_target_stops_resolving() {
        let writer = TargetWriter::new(EntityId::new(), Vec3::ONE);
        let handle = writer.handle();
        writer.remove();
        assert_eq!(handle.position(), None);
    }
}
