//! Read-only view of the model used by integrity checks.

use tradewind_core::{ObjectId, ObjectKind};
use tradewind_world::Game;

/// What an AI object may ask of the model.
pub trait WorldView {
    /// Whether `id` names a live entity of `kind`.
    fn has_object(&self, id: &ObjectId, kind: ObjectKind) -> bool;
}

impl WorldView for Game {
    fn has_object(&self, id: &ObjectId, kind: ObjectKind) -> bool {
        self.objects().resolve(id, kind).is_ok()
    }
}
