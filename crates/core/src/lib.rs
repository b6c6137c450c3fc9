#![warn(missing_docs)]
//! Core primitives shared across the workspace: identifiers, the element
//! wire model, the identity registry and change propagation.

pub mod ability;
pub mod delta;
pub mod element;
pub mod goods;
pub mod highscore;
pub mod id;
pub mod options;
pub mod registry;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use ability::Ability;
pub use delta::{ApplyError, Audience, Change, ChangeRecord, DeltaSet, Replica};
pub use element::{DecodeError, Element, ElementCodec};
pub use goods::Goods;
pub use highscore::{HighScore, HighScoreTable, Level};
pub use id::{IdError, ObjectId, ObjectKind};
pub use options::{GameOption, MergeError, OptionGroup, OptionValue};
pub use registry::{IdentityRegistry, Kinded, RegistryError, ResolveError};

/// Game turn counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Turn(pub u32);

impl Turn {
    /// First turn of every game.
    pub const FIRST: Self = Self(1);

    /// The following turn.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Helper to derive a reproducible RNG seeded by game + object + turn domains.
pub fn scoped_rng(game_seed: u64, object_hash: u64, turn: Turn) -> StdRng {
    let seed = game_seed ^ object_hash ^ u64::from(turn.0).rotate_left(32);
    StdRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn scoped_rng_is_reproducible() {
        let hash = ObjectId::parse("settlement:1").unwrap().stable_hash();
        let a: u64 = scoped_rng(7, hash, Turn(3)).gen();
        let b: u64 = scoped_rng(7, hash, Turn(3)).gen();
        let c: u64 = scoped_rng(7, hash, Turn(4)).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
