#![warn(missing_docs)]
//! Authoritative world model and game logic.

mod game;
mod model;
mod movement;
mod persist;
mod rules;

pub use game::*;
pub use model::*;
pub use movement::*;
pub use persist::*;
pub use rules::*;
