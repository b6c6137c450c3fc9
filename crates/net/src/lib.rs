#![warn(missing_docs)]
//! Wire protocol shared by clients and the authority: the closed set of
//! message variants and the frame codec that carries them.

mod codec;
mod protocol;

pub use codec::*;
pub use protocol::*;
