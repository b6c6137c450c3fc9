#![warn(missing_docs)]
//! Authoritative host: dispatch, client errors, the single-writer world lane
//! and the replay log.

mod authority;
mod error;
mod lane;
mod replay;

pub use authority::{Authority, Dispatch, Envelope, Verdict};
pub use error::ClientError;
pub use lane::{spawn_lane, LaneHandle, Outbox};
pub use replay::{
    delta_digest, game_digest, RecordedOutcome, ReplayEntry, ReplayHeader, ReplayMismatch,
    ReplayPlayer, ReplayRecorder,
};
