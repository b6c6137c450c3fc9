#![warn(missing_docs)]
//! AI-side shadow objects.
//!
//! An [`AiMain`] is one AI session: a registry of [`AiObject`]s addressed by
//! the identifiers of the model entities they shadow. Objects keep a weak
//! back-reference to their session and are disposed by removing them from
//! it.

mod goods;
mod object;
mod session;
mod unit;
mod world_view;

pub use goods::AiGoods;
pub use object::{AiObject, AiObjectCore, IntegrityStatus, Lifecycle};
pub use session::{AiError, AiMain, IntegrityReport};
pub use unit::{AiUnit, Mission};
pub use world_view::WorldView;
