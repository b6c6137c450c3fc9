//! Shared AI object state and the [`AiObject`] trait.

use crate::session::AiMain;
use crate::world_view::WorldView;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tradewind_core::{Element, ObjectId};

/// Result of an integrity check. Ordered worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegrityStatus {
    /// Problems were found and not repaired.
    ProblemsRemain,
    /// Problems were found and repaired.
    Fixed,
    /// Nothing wrong.
    Clean,
}

impl IntegrityStatus {
    /// Signed form: negative, zero or positive.
    pub const fn code(self) -> i32 {
        match self {
            IntegrityStatus::ProblemsRemain => -1,
            IntegrityStatus::Fixed => 0,
            IntegrityStatus::Clean => 1,
        }
    }

    /// Classify a signed status.
    pub const fn from_code(code: i32) -> Self {
        if code < 0 {
            IntegrityStatus::ProblemsRemain
        } else if code == 0 {
            IntegrityStatus::Fixed
        } else {
            IntegrityStatus::Clean
        }
    }
}

/// Where an object is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built but never registered.
    Uninitialized,
    /// Registered with its session.
    Active,
    /// Removed from its session, or the session is gone.
    Disposed,
}

/// State every AI object carries: its session, identifier and lifecycle
/// flag.
pub struct AiObjectCore {
    main: Weak<AiMain>,
    id: ObjectId,
    instance: u64,
    registered: AtomicBool,
}

impl AiObjectCore {
    /// Core for an object of `main` addressed by `id`.
    pub fn new(main: &Arc<AiMain>, id: ObjectId) -> Self {
        Self {
            main: Arc::downgrade(main),
            id,
            instance: main.next_instance(),
            registered: AtomicBool::new(false),
        }
    }

    /// Identifier this object is registered under.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Token distinguishing this object from any later object reusing the
    /// same identifier.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Owning session, unless it has been dropped.
    pub fn main(&self) -> Option<Arc<AiMain>> {
        self.main.upgrade()
    }

    /// Whether this object belongs to `main`.
    pub fn belongs_to(&self, main: &Arc<AiMain>) -> bool {
        Weak::ptr_eq(&self.main, &Arc::downgrade(main))
    }

    /// Confirm the owning session. The session is fixed at construction;
    /// naming any other session panics.
    pub fn attach_to(&self, main: &Arc<AiMain>) {
        if !self.belongs_to(main) {
            panic!("AI object {} can not be moved to another session", self.id);
        }
    }

    pub(crate) fn mark_registered(&self) {
        self.registered.store(true, Ordering::Release);
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if !self.registered.load(Ordering::Acquire) {
            return Lifecycle::Uninitialized;
        }
        let registered = self
            .main()
            .and_then(|main| main.get(&self.id))
            .is_some_and(|current| current.core().instance == self.instance);
        if registered {
            Lifecycle::Active
        } else {
            Lifecycle::Disposed
        }
    }

    /// Whether the object never reached its session.
    pub fn is_uninitialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Uninitialized
    }

    /// Whether the session no longer maps the identifier to this object.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    /// Remove this object from its session. A no-op if another object now
    /// holds the identifier.
    pub fn dispose(&self) {
        if let Some(main) = self.main() {
            main.remove_instance(&self.id, self.instance);
        }
    }

    /// Baseline integrity: uninitialized objects always have problems.
    pub fn check_integrity(&self) -> IntegrityStatus {
        if self.is_uninitialized() {
            IntegrityStatus::ProblemsRemain
        } else {
            IntegrityStatus::Clean
        }
    }
}

impl fmt::Debug for AiObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiObjectCore")
            .field("id", &self.id)
            .field("instance", &self.instance)
            .field("registered", &self.registered.load(Ordering::Relaxed))
            .finish()
    }
}

/// An object owned by an AI session.
pub trait AiObject: Send + Sync + fmt::Debug {
    /// Shared state.
    fn core(&self) -> &AiObjectCore;

    /// Identifier.
    fn id(&self) -> &ObjectId {
        self.core().id()
    }

    /// Check, and with `fix` repair, this object against the model.
    fn check_integrity(&self, _world: &dyn WorldView, _fix: bool) -> IntegrityStatus {
        self.core().check_integrity()
    }

    /// Persisted form.
    fn to_element(&self) -> Element;

    /// Remove from the session.
    fn dispose(&self) {
        self.core().dispose();
    }
}
