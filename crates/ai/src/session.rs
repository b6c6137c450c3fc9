//! The AI session and its object registry.

use crate::goods::AiGoods;
use crate::object::{AiObject, IntegrityStatus};
use crate::unit::AiUnit;
use crate::world_view::WorldView;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use tradewind_core::{DecodeError, Element, IdentityRegistry, ObjectId, RegistryError};

/// Registration or load failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    /// The identifier is held by another live object.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A persisted object could not be read.
    #[error("Failed to read AI object: {0}")]
    Decode(#[from] DecodeError),
}

/// Outcome of [`AiMain::check_integrity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Worst status seen.
    pub status: IntegrityStatus,
    /// Objects repaired or disposed.
    pub fixed: usize,
}

/// One AI session.
pub struct AiMain {
    objects: RwLock<IdentityRegistry<Arc<dyn AiObject>>>,
    next_instance: AtomicU64,
    next_serial: AtomicU64,
}

impl AiMain {
    /// Tag of the persisted session element.
    pub const TAG: &'static str = "aiMain";

    /// Fresh, empty session.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: RwLock::new(IdentityRegistry::new()),
            next_instance: AtomicU64::new(1),
            next_serial: AtomicU64::new(1),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, IdentityRegistry<Arc<dyn AiObject>>> {
        match self.objects.read() {
            Ok(guard) => guard,
            Err(_) => panic!("AI object registry poisoned"),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, IdentityRegistry<Arc<dyn AiObject>>> {
        match self.objects.write() {
            Ok(guard) => guard,
            Err(_) => panic!("AI object registry poisoned"),
        }
    }

    pub(crate) fn next_instance(&self) -> u64 {
        self.next_instance.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a fresh `prefix:N` for objects that shadow no model entity.
    pub fn allocate_id(&self, prefix: &str) -> ObjectId {
        loop {
            let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
            let id = match ObjectId::with_serial(prefix, serial) {
                Ok(id) => id,
                Err(err) => panic!("invalid AI identifier prefix {prefix:?}: {err}"),
            };
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Register `object` under its identifier, making it active.
    ///
    /// Panics if the object was built for another session.
    pub fn register(self: &Arc<Self>, object: Arc<dyn AiObject>) -> Result<(), AiError> {
        object.core().attach_to(self);
        let id = object.id().clone();
        self.write().register(id.clone(), Arc::clone(&object))?;
        object.core().mark_registered();
        debug!(%id, "registered AI object");
        Ok(())
    }

    /// Remove whatever is registered under `id`.
    pub fn remove(&self, id: &ObjectId) -> Option<Arc<dyn AiObject>> {
        let removed = self.write().unregister(id);
        if removed.is_some() {
            debug!(%id, "removed AI object");
        }
        removed
    }

    pub(crate) fn remove_instance(&self, id: &ObjectId, instance: u64) {
        let mut objects = self.write();
        if objects
            .get(id)
            .is_some_and(|current| current.core().instance() == instance)
        {
            objects.unregister(id);
            debug!(%id, "disposed AI object");
        }
    }

    /// Object registered under `id`.
    pub fn get(&self, id: &ObjectId) -> Option<Arc<dyn AiObject>> {
        self.read().get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.read().contains(id)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no objects are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered objects in identifier order.
    pub fn objects(&self) -> Vec<Arc<dyn AiObject>> {
        self.read().iter().map(|(_, object)| Arc::clone(object)).collect()
    }

    /// Check every object. With `fix`, objects that still report problems
    /// are disposed and count as fixed. The status is the worst seen.
    pub fn check_integrity(&self, world: &dyn WorldView, fix: bool) -> IntegrityReport {
        let mut status = IntegrityStatus::Clean;
        let mut fixed = 0;
        for object in self.objects() {
            let mut result = object.check_integrity(world, fix);
            if fix && result == IntegrityStatus::ProblemsRemain {
                warn!(id = %object.id(), "disposing broken AI object");
                object.dispose();
                result = IntegrityStatus::Fixed;
            }
            if result == IntegrityStatus::Fixed {
                fixed += 1;
            }
            status = status.min(result);
        }
        info!(?status, fixed, objects = self.len(), "AI integrity sweep");
        IntegrityReport { status, fixed }
    }

    /// Persisted form: every object in identifier order.
    pub fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_children(self.objects().iter().map(|object| object.to_element()))
    }

    /// Read objects saved by [`AiMain::to_element`] into this session.
    /// Returns the number of objects read.
    pub fn read_element(self: &Arc<Self>, element: &Element) -> Result<usize, AiError> {
        element.expect_tag(Self::TAG)?;
        for child in element.children() {
            let object: Arc<dyn AiObject> = match child.tag() {
                AiUnit::TAG => AiUnit::read_element(self, child)?,
                AiGoods::TAG => AiGoods::read_element(self, child)?,
                other => {
                    return Err(DecodeError::UnexpectedTag {
                        expected: format!("{} or {}", AiUnit::TAG, AiGoods::TAG),
                        found: other.to_string(),
                    }
                    .into())
                }
            };
            self.register(object)?;
        }
        Ok(element.children().len())
    }
}
