//! Identity registry.
//!
//! Maps [`ObjectId`]s to live objects. At most one object is registered under
//! an identifier at any time; after [`IdentityRegistry::unregister`] the
//! identifier may be reused. Iteration order is identifier order.

use crate::id::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use thiserror::Error;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another live object already owns the identifier.
    #[error("identifier already registered: {0}")]
    AlreadyRegistered(ObjectId),
}

/// Lookup failure for a declared identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Nothing is registered under the identifier.
    #[error("no such {expected}: {id}")]
    NotFound {
        /// Requested identifier.
        id: ObjectId,
        /// Kind the caller expected.
        expected: ObjectKind,
    },
    /// Something is registered, but of another kind.
    #[error("{id} is a {found}, not a {expected}")]
    WrongKind {
        /// Requested identifier.
        id: ObjectId,
        /// Kind the caller expected.
        expected: ObjectKind,
        /// Kind actually registered.
        found: ObjectKind,
    },
}

impl ResolveError {
    /// Identifier that failed to resolve.
    pub fn id(&self) -> &ObjectId {
        match self {
            ResolveError::NotFound { id, .. } | ResolveError::WrongKind { id, .. } => id,
        }
    }
}

/// Objects that know which [`ObjectKind`] they are.
pub trait Kinded {
    /// Kind of this object.
    fn kind(&self) -> ObjectKind;
}

/// Identifier → object map with unique registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRegistry<T> {
    entries: BTreeMap<ObjectId, T>,
}

impl<T> Default for IdentityRegistry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> IdentityRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `id`; fails while another object holds `id`.
    pub fn register(&mut self, id: ObjectId, value: T) -> Result<(), RegistryError> {
        match self.entries.entry(id) {
            btree_map::Entry::Occupied(entry) => {
                Err(RegistryError::AlreadyRegistered(entry.key().clone()))
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Remove the mapping for `id`.
    pub fn unregister(&mut self, id: &ObjectId) -> Option<T> {
        self.entries.remove(id)
    }

    /// Look up an object.
    pub fn get(&self, id: &ObjectId) -> Option<&T> {
        self.entries.get(id)
    }

    /// Look up an object mutably.
    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &T)> {
        self.entries.iter()
    }

    /// Iterate mutably in identifier order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ObjectId, &mut T)> {
        self.entries.iter_mut()
    }
}

impl<T: Kinded> IdentityRegistry<T> {
    /// Resolve `id`, requiring the registered object to be of kind `expected`.
    pub fn resolve(&self, id: &ObjectId, expected: ObjectKind) -> Result<&T, ResolveError> {
        let value = self.entries.get(id).ok_or_else(|| ResolveError::NotFound {
            id: id.clone(),
            expected,
        })?;
        check_kind(id, expected, value.kind())?;
        Ok(value)
    }

    /// Mutable form of [`IdentityRegistry::resolve`].
    pub fn resolve_mut(
        &mut self,
        id: &ObjectId,
        expected: ObjectKind,
    ) -> Result<&mut T, ResolveError> {
        let value = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ResolveError::NotFound {
                id: id.clone(),
                expected,
            })?;
        check_kind(id, expected, value.kind())?;
        Ok(value)
    }
}

fn check_kind(id: &ObjectId, expected: ObjectKind, found: ObjectKind) -> Result<(), ResolveError> {
    if found == expected {
        Ok(())
    } else {
        Err(ResolveError::WrongKind {
            id: id.clone(),
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Probe(ObjectKind);

    impl Kinded for Probe {
        fn kind(&self) -> ObjectKind {
            self.0
        }
    }

    fn id(raw: &str) -> ObjectId {
        ObjectId::parse(raw).unwrap()
    }

    #[test]
    fn duplicate_registration_is_rejected_until_unregistered() {
        let mut registry = IdentityRegistry::new();
        registry
            .register(id("unit:1"), Probe(ObjectKind::Unit))
            .unwrap();
        assert_eq!(
            registry.register(id("unit:1"), Probe(ObjectKind::Unit)),
            Err(RegistryError::AlreadyRegistered(id("unit:1")))
        );

        assert!(registry.unregister(&id("unit:1")).is_some());
        registry
            .register(id("unit:1"), Probe(ObjectKind::Settlement))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_checks_kind() {
        let mut registry = IdentityRegistry::new();
        registry
            .register(id("settlement:1"), Probe(ObjectKind::Settlement))
            .unwrap();

        assert!(registry
            .resolve(&id("settlement:1"), ObjectKind::Settlement)
            .is_ok());
        let err = registry
            .resolve(&id("settlement:1"), ObjectKind::Unit)
            .unwrap_err();
        assert_eq!(err.to_string(), "settlement:1 is a settlement, not a unit");

        let err = registry.resolve(&id("unit:9"), ObjectKind::Unit).unwrap_err();
        assert_eq!(err.to_string(), "no such unit: unit:9");
        assert_eq!(err.id(), &id("unit:9"));
    }
}
