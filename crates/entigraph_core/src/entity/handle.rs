//! Shared, identity-stable entity handles.

use crate::entity::{Entity, EntityId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::{Arc, Weak};

/// A shared handle to one live entity instance.
///
/// Cloning the handle never clones the entity: every clone points at the
/// same instance, so updates made through one holder are visible to all.
/// Equality is reference identity.
pub struct EntityRef<T>(Arc<RwLock<T>>);

impl<T: Entity> EntityRef<T> {
    /// Wraps a freshly constructed entity.
    pub fn new(entity: T) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Locks the entity for reading.
    ///
    /// Guards must not be held across an `.await`.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Returns the entity id.
    pub fn id(&self) -> EntityId {
        self.0.read().entity_id()
    }

    /// Returns true if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a non-owning handle, used by child entities to point back
    /// at the parent that owns their cache scope.
    pub fn downgrade(&self) -> WeakEntityRef<T> {
        WeakEntityRef(Arc::downgrade(&self.0))
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for EntityRef<T> {}

// Only the id is printed: entity graphs are cyclic.
impl<T: Entity> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(entity) => write!(f, "EntityRef({})", entity.entity_id()),
            None => f.write_str("EntityRef(<locked>)"),
        }
    }
}

/// A non-owning counterpart of [`EntityRef`].
pub struct WeakEntityRef<T>(Weak<RwLock<T>>);

impl<T: Entity> WeakEntityRef<T> {
    /// Returns the strong handle if the entity is still alive.
    pub fn upgrade(&self) -> Option<EntityRef<T>> {
        self.0.upgrade().map(EntityRef)
    }
}

impl<T> Clone for WeakEntityRef<T> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<T> fmt::Debug for WeakEntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakEntityRef")
    }
}
