//! Entity identity and shared handles.

mod handle;
mod id;

pub use handle::{EntityRef, WeakEntityRef};
pub use id::EntityId;

/// An identified, mutable record that lives in an identity cache.
///
/// Implementors are plain structs; sharing and interior mutability are
/// provided by [`EntityRef`].
pub trait Entity: Send + Sync + 'static {
    /// Parameters needed to construct a fresh instance, such as a parent
    /// relation. Use `()` when none are needed.
    type Params: Clone + Send + Sync + 'static;

    /// Returns the id of this entity.
    fn entity_id(&self) -> EntityId;
}
