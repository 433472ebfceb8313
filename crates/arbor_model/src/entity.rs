//! Model entities and their handles.

use core::any::TypeId;
use core::fmt;

use crate::component::Components;
use crate::path::ModelPath;
use crate::projection::Projections;
use crate::stage::{Lifecycle, Stage};

/// Handle to an entity in a [`ModelRegistry`](crate::registry::ModelRegistry).
///
/// An `EntityId` is a lookup key, not an owning pointer. It stays valid for
/// the registry's whole lifetime because entities are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    /// Creates an entity id from a raw index.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index, which is also the registration order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity_{}", self.0)
    }
}

/// An addressable node in the model graph.
///
/// Entities are owned by the registry. The parent/child links are relations
/// expressed through [`EntityId`]s; no entity owns another.
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) path: ModelPath,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) components: Components,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) projections: Projections,
}

impl Entity {
    pub(crate) fn new(id: EntityId, path: ModelPath, parent: Option<EntityId>) -> Self {
        Self {
            id,
            path,
            parent,
            children: Vec::new(),
            components: Components::new(),
            lifecycle: Lifecycle::default(),
            projections: Projections::default(),
        }
    }

    /// Returns this entity's handle.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns this entity's path.
    #[must_use]
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Returns the parent entity, if any.
    #[must_use]
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Returns the direct children in registration order.
    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Returns the attached components.
    #[must_use]
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Returns `true` if a component or tag of type `T` is attached.
    #[must_use]
    pub fn has<T: 'static>(&self) -> bool {
        self.components.contains::<T>()
    }

    /// Borrows an attached component.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.components.get::<T>()
    }

    /// Returns the current lifecycle stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.lifecycle.stage()
    }

    /// Returns the full lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Returns the projection bindings.
    #[must_use]
    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    /// Returns `true` if a projection of type `T` is bound.
    #[must_use]
    pub fn has_projection<T: 'static>(&self) -> bool {
        self.projections.contains(TypeId::of::<T>())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("stage", &self.lifecycle.stage())
            .field("components", &self.components)
            .field("projections", &self.projections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Tag;

    struct Buildable;
    impl Tag for Buildable {}

    #[test]
    fn display_uses_index() {
        assert_eq!(EntityId::new(3).to_string(), "entity_3");
        assert_eq!(EntityId::new(3).index(), 3);
    }

    #[test]
    fn new_entity_starts_registered_and_empty() {
        let mut entity = Entity::new(EntityId(0), ModelPath::root("app").unwrap(), None);
        assert_eq!(entity.stage(), Stage::Registered);
        assert!(entity.children().is_empty());
        assert!(!entity.has::<Buildable>());

        entity.components.insert_tag(Buildable, 1).unwrap();
        assert!(entity.has::<Buildable>());
        assert!(format!("{entity:?}").contains("Buildable@1"));
    }
}
