//! Lazily-constructed, memoized typed views of an entity.
//!
//! A projection binds a factory to an entity for one result type. The first
//! [`resolve`](crate::registry::ModelRegistry::resolve) of that type runs the
//! factory with a [`ProjectionContext`]; every later call returns the same
//! [`Arc`].
//!
//! Different projection types bound to one entity are independent: resolving
//! one never forces another. At most one binding per entity may be marked
//! *primary*; the registry forces it just before the entity enters
//! [`Stage::Realized`](crate::stage::Stage::Realized).
//!
//! # Example
//!
//! ```
//! use arbor_model::registration::EntityRegistration;
//! use arbor_model::registry::ModelRegistry;
//! use std::sync::Arc;
//!
//! struct Executable {
//!     name: String,
//! }
//!
//! let mut registry = ModelRegistry::new();
//! let app = registry
//!     .register(EntityRegistration::new("app").with_projection(|ctx| Executable {
//!         name: ctx.path().name().to_string(),
//!     }))
//!     .unwrap();
//!
//! let first = registry.resolve::<Executable>(app).unwrap();
//! let second = registry.resolve::<Executable>(app).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(first.name, "app");
//! ```

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::component::{SharedValue, short_type_name};
use crate::entity::EntityId;
use crate::error::ModelResult;
use crate::path::ModelPath;
use crate::registry::ModelRegistry;
use crate::stage::Stage;

type ErasedFactory = Box<dyn FnOnce(&mut ProjectionContext<'_>) -> SharedValue + Send>;

/// A projection factory waiting to be attached to an entity.
pub struct ProjectionBinding {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) factory: ErasedFactory,
    pub(crate) primary: bool,
}

impl ProjectionBinding {
    /// Wraps a factory producing `T`.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            factory: Box::new(move |ctx| Arc::new(factory(ctx)) as SharedValue),
            primary: false,
        }
    }

    /// Marks this binding as the entity's primary projection.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Returns the short name of the projected type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    /// Returns `true` if this binding is marked primary.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }
}

impl fmt::Debug for ProjectionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionBinding")
            .field("type", &self.type_name())
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

enum SlotState {
    Pending(ErasedFactory),
    Resolving,
    Resolved(SharedValue),
}

struct ProjectionSlot {
    type_name: &'static str,
    state: SlotState,
}

/// Outcome of starting a resolution.
pub(crate) enum Claim {
    /// The value was already memoized.
    Ready(SharedValue),
    /// The caller now owns the factory and must call [`Projections::complete`].
    Run(ErasedFactory),
    /// The factory is currently running further up the stack.
    Cycle,
    /// No factory is bound for the type.
    Unbound,
}

/// Projection bindings owned by one entity.
#[derive(Default)]
pub struct Projections {
    slots: HashMap<TypeId, ProjectionSlot>,
    primary: Option<TypeId>,
}

impl Projections {
    /// Returns `true` if a projection of `type_id` is bound.
    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.slots.contains_key(&type_id)
    }

    /// Returns `true` if the projection of `type_id` has been resolved.
    #[must_use]
    pub fn is_resolved(&self, type_id: TypeId) -> bool {
        self.slots
            .get(&type_id)
            .is_some_and(|slot| matches!(slot.state, SlotState::Resolved(_)))
    }

    /// Returns the primary projection type, if one is bound.
    #[must_use]
    pub fn primary(&self) -> Option<TypeId> {
        self.primary
    }

    /// Returns the short name of a bound projection type.
    #[must_use]
    pub fn type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.slots
            .get(&type_id)
            .map(|slot| short_type_name(slot.type_name))
    }

    /// Returns the number of bound projections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of the bindings that conflict with `binding`, if any.
    pub(crate) fn conflict(&self, binding: &ProjectionBinding) -> Option<&'static str> {
        if self.slots.contains_key(&binding.type_id) {
            return Some(binding.type_name());
        }
        if binding.primary {
            return self
                .primary
                .and_then(|existing| self.type_name(existing));
        }
        None
    }

    /// Attaches a binding. Callers check [`conflict`](Self::conflict) first.
    pub(crate) fn insert(&mut self, binding: ProjectionBinding) {
        if binding.primary {
            self.primary = Some(binding.type_id);
        }
        self.slots.insert(
            binding.type_id,
            ProjectionSlot {
                type_name: binding.type_name,
                state: SlotState::Pending(binding.factory),
            },
        );
    }

    pub(crate) fn claim(&mut self, type_id: TypeId) -> Claim {
        let Some(slot) = self.slots.get_mut(&type_id) else {
            return Claim::Unbound;
        };
        match core::mem::replace(&mut slot.state, SlotState::Resolving) {
            SlotState::Pending(factory) => Claim::Run(factory),
            SlotState::Resolving => Claim::Cycle,
            SlotState::Resolved(value) => {
                slot.state = SlotState::Resolved(Arc::clone(&value));
                Claim::Ready(value)
            }
        }
    }

    pub(crate) fn complete(&mut self, type_id: TypeId, value: SharedValue) {
        if let Some(slot) = self.slots.get_mut(&type_id) {
            slot.state = SlotState::Resolved(value);
        }
    }
}

impl fmt::Debug for Projections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.values().map(|slot| {
                let state = match slot.state {
                    SlotState::Pending(_) => "pending",
                    SlotState::Resolving => "resolving",
                    SlotState::Resolved(_) => "resolved",
                };
                (short_type_name(slot.type_name), state)
            }))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProjectionContext
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to a projection factory.
///
/// Exposes the entity being projected and read access to the registry. Other
/// projections, on this entity or any other, may be resolved through it.
pub struct ProjectionContext<'a> {
    registry: &'a mut ModelRegistry,
    entity: EntityId,
    path: ModelPath,
}

impl<'a> ProjectionContext<'a> {
    pub(crate) fn new(registry: &'a mut ModelRegistry, entity: EntityId, path: ModelPath) -> Self {
        Self {
            registry,
            entity,
            path,
        }
    }

    /// Returns the entity being projected.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Returns the path of the entity being projected.
    #[must_use]
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Returns the entity's current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.registry
            .stage(self.entity)
            .unwrap_or(Stage::Registered)
    }

    /// Returns a component of the projected entity, if attached.
    #[must_use]
    pub fn component<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.find_component::<T>(self.entity)
    }

    /// Returns `true` if the projected entity carries `T`.
    #[must_use]
    pub fn has<T: 'static>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    /// Resolves another projection of the same entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::resolve`], including
    /// [`ModelError::ProjectionCycle`](crate::error::ModelError::ProjectionCycle)
    /// when asked for the projection currently being built.
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> ModelResult<Arc<T>> {
        self.registry.resolve::<T>(self.entity)
    }

    /// Resolves a projection of another entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::resolve`].
    pub fn resolve_for<T: Send + Sync + 'static>(&mut self, entity: EntityId) -> ModelResult<Arc<T>> {
        self.registry.resolve::<T>(entity)
    }

    /// Returns read access to the whole registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &*self.registry
    }
}
