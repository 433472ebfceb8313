//! Typed component storage for model entities.
//!
//! This module provides the [`Component`] and [`Tag`] traits and the
//! [`Components`] container that every entity owns.
//!
//! # Data Components vs Tags
//!
//! | Kind | Trait | Payload | Re-adding |
//! |------|-------|---------|-----------|
//! | Data | [`Component`] | Any value | Error unless [`Component::IDEMPOTENT`] |
//! | Tag | [`Tag`] | None (marker) | Always a no-op |
//!
//! Components are write-once per type: once attached they are never removed
//! or replaced. Values are shared behind an [`Arc`] so rule actions and
//! projection factories can hold them while mutating the registry. Types
//! that need to change after attachment carry their own interior
//! mutability.
//!
//! # Example
//!
//! ```
//! use arbor_model::component::{Component, Components, Tag};
//!
//! struct BaseName(String);
//! impl Component for BaseName {}
//!
//! struct HasCSources;
//! impl Tag for HasCSources {}
//!
//! let mut components = Components::new();
//! components.insert_component(BaseName("app".into()), 1).unwrap();
//! components.insert_tag(HasCSources, 2).unwrap();
//!
//! assert_eq!(components.get::<BaseName>().unwrap().0, "app");
//! assert!(components.contains::<HasCSources>());
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use variadics_please::all_tuples;

/// A typed data value attached to an entity.
///
/// Implement this marker trait (or `#[derive(Component)]`) for any type that
/// should be stored on an entity.
///
/// # Idempotence
///
/// By default, attaching a second value of the same type fails. Types that
/// set `IDEMPOTENT = true` silently keep the first value instead.
///
/// ```
/// use arbor_model::component::Component;
///
/// struct SourceRoot(String);
/// impl Component for SourceRoot {}
///
/// struct Configurable;
/// impl Component for Configurable {
///     const IDEMPOTENT: bool = true;
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Whether re-attaching this component type is a silent no-op.
    const IDEMPOTENT: bool = false;
}

/// A payload-free capability marker attached to an entity.
///
/// Tags exist purely to be matched by rules and queries ("this entity has
/// C sources"). Adding a tag that is already present is a no-op.
pub trait Tag: Send + Sync + 'static {}

/// Distinguishes data components from tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A value-carrying component.
    Data,
    /// A payload-free marker.
    Tag,
}

/// Unique identifier for a component type.
///
/// Used to key components in entity storage and in rule signatures.
#[derive(Clone, Copy)]
pub struct ComponentId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentId {
    /// Creates a `ComponentId` for the given type.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the full type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentId {}

impl core::hash::Hash for ComponentId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.short_name())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strips the module path from a type name. Generic arguments are kept
/// as written.
///
/// ```
/// use arbor_model::component::short_type_name;
///
/// assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec<u8>");
/// assert_eq!(short_type_name("u32"), "u32");
/// ```
#[must_use]
pub fn short_type_name(name: &'static str) -> &'static str {
    let end = name.find('<').unwrap_or(name.len());
    match name[..end].rfind("::") {
        Some(idx) => &name[idx + 2..],
        None => name,
    }
}

/// Type-erased shared component value.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

/// Outcome of inserting a component into a [`Components`] container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// The component was attached.
    Added,
    /// The type was already present and re-adding is a no-op.
    AlreadyPresent,
}

/// The type was already present and re-adding is not permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("component {0} is already attached")]
pub struct AlreadyAttached(pub ComponentId);

/// Storage for a single attached component.
pub struct ComponentEntry {
    value: SharedValue,
    kind: ComponentKind,
    age: u64,
}

impl ComponentEntry {
    /// Returns whether this entry is a data component or a tag.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Returns the registry-wide age stamp recorded when attached.
    #[must_use]
    pub fn age(&self) -> u64 {
        self.age
    }
}

/// A type-erased component waiting to be inserted.
///
/// Produced by entity registrations so that initial components can be
/// carried before the entity exists.
pub struct PendingComponent {
    pub(crate) id: ComponentId,
    pub(crate) kind: ComponentKind,
    pub(crate) idempotent: bool,
    pub(crate) value: SharedValue,
}

impl PendingComponent {
    /// Wraps a data component.
    #[must_use]
    pub fn component<C: Component>(component: C) -> Self {
        Self {
            id: ComponentId::of::<C>(),
            kind: ComponentKind::Data,
            idempotent: C::IDEMPOTENT,
            value: Arc::new(component),
        }
    }

    /// Wraps a tag.
    #[must_use]
    pub fn tag<T: Tag>(tag: T) -> Self {
        Self {
            id: ComponentId::of::<T>(),
            kind: ComponentKind::Tag,
            idempotent: true,
            value: Arc::new(tag),
        }
    }

    /// Returns the component type being carried.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }
}

impl fmt::Debug for PendingComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingComponent")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Container for the components attached to one entity.
///
/// Iteration order is attachment order, which is also ascending age.
#[derive(Default)]
pub struct Components {
    storage: IndexMap<ComponentId, ComponentEntry>,
}

impl Components {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: IndexMap::new(),
        }
    }

    /// Attaches a data component stamped with `age`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyAttached`] if the type is present and not idempotent.
    pub fn insert_component<C: Component>(
        &mut self,
        component: C,
        age: u64,
    ) -> Result<Inserted, AlreadyAttached> {
        self.insert_pending(PendingComponent::component(component), age)
    }

    /// Attaches a tag stamped with `age`. Re-adding a tag is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyAttached`] if the type was previously attached as a
    /// non-idempotent data component.
    pub fn insert_tag<T: Tag>(&mut self, tag: T, age: u64) -> Result<Inserted, AlreadyAttached> {
        self.insert_pending(PendingComponent::tag(tag), age)
    }

    /// Attaches a type-erased pending component.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyAttached`] if the type is present and re-adding is
    /// not permitted.
    pub fn insert_pending(
        &mut self,
        pending: PendingComponent,
        age: u64,
    ) -> Result<Inserted, AlreadyAttached> {
        if let Some(existing) = self.storage.get(&pending.id) {
            let idempotent = pending.idempotent && existing.kind == pending.kind;
            return if idempotent {
                Ok(Inserted::AlreadyPresent)
            } else {
                Err(AlreadyAttached(pending.id))
            };
        }

        self.storage.insert(
            pending.id,
            ComponentEntry {
                value: pending.value,
                kind: pending.kind,
                age,
            },
        );
        Ok(Inserted::Added)
    }

    /// Returns `true` if a component of type `T` is attached.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.storage.contains_key(&ComponentId::of::<T>())
    }

    /// Returns `true` if a component with the given id is attached.
    #[must_use]
    pub fn contains_id(&self, id: ComponentId) -> bool {
        self.storage.contains_key(&id)
    }

    /// Returns `true` if every id in `ids` is attached.
    #[must_use]
    pub fn contains_all(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|id| self.storage.contains_key(id))
    }

    /// Gets a reference to a component.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.storage
            .get(&ComponentId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Gets a shared handle to a component.
    #[must_use]
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.storage
            .get(&ComponentId::of::<T>())
            .and_then(|entry| Arc::clone(&entry.value).downcast::<T>().ok())
    }

    /// Returns the storage entry for a component id.
    #[must_use]
    pub fn entry(&self, id: ComponentId) -> Option<&ComponentEntry> {
        self.storage.get(&id)
    }

    /// Iterates over attached component ids in attachment order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.storage.keys().copied()
    }

    /// Iterates over `(id, entry)` pairs in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentEntry)> + '_ {
        self.storage.iter().map(|(id, entry)| (*id, entry))
    }

    /// Returns the number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.storage
                    .iter()
                    .map(|(id, entry)| format!("{}@{}", id.short_name(), entry.age)),
            )
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentSet
// ─────────────────────────────────────────────────────────────────────────────

/// A tuple of component types fetched together as shared handles.
///
/// Used by typed rule actions: the tuple's ids become part of the rule
/// signature, and matching entities hand the action an `(Arc<A>, Arc<B>, ..)`.
///
/// ```
/// use arbor_model::component::{Component, ComponentSet, Components, Tag};
///
/// struct BaseName(String);
/// impl Component for BaseName {}
/// struct Buildable;
/// impl Tag for Buildable {}
///
/// let mut components = Components::new();
/// components.insert_component(BaseName("lib".into()), 1).unwrap();
/// components.insert_tag(Buildable, 2).unwrap();
///
/// let ids = <(BaseName, Buildable)>::component_ids();
/// assert_eq!(ids.len(), 2);
///
/// let (name, _) = <(BaseName, Buildable)>::fetch(&components).unwrap();
/// assert_eq!(name.0, "lib");
/// ```
pub trait ComponentSet: 'static {
    /// Shared handles to each component in the set.
    type Item: Send + Sync;

    /// Returns the ids of every component type in the set.
    fn component_ids() -> Vec<ComponentId>;

    /// Fetches every component, or `None` if any is missing.
    fn fetch(components: &Components) -> Option<Self::Item>;
}

macro_rules! impl_component_set_for_tuple {
    ($($C:ident),*) => {
        impl<$($C: Send + Sync + 'static),*> ComponentSet for ($($C,)*) {
            type Item = ($(Arc<$C>,)*);

            fn component_ids() -> Vec<ComponentId> {
                vec![$(ComponentId::of::<$C>()),*]
            }

            fn fetch(components: &Components) -> Option<Self::Item> {
                Some(($(components.get_arc::<$C>()?,)*))
            }
        }
    };
}

// Generate implementations for tuples from 1 to 8 elements
all_tuples!(impl_component_set_for_tuple, 1, 8, C);
