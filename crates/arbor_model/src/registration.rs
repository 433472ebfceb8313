//! Declarative entity registrations.

use crate::component::{Component, PendingComponent, Tag};
use crate::entity::EntityId;
use crate::path::ModelPath;
use crate::projection::{ProjectionBinding, ProjectionContext};

/// Where a new entity is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// A top-level entity.
    Root,
    /// The entity registered at this path.
    Path(ModelPath),
    /// The entity with this handle.
    Entity(EntityId),
}

/// Everything needed to register one entity.
///
/// The path is the parent's path plus `name`; initial components, tags and
/// projection bindings are attached before any rule sees the entity.
///
/// # Example
///
/// ```
/// use arbor_model::component::{Component, Tag};
/// use arbor_model::registration::EntityRegistration;
/// use arbor_model::registry::ModelRegistry;
///
/// struct HasCSources;
/// impl Tag for HasCSources {}
///
/// struct BaseName(&'static str);
/// impl Component for BaseName {}
///
/// let mut registry = ModelRegistry::new();
/// let app = registry.register_root("app").unwrap();
/// let main = registry
///     .register(
///         EntityRegistration::new("main")
///             .parent_entity(app)
///             .with_tag(HasCSources)
///             .with_component(BaseName("main")),
///     )
///     .unwrap();
///
/// assert_eq!(registry.entity(main).unwrap().path().to_string(), "app.main");
/// assert!(registry.has_component::<HasCSources>(main));
/// ```
#[derive(Debug)]
pub struct EntityRegistration {
    pub(crate) name: String,
    pub(crate) parent: ParentRef,
    pub(crate) components: Vec<PendingComponent>,
    pub(crate) projections: Vec<ProjectionBinding>,
}

impl EntityRegistration {
    /// Starts a registration for an entity named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: ParentRef::Root,
            components: Vec::new(),
            projections: Vec::new(),
        }
    }

    /// Attaches the entity under the entity at `path`.
    #[must_use]
    pub fn parent(mut self, path: ModelPath) -> Self {
        self.parent = ParentRef::Path(path);
        self
    }

    /// Attaches the entity under `parent`.
    #[must_use]
    pub fn parent_entity(mut self, parent: EntityId) -> Self {
        self.parent = ParentRef::Entity(parent);
        self
    }

    /// Adds an initial data component.
    #[must_use]
    pub fn with_component<C: Component>(mut self, component: C) -> Self {
        self.components.push(PendingComponent::component(component));
        self
    }

    /// Adds an initial tag.
    #[must_use]
    pub fn with_tag<T: Tag>(mut self, tag: T) -> Self {
        self.components.push(PendingComponent::tag(tag));
        self
    }

    /// Binds a lazy projection.
    #[must_use]
    pub fn with_projection<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.projections.push(ProjectionBinding::new(factory));
        self
    }

    /// Binds the projection that is forced when the entity is realized.
    #[must_use]
    pub fn with_primary_projection<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.projections
            .push(ProjectionBinding::new(factory).primary());
        self
    }

    /// Returns the entity's own name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
