//! Typed handles to entities with a known projection.

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use crate::component::short_type_name;
use crate::entity::EntityId;
use crate::error::{BoxError, ModelResult};
use crate::path::ModelPath;
use crate::query::EntitySpec;
use crate::registry::ModelRegistry;
use crate::rule::{Rule, RuleContext, RuleId};
use crate::stage::Stage;

/// A handle to an entity whose `T` projection callers want to use.
///
/// The handle holds no value itself. [`get`](Self::get) realizes the entity
/// and resolves `T`; [`configure`](Self::configure) defers work until the
/// entity is realized.
///
/// ```
/// use arbor_model::known::KnownEntity;
/// use arbor_model::registration::EntityRegistration;
/// use arbor_model::registry::ModelRegistry;
/// use arbor_model::stage::Stage;
///
/// struct Binary(String);
///
/// let mut registry = ModelRegistry::new();
/// let app = registry
///     .register(EntityRegistration::new("app").with_projection(|ctx| {
///         Binary(format!("{}.exe", ctx.path().name()))
///     }))
///     .unwrap();
///
/// let known = KnownEntity::<Binary>::new(&registry, app).unwrap();
/// let binary = known.get(&mut registry).unwrap();
/// assert_eq!(binary.0, "app.exe");
/// assert_eq!(registry.stage(app).unwrap(), Stage::Realized);
/// ```
pub struct KnownEntity<T> {
    entity: EntityId,
    path: ModelPath,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> KnownEntity<T> {
    /// Creates a handle for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownEntity`](crate::error::ModelError::UnknownEntity)
    /// if the entity does not belong to `registry`.
    pub fn new(registry: &ModelRegistry, entity: EntityId) -> ModelResult<Self> {
        let path = registry.entity(entity)?.path().clone();
        Ok(Self {
            entity,
            path,
            _marker: PhantomData,
        })
    }

    /// Creates a handle for the entity at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`](crate::error::ModelError::NotFound)
    /// if nothing is registered there.
    pub fn at(registry: &ModelRegistry, path: &ModelPath) -> ModelResult<Self> {
        let entity = registry.get(path)?;
        Self::new(registry, entity)
    }

    /// Returns the entity id.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Returns the entity path.
    #[must_use]
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Realizes the entity and resolves its `T` projection.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`ModelRegistry::realize`] and
    /// [`ModelRegistry::resolve`].
    pub fn get(&self, registry: &mut ModelRegistry) -> ModelResult<Arc<T>> {
        registry.realize(self.entity)?;
        registry.resolve::<T>(self.entity)
    }

    /// Runs `action` with the resolved projection once the entity is realized.
    ///
    /// If the entity is already realized the action runs before this call
    /// returns.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`ModelRegistry::add_rule`], including a
    /// failing action when the entity is already realized.
    pub fn configure<F>(&self, registry: &mut ModelRegistry, action: F) -> ModelResult<RuleId>
    where
        F: Fn(&mut RuleContext<'_>, &T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = format!(
            "configure {} of {} #{}",
            short_type_name(core::any::type_name::<T>()),
            self.path,
            registry.rule_count()
        );
        let rule = Rule::builder(name)
            .at_stage(Stage::Realized)
            .one_shot()
            .matching(EntitySpec::at_path(self.path.clone()))
            .run(move |ctx| {
                let value = ctx.resolve::<T>()?;
                action(ctx, &value)
            });
        registry.add_rule(rule)
    }
}

impl<T> Clone for KnownEntity<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for KnownEntity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl<T> Eq for KnownEntity<T> {}

impl<T> fmt::Debug for KnownEntity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownEntity")
            .field("entity", &self.entity)
            .field("path", &self.path)
            .field("projection", &short_type_name(core::any::type_name::<T>()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::registration::EntityRegistration;

    struct Library {
        name: String,
    }

    struct LinkedWith(String);
    impl Component for LinkedWith {}

    fn registry_with_library() -> (ModelRegistry, EntityId) {
        let mut registry = ModelRegistry::new();
        let lib = registry
            .register(EntityRegistration::new("lib").with_projection(|ctx| Library {
                name: ctx.path().name().to_string(),
            }))
            .unwrap();
        (registry, lib)
    }

    #[test]
    fn configure_waits_for_realization() {
        let (mut registry, lib) = registry_with_library();
        let known = KnownEntity::<Library>::new(&registry, lib).unwrap();

        known
            .configure(&mut registry, |ctx, library| {
                ctx.add_component(LinkedWith(library.name.clone()))?;
                Ok(())
            })
            .unwrap();

        registry.advance(lib, Stage::Created).unwrap();
        assert!(!registry.has_component::<LinkedWith>(lib));

        registry.realize(lib).unwrap();
        assert_eq!(registry.component::<LinkedWith>(lib).unwrap().0, "lib");
    }

    #[test]
    fn configure_on_realized_entity_runs_immediately() {
        let (mut registry, lib) = registry_with_library();
        registry.realize(lib).unwrap();
        let known = KnownEntity::<Library>::at(&registry, &"lib".parse().unwrap()).unwrap();

        known
            .configure(&mut registry, |ctx, library| {
                ctx.add_component(LinkedWith(library.name.to_uppercase()))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(registry.component::<LinkedWith>(lib).unwrap().0, "LIB");
    }

    #[test]
    fn configure_is_scoped_to_its_entity() {
        let (mut registry, lib) = registry_with_library();
        let other = registry
            .register(EntityRegistration::new("other").with_projection(|_| Library {
                name: "other".into(),
            }))
            .unwrap();

        KnownEntity::<Library>::new(&registry, lib)
            .unwrap()
            .configure(&mut registry, |ctx, _| {
                ctx.add_tag(Marker)?;
                Ok(())
            })
            .unwrap();

        registry.advance_all(Stage::Realized).unwrap();
        assert!(registry.has_component::<Marker>(lib));
        assert!(!registry.has_component::<Marker>(other));
    }

    struct Marker;
    impl crate::component::Tag for Marker {}

    #[test]
    fn unknown_entity_is_rejected() {
        let registry = ModelRegistry::new();
        assert!(KnownEntity::<Library>::new(&registry, EntityId::new(3)).is_err());
    }
}
