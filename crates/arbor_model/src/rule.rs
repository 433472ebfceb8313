//! Declarative reactive rules.
//!
//! A [`Rule`] binds a component signature and a minimum stage to an action.
//! Whenever an entity gains a component named in the signature, or enters
//! the rule's stage, the registry re-evaluates the rule against it and runs
//! the action if every required component is present and the entity is at
//! or past the stage.
//!
//! # Modes
//!
//! | Mode | Fires |
//! |------|-------|
//! | [`RuleMode::OneShot`] | At most once per entity |
//! | [`RuleMode::Continuous`] | Once per distinct trigger on each entity |
//!
//! When several rules match the same trigger on the same entity they run in
//! registration order.
//!
//! # Example
//!
//! ```
//! use arbor_model::component::Tag;
//! use arbor_model::registry::ModelRegistry;
//! use arbor_model::rule::Rule;
//! use arbor_model::stage::Stage;
//!
//! struct HasCSources;
//! impl Tag for HasCSources {}
//!
//! let mut registry = ModelRegistry::new();
//! registry
//!     .add_rule(
//!         Rule::builder("c-sources")
//!             .requires::<HasCSources>()
//!             .at_stage(Stage::Discovered)
//!             .run(|ctx| {
//!                 ctx.register_child("c")?;
//!                 Ok(())
//!             }),
//!     )
//!     .unwrap();
//!
//! let app = registry.register_root("app").unwrap();
//! registry.add_tag(app, HasCSources).unwrap();
//! registry.advance(app, Stage::Discovered).unwrap();
//!
//! assert!(registry.find(&"app.c".parse().unwrap()).is_some());
//! ```

use core::fmt;
use std::sync::Arc;

use crate::component::{Component, ComponentId, ComponentSet, Tag};
use crate::entity::{Entity, EntityId};
use crate::error::{BoxError, ModelError, ModelResult};
use crate::path::ModelPath;
use crate::projection::ProjectionContext;
use crate::query::EntitySpec;
use crate::registration::EntityRegistration;
use crate::registry::ModelRegistry;
use crate::stage::Stage;

/// Identifier of a registered rule. Ordering is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    /// Returns the raw index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule_{}", self.0)
    }
}

/// How often a rule may fire for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleMode {
    /// Fires at most once per entity.
    #[default]
    OneShot,
    /// Fires once for each distinct qualifying trigger.
    Continuous,
}

/// The cause of a rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The entity was registered.
    Registered,
    /// A component of this type was attached.
    ComponentAdded(ComponentId),
    /// The entity entered this stage.
    StageEntered(Stage),
    /// This rule was registered after the entity existed.
    RuleAdded(RuleId),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Registered => f.write_str("registered"),
            Trigger::ComponentAdded(id) => write!(f, "added {id}"),
            Trigger::StageEntered(stage) => write!(f, "entered {stage}"),
            Trigger::RuleAdded(id) => write!(f, "{id} added"),
        }
    }
}

/// Key recorded in the firing ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Firing {
    rule: RuleId,
    entity: EntityId,
    trigger: Option<Trigger>,
}

type RuleAction = Box<dyn Fn(&mut RuleContext<'_>) -> Result<(), BoxError> + Send + Sync>;

/// A declarative `(signature, stage) -> action` binding.
pub struct Rule {
    name: Arc<str>,
    signature: Vec<ComponentId>,
    stage: Stage,
    mode: RuleMode,
    scope: Option<EntitySpec>,
    action: RuleAction,
}

impl Rule {
    /// Starts building a rule named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder {
            name: name.into(),
            signature: Vec::new(),
            stage: Stage::Registered,
            mode: RuleMode::OneShot,
            scope: None,
        }
    }

    /// Returns the rule's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the component types an entity must carry.
    #[must_use]
    pub fn signature(&self) -> &[ComponentId] {
        &self.signature
    }

    /// Returns the minimum stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the firing mode.
    #[must_use]
    pub fn mode(&self) -> RuleMode {
        self.mode
    }

    /// Returns the entity scope, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&EntitySpec> {
        self.scope.as_ref()
    }

    /// Returns `true` if the rule may run against `entity` right now.
    #[must_use]
    pub fn is_eligible(&self, entity: &Entity) -> bool {
        entity.stage() >= self.stage
            && entity.components().contains_all(&self.signature)
            && self
                .scope
                .as_ref()
                .is_none_or(|scope| scope.is_satisfied_by(entity))
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn firing(&self, rule: RuleId, entity: EntityId, trigger: Trigger) -> Firing {
        Firing {
            rule,
            entity,
            trigger: match self.mode {
                RuleMode::OneShot => None,
                RuleMode::Continuous => Some(trigger),
            },
        }
    }

    pub(crate) fn run(&self, ctx: &mut RuleContext<'_>) -> Result<(), BoxError> {
        (self.action)(ctx)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("stage", &self.stage)
            .field("mode", &self.mode)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Rule`].
#[derive(Debug)]
pub struct RuleBuilder {
    name: String,
    signature: Vec<ComponentId>,
    stage: Stage,
    mode: RuleMode,
    scope: Option<EntitySpec>,
}

impl RuleBuilder {
    /// Requires component or tag `T`.
    #[must_use]
    pub fn requires<T: Send + Sync + 'static>(self) -> Self {
        self.requires_id(ComponentId::of::<T>())
    }

    /// Requires the component with `id`.
    #[must_use]
    pub fn requires_id(mut self, id: ComponentId) -> Self {
        if !self.signature.contains(&id) {
            self.signature.push(id);
        }
        self
    }

    /// Sets the minimum stage. Defaults to [`Stage::Registered`].
    #[must_use]
    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Fires at most once per entity (the default).
    #[must_use]
    pub fn one_shot(mut self) -> Self {
        self.mode = RuleMode::OneShot;
        self
    }

    /// Fires once for each distinct qualifying trigger.
    #[must_use]
    pub fn continuous(mut self) -> Self {
        self.mode = RuleMode::Continuous;
        self
    }

    /// Restricts the rule to entities matching `spec`.
    ///
    /// Components the spec requires conjunctively join the signature, so the
    /// rule is re-evaluated when they are attached.
    #[must_use]
    pub fn matching(mut self, spec: EntitySpec) -> Self {
        for id in spec.required_components() {
            self = self.requires_id(id);
        }
        self.scope = Some(match self.scope.take() {
            Some(existing) => existing.and(spec),
            None => spec,
        });
        self
    }

    /// Finishes the rule with an action.
    pub fn run<F>(self, action: F) -> Rule
    where
        F: Fn(&mut RuleContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Rule {
            name: Arc::from(self.name),
            signature: self.signature,
            stage: self.stage,
            mode: self.mode,
            scope: self.scope,
            action: Box::new(action),
        }
    }

    /// Finishes the rule with an action that receives the components in `S`.
    ///
    /// Every type in `S` joins the signature.
    ///
    /// ```
    /// use arbor_model::component::Component;
    /// use arbor_model::rule::Rule;
    ///
    /// struct BaseName(String);
    /// impl Component for BaseName {}
    ///
    /// let rule = Rule::builder("log-name").run_with::<(BaseName,), _>(|ctx, (name,)| {
    ///     assert!(!name.0.is_empty());
    ///     Ok(())
    /// });
    /// assert_eq!(rule.signature().len(), 1);
    /// ```
    pub fn run_with<S, F>(mut self, action: F) -> Rule
    where
        S: ComponentSet,
        F: Fn(&mut RuleContext<'_>, S::Item) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        for id in S::component_ids() {
            self = self.requires_id(id);
        }
        self.run(move |ctx| {
            let Some(components) = ctx.fetch::<S>() else {
                let missing = S::component_ids()
                    .into_iter()
                    .find(|id| !ctx.has_id(*id))
                    .unwrap_or_else(ComponentId::of::<S>);
                return Err(ModelError::MissingComponent {
                    path: ctx.path().clone(),
                    component: missing,
                }
                .into());
            };
            action(ctx, components)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleContext
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to a rule action.
///
/// Exposes the entity the rule matched and the registry. Mutations made
/// through the context are applied immediately; the rules they trigger run
/// after the current action returns.
pub struct RuleContext<'a> {
    registry: &'a mut ModelRegistry,
    rule: RuleId,
    entity: EntityId,
    path: ModelPath,
    trigger: Trigger,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        registry: &'a mut ModelRegistry,
        rule: RuleId,
        entity: EntityId,
        path: ModelPath,
        trigger: Trigger,
    ) -> Self {
        Self {
            registry,
            rule,
            entity,
            path,
            trigger,
        }
    }

    /// Returns the rule being run.
    #[must_use]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Returns the matched entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Returns the matched entity's path.
    #[must_use]
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Returns what caused this evaluation.
    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Returns the matched entity's stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.registry
            .stage(self.entity)
            .unwrap_or(Stage::Registered)
    }

    /// Returns read access to the registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &*self.registry
    }

    /// Returns mutable access to the registry.
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut *self.registry
    }

    /// Returns a component of the matched entity.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingComponent`] if it is not attached.
    pub fn component<T: Send + Sync + 'static>(&self) -> ModelResult<Arc<T>> {
        self.registry.component::<T>(self.entity)
    }

    /// Returns a component of the matched entity, if attached.
    #[must_use]
    pub fn find_component<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.find_component::<T>(self.entity)
    }

    /// Returns `true` if the matched entity carries `T`.
    #[must_use]
    pub fn has<T: 'static>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    fn has_id(&self, id: ComponentId) -> bool {
        self.registry
            .entity(self.entity)
            .is_ok_and(|entity| entity.components().contains_id(id))
    }

    fn fetch<S: ComponentSet>(&self) -> Option<S::Item> {
        self.registry
            .entity(self.entity)
            .ok()
            .and_then(|entity| S::fetch(entity.components()))
    }

    /// Attaches a component to the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::add_component`].
    pub fn add_component<C: Component>(&mut self, component: C) -> ModelResult<()> {
        self.registry.add_component(self.entity, component)
    }

    /// Attaches a tag to the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::add_tag`].
    pub fn add_tag<T: Tag>(&mut self, tag: T) -> ModelResult<()> {
        self.registry.add_tag(self.entity, tag)
    }

    /// Registers a new entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::register`].
    pub fn register(&mut self, registration: EntityRegistration) -> ModelResult<EntityId> {
        self.registry.register(registration)
    }

    /// Registers a plain child of the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::register`].
    pub fn register_child(&mut self, name: impl Into<String>) -> ModelResult<EntityId> {
        self.registry
            .register(EntityRegistration::new(name).parent_entity(self.entity))
    }

    /// Registers a child of the matched entity from a registration.
    ///
    /// Any parent set on `registration` is replaced by the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::register`].
    pub fn register_child_with(&mut self, registration: EntityRegistration) -> ModelResult<EntityId> {
        self.registry
            .register(registration.parent_entity(self.entity))
    }

    /// Binds a projection to the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::bind_projection`].
    pub fn bind_projection<T, F>(&mut self, factory: F) -> ModelResult<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.registry.bind_projection(self.entity, factory)
    }

    /// Binds the primary projection of the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::bind_primary_projection`].
    pub fn bind_primary_projection<T, F>(&mut self, factory: F) -> ModelResult<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.registry.bind_primary_projection(self.entity, factory)
    }

    /// Resolves a projection of the matched entity.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::resolve`].
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> ModelResult<Arc<T>> {
        self.registry.resolve::<T>(self.entity)
    }

    /// Advances any entity, draining its stage rules before returning.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelRegistry::advance`]. Asking to advance the matched
    /// entity past the stage it is currently entering fails with
    /// [`ModelError::InvalidTransition`].
    pub fn advance(&mut self, entity: EntityId, target: Stage) -> ModelResult<Stage> {
        self.registry.advance(entity, target)
    }

    /// Runs a query against the registry.
    #[must_use]
    pub fn query(&self, spec: &EntitySpec) -> Vec<EntityId> {
        self.registry.query(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Buildable;
    impl Tag for Buildable {}

    struct Linkable;
    impl Tag for Linkable {}

    #[test]
    fn builder_defaults() {
        let rule = Rule::builder("noop").run(|_| Ok(()));
        assert_eq!(rule.name(), "noop");
        assert_eq!(rule.stage(), Stage::Registered);
        assert_eq!(rule.mode(), RuleMode::OneShot);
        assert!(rule.signature().is_empty());
        assert!(rule.scope().is_none());
    }

    #[test]
    fn signature_deduplicates() {
        let rule = Rule::builder("dedup")
            .requires::<Buildable>()
            .requires::<Buildable>()
            .matching(EntitySpec::with_tag::<Buildable>().and(EntitySpec::with_tag::<Linkable>()))
            .run(|_| Ok(()));

        assert_eq!(
            rule.signature(),
            &[ComponentId::of::<Buildable>(), ComponentId::of::<Linkable>()]
        );
    }

    #[test]
    fn firing_keys_depend_on_mode() {
        let entity = EntityId::new(0);
        let one_shot = Rule::builder("a").run(|_| Ok(()));
        let continuous = Rule::builder("b").continuous().run(|_| Ok(()));

        let first = Trigger::Registered;
        let second = Trigger::StageEntered(Stage::Created);

        assert_eq!(
            one_shot.firing(RuleId(0), entity, first),
            one_shot.firing(RuleId(0), entity, second)
        );
        assert_ne!(
            continuous.firing(RuleId(1), entity, first),
            continuous.firing(RuleId(1), entity, second)
        );
    }

    #[test]
    fn eligibility_checks_stage_signature_and_scope() {
        let mut entity = Entity::new(EntityId::new(0), ModelPath::parse("app.lib").unwrap(), None);
        let rule = Rule::builder("scoped")
            .requires::<Buildable>()
            .at_stage(Stage::Created)
            .matching(EntitySpec::descendants_of(ModelPath::parse("app").unwrap()))
            .run(|_| Ok(()));

        assert!(!rule.is_eligible(&entity));
        entity.components.insert_tag(Buildable, 1).unwrap();
        assert!(!rule.is_eligible(&entity));
        entity.lifecycle.enter(Stage::Created);
        assert!(rule.is_eligible(&entity));
    }

    #[test]
    fn trigger_display() {
        assert_eq!(Trigger::StageEntered(Stage::Realized).to_string(), "entered realized");
        assert_eq!(Trigger::RuleAdded(RuleId(2)).to_string(), "rule_2 added");
        assert_eq!(
            Trigger::ComponentAdded(ComponentId::of::<Buildable>()).to_string(),
            "added Buildable"
        );
    }
}
