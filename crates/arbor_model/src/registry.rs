//! The model registry: entity storage, lifecycle and rule dispatch.
//!
//! [`ModelRegistry`] owns every entity of one configuration run. All
//! operations are synchronous: when a call returns, every rule it triggered
//! has run and the resulting state is observable.
//!
//! # Rule Dispatch
//!
//! Mutations never call rules directly. They queue an `(entity, trigger)`
//! pair and the registry drains the queue in FIFO order once the outermost
//! call is ready to return. Mutations made from inside a rule action only
//! queue further work. Stage advances are the exception: each stage step
//! drains the queue before the next step begins, so "on stage" rules have
//! run by the time the entity moves on.
//!
//! Two guards turn runaway rule sets into [`ModelError::RuleCycle`]:
//!
//! - a per-drain trigger budget
//!   ([`RegistryConfig::max_trigger_iterations`](crate::config::RegistryConfig::max_trigger_iterations)),
//! - a limit on drains nested through stage advances
//!   ([`RegistryConfig::max_reentrancy_depth`](crate::config::RegistryConfig::max_reentrancy_depth)).
//!
//! # Example
//!
//! ```
//! use arbor_model::registry::ModelRegistry;
//! use arbor_model::stage::Stage;
//!
//! let mut registry = ModelRegistry::new();
//! let app = registry.register_root("app").unwrap();
//! let lib = registry.register_child(&"app".parse().unwrap(), "lib").unwrap();
//!
//! registry.advance(lib, Stage::Realized).unwrap();
//!
//! // The parent is advanced first.
//! assert_eq!(registry.stage(app).unwrap(), Stage::Realized);
//! assert_eq!(registry.stage(lib).unwrap(), Stage::Realized);
//! ```

use core::any::TypeId;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::component::{
    AlreadyAttached, Component, ComponentId, Components, Inserted, PendingComponent, SharedValue,
    Tag, short_type_name,
};
use crate::config::RegistryConfig;
use crate::entity::{Entity, EntityId};
use crate::error::{CycleGuard, ModelError, ModelResult, TransitionBlocked};
use crate::event::{EventBus, ModelEvent};
use crate::path::ModelPath;
use crate::projection::{Claim, ProjectionBinding, ProjectionContext, Projections};
use crate::query::EntitySpec;
use crate::registration::{EntityRegistration, ParentRef};
use crate::rule::{Firing, Rule, RuleContext, RuleId, RuleMode, Trigger};
use crate::stage::Stage;

/// Owner of every entity, rule and projection of one configuration run.
#[derive(Default)]
pub struct ModelRegistry {
    config: RegistryConfig,
    entities: Vec<Entity>,
    paths: BTreeMap<ModelPath, EntityId>,
    rules: Vec<Arc<Rule>>,
    rule_names: HashMap<Arc<str>, RuleId>,
    rules_by_component: HashMap<ComponentId, Vec<RuleId>>,
    rules_by_stage: HashMap<Stage, Vec<RuleId>>,
    continuous: Vec<RuleId>,
    fired: HashSet<Firing>,
    fired_counts: Vec<usize>,
    pending: VecDeque<(EntityId, Trigger)>,
    depth: usize,
    processed: usize,
    next_age: u64,
    events: EventBus,
}

impl ModelRegistry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with `config`.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a new entity.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NotFound`] / [`ModelError::UnknownEntity`] if the parent does not exist
    /// - [`ModelError::InvalidPath`] if the name is not a valid path segment
    /// - [`ModelError::Finalized`] if the parent is finalized
    /// - [`ModelError::DuplicatePath`] if the path is taken
    /// - [`ModelError::DuplicateComponent`] / [`ModelError::DuplicateProjection`]
    ///   if the registration repeats a type
    /// - any rule error raised while processing the registration
    pub fn register(&mut self, registration: EntityRegistration) -> ModelResult<EntityId> {
        let EntityRegistration {
            name,
            parent,
            components: initial_components,
            projections: initial_projections,
        } = registration;

        let parent = match parent {
            ParentRef::Root => None,
            ParentRef::Path(path) => Some(self.get(&path)?),
            ParentRef::Entity(id) => Some(self.entity(id)?.id()),
        };

        let path = match parent {
            None => ModelPath::root(&name)?,
            Some(parent) => {
                let parent = self.entity(parent)?;
                if parent.lifecycle().is_finalized() {
                    return Err(ModelError::Finalized {
                        path: parent.path().clone(),
                    });
                }
                parent.path().child(&name)?
            }
        };

        if self.paths.contains_key(&path) {
            return Err(ModelError::DuplicatePath { path });
        }

        let mut components = Components::new();
        let mut added = Vec::with_capacity(initial_components.len());
        for pending in initial_components {
            let age = self.next_age;
            let component = pending.id();
            match components.insert_pending(pending, age) {
                Ok(Inserted::Added) => {
                    self.next_age += 1;
                    added.push((component, age));
                }
                Ok(Inserted::AlreadyPresent) => {}
                Err(AlreadyAttached(component)) => {
                    return Err(ModelError::DuplicateComponent { path, component });
                }
            }
        }

        let mut projections = Projections::default();
        for binding in initial_projections {
            if let Some(projection) = projections.conflict(&binding) {
                return Err(ModelError::DuplicateProjection { path, projection });
            }
            projections.insert(binding);
        }

        let id = EntityId(self.entities.len());
        let mut entity = Entity::new(id, path.clone(), parent);
        entity.components = components;
        entity.projections = projections;
        self.entities.push(entity);
        self.paths.insert(path.clone(), id);
        if let Some(parent) = parent {
            self.entities[parent.0].children.push(id);
        }

        tracing::debug!(entity = %id, path = %path, "entity registered");

        self.events.publish(&ModelEvent::EntityRegistered {
            entity: id,
            path: path.clone(),
            parent,
        });
        for (component, age) in added {
            self.events.publish(&ModelEvent::ComponentAdded {
                entity: id,
                path: path.clone(),
                component,
                age,
            });
        }

        self.pending.push_back((id, Trigger::Registered));
        self.settle()?;
        Ok(id)
    }

    /// Registers a top-level entity with no components.
    ///
    /// # Errors
    ///
    /// Fails like [`register`](Self::register).
    pub fn register_root(&mut self, name: impl Into<String>) -> ModelResult<EntityId> {
        self.register(EntityRegistration::new(name))
    }

    /// Registers a child of the entity at `parent` with no components.
    ///
    /// # Errors
    ///
    /// Fails like [`register`](Self::register).
    pub fn register_child(
        &mut self,
        parent: &ModelPath,
        name: impl Into<String>,
    ) -> ModelResult<EntityId> {
        self.register(EntityRegistration::new(name).parent(parent.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the entity registered at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no entity is registered there.
    pub fn get(&self, path: &ModelPath) -> ModelResult<EntityId> {
        self.find(path).ok_or_else(|| ModelError::NotFound {
            path: path.clone(),
        })
    }

    /// Returns the entity registered at `path`, if any.
    #[must_use]
    pub fn find(&self, path: &ModelPath) -> Option<EntityId> {
        self.paths.get(path).copied()
    }

    /// Borrows an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownEntity`] for an id from another registry.
    pub fn entity(&self, id: EntityId) -> ModelResult<&Entity> {
        self.entities.get(id.0).ok_or(ModelError::UnknownEntity(id))
    }

    fn entity_mut(&mut self, id: EntityId) -> ModelResult<&mut Entity> {
        self.entities
            .get_mut(id.0)
            .ok_or(ModelError::UnknownEntity(id))
    }

    /// Iterates over every entity in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter()
    }

    /// Returns the entity's current stage.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownEntity`] for an unknown id.
    pub fn stage(&self, id: EntityId) -> ModelResult<Stage> {
        Ok(self.entity(id)?.stage())
    }

    /// Returns the entity's direct children in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownEntity`] for an unknown id.
    pub fn children(&self, id: EntityId) -> ModelResult<&[EntityId]> {
        Ok(self.entity(id)?.children())
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Returns every entity matching `spec`, in registration order.
    #[must_use]
    pub fn query(&self, spec: &EntitySpec) -> Vec<EntityId> {
        match spec.path_scope() {
            Some(scope) => {
                let mut ids = self.scan_subtree(scope, spec);
                ids.sort_unstable();
                ids
            }
            None => self
                .entities
                .iter()
                .filter(|entity| spec.is_satisfied_by(entity))
                .map(Entity::id)
                .collect(),
        }
    }

    /// Returns every entity matching `spec`, in canonical path order.
    #[must_use]
    pub fn query_sorted(&self, spec: &EntitySpec) -> Vec<EntityId> {
        match spec.path_scope() {
            Some(scope) => self.scan_subtree(scope, spec),
            None => self
                .paths
                .values()
                .copied()
                .filter(|id| spec.is_satisfied_by(&self.entities[id.0]))
                .collect(),
        }
    }

    /// Range scan of the ordered path index: a path and its descendants are
    /// contiguous in canonical order.
    fn scan_subtree(&self, scope: &ModelPath, spec: &EntitySpec) -> Vec<EntityId> {
        self.paths
            .range(scope.clone()..)
            .take_while(|(path, _)| path.starts_with(scope))
            .map(|(_, id)| *id)
            .filter(|id| spec.is_satisfied_by(&self.entities[id.0]))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Components
    // ─────────────────────────────────────────────────────────────────────

    /// Attaches a data component.
    ///
    /// Re-attaching an [idempotent](Component::IDEMPOTENT) type keeps the
    /// first value and triggers nothing.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateComponent`] if the type is attached and not idempotent
    /// - [`ModelError::Finalized`] if the entity is finalized
    /// - any rule error raised while processing the addition
    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: C) -> ModelResult<()> {
        self.attach(entity, PendingComponent::component(component))
    }

    /// Attaches a tag. Re-attaching a tag is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Finalized`] if the entity is finalized
    /// - any rule error raised while processing the addition
    pub fn add_tag<T: Tag>(&mut self, entity: EntityId, tag: T) -> ModelResult<()> {
        self.attach(entity, PendingComponent::tag(tag))
    }

    /// Attaches a type-erased component.
    ///
    /// # Errors
    ///
    /// Fails like [`add_component`](Self::add_component).
    pub fn attach(&mut self, entity: EntityId, pending: PendingComponent) -> ModelResult<()> {
        let age = self.next_age;
        let target = self.entity_mut(entity)?;
        if target.lifecycle.is_finalized() {
            return Err(ModelError::Finalized {
                path: target.path.clone(),
            });
        }

        let component = pending.id();
        match target.components.insert_pending(pending, age) {
            Ok(Inserted::Added) => {}
            Ok(Inserted::AlreadyPresent) => return Ok(()),
            Err(AlreadyAttached(component)) => {
                return Err(ModelError::DuplicateComponent {
                    path: target.path.clone(),
                    component,
                });
            }
        }
        let path = target.path.clone();
        self.next_age += 1;

        tracing::trace!(entity = %entity, path = %path, component = %component, age, "component added");

        self.events.publish(&ModelEvent::ComponentAdded {
            entity,
            path,
            component,
            age,
        });
        self.pending
            .push_back((entity, Trigger::ComponentAdded(component)));
        self.settle()
    }

    /// Returns a shared handle to a component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingComponent`] if it is not attached.
    pub fn component<T: Send + Sync + 'static>(&self, entity: EntityId) -> ModelResult<Arc<T>> {
        let target = self.entity(entity)?;
        target
            .components
            .get_arc::<T>()
            .ok_or_else(|| ModelError::MissingComponent {
                path: target.path.clone(),
                component: ComponentId::of::<T>(),
            })
    }

    /// Returns a shared handle to a component, if attached.
    #[must_use]
    pub fn find_component<T: Send + Sync + 'static>(&self, entity: EntityId) -> Option<Arc<T>> {
        self.entities
            .get(entity.0)
            .and_then(|target| target.components.get_arc::<T>())
    }

    /// Returns `true` if the entity carries `T`.
    #[must_use]
    pub fn has_component<T: 'static>(&self, entity: EntityId) -> bool {
        self.entities
            .get(entity.0)
            .is_some_and(|target| target.components.contains::<T>())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rules
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a rule and evaluates it against every existing entity.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateRule`] if the name is taken
    /// - any rule error raised while applying the rule to existing entities
    pub fn add_rule(&mut self, rule: Rule) -> ModelResult<RuleId> {
        if self.rule_names.contains_key(rule.name()) {
            return Err(ModelError::DuplicateRule {
                name: rule.name().to_string(),
            });
        }

        let id = RuleId(self.rules.len());
        for component in rule.signature() {
            self.rules_by_component
                .entry(*component)
                .or_default()
                .push(id);
        }
        self.rules_by_stage
            .entry(rule.stage())
            .or_default()
            .push(id);
        if rule.mode() == RuleMode::Continuous {
            self.continuous.push(id);
        }
        self.rule_names.insert(rule.shared_name(), id);

        tracing::debug!(
            rule = %rule.name(),
            id = %id,
            stage = %rule.stage(),
            mode = ?rule.mode(),
            "rule registered"
        );

        self.rules.push(Arc::new(rule));
        self.fired_counts.push(0);

        for entity in &self.entities {
            self.pending.push_back((entity.id, Trigger::RuleAdded(id)));
        }
        self.settle()?;
        Ok(id)
    }

    /// Returns a registered rule.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0).map(Arc::as_ref)
    }

    /// Returns the id of the rule named `name`.
    #[must_use]
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rule_names.get(name).copied()
    }

    /// Returns the number of registered rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns how many times a rule has fired across all entities.
    #[must_use]
    pub fn fired_count(&self, id: RuleId) -> usize {
        self.fired_counts.get(id.0).copied().unwrap_or_default()
    }

    fn settle(&mut self) -> ModelResult<()> {
        if self.depth == 0 {
            self.drain()
        } else {
            Ok(())
        }
    }

    fn drain(&mut self) -> ModelResult<()> {
        if self.depth == 0 {
            self.processed = 0;
        }
        self.depth += 1;
        let result = self.drain_queue();
        self.depth -= 1;
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    fn drain_queue(&mut self) -> ModelResult<()> {
        while let Some((entity, trigger)) = self.pending.pop_front() {
            self.processed += 1;
            let limit = self.config.max_trigger_iterations();
            if self.processed > limit {
                return Err(ModelError::RuleCycle {
                    path: self.entities[entity.0].path.clone(),
                    trigger: trigger.to_string(),
                    guard: CycleGuard::Iterations(limit),
                });
            }
            self.evaluate(entity, trigger)?;
        }
        Ok(())
    }

    /// Candidate rules for a trigger, in registration order.
    fn candidates(&self, trigger: Trigger) -> Vec<RuleId> {
        let mut ids = match trigger {
            Trigger::Registered => self.rules_by_stage.get(&Stage::Registered).cloned(),
            Trigger::ComponentAdded(component) => self.rules_by_component.get(&component).cloned(),
            Trigger::StageEntered(stage) => {
                let mut ids = self.rules_by_stage.get(&stage).cloned().unwrap_or_default();
                // Continuous rules keep observing every later stage.
                ids.extend(
                    self.continuous
                        .iter()
                        .copied()
                        .filter(|id| self.rules[id.0].stage() < stage),
                );
                Some(ids)
            }
            Trigger::RuleAdded(rule) => Some(vec![rule]),
        }
        .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    fn evaluate(&mut self, entity: EntityId, trigger: Trigger) -> ModelResult<()> {
        for id in self.candidates(trigger) {
            let rule = Arc::clone(&self.rules[id.0]);
            let firing = rule.firing(id, entity, trigger);
            if self.fired.contains(&firing) || !rule.is_eligible(&self.entities[entity.0]) {
                continue;
            }
            self.fired.insert(firing);
            self.fire(&rule, id, entity, trigger)?;
        }
        Ok(())
    }

    fn fire(&mut self, rule: &Rule, id: RuleId, entity: EntityId, trigger: Trigger) -> ModelResult<()> {
        let path = self.entities[entity.0].path.clone();
        tracing::debug!(rule = %rule.name(), path = %path, trigger = %trigger, "firing rule");

        let result = {
            let mut ctx = RuleContext::new(self, id, entity, path.clone(), trigger);
            rule.run(&mut ctx)
        };

        if let Err(source) = result {
            let error = match source.downcast::<ModelError>() {
                Ok(error) if error.is_rule_failure() => *error,
                Ok(error) => ModelError::RuleExecution {
                    rule: rule.name().to_string(),
                    path,
                    source: error,
                },
                Err(source) => ModelError::RuleExecution {
                    rule: rule.name().to_string(),
                    path,
                    source,
                },
            };
            tracing::debug!(error = %error, "rule failed");
            return Err(error);
        }

        self.fired_counts[id.0] += 1;
        self.events.publish(&ModelEvent::RuleFired {
            rule: id,
            rule_name: rule.shared_name(),
            entity,
            path,
            trigger,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Advances an entity, and its ancestors first, to `target`.
    ///
    /// Returns the entity's stage afterwards. Already being at or past
    /// `target` is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidTransition`] if the entity or an ancestor
    ///   failed earlier, the parent chain is cyclic or too deep, or the entity
    ///   is already mid-advance
    /// - any rule error raised by a stage's rules, after which the entity is
    ///   marked failed at that stage
    pub fn advance(&mut self, entity: EntityId, target: Stage) -> ModelResult<Stage> {
        self.advance_chain(entity, target, 0)
    }

    fn advance_chain(&mut self, entity: EntityId, target: Stage, hops: usize) -> ModelResult<Stage> {
        let current = self.entity(entity)?;
        let from = current.stage();
        let parent = current.parent;
        let blocked = |reason| ModelError::InvalidTransition {
            path: current.path.clone(),
            from,
            to: target,
            reason,
        };

        if let Some(failed) = current.lifecycle.failed() {
            return Err(blocked(TransitionBlocked::PreviouslyFailed(failed)));
        }
        if from >= target {
            return Ok(from);
        }
        if hops > self.config.max_parent_depth() || parent == Some(entity) {
            return Err(blocked(TransitionBlocked::ParentCycle));
        }
        if current.lifecycle.transitioning().is_some() {
            return Err(blocked(TransitionBlocked::Reentrant));
        }

        if let Some(parent) = parent {
            self.advance_chain(parent, target, hops + 1)?;
        }

        self.entities[entity.0].lifecycle.begin(target);
        let result = self.step_through(entity, from, target);
        self.entities[entity.0].lifecycle.end();
        result.map(|()| target)
    }

    fn step_through(&mut self, entity: EntityId, from: Stage, target: Stage) -> ModelResult<()> {
        let mut previous = from;
        for stage in from.steps_to(target) {
            if let Err(error) = self.enter_stage(entity, previous, stage) {
                self.entities[entity.0].lifecycle.fail(stage);
                return Err(error);
            }
            previous = stage;
        }
        Ok(())
    }

    fn enter_stage(&mut self, entity: EntityId, from: Stage, stage: Stage) -> ModelResult<()> {
        if stage == Stage::Realized {
            self.force_primary(entity)?;
        }

        let target = &mut self.entities[entity.0];
        target.lifecycle.enter(stage);
        let path = target.path.clone();

        tracing::debug!(path = %path, from = %from, to = %stage, "stage entered");

        self.events.publish(&ModelEvent::StageChanged {
            entity,
            path: path.clone(),
            from,
            to: stage,
        });

        let trigger = Trigger::StageEntered(stage);
        let limit = self.config.max_reentrancy_depth();
        if self.depth >= limit {
            self.pending.clear();
            return Err(ModelError::RuleCycle {
                path,
                trigger: trigger.to_string(),
                guard: CycleGuard::Depth(limit),
            });
        }

        self.pending.push_back((entity, trigger));
        self.drain()
    }

    /// Advances an entity to [`Stage::Realized`].
    ///
    /// # Errors
    ///
    /// Fails like [`advance`](Self::advance).
    pub fn realize(&mut self, entity: EntityId) -> ModelResult<Stage> {
        self.advance(entity, Stage::Realized)
    }

    /// Advances an entity to [`Stage::Finalized`].
    ///
    /// # Errors
    ///
    /// Fails like [`advance`](Self::advance).
    pub fn finalize(&mut self, entity: EntityId) -> ModelResult<Stage> {
        self.advance(entity, Stage::Finalized)
    }

    /// Advances every entity to `target` in canonical path order.
    ///
    /// Entities registered by rules along the way are advanced too.
    ///
    /// # Errors
    ///
    /// Stops at the first failing entity.
    pub fn advance_all(&mut self, target: Stage) -> ModelResult<()> {
        loop {
            let behind: Vec<EntityId> = self
                .paths
                .values()
                .copied()
                .filter(|id| self.entities[id.0].stage() < target)
                .collect();
            if behind.is_empty() {
                return Ok(());
            }
            for id in behind {
                self.advance(id, target)?;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Projections
    // ─────────────────────────────────────────────────────────────────────

    /// Binds a lazy projection of type `T`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateProjection`] if `T` is already bound
    /// - [`ModelError::Finalized`] if the entity is finalized
    pub fn bind_projection<T, F>(&mut self, entity: EntityId, factory: F) -> ModelResult<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.bind(entity, ProjectionBinding::new(factory))
    }

    /// Binds the projection forced when the entity is realized.
    ///
    /// # Errors
    ///
    /// Fails like [`bind_projection`](Self::bind_projection), and with
    /// [`ModelError::DuplicateProjection`] if a primary projection is already
    /// bound.
    pub fn bind_primary_projection<T, F>(&mut self, entity: EntityId, factory: F) -> ModelResult<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ProjectionContext<'_>) -> T + Send + 'static,
    {
        self.bind(entity, ProjectionBinding::new(factory).primary())
    }

    /// Attaches a prepared projection binding.
    ///
    /// # Errors
    ///
    /// Fails like [`bind_projection`](Self::bind_projection).
    pub fn bind(&mut self, entity: EntityId, binding: ProjectionBinding) -> ModelResult<()> {
        let target = self.entity_mut(entity)?;
        if target.lifecycle.is_finalized() {
            return Err(ModelError::Finalized {
                path: target.path.clone(),
            });
        }
        if let Some(projection) = target.projections.conflict(&binding) {
            return Err(ModelError::DuplicateProjection {
                path: target.path.clone(),
                projection,
            });
        }
        tracing::trace!(
            path = %target.path,
            projection = binding.type_name(),
            primary = binding.is_primary(),
            "projection bound"
        );
        target.projections.insert(binding);
        Ok(())
    }

    /// Returns `true` if a projection of type `T` is bound.
    #[must_use]
    pub fn has_projection<T: 'static>(&self, entity: EntityId) -> bool {
        self.entities
            .get(entity.0)
            .is_some_and(|target| target.projections.contains(TypeId::of::<T>()))
    }

    /// Resolves the projection of type `T`, running its factory on first use.
    ///
    /// Every call for the same entity and type returns the same [`Arc`].
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnsupportedProjection`] if no `T` projection is bound
    /// - [`ModelError::ProjectionCycle`] if called from inside the `T`
    ///   factory of the same entity
    pub fn resolve<T: Send + Sync + 'static>(&mut self, entity: EntityId) -> ModelResult<Arc<T>> {
        let type_name = core::any::type_name::<T>();
        let value = self.resolve_erased(entity, TypeId::of::<T>(), type_name)?;
        value
            .downcast::<T>()
            .map_err(|_| ModelError::UnsupportedProjection {
                path: self.entities[entity.0].path.clone(),
                projection: short_type_name(type_name),
            })
    }

    fn resolve_erased(
        &mut self,
        entity: EntityId,
        type_id: TypeId,
        type_name: &'static str,
    ) -> ModelResult<SharedValue> {
        let target = self.entity_mut(entity)?;
        let path = target.path.clone();
        let projection = short_type_name(type_name);

        let factory = match target.projections.claim(type_id) {
            Claim::Ready(value) => return Ok(value),
            Claim::Cycle => return Err(ModelError::ProjectionCycle { path, projection }),
            Claim::Unbound => return Err(ModelError::UnsupportedProjection { path, projection }),
            Claim::Run(factory) => factory,
        };

        tracing::debug!(path = %path, projection, "resolving projection");

        let value = {
            let mut ctx = ProjectionContext::new(self, entity, path.clone());
            factory(&mut ctx)
        };
        self.entities[entity.0]
            .projections
            .complete(type_id, Arc::clone(&value));

        self.events.publish(&ModelEvent::ProjectionResolved {
            entity,
            path,
            projection,
        });
        Ok(value)
    }

    fn force_primary(&mut self, entity: EntityId) -> ModelResult<()> {
        let projections = &self.entities[entity.0].projections;
        let Some(type_id) = projections.primary() else {
            return Ok(());
        };
        let type_name = projections.type_name(type_id).unwrap_or("primary");
        self.resolve_erased(entity, type_id, type_name).map(drop)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the event bus for subscribing observers.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl core::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("entities", &self.entities.len())
            .field("rules", &self.rules.len())
            .field("pending", &self.pending.len())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
