//! Entity predicates for queries and rule scoping.
//!
//! An [`EntitySpec`] is a composable predicate over entities. The same spec
//! serves one-off [`query`](crate::registry::ModelRegistry::query) calls and
//! scopes rules via [`RuleBuilder::matching`](crate::rule::RuleBuilder::matching).
//!
//! # Example
//!
//! ```
//! use arbor_model::component::Tag;
//! use arbor_model::path::ModelPath;
//! use arbor_model::query::EntitySpec;
//!
//! struct HasCSources;
//! impl Tag for HasCSources {}
//!
//! let app = ModelPath::parse("app").unwrap();
//! let spec = EntitySpec::descendants_of(app).and(EntitySpec::with_tag::<HasCSources>());
//!
//! assert_eq!(spec.to_string(), "(descendants_of(app) and has(HasCSources))");
//! assert_eq!(spec.required_components().len(), 1);
//! ```

use core::fmt;
use core::ops::Not;
use std::sync::Arc;

use crate::component::{Component, ComponentId, Tag};
use crate::entity::Entity;
use crate::path::ModelPath;
use crate::stage::Stage;

type EntityPredicate = Arc<dyn Fn(&Entity) -> bool + Send + Sync>;

/// A predicate over entities.
#[derive(Clone, Default)]
pub enum EntitySpec {
    /// Every entity.
    #[default]
    All,
    /// The entity at exactly this path.
    AtPath(ModelPath),
    /// Entities strictly below this path.
    DescendantsOf(ModelPath),
    /// Direct children of the entity at this path.
    OwnedBy(ModelPath),
    /// Entities carrying this component or tag.
    Has(ComponentId),
    /// Entities at or past this stage.
    StageAtLeast(Stage),
    /// Both specs hold.
    And(Box<EntitySpec>, Box<EntitySpec>),
    /// Either spec holds.
    Or(Box<EntitySpec>, Box<EntitySpec>),
    /// The spec does not hold.
    Not(Box<EntitySpec>),
    /// A custom predicate with a description used for display.
    Matching {
        /// Human-readable description.
        description: String,
        /// The predicate.
        predicate: EntityPredicate,
    },
}

impl EntitySpec {
    /// Matches every entity.
    #[must_use]
    pub fn all() -> Self {
        EntitySpec::All
    }

    /// Matches the entity at `path`.
    #[must_use]
    pub fn at_path(path: ModelPath) -> Self {
        EntitySpec::AtPath(path)
    }

    /// Matches entities strictly below `path`.
    #[must_use]
    pub fn descendants_of(path: ModelPath) -> Self {
        EntitySpec::DescendantsOf(path)
    }

    /// Matches the direct children of the entity at `path`.
    #[must_use]
    pub fn owned_by(path: ModelPath) -> Self {
        EntitySpec::OwnedBy(path)
    }

    /// Matches entities carrying tag `T`.
    #[must_use]
    pub fn with_tag<T: Tag>() -> Self {
        EntitySpec::Has(ComponentId::of::<T>())
    }

    /// Matches entities carrying component `T`.
    #[must_use]
    pub fn with_component<T: Component>() -> Self {
        EntitySpec::Has(ComponentId::of::<T>())
    }

    /// Matches entities at or past `stage`.
    #[must_use]
    pub fn stage_at_least(stage: Stage) -> Self {
        EntitySpec::StageAtLeast(stage)
    }

    /// Matches entities accepted by `predicate`.
    pub fn matching<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Entity) -> bool + Send + Sync + 'static,
    {
        EntitySpec::Matching {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Matches entities accepted by both `self` and `other`.
    #[must_use]
    pub fn and(self, other: EntitySpec) -> Self {
        EntitySpec::And(Box::new(self), Box::new(other))
    }

    /// Matches entities accepted by `self` or `other`.
    #[must_use]
    pub fn or(self, other: EntitySpec) -> Self {
        EntitySpec::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the predicate against `entity`.
    #[must_use]
    pub fn is_satisfied_by(&self, entity: &Entity) -> bool {
        match self {
            EntitySpec::All => true,
            EntitySpec::AtPath(path) => entity.path() == path,
            EntitySpec::DescendantsOf(path) => entity.path().is_descendant_of(path),
            EntitySpec::OwnedBy(path) => entity.path().is_direct_descendant_of(path),
            EntitySpec::Has(id) => entity.components().contains_id(*id),
            EntitySpec::StageAtLeast(stage) => entity.stage() >= *stage,
            EntitySpec::And(a, b) => a.is_satisfied_by(entity) && b.is_satisfied_by(entity),
            EntitySpec::Or(a, b) => a.is_satisfied_by(entity) || b.is_satisfied_by(entity),
            EntitySpec::Not(inner) => !inner.is_satisfied_by(entity),
            EntitySpec::Matching { predicate, .. } => predicate(entity),
        }
    }

    /// Component ids every matching entity must carry.
    ///
    /// Only conjunctive requirements are reported; components mentioned under
    /// `or` or `not` are not required.
    #[must_use]
    pub fn required_components(&self) -> Vec<ComponentId> {
        let mut ids = Vec::new();
        self.collect_required(&mut ids);
        ids
    }

    fn collect_required(&self, ids: &mut Vec<ComponentId>) {
        match self {
            EntitySpec::Has(id) => {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
            EntitySpec::And(a, b) => {
                a.collect_required(ids);
                b.collect_required(ids);
            }
            _ => {}
        }
    }

    /// A path whose subtree (itself included) contains every match, if the
    /// spec constrains paths conjunctively.
    #[must_use]
    pub fn path_scope(&self) -> Option<&ModelPath> {
        match self {
            EntitySpec::AtPath(path) | EntitySpec::DescendantsOf(path) | EntitySpec::OwnedBy(path) => {
                Some(path)
            }
            EntitySpec::And(a, b) => a.path_scope().or_else(|| b.path_scope()),
            _ => None,
        }
    }
}

impl Not for EntitySpec {
    type Output = EntitySpec;

    fn not(self) -> Self::Output {
        EntitySpec::Not(Box::new(self))
    }
}

impl fmt::Display for EntitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitySpec::All => f.write_str("all"),
            EntitySpec::AtPath(path) => write!(f, "path({path})"),
            EntitySpec::DescendantsOf(path) => write!(f, "descendants_of({path})"),
            EntitySpec::OwnedBy(path) => write!(f, "owned_by({path})"),
            EntitySpec::Has(id) => write!(f, "has({id})"),
            EntitySpec::StageAtLeast(stage) => write!(f, "stage >= {stage}"),
            EntitySpec::And(a, b) => write!(f, "({a} and {b})"),
            EntitySpec::Or(a, b) => write!(f, "({a} or {b})"),
            EntitySpec::Not(inner) => write!(f, "not {inner}"),
            EntitySpec::Matching { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for EntitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntitySpec({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    struct Buildable;
    impl Tag for Buildable {}

    struct Linkable;
    impl Tag for Linkable {}

    fn entity(path: &str) -> Entity {
        Entity::new(EntityId::new(0), ModelPath::parse(path).unwrap(), None)
    }

    fn path(s: &str) -> ModelPath {
        ModelPath::parse(s).unwrap()
    }

    #[test]
    fn path_predicates() {
        let deep = entity("app.main.cpp");

        assert!(EntitySpec::descendants_of(path("app")).is_satisfied_by(&deep));
        assert!(!EntitySpec::owned_by(path("app")).is_satisfied_by(&deep));
        assert!(EntitySpec::owned_by(path("app.main")).is_satisfied_by(&deep));
        assert!(EntitySpec::at_path(path("app.main.cpp")).is_satisfied_by(&deep));
        assert!(!EntitySpec::descendants_of(path("app.main.cpp")).is_satisfied_by(&deep));
    }

    #[test]
    fn combinators() {
        let mut tagged = entity("lib");
        tagged.components.insert_tag(Buildable, 1).unwrap();

        let buildable = EntitySpec::with_tag::<Buildable>();
        let linkable = EntitySpec::with_tag::<Linkable>();

        assert!(buildable.clone().or(linkable.clone()).is_satisfied_by(&tagged));
        assert!(!buildable.clone().and(linkable.clone()).is_satisfied_by(&tagged));
        assert!((!linkable).is_satisfied_by(&tagged));
        assert!(EntitySpec::matching("named lib", |e| e.path().name() == "lib").is_satisfied_by(&tagged));
    }

    #[test]
    fn required_components_only_from_conjunctions() {
        let spec = EntitySpec::with_tag::<Buildable>()
            .and(EntitySpec::with_tag::<Buildable>())
            .and(EntitySpec::with_tag::<Linkable>().or(EntitySpec::all()));

        assert_eq!(spec.required_components(), vec![ComponentId::of::<Buildable>()]);
        assert!((!EntitySpec::with_tag::<Linkable>()).required_components().is_empty());
    }

    #[test]
    fn path_scope_follows_conjunctions() {
        let app = path("app");
        let spec = EntitySpec::with_tag::<Buildable>().and(EntitySpec::descendants_of(app.clone()));
        assert_eq!(spec.path_scope(), Some(&app));

        let spec = EntitySpec::descendants_of(app).or(EntitySpec::all());
        assert_eq!(spec.path_scope(), None);
    }

    #[test]
    fn display_is_readable() {
        let spec = !EntitySpec::stage_at_least(Stage::Realized);
        assert_eq!(spec.to_string(), "not stage >= realized");
    }
}
