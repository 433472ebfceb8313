//! The configuration model graph behind Arbor.
//!
//! `arbor_model` stores a build's configuration as a tree of entities. Each
//! entity carries typed components and tags, moves through ordered lifecycle
//! stages, and can be viewed through lazily-built projections. Behavior is
//! attached with declarative rules that react when an entity gains a
//! component or enters a stage:
//!
//! - [`path`] - Hierarchical dot-separated entity paths
//! - [`component`] - Typed components and tags
//! - [`stage`] - Lifecycle stages
//! - [`registry`] - Entity storage, lifecycle and rule dispatch
//! - [`rule`] - Declarative reactive rules
//! - [`projection`] - Lazy, memoized typed views of an entity
//! - [`query`] - Entity predicates for queries and rule scopes
//! - [`event`] - Observer hooks for model changes
//! - [`plugin`] / [`project`] - Plugins and the host that runs them
//!
//! # Example
//!
//! ```
//! use arbor_model::prelude::*;
//!
//! #[derive(Tag)]
//! struct HasCSources;
//!
//! #[derive(Component)]
//! struct SourceSet(Vec<String>);
//!
//! let mut registry = ModelRegistry::new();
//! registry
//!     .add_rule(
//!         Rule::builder("c-source-set")
//!             .requires::<HasCSources>()
//!             .at_stage(Stage::Discovered)
//!             .run(|ctx| {
//!                 ctx.add_component(SourceSet(vec!["src/main.c".into()]))?;
//!                 Ok(())
//!             }),
//!     )
//!     .unwrap();
//!
//! let app = registry
//!     .register(EntityRegistration::new("app").with_tag(HasCSources))
//!     .unwrap();
//! registry.advance(app, Stage::Discovered).unwrap();
//!
//! assert_eq!(registry.component::<SourceSet>(app).unwrap().0.len(), 1);
//! ```

// Lets derive output refer to `arbor_model::` from inside this crate.
extern crate self as arbor_model;

/// Configuration for the registry's guards.
pub mod config;

/// Typed components and tags.
pub mod component;

/// Entities and their ids.
pub mod entity;

/// Error types.
pub mod error;

/// Observer hooks for model changes.
pub mod event;

/// Typed handles to entities with a known projection.
pub mod known;

/// Hierarchical entity paths.
pub mod path;

/// Plugin trait and plugin groups.
pub mod plugin;

/// Plugin host.
pub mod project;

/// Lazy projections.
pub mod projection;

/// Entity predicates.
pub mod query;

/// Entity registration requests.
pub mod registration;

/// The model registry.
pub mod registry;

/// Reactive rules.
pub mod rule;

/// Lifecycle stages.
pub mod stage;

/// Derive macros for [`Component`](component::Component) and [`Tag`](component::Tag).
pub use arbor_model_macros::{Component, Tag};

/// Re-export of the commonly used types.
pub mod prelude {
    pub use crate::component::{Component, ComponentId, ComponentSet, Tag};
    pub use crate::config::RegistryConfig;
    pub use crate::entity::{Entity, EntityId};
    pub use crate::error::{BoxError, ModelError, ModelResult};
    pub use crate::event::{
        AllEvents, EventBus, ModelEvent, OnComponentAdded, OnEntityRegistered,
        OnProjectionResolved, OnRuleFired, OnStageChanged,
    };
    pub use crate::known::KnownEntity;
    pub use crate::path::ModelPath;
    pub use crate::plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId};
    pub use crate::project::{PluginError, Project};
    pub use crate::projection::ProjectionContext;
    pub use crate::query::EntitySpec;
    pub use crate::registration::EntityRegistration;
    pub use crate::registry::ModelRegistry;
    pub use crate::rule::{Rule, RuleContext, RuleId, RuleMode, Trigger};
    pub use crate::stage::Stage;
    pub use arbor_model_macros::{Component, Tag};
}
