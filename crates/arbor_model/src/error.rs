//! Error types for the model registry.

use core::fmt;

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::event::SubscribeError;
use crate::path::{ModelPath, PathError};
use crate::stage::Stage;

/// Type-erased error returned by rule actions.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the model.
pub type ModelResult<T> = Result<T, ModelError>;

/// Why a stage transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionBlocked {
    /// The entity failed while entering this stage and cannot advance further.
    PreviouslyFailed(Stage),
    /// The parent chain loops back on itself or exceeds the configured depth.
    ParentCycle,
    /// The entity is already advancing and one of its own rules asked to
    /// advance it again.
    Reentrant,
}

impl fmt::Display for TransitionBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionBlocked::PreviouslyFailed(stage) => {
                write!(f, "entity previously failed entering {stage}")
            }
            TransitionBlocked::ParentCycle => f.write_str("parent chain forms a cycle"),
            TransitionBlocked::Reentrant => f.write_str("entity is already advancing"),
        }
    }
}

/// Which guard stopped a runaway rule cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleGuard {
    /// Too many queued triggers were processed by one drain.
    Iterations(usize),
    /// Drains nested too deeply through stage advances.
    Depth(usize),
}

impl fmt::Display for CycleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleGuard::Iterations(limit) => write!(f, "more than {limit} triggers processed"),
            CycleGuard::Depth(limit) => write!(f, "rule drains nested deeper than {limit}"),
        }
    }
}

/// Errors produced by the model registry.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An entity already exists at this path.
    #[error("an entity is already registered at '{path}'")]
    DuplicatePath {
        /// The colliding path.
        path: ModelPath,
    },

    /// A non-idempotent component type was attached twice.
    #[error("component {component} is already attached to '{path}'")]
    DuplicateComponent {
        /// The entity's path.
        path: ModelPath,
        /// The component type.
        component: ComponentId,
    },

    /// No entity exists at this path.
    #[error("no entity registered at '{path}'")]
    NotFound {
        /// The requested path.
        path: ModelPath,
    },

    /// A stage transition was refused.
    #[error("cannot advance '{path}' from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The entity's path.
        path: ModelPath,
        /// The entity's current stage.
        from: Stage,
        /// The requested stage.
        to: Stage,
        /// Why the transition was refused.
        reason: TransitionBlocked,
    },

    /// No projection of the requested type is bound.
    #[error("no {projection} projection is bound to '{path}'")]
    UnsupportedProjection {
        /// The entity's path.
        path: ModelPath,
        /// The requested projection type.
        projection: &'static str,
    },

    /// Rule processing exceeded a cycle guard.
    #[error("rule cycle detected at '{path}' ({trigger}): {guard}")]
    RuleCycle {
        /// The entity being processed when the guard tripped.
        path: ModelPath,
        /// The trigger being processed when the guard tripped.
        trigger: String,
        /// The guard that tripped.
        guard: CycleGuard,
    },

    /// A rule action failed.
    #[error("rule '{rule}' failed on '{path}': {source}")]
    RuleExecution {
        /// The rule's name.
        rule: String,
        /// The entity the rule was running against.
        path: ModelPath,
        /// The error returned by the action.
        #[source]
        source: BoxError,
    },

    /// A path could not be built.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// An entity id does not belong to this registry.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// A required component is not attached.
    #[error("'{path}' has no {component} component")]
    MissingComponent {
        /// The entity's path.
        path: ModelPath,
        /// The missing component type.
        component: ComponentId,
    },

    /// The entity is finalized and can no longer be mutated.
    #[error("'{path}' is finalized")]
    Finalized {
        /// The entity's path.
        path: ModelPath,
    },

    /// A rule with this name is already registered.
    #[error("a rule named '{name}' is already registered")]
    DuplicateRule {
        /// The rule name.
        name: String,
    },

    /// A projection of this type is already bound.
    #[error("a {projection} projection is already bound to '{path}'")]
    DuplicateProjection {
        /// The entity's path.
        path: ModelPath,
        /// The projection type.
        projection: &'static str,
    },

    /// A projection factory asked for its own result.
    #[error("{projection} projection of '{path}' depends on itself")]
    ProjectionCycle {
        /// The entity's path.
        path: ModelPath,
        /// The projection type.
        projection: &'static str,
    },

    /// An event observer could not be registered.
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

impl ModelError {
    /// Returns `true` for errors that already carry rule diagnostics and must
    /// not be wrapped again when they escape an action.
    #[must_use]
    pub fn is_rule_failure(&self) -> bool {
        matches!(
            self,
            ModelError::RuleCycle { .. } | ModelError::RuleExecution { .. }
        )
    }

    /// Returns the path this error refers to, when it names one.
    #[must_use]
    pub fn path(&self) -> Option<&ModelPath> {
        match self {
            ModelError::DuplicatePath { path }
            | ModelError::DuplicateComponent { path, .. }
            | ModelError::NotFound { path }
            | ModelError::InvalidTransition { path, .. }
            | ModelError::UnsupportedProjection { path, .. }
            | ModelError::RuleCycle { path, .. }
            | ModelError::RuleExecution { path, .. }
            | ModelError::MissingComponent { path, .. }
            | ModelError::Finalized { path }
            | ModelError::DuplicateProjection { path, .. }
            | ModelError::ProjectionCycle { path, .. } => Some(path),
            ModelError::InvalidPath(_)
            | ModelError::UnknownEntity(_)
            | ModelError::DuplicateRule { .. }
            | ModelError::Subscribe(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let path = ModelPath::parse("app.sources").unwrap();
        let err = ModelError::DuplicatePath { path: path.clone() };
        assert_eq!(
            err.to_string(),
            "an entity is already registered at 'app.sources'"
        );
        assert_eq!(err.path(), Some(&path));
    }

    #[test]
    fn transition_message_includes_reason() {
        let err = ModelError::InvalidTransition {
            path: ModelPath::parse("app").unwrap(),
            from: Stage::Discovered,
            to: Stage::Realized,
            reason: TransitionBlocked::PreviouslyFailed(Stage::Created),
        };
        assert_eq!(
            err.to_string(),
            "cannot advance 'app' from discovered to realized: entity previously failed entering created"
        );
    }

    #[test]
    fn rule_execution_exposes_source() {
        use core::error::Error as _;

        let err = ModelError::RuleExecution {
            rule: "generate-sources".into(),
            path: ModelPath::parse("app").unwrap(),
            source: "disk full".into(),
        };
        assert!(err.is_rule_failure());
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("disk full"));
    }
}
