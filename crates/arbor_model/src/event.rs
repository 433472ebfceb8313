//! Registry event publication.
//!
//! The [`EventBus`] lets plugins observe what happens inside a
//! [`ModelRegistry`](crate::registry::ModelRegistry): registrations,
//! component additions, stage changes, rule firings and projection
//! resolutions. Observers are read-only; rules are the mutation mechanism.
//!
//! # Multi-Kind Subscription
//!
//! Subscribe to several kinds at once using tuple syntax:
//!
//! ```
//! use arbor_model::event::{EventBus, ModelEvent, OnEntityRegistered, OnStageChanged};
//!
//! let mut events = EventBus::new();
//! events
//!     .subscribe::<(OnEntityRegistered, OnStageChanged), _>("audit", |event: &ModelEvent| {
//!         if let ModelEvent::StageChanged { path, to, .. } = event {
//!             println!("{path} -> {to}");
//!         }
//!     })
//!     .unwrap();
//!
//! assert_eq!(events.observer_count::<OnStageChanged>(), 1);
//! ```

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use variadics_please::all_tuples;

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::path::ModelPath;
use crate::rule::{RuleId, Trigger};
use crate::stage::Stage;

// ─────────────────────────────────────────────────────────────────────────────
// ModelEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Something observable that happened inside the registry.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// An entity was registered.
    EntityRegistered {
        /// The new entity.
        entity: EntityId,
        /// Its path.
        path: ModelPath,
        /// Its parent, if any.
        parent: Option<EntityId>,
    },

    /// A component or tag was attached.
    ComponentAdded {
        /// The entity.
        entity: EntityId,
        /// Its path.
        path: ModelPath,
        /// The attached component type.
        component: ComponentId,
        /// Registry-wide age stamp of the addition.
        age: u64,
    },

    /// An entity entered a new stage.
    StageChanged {
        /// The entity.
        entity: EntityId,
        /// Its path.
        path: ModelPath,
        /// The stage it left.
        from: Stage,
        /// The stage it entered.
        to: Stage,
    },

    /// A rule action ran.
    RuleFired {
        /// The rule.
        rule: RuleId,
        /// The rule's name.
        rule_name: Arc<str>,
        /// The entity the rule ran against.
        entity: EntityId,
        /// Its path.
        path: ModelPath,
        /// What caused the evaluation.
        trigger: Trigger,
    },

    /// A projection factory ran.
    ProjectionResolved {
        /// The entity.
        entity: EntityId,
        /// Its path.
        path: ModelPath,
        /// Short name of the projected type.
        projection: &'static str,
    },
}

impl ModelEvent {
    /// Returns the kind observers subscribe to for this event.
    #[must_use]
    pub fn kind(&self) -> EventKindId {
        match self {
            ModelEvent::EntityRegistered { .. } => EventKindId::of::<OnEntityRegistered>(),
            ModelEvent::ComponentAdded { .. } => EventKindId::of::<OnComponentAdded>(),
            ModelEvent::StageChanged { .. } => EventKindId::of::<OnStageChanged>(),
            ModelEvent::RuleFired { .. } => EventKindId::of::<OnRuleFired>(),
            ModelEvent::ProjectionResolved { .. } => EventKindId::of::<OnProjectionResolved>(),
        }
    }

    /// Returns the entity the event concerns.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        match self {
            ModelEvent::EntityRegistered { entity, .. }
            | ModelEvent::ComponentAdded { entity, .. }
            | ModelEvent::StageChanged { entity, .. }
            | ModelEvent::RuleFired { entity, .. }
            | ModelEvent::ProjectionResolved { entity, .. } => *entity,
        }
    }

    /// Returns the path of the entity the event concerns.
    #[must_use]
    pub fn path(&self) -> &ModelPath {
        match self {
            ModelEvent::EntityRegistered { path, .. }
            | ModelEvent::ComponentAdded { path, .. }
            | ModelEvent::StageChanged { path, .. }
            | ModelEvent::RuleFired { path, .. }
            | ModelEvent::ProjectionResolved { path, .. } => path,
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelEvent::EntityRegistered { path, .. } => write!(f, "registered {path}"),
            ModelEvent::ComponentAdded {
                path, component, ..
            } => write!(f, "{path} += {component}"),
            ModelEvent::StageChanged { path, from, to, .. } => {
                write!(f, "{path}: {from} -> {to}")
            }
            ModelEvent::RuleFired {
                rule_name,
                path,
                trigger,
                ..
            } => write!(f, "rule '{rule_name}' fired on {path} ({trigger})"),
            ModelEvent::ProjectionResolved {
                path, projection, ..
            } => write!(f, "resolved {projection} of {path}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier for an event kind, derived from a marker type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKindId {
    type_id: TypeId,
    type_name: &'static str,
}

impl EventKindId {
    /// Creates an `EventKindId` for the given marker type.
    #[must_use]
    pub fn of<K: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<K>(),
            type_name: core::any::type_name::<K>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Marker trait for event kinds.
pub trait EventKind: 'static {}

/// Fired for [`ModelEvent::EntityRegistered`].
pub struct OnEntityRegistered;
impl EventKind for OnEntityRegistered {}

/// Fired for [`ModelEvent::ComponentAdded`].
pub struct OnComponentAdded;
impl EventKind for OnComponentAdded {}

/// Fired for [`ModelEvent::StageChanged`].
pub struct OnStageChanged;
impl EventKind for OnStageChanged {}

/// Fired for [`ModelEvent::RuleFired`].
pub struct OnRuleFired;
impl EventKind for OnRuleFired {}

/// Fired for [`ModelEvent::ProjectionResolved`].
pub struct OnProjectionResolved;
impl EventKind for OnProjectionResolved {}

/// Every event kind.
pub type AllEvents = (
    OnEntityRegistered,
    OnComponentAdded,
    OnStageChanged,
    OnRuleFired,
    OnProjectionResolved,
);

/// Types that can be converted into a list of event kinds.
///
/// Implemented for single kinds and tuples of kinds.
pub trait IntoEventKinds {
    /// Returns the kind ids for this type.
    fn event_kinds() -> Vec<EventKindId>;
}

impl<K: EventKind> IntoEventKinds for K {
    fn event_kinds() -> Vec<EventKindId> {
        vec![EventKindId::of::<K>()]
    }
}

macro_rules! impl_into_event_kinds_for_tuple {
    ($($K:ident),*) => {
        impl<$($K: EventKind),*> IntoEventKinds for ($($K,)*) {
            fn event_kinds() -> Vec<EventKindId> {
                vec![$(EventKindId::of::<$K>()),*]
            }
        }
    };
}

all_tuples!(impl_into_event_kinds_for_tuple, 2, 8, K);

// ─────────────────────────────────────────────────────────────────────────────
// EventBus
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while subscribing an observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    /// An observer with this name already exists for the kind.
    #[error("observer '{name}' already subscribed to '{}'", .kind.type_name())]
    DuplicateName {
        /// The kind where the duplicate was found.
        kind: EventKindId,
        /// The duplicate observer name.
        name: String,
    },
}

type Observer = Arc<dyn Fn(&ModelEvent) + Send + Sync>;

struct ObserverEntry {
    name: String,
    observer: Observer,
}

/// Registry of event observers, keyed by event kind.
///
/// Observers run synchronously in subscription order.
#[derive(Default)]
pub struct EventBus {
    observers: HashMap<EventKindId, Vec<ObserverEntry>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    /// Subscribes an observer to one or more event kinds.
    ///
    /// The observer is stored under `name` for every kind.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::DuplicateName`] if the name is already taken
    /// for one of the kinds. Nothing is subscribed in that case.
    pub fn subscribe<K, F>(
        &mut self,
        name: impl Into<String>,
        observer: F,
    ) -> Result<&mut Self, SubscribeError>
    where
        K: IntoEventKinds,
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        let kinds = K::event_kinds();
        let name = name.into();

        let taken = kinds.iter().find(|kind| {
            self.observers
                .get(*kind)
                .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
        });
        if let Some(kind) = taken {
            return Err(SubscribeError::DuplicateName { kind: *kind, name });
        }

        let observer: Observer = Arc::new(observer);
        for kind in kinds {
            self.observers.entry(kind).or_default().push(ObserverEntry {
                name: name.clone(),
                observer: Arc::clone(&observer),
            });
        }

        Ok(self)
    }

    /// Delivers `event` to every observer of its kind.
    pub fn publish(&self, event: &ModelEvent) {
        if let Some(entries) = self.observers.get(&event.kind()) {
            for entry in entries {
                (entry.observer)(event);
            }
        }
    }

    /// Returns the number of observers subscribed to kind `K`.
    #[must_use]
    pub fn observer_count<K: EventKind>(&self) -> usize {
        self.observers
            .get(&EventKindId::of::<K>())
            .map_or(0, Vec::len)
    }

    /// Checks if an observer with the given name is subscribed to kind `K`.
    #[must_use]
    pub fn contains_observer<K: EventKind>(&self, name: &str) -> bool {
        self.observers
            .get(&EventKindId::of::<K>())
            .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
    }

    /// Returns `true` if nobody observes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.observers.iter().map(|(kind, entries)| {
                (
                    kind.type_name(),
                    entries.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
                )
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn stage_changed() -> ModelEvent {
        ModelEvent::StageChanged {
            entity: EntityId::new(0),
            path: ModelPath::root("app").unwrap(),
            from: Stage::Registered,
            to: Stage::Discovered,
        }
    }

    #[test]
    fn observers_only_see_their_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let log = Arc::clone(&seen);
        bus.subscribe::<OnStageChanged, _>("stages", move |event: &ModelEvent| {
            log.lock().unwrap().push(event.to_string());
        })
        .unwrap();
        bus.subscribe::<OnEntityRegistered, _>("registrations", |_: &ModelEvent| {
            panic!("must not be called for stage changes");
        })
        .unwrap();

        bus.publish(&stage_changed());

        assert_eq!(*seen.lock().unwrap(), vec!["app: registered -> discovered"]);
    }

    #[test]
    fn observers_run_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&seen);
            bus.subscribe::<OnStageChanged, _>(name, move |_: &ModelEvent| {
                log.lock().unwrap().push(name);
            })
            .unwrap();
        }

        bus.publish(&stage_changed());
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_names_are_rejected_per_kind() {
        let mut bus = EventBus::new();
        bus.subscribe::<OnStageChanged, _>("audit", |_: &ModelEvent| {})
            .unwrap();

        let err = bus
            .subscribe::<OnStageChanged, _>("audit", |_: &ModelEvent| {})
            .unwrap_err();
        assert!(matches!(err, SubscribeError::DuplicateName { ref name, .. } if name == "audit"));

        bus.subscribe::<OnRuleFired, _>("audit", |_: &ModelEvent| {})
            .unwrap();
        assert_eq!(bus.observer_count::<OnStageChanged>(), 1);
        assert!(bus.contains_observer::<OnRuleFired>("audit"));
    }

    #[test]
    fn tuple_subscription_keeps_the_name_for_every_kind() {
        let mut bus = EventBus::new();
        bus.subscribe::<AllEvents, _>("all", |_: &ModelEvent| {})
            .unwrap();

        assert_eq!(bus.observer_count::<OnProjectionResolved>(), 1);
        assert!(bus.contains_observer::<OnStageChanged>("all"));
        assert!(bus.contains_observer::<OnRuleFired>("all"));
    }

    #[test]
    fn tuple_subscription_is_all_or_nothing() {
        let mut bus = EventBus::new();
        bus.subscribe::<OnRuleFired, _>("audit", |_: &ModelEvent| {})
            .unwrap();

        let err = bus
            .subscribe::<(OnStageChanged, OnRuleFired), _>("audit", |_: &ModelEvent| {})
            .unwrap_err();
        assert!(matches!(err, SubscribeError::DuplicateName { ref name, .. } if name == "audit"));
        assert!(!bus.contains_observer::<OnStageChanged>("audit"));
        assert_eq!(bus.observer_count::<OnRuleFired>(), 1);
    }
}
