//! Entity queries and event observers.

use std::sync::{Arc, Mutex};

use arbor_model::event::SubscribeError;
use arbor_model::prelude::*;

#[derive(Tag)]
struct HasCSources;

#[derive(Tag)]
struct Test;

fn path(text: &str) -> ModelPath {
    text.parse().unwrap()
}

fn paths(registry: &ModelRegistry, ids: &[EntityId]) -> Vec<String> {
    ids.iter()
        .map(|id| registry.entity(*id).unwrap().path().to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn descendants_are_visible_immediately() {
    let mut registry = ModelRegistry::new();
    registry.register_root("app").unwrap();
    let spec = EntitySpec::descendants_of(path("app"));
    assert!(registry.query(&spec).is_empty());

    let source = registry.register_child(&path("app"), "source").unwrap();
    let headers = registry.register_child(&path("app"), "headers").unwrap();
    assert_eq!(registry.query(&spec), vec![source, headers]);
    assert_eq!(registry.query_sorted(&spec), vec![headers, source]);
}

#[test]
fn subtree_queries_do_not_leak_into_siblings() {
    let mut registry = ModelRegistry::new();
    registry.register_root("app").unwrap();
    registry.register_root("app2").unwrap();
    registry.register_child(&path("app"), "main").unwrap();
    registry.register_child(&path("app2"), "main").unwrap();
    registry.register_child(&path("app.main"), "c").unwrap();

    let found = registry.query_sorted(&EntitySpec::descendants_of(path("app")));
    assert_eq!(paths(&registry, &found), vec!["app.main", "app.main.c"]);

    let owned = registry.query(&EntitySpec::owned_by(path("app")));
    assert_eq!(paths(&registry, &owned), vec!["app.main"]);
}

#[test]
fn specs_combine() {
    let mut registry = ModelRegistry::new();
    let app = registry
        .register(EntityRegistration::new("app").with_tag(HasCSources))
        .unwrap();
    let tests = registry
        .register(
            EntityRegistration::new("tests")
                .with_tag(HasCSources)
                .with_tag(Test),
        )
        .unwrap();
    let docs = registry.register_root("docs").unwrap();
    registry.advance(app, Stage::Created).unwrap();

    let production = EntitySpec::with_tag::<HasCSources>().and(!EntitySpec::with_tag::<Test>());
    assert_eq!(registry.query(&production), vec![app]);

    let either = EntitySpec::at_path(path("docs")).or(EntitySpec::with_tag::<Test>());
    assert_eq!(registry.query(&either), vec![tests, docs]);

    let advanced = EntitySpec::stage_at_least(Stage::Discovered);
    assert_eq!(registry.query(&advanced), vec![app]);

    let custom = EntitySpec::matching("short names", |entity| entity.path().name().len() <= 4);
    assert_eq!(registry.query(&custom), vec![app, docs]);
    assert_eq!(custom.to_string(), "short names");
}

// ─────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn observers_see_events_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let mut registry = ModelRegistry::new();
    registry
        .events_mut()
        .subscribe::<AllEvents, _>("log", move |event| {
            sink.lock().unwrap().push(event.to_string());
        })
        .unwrap();

    let app = registry
        .register(EntityRegistration::new("app").with_tag(HasCSources))
        .unwrap();
    registry.advance(app, Stage::Discovered).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    assert!(log[0].contains("registered"), "{}", log[0]);
    assert!(log[1].contains("HasCSources"), "{}", log[1]);
    assert!(log[2].contains("discovered"), "{}", log[2]);
}

#[test]
fn events_carry_entity_and_path() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut registry = ModelRegistry::new();
    registry
        .events_mut()
        .subscribe::<(OnEntityRegistered, OnComponentAdded), _>("pairs", move |event| {
            sink.lock()
                .unwrap()
                .push((event.entity(), event.path().to_string()));
        })
        .unwrap();

    let app = registry.register_root("app").unwrap();
    registry.add_tag(app, HasCSources).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(app, "app".to_string()), (app, "app".to_string())]
    );
}

#[test]
fn duplicate_observer_names_are_rejected() {
    let mut registry = ModelRegistry::new();
    let events = registry.events_mut();
    events
        .subscribe::<OnStageChanged, _>("trace", |_| {})
        .unwrap();
    let error = events
        .subscribe::<OnStageChanged, _>("trace", |_| {})
        .unwrap_err();

    assert!(matches!(error, SubscribeError::DuplicateName { ref name, .. } if name == "trace"));
    assert_eq!(events.observer_count::<OnStageChanged>(), 1);

    events
        .subscribe::<OnRuleFired, _>("trace", |_| {})
        .unwrap();
    assert!(events.contains_observer::<OnRuleFired>("trace"));
}

#[test]
fn subscribe_errors_convert_into_model_errors() {
    fn install(registry: &mut ModelRegistry) -> ModelResult<()> {
        registry
            .events_mut()
            .subscribe::<OnStageChanged, _>("once", |_| {})?;
        Ok(())
    }

    let mut registry = ModelRegistry::new();
    install(&mut registry).unwrap();
    assert!(matches!(
        install(&mut registry),
        Err(ModelError::Subscribe(SubscribeError::DuplicateName { .. }))
    ));
}
