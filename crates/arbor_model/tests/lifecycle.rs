//! Registration, hierarchy and lifecycle behavior of the registry.

use std::sync::{Arc, Mutex};

use arbor_model::error::TransitionBlocked;
use arbor_model::prelude::*;

#[derive(Component)]
struct BaseName(String);

#[derive(Component)]
#[component(idempotent)]
struct Configurable;

#[derive(Tag)]
struct HasCSources;

fn path(text: &str) -> ModelPath {
    text.parse().unwrap()
}

// ─────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_path_leaves_first_registration_intact() {
    let mut registry = ModelRegistry::new();
    let first = registry
        .register(EntityRegistration::new("app").with_component(BaseName("first".into())))
        .unwrap();

    let error = registry
        .register(EntityRegistration::new("app").with_component(BaseName("second".into())))
        .unwrap_err();

    assert!(matches!(error, ModelError::DuplicatePath { ref path } if path.to_string() == "app"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(&path("app")).unwrap(), first);
    assert_eq!(registry.component::<BaseName>(first).unwrap().0, "first");
}

#[test]
fn unknown_parent_is_not_found() {
    let mut registry = ModelRegistry::new();
    let error = registry
        .register_child(&path("missing"), "lib")
        .unwrap_err();
    assert!(matches!(error, ModelError::NotFound { .. }));
    assert!(registry.is_empty());
}

#[test]
fn invalid_names_are_rejected() {
    let mut registry = ModelRegistry::new();
    assert!(matches!(
        registry.register_root("has.dot"),
        Err(ModelError::InvalidPath(_))
    ));
    assert!(matches!(
        registry.register_root(""),
        Err(ModelError::InvalidPath(_))
    ));
}

#[test]
fn repeated_component_in_one_registration_fails() {
    let mut registry = ModelRegistry::new();
    let error = registry
        .register(
            EntityRegistration::new("app")
                .with_component(BaseName("a".into()))
                .with_component(BaseName("b".into())),
        )
        .unwrap_err();
    assert!(matches!(error, ModelError::DuplicateComponent { .. }));
    assert!(registry.find(&path("app")).is_none());
}

#[test]
fn children_keep_registration_order() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    let zeta = registry.register_child(&path("app"), "zeta").unwrap();
    let alpha = registry.register_child(&path("app"), "alpha").unwrap();

    assert_eq!(registry.children(app).unwrap(), &[zeta, alpha]);
    assert_eq!(registry.entity(alpha).unwrap().parent(), Some(app));
    assert_eq!(
        registry.query_sorted(&EntitySpec::owned_by(path("app"))),
        vec![alpha, zeta]
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn data_components_cannot_be_added_twice() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    registry.add_component(app, BaseName("app".into())).unwrap();

    let error = registry
        .add_component(app, BaseName("other".into()))
        .unwrap_err();
    assert!(matches!(error, ModelError::DuplicateComponent { .. }));
    assert_eq!(registry.component::<BaseName>(app).unwrap().0, "app");
}

#[test]
fn tags_and_idempotent_components_can_be_re_added() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();

    registry.add_tag(app, HasCSources).unwrap();
    registry.add_tag(app, HasCSources).unwrap();
    registry.add_component(app, Configurable).unwrap();
    registry.add_component(app, Configurable).unwrap();

    assert_eq!(registry.entity(app).unwrap().components().len(), 2);
}

#[test]
fn component_ages_increase() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    registry.add_tag(app, HasCSources).unwrap();
    registry.add_component(app, BaseName("app".into())).unwrap();

    let components = registry.entity(app).unwrap().components();
    let tag_age = components.entry(ComponentId::of::<HasCSources>()).unwrap().age();
    let name_age = components.entry(ComponentId::of::<BaseName>()).unwrap().age();
    assert!(tag_age < name_age);
}

#[test]
fn missing_component_is_reported() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    assert!(matches!(
        registry.component::<BaseName>(app),
        Err(ModelError::MissingComponent { .. })
    ));
    assert!(registry.find_component::<BaseName>(app).is_none());
}

// ─────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn advance_is_a_no_op_when_already_there() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();

    assert_eq!(registry.advance(app, Stage::Created).unwrap(), Stage::Created);
    assert_eq!(registry.advance(app, Stage::Discovered).unwrap(), Stage::Created);
    assert_eq!(registry.stage(app).unwrap(), Stage::Created);
}

#[test]
fn finalized_entities_reject_mutation() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    registry.finalize(app).unwrap();

    assert!(matches!(
        registry.add_tag(app, HasCSources),
        Err(ModelError::Finalized { .. })
    ));
    assert!(matches!(
        registry.add_component(app, BaseName("late".into())),
        Err(ModelError::Finalized { .. })
    ));
    assert!(matches!(
        registry.register_child(&path("app"), "late"),
        Err(ModelError::Finalized { .. })
    ));
    assert!(matches!(
        registry.bind_projection(app, |_| 1_u8),
        Err(ModelError::Finalized { .. })
    ));
}

#[test]
fn failing_stage_rule_marks_entity_failed() {
    let mut registry = ModelRegistry::new();
    registry
        .add_rule(
            Rule::builder("broken")
                .at_stage(Stage::Created)
                .run(|_| Err("no toolchain".into())),
        )
        .unwrap();
    let app = registry.register_root("app").unwrap();

    let error = registry.advance(app, Stage::Realized).unwrap_err();
    let ModelError::RuleExecution { rule, path, source } = &error else {
        panic!("expected a rule execution error, got {error:?}");
    };
    assert_eq!(rule, "broken");
    assert_eq!(path.to_string(), "app");
    assert_eq!(source.to_string(), "no toolchain");

    let lifecycle = *registry.entity(app).unwrap().lifecycle();
    assert_eq!(lifecycle.stage(), Stage::Discovered);
    assert_eq!(lifecycle.failed(), Some(Stage::Created));

    let retry = registry.advance(app, Stage::Realized).unwrap_err();
    assert!(matches!(
        retry,
        ModelError::InvalidTransition {
            reason: TransitionBlocked::PreviouslyFailed(Stage::Created),
            ..
        }
    ));
}

#[test]
fn failed_entity_stays_at_last_completed_stage() {
    let mut registry = ModelRegistry::new();
    registry
        .add_rule(
            Rule::builder("boom")
                .at_stage(Stage::Created)
                .run(|_| Err("boom".into())),
        )
        .unwrap();
    let app = registry.register_root("app").unwrap();
    registry.advance(app, Stage::Discovered).unwrap();

    assert!(registry.advance(app, Stage::Created).is_err());
    assert_eq!(registry.stage(app).unwrap(), Stage::Discovered);
    assert!(
        registry
            .query(&EntitySpec::stage_at_least(Stage::Created))
            .is_empty()
    );

    let error = registry.advance_all(Stage::Created).unwrap_err();
    assert!(matches!(
        error,
        ModelError::InvalidTransition {
            reason: TransitionBlocked::PreviouslyFailed(Stage::Created),
            ..
        }
    ));
    assert!(registry.advance_all(Stage::Discovered).is_ok());
}

#[test]
fn stage_rule_cannot_advance_its_own_entity_further() {
    let mut registry = ModelRegistry::new();
    registry
        .add_rule(
            Rule::builder("jump-ahead")
                .at_stage(Stage::Discovered)
                .run(|ctx| {
                    let entity = ctx.entity();
                    ctx.advance(entity, Stage::Realized)?;
                    Ok(())
                }),
        )
        .unwrap();
    let app = registry.register_root("app").unwrap();

    let error = registry.advance(app, Stage::Created).unwrap_err();
    let ModelError::RuleExecution { source, .. } = error else {
        panic!("expected the reentrant advance to fail the rule");
    };
    let inner = source.downcast_ref::<ModelError>().unwrap();
    assert!(matches!(
        inner,
        ModelError::InvalidTransition {
            reason: TransitionBlocked::Reentrant,
            ..
        }
    ));
}

#[test]
fn stage_rule_may_advance_other_entities() {
    let mut registry = ModelRegistry::new();
    let app = registry.register_root("app").unwrap();
    let tool = registry.register_root("tool").unwrap();

    registry
        .add_rule(
            Rule::builder("needs-tool")
                .at_stage(Stage::Created)
                .matching(EntitySpec::at_path(path("app")))
                .run(move |ctx| {
                    ctx.advance(tool, Stage::Realized)?;
                    Ok(())
                }),
        )
        .unwrap();

    registry.advance(app, Stage::Created).unwrap();
    assert_eq!(registry.stage(tool).unwrap(), Stage::Realized);
}

#[test]
fn advance_all_walks_in_path_order_and_includes_new_entities() {
    let mut registry = ModelRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&order);
    registry
        .events_mut()
        .subscribe::<OnStageChanged, _>("order", move |event| {
            if let ModelEvent::StageChanged {
                path,
                to: Stage::Discovered,
                ..
            } = event
            {
                sink.lock().unwrap().push(path.to_string());
            }
        })
        .unwrap();
    registry
        .add_rule(
            Rule::builder("spawn")
                .requires::<HasCSources>()
                .at_stage(Stage::Discovered)
                .run(|ctx| {
                    ctx.register_child("spawned")?;
                    Ok(())
                }),
        )
        .unwrap();

    registry.register_root("b").unwrap();
    registry
        .register(EntityRegistration::new("a").with_tag(HasCSources))
        .unwrap();

    registry.advance_all(Stage::Discovered).unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "a.spawned"]);
    assert!(
        registry
            .iter()
            .all(|entity| entity.stage() == Stage::Discovered)
    );
}
