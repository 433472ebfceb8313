//! Property tests for path ordering and lifecycle monotonicity.

use std::sync::{Arc, Mutex};

use arbor_model::prelude::*;
use proptest::prelude::*;

/// Builds a random forest: entry `i` names the parent of entity `i + 1`
/// among the entities registered before it, or `None` for a root.
fn forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), 1..24).prop_map(
        |choices| {
            choices
                .into_iter()
                .enumerate()
                .map(|(i, choice)| choice.map(|index| index.index(i + 1)))
                .collect()
        },
    )
}

fn register_forest(registry: &mut ModelRegistry, parents: &[Option<usize>]) -> Vec<EntityId> {
    let mut ids = vec![registry.register_root("n0").unwrap()];
    for (i, parent) in parents.iter().enumerate() {
        let name = format!("n{}", i + 1);
        let registration = match parent {
            Some(parent) => EntityRegistration::new(name).parent_entity(ids[*parent]),
            None => EntityRegistration::new(name),
        };
        ids.push(registry.register(registration).unwrap());
    }
    ids
}

fn depth_first(registry: &ModelRegistry, id: EntityId, out: &mut Vec<String>) {
    out.push(registry.entity(id).unwrap().path().to_string());
    let mut children: Vec<EntityId> = registry.children(id).unwrap().to_vec();
    children.sort_by(|a, b| {
        let a = registry.entity(*a).unwrap().path().clone();
        let b = registry.entity(*b).unwrap().path().clone();
        a.name().cmp(b.name())
    });
    for child in children {
        depth_first(registry, child, out);
    }
}

proptest! {
    #[test]
    fn sorted_query_is_depth_first(parents in forest()) {
        let mut registry = ModelRegistry::new();
        register_forest(&mut registry, &parents);

        let mut roots: Vec<EntityId> = registry
            .iter()
            .filter(|entity| entity.parent().is_none())
            .map(Entity::id)
            .collect();
        roots.sort_by(|a, b| {
            let a = registry.entity(*a).unwrap().path().clone();
            let b = registry.entity(*b).unwrap().path().clone();
            a.name().cmp(b.name())
        });
        let mut expected = Vec::new();
        for root in roots {
            depth_first(&registry, root, &mut expected);
        }

        let sorted: Vec<String> = registry
            .query_sorted(&EntitySpec::all())
            .into_iter()
            .map(|id| registry.entity(id).unwrap().path().to_string())
            .collect();
        prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn stages_never_decrease_and_parents_lead(
        parents in forest(),
        steps in prop::collection::vec((any::<prop::sample::Index>(), 0usize..5), 1..32),
    ) {
        let mut registry = ModelRegistry::new();
        let ids = register_forest(&mut registry, &parents);

        let history = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&history);
        registry
            .events_mut()
            .subscribe::<OnStageChanged, _>("history", move |event| {
                if let ModelEvent::StageChanged { entity, from, to, .. } = event {
                    sink.lock().unwrap().push((*entity, *from, *to));
                }
            })
            .unwrap();

        let mut last_seen = vec![Stage::Registered; ids.len()];
        for (pick, stage) in steps {
            let entity = ids[pick.index(ids.len())];
            registry.advance(entity, Stage::ALL[stage]).unwrap();

            for (index, id) in ids.iter().enumerate() {
                let stage = registry.stage(*id).unwrap();
                prop_assert!(stage >= last_seen[index]);
                last_seen[index] = stage;

                if let Some(parent) = registry.entity(*id).unwrap().parent() {
                    prop_assert!(registry.stage(parent).unwrap() >= stage);
                }
            }
        }

        for (_, from, to) in history.lock().unwrap().iter() {
            prop_assert_eq!(from.next(), Some(*to));
        }
    }
}
