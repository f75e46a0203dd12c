//! Property-based tests using proptest
//!
//! These tests verify the HAL parser's contracts against randomized embedded
//! response trees: idempotence, silent skipping of unregistered type tags,
//! and id-keyed batching.

use halyard::hal::{parse_embedded, EntityDescriptor, EntityRegistry, NormalizedEntity};
use halyard::store::Action;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

const REGISTERED: &[(&str, &str)] = &[
    ("app", "apps"),
    ("database", "databases"),
    ("operation", "operations"),
];

fn registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    for (tag, table) in REGISTERED.iter().copied() {
        registry.register(EntityDescriptor::new(tag, table, |raw| {
            let id = raw.get("id")?.as_u64()?;
            NormalizedEntity::from_serialize(&id.to_string(), raw)
        }));
    }
    registry
}

/// Generate an arbitrary embedded-response tree. Type tags are drawn from
/// both registered and unregistered names, ids are sometimes absent, and
/// relations hold either a single node or a sequence.
fn arb_tree() -> impl Strategy<Value = Value> {
    let leaf = (
        prop::option::of(prop_oneof![
            Just("app"),
            Just("database"),
            Just("operation"),
            Just("widget"),
            Just("mystery"),
        ]),
        prop::option::of(0u64..1000),
    )
        .prop_map(|(tag, id)| {
            let mut object = Map::new();
            if let Some(tag) = tag {
                object.insert("_type".to_string(), json!(tag));
            }
            if let Some(id) = id {
                object.insert("id".to_string(), json!(id));
            }
            Value::Object(object)
        });

    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            prop::option::of(prop_oneof![Just("app"), Just("database"), Just("widget")]),
            prop::option::of(0u64..1000),
            prop::collection::btree_map(
                "[a-z]{1,8}",
                prop_oneof![
                    inner.clone(),
                    prop::collection::vec(inner, 0..3).prop_map(Value::Array),
                ],
                0..4,
            ),
        )
            .prop_map(|(tag, id, embedded)| {
                let mut object = Map::new();
                if let Some(tag) = tag {
                    object.insert("_type".to_string(), json!(tag));
                }
                if let Some(id) = id {
                    object.insert("id".to_string(), json!(id));
                }
                if !embedded.is_empty() {
                    object.insert(
                        "_embedded".to_string(),
                        Value::Object(embedded.into_iter().collect()),
                    );
                }
                Value::Object(object)
            })
    })
}

proptest! {
    /// Re-parsing an identical tree yields byte-identical save actions
    #[test]
    fn parse_is_idempotent(tree in arb_tree()) {
        let registry = registry();
        let first = parse_embedded(&tree, &registry);
        let second = parse_embedded(&tree, &registry);
        prop_assert_eq!(&first, &second);

        // identical down to serialized bytes, not just structural equality
        for (a, b) in first.iter().zip(second.iter()) {
            let (Action::SaveEntities { entities: ea, .. }, Action::SaveEntities { entities: eb, .. }) = (a, b) else {
                continue;
            };
            prop_assert_eq!(
                serde_json::to_vec(ea).unwrap(),
                serde_json::to_vec(eb).unwrap()
            );
        }
    }

    /// Only registered tables ever receive save actions
    #[test]
    fn only_registered_types_emit(tree in arb_tree()) {
        let actions = parse_embedded(&tree, &registry());
        for action in &actions {
            let Action::SaveEntities { table, entities } = action else {
                panic!("parser only emits save actions");
            };
            prop_assert!(REGISTERED.iter().any(|(_, t)| *t == table.as_str()));
            prop_assert!(!entities.is_empty());
        }
    }

    /// At most one action per entity type, regardless of entity count
    #[test]
    fn actions_are_batched_per_type(tree in arb_tree()) {
        let actions = parse_embedded(&tree, &registry());
        prop_assert!(actions.len() <= REGISTERED.len());

        let mut seen = Vec::new();
        for action in &actions {
            if let Action::SaveEntities { table, .. } = action {
                prop_assert!(!seen.contains(table));
                seen.push(table.clone());
            }
        }
    }

    /// Entities are keyed by their own id field
    #[test]
    fn entities_are_keyed_by_id(tree in arb_tree()) {
        let actions = parse_embedded(&tree, &registry());
        for action in &actions {
            if let Action::SaveEntities { entities, .. } = action {
                for (key, value) in entities {
                    let id = value.get("id").and_then(Value::as_u64);
                    prop_assert_eq!(id.map(|i| i.to_string()).as_deref(), Some(key.as_str()));
                }
            }
        }
    }

    /// A registry with nothing registered parses any tree to zero actions
    #[test]
    fn empty_registry_emits_nothing(tree in arb_tree()) {
        let registry = EntityRegistry::new();
        prop_assert!(parse_embedded(&tree, &registry).is_empty());
    }
}
