//! HAL Response Normalization
//!
//! The platform's APIs answer in `application/hal+json`: a root object with
//! an optional `_type` discriminant, an `_embedded` map of relation name to
//! node or array of nodes, and `_links` carrying `{href}` relations. This
//! module walks that tree generically and turns every node with a registered
//! type into a batched save action, one per entity type.
//!
//! Parsing is a pure function of the response tree and the registry: the same
//! tree always yields the same actions, and nodes with unregistered type tags
//! are recursed into without emitting anything.

use crate::store::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A `_links` relation value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HalHref {
    #[serde(default)]
    pub href: String,
}

impl HalHref {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
        }
    }
}

/// Extract a foreign-key id from a link's trailing URL segment.
/// e.g. `https://api.test/accounts/42` -> `"42"`
pub fn extract_id_from_link(link: Option<&HalHref>) -> String {
    let Some(link) = link else {
        return String::new();
    };
    if link.href.is_empty() {
        return String::new();
    }
    link.href.rsplit('/').next().unwrap_or_default().to_string()
}

/// Extract the resource collection name from a link, the segment before the
/// id. e.g. `https://api.test/accounts/42` -> `"accounts"`
pub fn extract_resource_name_from_link(link: Option<&HalHref>) -> String {
    let Some(link) = link else {
        return String::new();
    };
    let mut segments = link.href.rsplit('/');
    segments.next();
    segments.next().unwrap_or_default().to_string()
}

/// An entity in normalized form: its identity plus the value stored in the
/// entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntity {
    pub id: String,
    pub value: Value,
}

impl NormalizedEntity {
    /// Serialize a typed entity into its stored form. Returns `None` when the
    /// value cannot be represented as JSON, which the parser treats as a skip.
    pub fn from_serialize<T: Serialize>(id: &str, entity: &T) -> Option<Self> {
        let value = serde_json::to_value(entity).ok()?;
        Some(Self {
            id: id.to_string(),
            value,
        })
    }
}

type DeserializeFn = Box<dyn Fn(&Value) -> Option<NormalizedEntity> + Send + Sync>;
type SaveFn = Box<dyn Fn(BTreeMap<String, Value>) -> Action + Send + Sync>;

/// Registered mapping from a server-side `_type` tag to deserialization and
/// save behavior.
pub struct EntityDescriptor {
    type_tag: String,
    deserialize: DeserializeFn,
    save: SaveFn,
}

impl EntityDescriptor {
    /// Descriptor whose save action upserts into `table`.
    pub fn new<F>(type_tag: &str, table: &str, deserialize: F) -> Self
    where
        F: Fn(&Value) -> Option<NormalizedEntity> + Send + Sync + 'static,
    {
        let table = table.to_string();
        Self {
            type_tag: type_tag.to_string(),
            deserialize: Box::new(deserialize),
            save: Box::new(move |entities| Action::SaveEntities {
                table: table.clone(),
                entities,
            }),
        }
    }

    /// Descriptor with a custom save action.
    pub fn with_save<F, S>(type_tag: &str, deserialize: F, save: S) -> Self
    where
        F: Fn(&Value) -> Option<NormalizedEntity> + Send + Sync + 'static,
        S: Fn(BTreeMap<String, Value>) -> Action + Send + Sync + 'static,
    {
        Self {
            type_tag: type_tag.to_string(),
            deserialize: Box::new(deserialize),
            save: Box::new(save),
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }
}

/// Registry of entity descriptors, iterated in insertion order so the emitted
/// save actions are stable across runs. Built once at startup and consumed
/// read-only by the parser.
#[derive(Default)]
pub struct EntityRegistry {
    descriptors: Vec<EntityDescriptor>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Type tags are unique across the registry;
    /// registering the same tag twice is a startup programming error.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> &mut Self {
        assert!(
            self.get(descriptor.type_tag()).is_none(),
            "duplicate entity type tag: {}",
            descriptor.type_tag()
        );
        self.descriptors.push(descriptor);
        self
    }

    pub fn register_all(&mut self, descriptors: Vec<EntityDescriptor>) -> &mut Self {
        for descriptor in descriptors {
            self.register(descriptor);
        }
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<&EntityDescriptor> {
        self.descriptors.iter().find(|d| d.type_tag == type_tag)
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Walk a response tree and produce one save action per entity type found,
/// in registry insertion order. Entities are keyed by id, so duplicates
/// within a response collapse to the last occurrence.
pub fn parse_embedded(data: &Value, registry: &EntityRegistry) -> Vec<Action> {
    let mut buckets: HashMap<String, Vec<NormalizedEntity>> = HashMap::new();
    parse_node(data, registry, &mut buckets);

    let mut actions = Vec::new();
    for descriptor in &registry.descriptors {
        let Some(entities) = buckets.remove(descriptor.type_tag()) else {
            continue;
        };
        if entities.is_empty() {
            continue;
        }
        let keyed: BTreeMap<String, Value> =
            entities.into_iter().map(|e| (e.id, e.value)).collect();
        actions.push((descriptor.save)(keyed));
    }
    actions
}

fn parse_node(
    node: &Value,
    registry: &EntityRegistry,
    buckets: &mut HashMap<String, Vec<NormalizedEntity>>,
) {
    let Some(object) = node.as_object() else {
        return;
    };

    if let Some(tag) = object.get("_type").and_then(Value::as_str) {
        if let Some(descriptor) = registry.get(tag) {
            if let Some(entity) = (descriptor.deserialize)(node) {
                buckets.entry(tag.to_string()).or_default().push(entity);
            }
        }
    }

    let Some(embedded) = object.get("_embedded").and_then(Value::as_object) else {
        return;
    };
    for relation in embedded.values() {
        match relation {
            Value::Array(nodes) => {
                for child in nodes {
                    parse_node(child, registry, buckets);
                }
            }
            child => parse_node(child, registry, buckets),
        }
    }
}
