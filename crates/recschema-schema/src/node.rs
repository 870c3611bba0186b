//! # Schema Document Nodes
//!
//! A dialect-neutral schema tree. References to record types stay as
//! [`TypeKey`]s until [`SchemaNode::render`] turns them into path strings
//! for one dialect, so a single tree can be emitted in every dialect
//! without walking the type graph again.

use recschema_core::TypeKey;
use serde_json::{Map, Value};

use crate::dialect::Dialect;

/// One node of a schema document.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Keyword map, in insertion order.
    Map(Vec<(String, SchemaNode)>),
    /// Ordered list.
    List(Vec<SchemaNode>),
    /// Literal JSON value.
    Scalar(Value),
    /// `{"$ref": <path of the definition>}`.
    Ref(TypeKey),
    /// Bare reference path string, as used in discriminator mappings.
    Path(TypeKey),
}

impl SchemaNode {
    /// An empty map.
    pub fn map() -> Self {
        Self::Map(Vec::new())
    }

    /// Wrap a literal value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Lift a plain JSON value into a node tree.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(object) => Self::Map(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::List(items.iter().map(Self::from_value).collect()),
            other => Self::Scalar(other.clone()),
        }
    }

    /// Set `key` on a map node, replacing an existing entry in place.
    /// Has no effect on other node kinds.
    pub fn insert(&mut self, key: impl Into<String>, node: SchemaNode) {
        if let Self::Map(entries) = self {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = node,
                None => entries.push((key, node)),
            }
        }
    }

    /// Entry `key` of a map node.
    pub fn get(&self, key: &str) -> Option<&SchemaNode> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Remove entry `key` from a map node.
    pub fn remove(&mut self, key: &str) -> Option<SchemaNode> {
        match self {
            Self::Map(entries) => {
                let index = entries.iter().position(|(k, _)| k == key)?;
                Some(entries.remove(index).1)
            }
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Every record key referenced below this node.
    pub fn references(&self, out: &mut Vec<TypeKey>) {
        match self {
            Self::Map(entries) => entries.iter().for_each(|(_, v)| v.references(out)),
            Self::List(items) => items.iter().for_each(|v| v.references(out)),
            Self::Ref(key) | Self::Path(key) => out.push(*key),
            Self::Scalar(_) => {}
        }
    }

    /// Emit the tree as JSON for `dialect`.
    pub fn render(&self, dialect: Dialect) -> Value {
        match self {
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.render(dialect)))
                    .collect::<Map<String, Value>>(),
            ),
            Self::List(items) => Value::Array(items.iter().map(|v| v.render(dialect)).collect()),
            Self::Scalar(value) => value.clone(),
            Self::Ref(key) => {
                let mut object = Map::new();
                object.insert("$ref".to_string(), Value::String(dialect.reference(key.name())));
                Value::Object(object)
            }
            Self::Path(key) => Value::String(dialect.reference(key.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Point;

    #[test]
    fn references_render_per_dialect() {
        let key = TypeKey::of::<Point>("Point");
        let mut node = SchemaNode::map();
        node.insert("type", SchemaNode::scalar("array"));
        node.insert("items", SchemaNode::Ref(key));
        assert_eq!(
            node.render(Dialect::Draft06),
            json!({"type": "array", "items": {"$ref": "#/definitions/Point"}})
        );
        assert_eq!(
            node.render(Dialect::OpenApi3),
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Point"}})
        );
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut node = SchemaNode::from_value(&json!({"a": 1, "b": 2}));
        node.insert("a", SchemaNode::scalar(3));
        let rendered = node.render(Dialect::Draft04);
        let keys: Vec<_> = rendered.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(rendered["a"], 3);
        assert_eq!(node.remove("b"), Some(SchemaNode::scalar(2)));
        assert!(node.get("b").is_none());
    }
}
