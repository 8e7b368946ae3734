//! Serializable tree snapshots.
//!
//! A [`Snapshot`] records everything needed to rebuild a tree: declared
//! types, values, attributes, aliases and whether the tree was frozen. It
//! serializes with serde, so a tree can be persisted and restored elsewhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::{Attributes, SchemaNode};
use crate::types::Type;
use crate::Value;

/// Recorded state of a whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub frozen: bool,
    pub root: NodeSnapshot,
}

/// Recorded state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSnapshot {
    Leaf {
        #[serde(rename = "type")]
        ty: Type,
        value: Value,
        #[serde(default)]
        attributes: Attributes,
    },
    Container {
        #[serde(default)]
        attributes: Attributes,
        #[serde(default)]
        entries: BTreeMap<String, NodeSnapshot>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        aliases: BTreeMap<String, String>,
    },
}

impl NodeSnapshot {
    fn capture(node: &SchemaNode) -> Result<Self> {
        let attributes = node.attributes().clone();
        if let Some(ty) = node.declared_type() {
            return Ok(NodeSnapshot::Leaf {
                ty: ty.clone(),
                value: node.value_of_subtree(),
                attributes,
            });
        }
        let mut entries = BTreeMap::new();
        for name in node.entry_names() {
            entries.insert(name.to_string(), Self::capture(node.get_node(name)?)?);
        }
        let aliases = node
            .aliases()
            .into_iter()
            .map(|(name, target)| (name.to_string(), target.to_string()))
            .collect();
        Ok(NodeSnapshot::Container {
            attributes,
            entries,
            aliases,
        })
    }

    fn rebuild(&self) -> Result<SchemaNode> {
        match self {
            NodeSnapshot::Leaf {
                ty,
                value,
                attributes,
            } => SchemaNode::leaf(Some(value.clone()), Some(ty.clone()), attributes.clone()),
            NodeSnapshot::Container {
                attributes,
                entries,
                aliases,
            } => {
                let mut node = SchemaNode::container_with(attributes.clone());
                for (name, entry) in entries {
                    node.insert_entry(name, entry.rebuild()?)?;
                }
                for (name, target) in aliases {
                    node.insert_alias(name, target)?;
                }
                Ok(node)
            }
        }
    }
}

impl Snapshot {
    /// Rebuilds the tree, freezing it again if it was frozen.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot was edited into an invalid tree, for example
    /// a value that does not fit its recorded type.
    pub fn restore(&self) -> Result<SchemaNode> {
        let mut node = self.root.rebuild()?;
        if self.frozen {
            node.freeze()?;
        }
        Ok(node)
    }
}

impl SchemaNode {
    /// Captures the tree rooted at this node.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_tree_core::{SchemaNode, Snapshot};
    /// use serde_json::json;
    ///
    /// let mut cfg = SchemaNode::from_primitive(json!({"a": 1, "b": {"c": [1.5]}}).into(), Default::default())?;
    /// cfg.freeze()?;
    ///
    /// let text = serde_json::to_string(&cfg.snapshot()?).unwrap();
    /// let restored = serde_json::from_str::<Snapshot>(&text).unwrap().restore()?;
    /// assert!(restored.is_frozen());
    /// assert_eq!(restored.value_of_subtree(), cfg.value_of_subtree());
    /// # Ok::<(), config_tree_core::SchemaError>(())
    /// ```
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            frozen: self.is_frozen(),
            root: NodeSnapshot::capture(self)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Template;

    fn sample() -> SchemaNode {
        Template::new()
            .field_with("threshold", Value::Null, ["float?", "env:THRESHOLD"])
            .declare("tags", ["[str]", "w"])
            .nested("extra", Template::new().writable())
            .alias("limit", "threshold")
            .build()
            .unwrap()
    }

    #[test]
    fn test_snapshot_serializes_types_and_attributes() {
        let snapshot = sample().snapshot().unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            json!({
                "frozen": false,
                "root": {
                    "kind": "container",
                    "attributes": {"writable": false},
                    "entries": {
                        "extra": {"kind": "container", "attributes": {"writable": true}, "entries": {}},
                        "tags": {"kind": "leaf", "type": "[str]", "value": [], "attributes": {"writable": true}},
                        "threshold": {
                            "kind": "leaf",
                            "type": "float?",
                            "value": null,
                            "attributes": {"writable": false, "env": "THRESHOLD"}
                        }
                    },
                    "aliases": {"limit": "threshold"}
                }
            })
        );
    }

    #[test]
    fn test_restore_preserves_behavior() {
        let mut original = sample();
        original.freeze().unwrap();
        let mut restored = original.snapshot().unwrap().restore().unwrap();

        assert!(restored.is_frozen());
        assert_eq!(restored, original);
        assert_eq!(restored.to_string(), original.to_string());
        assert!(restored.set("threshold", 1.0).unwrap_err().is_read_only());
        restored.get_list_mut("tags").unwrap().push("x").unwrap();
        restored.merge_from_mapping(json!({"extra": {"new": 1}})).unwrap();
        assert!(restored.merge_from_env_with(|_| Some("2.5".to_string())).is_err());
    }

    #[test]
    fn test_restore_rejects_invalid_snapshot() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "frozen": false,
            "root": {"kind": "leaf", "type": "int", "value": "nope"}
        }))
        .unwrap();
        assert!(snapshot.restore().is_err());

        let unknown_type = serde_json::from_value::<Snapshot>(json!({
            "frozen": false,
            "root": {"kind": "leaf", "type": "dict", "value": 1}
        }));
        assert!(unknown_type.is_err());
    }
}
