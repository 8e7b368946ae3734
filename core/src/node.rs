//! The schema tree.
//!
//! A [`SchemaNode`] is either a leaf holding one typed value or a container
//! holding named child nodes plus an alias table. Trees are assembled with
//! [`entry`](SchemaNode::entry) and [`alias`](SchemaNode::alias), mutated
//! freely, then [`freeze`](SchemaNode::freeze)d. After freezing only entries
//! whose [`Attributes`] mark them writable can change.
//!
//! # Example
//!
//! ```
//! use config_tree_core::{Attributes, SchemaNode, Type, Value};
//!
//! let mut cfg = SchemaNode::container()
//!     .entry("port", 8080)?
//!     .entry("hosts", SchemaNode::leaf(None, Some(Type::list(Type::Str)), Attributes::writable())?)?
//!     .alias("listen_port", "port")?;
//! cfg.freeze()?;
//!
//! assert_eq!(cfg.get("listen_port")?.to_value(), Value::Int(8080));
//! assert!(cfg.set("port", 9090).is_err());
//! cfg.set("hosts", vec!["a", "b"])?;
//! # Ok::<(), config_tree_core::SchemaError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alias;
use crate::error::{Result, SchemaError};
use crate::list::{HostToken, ListProxy};
use crate::types::{Type, cast, default_value, fits, infer};
use crate::Value;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex must compile")
});

/// Names of node operations, unavailable as entry names.
const RESERVED_NAMES: &[&str] = &[
    "alias",
    "attributes",
    "declared_type",
    "dotted_path",
    "dump",
    "entry",
    "freeze",
    "get",
    "get_list_mut",
    "get_node",
    "insert_alias",
    "insert_entry",
    "lookup",
    "merge_from_args",
    "merge_from_directives",
    "merge_from_environment",
    "merge_from_file",
    "merge_from_mapping",
    "merge_from_remainder",
    "set",
    "snapshot",
    "type_of_subtree",
    "value_of_subtree",
];

pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn validate_entry_name(name: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(SchemaError::InvalidIdentifier(name.to_string()));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(SchemaError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Per-entry access attributes.
///
/// Parsed from attribute strings: `w` or `writable` keeps the entry mutable
/// after freezing, `env:NAME` binds an environment variable and `arg:NAME`
/// binds a command-line argument.
///
/// # Examples
///
/// ```
/// use config_tree_core::Attributes;
///
/// let attrs: Attributes = "w env:FOO2".parse().unwrap();
/// assert!(attrs.writable);
/// assert_eq!(attrs.env.as_deref(), Some("FOO2"));
/// assert!("bogus".parse::<Attributes>().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub writable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
}

impl Attributes {
    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Default::default()
        }
    }

    pub fn with_env(mut self, name: impl Into<String>) -> Self {
        self.env = Some(name.into());
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>) -> Self {
        self.arg = Some(name.into());
        self
    }

    /// Parses attribute strings.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedAnnotation`] for unknown attributes or
    /// empty bindings.
    pub fn parse<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut attributes = Self::default();
        for item in items {
            let item = item.as_ref().trim();
            if item.eq_ignore_ascii_case("w") || item.eq_ignore_ascii_case("writable") {
                attributes.writable = true;
            } else if let Some(name) = item.strip_prefix("env:").filter(|n| !n.is_empty()) {
                attributes.env = Some(name.to_string());
            } else if let Some(name) = item.strip_prefix("arg:").filter(|n| !n.is_empty()) {
                attributes.arg = Some(name.to_string());
            } else {
                return Err(SchemaError::MalformedAnnotation(item.to_string()));
            }
        }
        Ok(attributes)
    }
}

impl FromStr for Attributes {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.split_whitespace())
    }
}

#[derive(Debug)]
enum Stored {
    Scalar(Value),
    List(ListProxy),
}

impl Stored {
    fn new(value: Value, ty: &Type, mutable: bool, host: &HostToken) -> Self {
        match value {
            Value::List(items) => Stored::List(ListProxy::new(items, ty.clone(), mutable, host)),
            scalar => Stored::Scalar(scalar),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Stored::Scalar(value) => value.clone(),
            Stored::List(list) => Value::List(list.to_vec()),
        }
    }
}

#[derive(Debug)]
struct Leaf {
    ty: Type,
    stored: Stored,
    host: HostToken,
}

#[derive(Debug, Default)]
struct Container {
    entries: BTreeMap<String, SchemaNode>,
    aliases: BTreeMap<String, String>,
}

impl Container {
    fn resolve(&self, name: &str) -> Option<&str> {
        alias::resolve(&self.entries, &self.aliases, name)
    }

    fn resolve_aliases(&self) -> Result<BTreeMap<String, String>> {
        alias::resolve_all(&self.entries, &self.aliases)
    }
}

#[derive(Debug)]
enum Body {
    Leaf(Leaf),
    Container(Container),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateAction {
    /// Writable containers drop their previous entries first.
    Update,
    /// Containers keep entries not mentioned by the incoming mapping.
    Merge,
}

/// Something that can become a child entry: a built node or raw data.
#[derive(Debug)]
pub enum Child {
    Node(SchemaNode),
    Value(Value),
}

impl From<SchemaNode> for Child {
    fn from(node: SchemaNode) -> Self {
        Child::Node(node)
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Value(value)
    }
}

macro_rules! child_from_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Value(Value::from(value))
            }
        })*
    };
}

child_from_value!(bool, i32, i64, f64, &str, String, BTreeMap<String, Value>);

impl<T: Into<Value>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::Value(Value::from(items))
    }
}

/// Result of looking up a name in a container.
///
/// Scalar children yield their value, list children their [`ListProxy`] and
/// container children the node itself so callers can keep descending.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Value(&'a Value),
    List(&'a ListProxy),
    Node(&'a SchemaNode),
}

impl<'a> Lookup<'a> {
    /// Materializes the lookup result into plain data.
    pub fn to_value(&self) -> Value {
        match *self {
            Lookup::Value(value) => value.clone(),
            Lookup::List(list) => Value::List(list.to_vec()),
            Lookup::Node(node) => node.value_of_subtree(),
        }
    }

    pub fn as_value(&self) -> Option<&'a Value> {
        match *self {
            Lookup::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&'a ListProxy> {
        match *self {
            Lookup::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&'a SchemaNode> {
        match *self {
            Lookup::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Declared types of a subtree, mirroring
/// [`SchemaNode::value_of_subtree`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypeTree {
    Leaf(Type),
    Container(BTreeMap<String, TypeTree>),
}

/// A node of a typed configuration tree.
#[derive(Debug)]
pub struct SchemaNode {
    body: Body,
    attributes: Attributes,
    frozen: bool,
    /// Entry names from the root down to this node.
    location: Vec<String>,
}

impl SchemaNode {
    /// Creates an empty, non-writable container.
    pub fn container() -> Self {
        Self::container_with(Attributes::default())
    }

    pub fn container_with(attributes: Attributes) -> Self {
        Self {
            body: Body::Container(Container::default()),
            attributes,
            frozen: false,
            location: Vec::new(),
        }
    }

    /// Creates a leaf from a default value, a declared type, or both.
    ///
    /// Without a type the type is inferred from `default`; without a default
    /// the type's zero value is used.
    ///
    /// # Errors
    ///
    /// [`SchemaError::MissingTypeAndDefault`] when neither is usable,
    /// [`SchemaError::IncompatibleDefault`] when the default does not fit the
    /// type, and [`SchemaError::UnacceptableType`] for types outside the
    /// acceptable set.
    pub fn leaf(default: Option<Value>, ty: Option<Type>, attributes: Attributes) -> Result<Self> {
        if let Some(ty) = &ty {
            ty.ensure_acceptable()?;
        }
        let (ty, value) = match (ty, default) {
            (None, None) | (None, Some(Value::Null)) => {
                return Err(SchemaError::MissingTypeAndDefault);
            }
            (Some(ty), None) => {
                let value = default_value(&ty);
                (ty, value)
            }
            (None, Some(value)) => (infer(&value, false)?, value),
            (Some(ty), Some(value)) => {
                if !fits(&value, &ty) {
                    return Err(SchemaError::IncompatibleDefault {
                        value: value.to_string(),
                        ty: ty.to_string(),
                    });
                }
                (ty, value)
            }
        };
        ty.ensure_acceptable()?;
        let value = cast(&value, &ty).map_err(|_| SchemaError::IncompatibleDefault {
            value: value.to_string(),
            ty: ty.to_string(),
        })?;

        let host = HostToken::new();
        let stored = Stored::new(value, &ty, true, &host);
        Ok(Self {
            body: Body::Leaf(Leaf { ty, stored, host }),
            attributes,
            frozen: false,
            location: Vec::new(),
        })
    }

    /// Builds a tree from plain data: mappings become containers, everything
    /// else a leaf with an inferred type. `attributes` apply to every node.
    pub fn from_primitive(value: Value, attributes: Attributes) -> Result<Self> {
        match value {
            Value::Map(map) => {
                let mut node = Self::container_with(attributes.clone());
                for (name, child) in map {
                    let child = Self::from_primitive(child, attributes.clone())?;
                    node.insert_entry(&name, child)?;
                }
                Ok(node)
            }
            value => Self::leaf(Some(value), None, attributes),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, Body::Container(_))
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Declared type of a leaf; `None` for containers.
    pub fn declared_type(&self) -> Option<&Type> {
        match &self.body {
            Body::Leaf(leaf) => Some(&leaf.ty),
            Body::Container(_) => None,
        }
    }

    /// Entry names of a container, in display order.
    pub fn entry_names(&self) -> Vec<&str> {
        match &self.body {
            Body::Container(container) => container.entries.keys().map(String::as_str).collect(),
            Body::Leaf(_) => Vec::new(),
        }
    }

    /// Alias table of a container.
    pub fn aliases(&self) -> Vec<(&str, &str)> {
        match &self.body {
            Body::Container(container) => container
                .aliases
                .iter()
                .map(|(name, target)| (name.as_str(), target.as_str()))
                .collect(),
            Body::Leaf(_) => Vec::new(),
        }
    }

    /// Returns `true` if `name` is an entry or an alias of this container.
    pub fn has_entry(&self, name: &str) -> bool {
        match &self.body {
            Body::Container(container) => {
                container.entries.contains_key(name) || container.aliases.contains_key(name)
            }
            Body::Leaf(_) => false,
        }
    }

    fn container_ref(&self, action: &str) -> Result<&Container> {
        match &self.body {
            Body::Container(container) => Ok(container),
            Body::Leaf(_) => Err(SchemaError::WrongNodeKind {
                action: action.to_string(),
                kind: "non-container",
            }),
        }
    }

    fn container_mut(&mut self, action: &str) -> Result<&mut Container> {
        match &mut self.body {
            Body::Container(container) => Ok(container),
            Body::Leaf(_) => Err(SchemaError::WrongNodeKind {
                action: action.to_string(),
                kind: "non-container",
            }),
        }
    }

    fn ensure_unfrozen(&self, action: &str) -> Result<()> {
        if self.frozen {
            Err(SchemaError::FrozenState {
                action: action.to_string(),
                when: "after",
            })
        } else {
            Ok(())
        }
    }

    fn not_found(&self, name: &str) -> SchemaError {
        SchemaError::EntryNotFound {
            name: name.to_string(),
            path: self.dotted_path(),
        }
    }

    /// Adds a child entry and returns the container for chaining.
    ///
    /// # Errors
    ///
    /// Fails after freezing, on leaves, for invalid, reserved or duplicate
    /// names, and when raw data cannot form a node.
    pub fn entry(mut self, name: &str, child: impl Into<Child>) -> Result<Self> {
        self.insert_entry(name, child)?;
        Ok(self)
    }

    /// In-place form of [`entry`](Self::entry), returning the new child.
    pub fn insert_entry(&mut self, name: &str, child: impl Into<Child>) -> Result<&mut SchemaNode> {
        self.ensure_unfrozen("add entry")?;
        let node = match child.into() {
            Child::Node(node) => node,
            Child::Value(value) => Self::from_primitive(value, Attributes::default())?,
        };
        self.adopt(name, node)
    }

    fn adopt(&mut self, name: &str, mut node: SchemaNode) -> Result<&mut SchemaNode> {
        validate_entry_name(name)?;
        let mut location = self.location.clone();
        location.push(name.to_string());
        let container = self.container_mut("add entry")?;
        if container.entries.contains_key(name) {
            return Err(SchemaError::DuplicateEntry(name.to_string()));
        }
        node.relocate(location);
        Ok(container.entries.entry(name.to_string()).or_insert(node))
    }

    fn relocate(&mut self, location: Vec<String>) {
        if let Body::Container(container) = &mut self.body {
            for (name, child) in container.entries.iter_mut() {
                let mut child_location = location.clone();
                child_location.push(name.clone());
                child.relocate(child_location);
            }
        }
        self.location = location;
    }

    /// Registers an alias; it is validated when the tree is frozen.
    pub fn alias(mut self, name: &str, target: &str) -> Result<Self> {
        self.insert_alias(name, target)?;
        Ok(self)
    }

    /// In-place form of [`alias`](Self::alias).
    pub fn insert_alias(&mut self, name: &str, target: &str) -> Result<&mut Self> {
        self.ensure_unfrozen("create alias")?;
        for candidate in [name, target] {
            if !is_identifier(candidate) {
                return Err(SchemaError::InvalidIdentifier(candidate.to_string()));
            }
        }
        self.container_mut("create alias")?
            .aliases
            .insert(name.to_string(), target.to_string());
        Ok(self)
    }

    /// Validates aliases and locks the tree.
    ///
    /// Freezing is recursive and idempotent. It is all-or-nothing: when any
    /// alias in the subtree is broken, cyclic or shadows an entry, nothing is
    /// frozen and nothing is rewritten.
    pub fn freeze(&mut self) -> Result<&mut Self> {
        self.validate_aliases()?;
        self.freeze_validated()?;
        debug!(path = %self.dotted_path(), "froze schema node");
        Ok(self)
    }

    fn validate_aliases(&self) -> Result<()> {
        if let Body::Container(container) = &self.body {
            if self.frozen {
                return Ok(());
            }
            container.resolve_aliases()?;
            for child in container.entries.values() {
                child.validate_aliases()?;
            }
        }
        Ok(())
    }

    fn freeze_validated(&mut self) -> Result<()> {
        let writable = self.attributes.writable;
        match &mut self.body {
            Body::Leaf(leaf) => {
                if let Stored::List(list) = &mut leaf.stored {
                    list.set_mutable(writable, &leaf.host)?;
                }
            }
            Body::Container(container) => {
                if self.frozen {
                    return Ok(());
                }
                container.aliases = container.resolve_aliases()?;
                for child in container.entries.values_mut() {
                    child.freeze_validated()?;
                }
            }
        }
        self.frozen = true;
        Ok(())
    }

    fn mutable(&self) -> bool {
        !self.frozen || self.attributes.writable
    }

    /// Dotted path of this node from the root; empty for the root.
    pub fn dotted_path(&self) -> String {
        self.location.join(".")
    }

    /// Looks up a child by entry or alias name.
    ///
    /// # Errors
    ///
    /// [`SchemaError::EntryNotFound`] for unknown names and
    /// [`SchemaError::WrongNodeKind`] on leaves.
    pub fn get(&self, name: &str) -> Result<Lookup<'_>> {
        Ok(self.get_node(name)?.as_lookup())
    }

    /// Like [`get`](Self::get) but always returns the child node.
    pub fn get_node(&self, name: &str) -> Result<&SchemaNode> {
        let container = self.container_ref("get entry")?;
        container
            .resolve(name)
            .and_then(|key| container.entries.get(key))
            .ok_or_else(|| self.not_found(name))
    }

    pub(crate) fn get_node_mut(&mut self, name: &str) -> Result<&mut SchemaNode> {
        let error = self.not_found(name);
        let container = self.container_mut("get entry")?;
        match container.resolve(name).map(str::to_string) {
            Some(key) => container.entries.get_mut(&key).ok_or(error),
            None => Err(error),
        }
    }

    /// In-place access to a list leaf.
    ///
    /// Mutations still go through the list's mutability gate.
    pub fn get_list_mut(&mut self, name: &str) -> Result<&mut ListProxy> {
        let node = self.get_node_mut(name)?;
        let path = node.dotted_path();
        match &mut node.body {
            Body::Leaf(Leaf {
                stored: Stored::List(list),
                ..
            }) => Ok(list),
            Body::Leaf(leaf) => Err(SchemaError::NotAList {
                directive: path,
                ty: leaf.ty.to_string(),
            }),
            Body::Container(_) => Err(SchemaError::NotAList {
                directive: path,
                ty: "container".to_string(),
            }),
        }
    }

    fn as_lookup(&self) -> Lookup<'_> {
        match &self.body {
            Body::Leaf(leaf) => match &leaf.stored {
                Stored::Scalar(value) => Lookup::Value(value),
                Stored::List(list) => Lookup::List(list),
            },
            Body::Container(_) => Lookup::Node(self),
        }
    }

    /// Resolves a dotted path relative to this node.
    pub fn lookup(&self, dotted_path: &str) -> Result<Lookup<'_>> {
        let mut node = self;
        for segment in dotted_path.split('.') {
            node = node.get_node(segment)?;
        }
        Ok(node.as_lookup())
    }

    /// Updates a child by entry or alias name.
    ///
    /// Leaves take a compatible value; containers take a mapping and, when
    /// writable, are replaced wholesale. On a writable container an unknown
    /// name creates a new writable entry.
    ///
    /// # Errors
    ///
    /// [`SchemaError::EntryNotFound`] for unknown names on non-writable
    /// containers, [`SchemaError::ReadOnly`] after freezing, and
    /// [`SchemaError::TypeMismatch`] for values that do not fit.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.update_entry(name, value.into(), UpdateAction::Update)
    }

    pub(crate) fn update_entry(&mut self, name: &str, raw: Value, action: UpdateAction) -> Result<()> {
        let container = self.container_ref("update entry")?;
        if container.resolve(name).is_some() {
            return self.get_node_mut(name)?.update_value(raw, action);
        }
        if !self.attributes.writable {
            return Err(self.not_found(name));
        }
        let mut map = BTreeMap::new();
        map.insert(name.to_string(), raw);
        self.update_value(Value::Map(map), UpdateAction::Merge)
    }

    /// Deep-merges a mapping into this container.
    ///
    /// Keys unknown to a non-writable container are rejected before
    /// anything is modified.
    pub fn merge_from_mapping(&mut self, value: impl Into<Value>) -> Result<&mut Self> {
        self.update_value(value.into(), UpdateAction::Merge)?;
        Ok(self)
    }

    pub(crate) fn update_value(&mut self, raw: Value, action: UpdateAction) -> Result<()> {
        if self.is_container() {
            self.update_container(raw, action)
        } else {
            self.update_leaf(raw)
        }
    }

    fn update_leaf(&mut self, raw: Value) -> Result<()> {
        let path = self.dotted_path();
        let mutable = self.mutable();
        if !mutable {
            return Err(SchemaError::ReadOnly { path });
        }
        let Body::Leaf(leaf) = &mut self.body else {
            return Ok(());
        };
        let mismatch = |raw: &Value| SchemaError::TypeMismatch {
            path: path.clone(),
            ty: leaf.ty.to_string(),
            value: raw.to_string(),
        };
        if !fits(&raw, &leaf.ty) {
            return Err(mismatch(&raw));
        }
        let value = cast(&raw, &leaf.ty).map_err(|_| mismatch(&raw))?;
        leaf.stored = Stored::new(value, &leaf.ty, mutable, &leaf.host);
        Ok(())
    }

    fn update_container(&mut self, raw: Value, action: UpdateAction) -> Result<()> {
        let path = self.dotted_path();
        let writable = self.attributes.writable;
        let frozen = self.frozen;
        let Value::Map(map) = raw else {
            return Err(SchemaError::ExpectedMapping {
                path,
                value: raw.to_string(),
            });
        };

        if frozen && !writable && map.is_empty() {
            return Err(SchemaError::ReadOnly { path });
        }

        let container = self.container_mut("merge mapping")?;
        let extra: Vec<String> = map
            .keys()
            .filter(|name| !container.entries.contains_key(*name))
            .map(|name| format!("{name:?}"))
            .collect();
        if !writable && !extra.is_empty() {
            return Err(SchemaError::ExtraEntries {
                entries: extra.join(", "),
                path,
            });
        }
        if writable && action == UpdateAction::Update {
            container.entries.clear();
            container.aliases.clear();
        }

        for (name, value) in map {
            let container = self.container_mut("merge mapping")?;
            if let Some(child) = container.entries.get_mut(&name) {
                child.update_value(value, action)?;
                continue;
            }
            let node = Self::from_primitive(value, Attributes::writable())?;
            let child = self.adopt(&name, node)?;
            if frozen {
                child.freeze()?;
            }
        }
        Ok(())
    }

    /// Relative dotted paths and nodes of every leaf below this node.
    pub fn leaves(&self) -> Vec<(String, &SchemaNode)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(String, &'a SchemaNode)>) {
        match &self.body {
            Body::Leaf(_) => out.push((prefix.join("."), self)),
            Body::Container(container) => {
                for (name, child) in &container.entries {
                    prefix.push(name.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// Materializes the subtree into plain nested data.
    pub fn value_of_subtree(&self) -> Value {
        match &self.body {
            Body::Leaf(leaf) => leaf.stored.to_value(),
            Body::Container(container) => Value::Map(
                container
                    .entries
                    .iter()
                    .map(|(name, child)| (name.clone(), child.value_of_subtree()))
                    .collect(),
            ),
        }
    }

    /// Structural comparison of two subtrees.
    ///
    /// Declared types, node kinds, frozen flags, entry names and leaf values
    /// must match. A `strict` comparison also requires equal attributes and
    /// alias tables. `==` is the strict form.
    pub fn equal(&self, other: &SchemaNode, strict: bool) -> bool {
        if self.frozen != other.frozen || (strict && self.attributes != other.attributes) {
            return false;
        }
        match (&self.body, &other.body) {
            (Body::Leaf(leaf), Body::Leaf(other_leaf)) => {
                leaf.ty == other_leaf.ty && leaf.stored.to_value() == other_leaf.stored.to_value()
            }
            (Body::Container(container), Body::Container(other_container)) => {
                if strict && container.aliases != other_container.aliases {
                    return false;
                }
                container.entries.len() == other_container.entries.len()
                    && container.entries.iter().all(|(name, child)| {
                        other_container
                            .entries
                            .get(name)
                            .is_some_and(|other_child| child.equal(other_child, strict))
                    })
            }
            _ => false,
        }
    }

    /// Declared types of the subtree.
    pub fn type_of_subtree(&self) -> TypeTree {
        match &self.body {
            Body::Leaf(leaf) => TypeTree::Leaf(leaf.ty.clone()),
            Body::Container(container) => TypeTree::Container(
                container
                    .entries
                    .iter()
                    .map(|(name, child)| (name.clone(), child.type_of_subtree()))
                    .collect(),
            ),
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let container = match &self.body {
            Body::Leaf(leaf) => {
                return match &leaf.stored {
                    Stored::Scalar(value) => write!(f, "({}) {value}", leaf.ty),
                    Stored::List(list) => write!(f, "({}) {list}", leaf.ty),
                };
            }
            Body::Container(container) => container,
        };

        let indent = "  ".repeat(level);
        let mut entries: Vec<_> = container.entries.iter().collect();
        entries.sort_by_key(|(_, child)| child.is_container());
        for (name, child) in entries {
            write!(f, "{indent}{name}:")?;
            if child.is_container() {
                writeln!(f)?;
                child.write_tree(f, level + 1)?;
            } else {
                f.write_str(" ")?;
                child.write_tree(f, level + 1)?;
                writeln!(f)?;
            }
        }
        for (name, target) in &container.aliases {
            writeln!(f, "{indent}{name} -> {target}")?;
        }
        Ok(())
    }
}

impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other, true)
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;

    fn leaf_with_type(default: Option<Value>, ty: Type) -> Result<SchemaNode> {
        SchemaNode::leaf(default, Some(ty), Attributes::default())
    }

    #[test]
    fn test_leaf_defaults_from_type() {
        let cases = [
            (Type::Int, Value::Int(0)),
            (Type::Float, Value::Float(0.0)),
            (Type::Str, Value::from("")),
            (Type::Bool, Value::Bool(false)),
            (Type::list(Type::Int), Value::List(vec![])),
            (Type::list(Type::Str), Value::List(vec![])),
        ];
        for (ty, expected) in cases {
            let node = leaf_with_type(None, ty).unwrap();
            assert_eq!(node.value_of_subtree(), expected);
        }
    }

    #[test]
    fn test_leaf_infers_type_from_default() {
        let cases = [
            (json!(1), Type::Int),
            (json!(1.0), Type::Float),
            (json!("baz"), Type::Str),
            (json!(true), Type::Bool),
            (json!([1.0, 2]), Type::list(Type::Float)),
            (json!(["baz", "baz2"]), Type::list(Type::Str)),
        ];
        for (value, ty) in cases {
            let node = SchemaNode::leaf(Some(value.into()), None, Attributes::default()).unwrap();
            assert_eq!(node.declared_type(), Some(&ty));
        }
    }

    #[test]
    fn test_leaf_rejects_incompatible_default() {
        let cases = [
            (json!(1.0), Type::Int),
            (json!(true), Type::Int),
            (json!("baz"), Type::Float),
            (json!(["baz"]), Type::Str),
            (json!(0), Type::Bool),
            (json!([1]), Type::list(Type::Str)),
        ];
        for (value, ty) in cases {
            let err = leaf_with_type(Some(value.into()), ty).unwrap_err();
            assert!(matches!(err, SchemaError::IncompatibleDefault { .. }), "{err}");
        }
        assert_eq!(
            SchemaNode::leaf(None, None, Attributes::default()).unwrap_err(),
            SchemaError::MissingTypeAndDefault
        );
        assert!(matches!(
            leaf_with_type(None, Type::list(Type::list(Type::Int))),
            Err(SchemaError::UnacceptableType(_))
        ));
    }

    #[test]
    fn test_leaf_widens_default() {
        let node = leaf_with_type(Some(Value::Int(1)), Type::Float).unwrap();
        assert_eq!(node.value_of_subtree(), Value::Float(1.0));
    }

    #[test]
    fn test_entry_names_are_validated() {
        let err = SchemaNode::container().entry("foo", 1).unwrap().entry("foo", 2).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateEntry("foo".to_string()));
        assert!(matches!(
            SchemaNode::container().entry("freeze", 1),
            Err(SchemaError::ReservedName(_))
        ));
        assert!(matches!(
            SchemaNode::container().entry("not-an-ident", 1),
            Err(SchemaError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            SchemaNode::leaf(Some(Value::Int(1)), None, Attributes::default())
                .unwrap()
                .entry("foo", 1),
            Err(SchemaError::WrongNodeKind { .. })
        ));
    }

    #[test]
    fn test_entry_after_freeze_is_rejected() {
        let mut node = SchemaNode::container().entry("foo", 1).unwrap();
        node.freeze().unwrap();
        assert_eq!(node.insert_entry("bar", 2).unwrap_err().kind(), ErrorKind::Declaration);
        assert!(node.insert_alias("bar", "foo").is_err());
    }

    #[test]
    fn test_dotted_path_follows_adoption() {
        let inner = SchemaNode::container().entry("leaf", 1).unwrap();
        let middle = SchemaNode::container().entry("inner", inner).unwrap();
        let root = SchemaNode::container().entry("middle", middle).unwrap();

        assert_eq!(root.dotted_path(), "");
        let leaf = root.get_node("middle").unwrap().get_node("inner").unwrap().get_node("leaf").unwrap();
        assert_eq!(leaf.dotted_path(), "middle.inner.leaf");
    }

    #[test]
    fn test_get_returns_values_for_leaves_and_nodes_for_containers() {
        let root = SchemaNode::from_primitive(
            json!({"foo": 1, "bar": [1, 2], "sub": {"baz": "x"}}).into(),
            Attributes::default(),
        )
        .unwrap();
        assert_eq!(root.get("foo").unwrap().as_value(), Some(&Value::Int(1)));
        assert_eq!(root.get("bar").unwrap().as_list().map(|l| l.len()), Some(2));
        let sub = root.get("sub").unwrap().as_node().unwrap();
        assert_eq!(sub.get("baz").unwrap().to_value(), Value::from("x"));
        assert_eq!(root.lookup("sub.baz").unwrap().to_value(), Value::from("x"));
        assert!(root.get("missing").unwrap_err().is_not_found());
        assert!(root.lookup("foo.bar").is_err());
    }

    #[test]
    fn test_container_merge_and_update_modes() {
        let mut root = SchemaNode::container()
            .entry("sub", SchemaNode::container_with(Attributes::writable()))
            .unwrap();
        root.merge_from_mapping(json!({"sub": {"bar": 1}})).unwrap();
        root.merge_from_mapping(json!({"sub": {"baz": 2}})).unwrap();
        assert_eq!(root.value_of_subtree(), Value::from(json!({"sub": {"bar": 1, "baz": 2}})));

        root.set("sub", Value::from(json!({"baz": 3}))).unwrap();
        assert_eq!(root.value_of_subtree(), Value::from(json!({"sub": {"baz": 3}})));
    }

    #[test]
    fn test_read_only_container_rejects_extra_keys_without_modification() {
        let mut root = SchemaNode::from_primitive(json!({"sub": {"foo": 1}}).into(), Attributes::default())
            .unwrap();
        let err = root
            .merge_from_mapping(json!({"sub": {"foo": 2, "unknown": 3}}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ExtraEntries { .. }));
        assert!(err.to_string().contains("adding extra entries"));
        assert_eq!(root.value_of_subtree(), Value::from(json!({"sub": {"foo": 1}})));
    }

    #[test]
    fn test_frozen_tree_is_read_only_except_writable_entries() {
        let mut root = SchemaNode::container()
            .entry("foo", 1)
            .unwrap()
            .entry(
                "bar",
                SchemaNode::leaf(Some(Value::Int(1)), None, Attributes::writable()).unwrap(),
            )
            .unwrap();
        root.freeze().unwrap();

        let err = root.set("foo", 2).unwrap_err();
        assert!(err.is_read_only());
        root.set("bar", 2).unwrap();
        assert_eq!(root.get("bar").unwrap().to_value(), Value::Int(2));

        let err = root.set("bar", "two").unwrap_err();
        assert!(err.is_type_error());
        let err = root.set("nothing", 1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_frozen_read_only_container_rejects_empty_update() {
        let mut root = SchemaNode::from_primitive(json!({"sub": {"foo": 1}}).into(), Attributes::default())
            .unwrap();
        root.freeze().unwrap();

        assert!(root.merge_from_mapping(json!({})).unwrap_err().is_read_only());
        let err = root.set("sub", json!({})).unwrap_err();
        assert!(err.is_read_only());
        assert_eq!(err, SchemaError::ReadOnly { path: "sub".to_string() });

        let mut open = SchemaNode::container_with(Attributes::writable());
        open.freeze().unwrap();
        open.merge_from_mapping(json!({})).unwrap();
    }

    #[test]
    fn test_equality_compares_kinds_types_and_frozen_state() {
        let build = |value: serde_json::Value| {
            SchemaNode::from_primitive(value.into(), Attributes::default()).unwrap()
        };
        let mut first = build(json!({"sub": {"foo": 1, "tags": ["a"]}}));
        let second = build(json!({"sub": {"foo": 1, "tags": ["a"]}}));
        assert_eq!(first, second);

        assert_ne!(first, build(json!({"sub": {"foo": 1.0, "tags": ["a"]}})));
        assert_ne!(first, build(json!({"sub": {"foo": 1, "tags": ["a", "b"]}})));
        assert_ne!(first, build(json!({"sub": 1})));
        assert_ne!(first, build(json!({"sub": {"foo": 1}})));
        assert_ne!(first, build(json!({"sub": {"foo": 1, "tags": ["a"], "bar": 2}})));

        first.freeze().unwrap();
        assert!(!first.equal(&second, false));
    }

    #[test]
    fn test_writable_container_gains_frozen_writable_entries_after_freeze() {
        let mut root = SchemaNode::container()
            .entry("extra", SchemaNode::container_with(Attributes::writable()))
            .unwrap();
        root.freeze().unwrap();

        root.merge_from_mapping(json!({"extra": {"items": [1]}})).unwrap();
        let extra = root.get_node("extra").unwrap();
        let items = extra.get_node("items").unwrap();
        assert!(items.is_frozen());
        assert!(items.attributes().writable);
        assert_eq!(items.dotted_path(), "extra.items");
        root.get_node_mut("extra").unwrap().get_list_mut("items").unwrap().push(2).unwrap();
    }

    #[test]
    fn test_aliases_resolve_transitively() {
        let mut root = SchemaNode::container()
            .entry("foo", 1)
            .unwrap()
            .alias("bar", "foo")
            .unwrap()
            .alias("baz", "bar")
            .unwrap()
            .alias("baz_", "foo")
            .unwrap();
        assert_eq!(root.get("baz").unwrap().to_value(), Value::Int(1));
        root.freeze().unwrap();
        for name in ["foo", "bar", "baz", "baz_"] {
            assert_eq!(root.get(name).unwrap().to_value(), Value::Int(1));
        }
        assert_eq!(root.aliases(), vec![("bar", "foo"), ("baz", "foo"), ("baz_", "foo")]);
    }

    #[test]
    fn test_alias_errors_surface_at_freeze() {
        let mut broken = SchemaNode::container()
            .entry("foo", 1)
            .unwrap()
            .alias("bar", "fooo")
            .unwrap()
            .alias("baz", "bar")
            .unwrap();
        assert!(matches!(broken.freeze(), Err(SchemaError::BrokenAlias(_))));
        assert!(!broken.is_frozen());

        let mut shadow = SchemaNode::container()
            .entry("foo", 1)
            .unwrap()
            .entry("bar", 2)
            .unwrap()
            .alias("bar", "foo")
            .unwrap();
        assert!(matches!(shadow.freeze(), Err(SchemaError::AliasShadowsEntry(_))));

        let mut cyclic = SchemaNode::container().alias("bar", "baz").unwrap().alias("baz", "bar").unwrap();
        let err = cyclic.freeze().unwrap_err();
        assert_eq!(err, SchemaError::CyclicAlias("bar -> baz -> bar".to_string()));

        let mut self_alias = SchemaNode::container().entry("foo", 1).unwrap().alias("bar", "bar").unwrap();
        assert!(matches!(self_alias.freeze(), Err(SchemaError::CyclicAlias(_))));
    }

    #[test]
    fn test_failed_freeze_leaves_children_unfrozen() {
        let sub = SchemaNode::container().entry("x", 1).unwrap();
        let mut root = SchemaNode::container()
            .entry("a", sub)
            .unwrap()
            .entry("z", SchemaNode::container().alias("loop", "loop").unwrap())
            .unwrap();
        assert!(root.freeze().is_err());
        assert!(!root.get_node("a").unwrap().is_frozen());
        root.set("a", Value::from(json!({"x": 5}))).unwrap();
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let mut root = SchemaNode::from_primitive(json!({"a": 1, "b": {"c": [1]}}).into(), Attributes::default())
            .unwrap()
            .alias("d", "a")
            .unwrap();
        root.freeze().unwrap();
        let once = (root.value_of_subtree(), root.to_string());
        root.freeze().unwrap();
        assert_eq!((root.value_of_subtree(), root.to_string()), once);
    }

    #[test]
    fn test_type_of_subtree() {
        let root = SchemaNode::from_primitive(json!({"a": 1, "b": {"c": [1.5]}}).into(), Attributes::default())
            .unwrap();
        let types = root.type_of_subtree();
        assert_eq!(
            serde_json::to_value(&types).unwrap(),
            json!({"a": "int", "b": {"c": "[float]"}})
        );
    }

    #[test]
    fn test_display_renders_tree() {
        let root = SchemaNode::from_primitive(
            json!({"sub": {"foo": "bar"}, "a": 1, "b": [1, 2]}).into(),
            Attributes::default(),
        )
        .unwrap()
        .alias("c", "a")
        .unwrap();
        assert_eq!(
            root.to_string(),
            "a: (int) 1\nb: ([int]) [1, 2]\nsub:\n  foo: (str) 'bar'\nc -> a\n"
        );
    }
}
