//! Dotted-path directives.
//!
//! A directive addresses one entry of a tree by its dotted path and says what
//! to do with a raw value: replace it, or (with the extended syntax) prepend
//! (`+path`) or append (`path+`) to a list entry.
//!
//! # Examples
//!
//! ```
//! use config_tree_core::{DirectiveOptions, SchemaNode, Value};
//! use serde_json::json;
//!
//! let mut cfg = SchemaNode::from_primitive(
//!     json!({"name": "x", "sub": {"ports": [80]}}).into(),
//!     Default::default(),
//! )?;
//! cfg.merge_from_directives(
//!     [("name", Value::from("y")), ("sub.ports+", Value::Int(443))],
//!     DirectiveOptions::default(),
//! )?;
//! assert_eq!(cfg.lookup("sub.ports")?.to_value(), Value::from(vec![80, 443]));
//! # Ok::<(), config_tree_core::SchemaError>(())
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::node::{SchemaNode, UpdateAction, is_identifier};
use crate::Value;

/// What a directive does with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveAction {
    Update,
    Append,
    Prepend,
}

/// A parsed directive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    text: String,
    segments: Vec<String>,
    action: DirectiveAction,
}

impl Directive {
    /// Parses a directive string.
    ///
    /// `+` decorations are only recognized with `extended` syntax; otherwise
    /// they are part of the path and fail the identifier check.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidDirective`] when a segment is not an identifier.
    pub fn parse(text: &str, extended: bool) -> Result<Self> {
        let (path, action) = match (text.strip_prefix('+'), text.strip_suffix('+')) {
            (Some(path), _) if extended => (path, DirectiveAction::Prepend),
            (_, Some(path)) if extended => (path, DirectiveAction::Append),
            _ => (text, DirectiveAction::Update),
        };
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| !is_identifier(segment)) {
            return Err(SchemaError::InvalidDirective(text.to_string()));
        }
        Ok(Self {
            text: text.to_string(),
            segments,
            action,
        })
    }

    pub fn action(&self) -> DirectiveAction {
        self.action
    }

    /// Path segments with any `+` decoration stripped.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn not_found(&self) -> SchemaError {
        SchemaError::DirectiveNotFound(self.text.clone())
    }

    /// Applies the directive to `root`.
    pub fn apply(&self, root: &mut SchemaNode, value: Value) -> Result<()> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(SchemaError::InvalidDirective(self.text.clone()));
        };

        let mut node = root;
        for segment in parents {
            node = match node.get_node_mut(segment) {
                Ok(child) if child.is_container() => child,
                Ok(_) => return Err(self.not_found()),
                Err(err) => return Err(self.classify(err)),
            };
        }

        match self.action {
            DirectiveAction::Update => node
                .update_entry(last, value, UpdateAction::Update)
                .map_err(|err| self.classify(err)),
            DirectiveAction::Append | DirectiveAction::Prepend => {
                let list = node.get_list_mut(last).map_err(|err| self.classify(err))?;
                if self.action == DirectiveAction::Append {
                    list.push(value)
                } else {
                    list.insert(0, value)
                }
            }
        }
    }

    fn classify(&self, err: SchemaError) -> SchemaError {
        match err {
            SchemaError::EntryNotFound { .. } | SchemaError::WrongNodeKind { .. } => self.not_found(),
            SchemaError::NotAList { ty, .. } => SchemaError::NotAList {
                directive: self.text.clone(),
                ty,
            },
            other => other,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parses `directive` and applies it to `root`.
///
/// # Errors
///
/// Invalid paths, missing entries and type mismatches are reported as
/// [`SchemaError::InvalidDirective`], [`SchemaError::DirectiveNotFound`] and
/// type errors respectively. Append and prepend on a non-list entry fail with
/// [`SchemaError::NotAList`].
pub fn modify(root: &mut SchemaNode, directive: &str, value: Value, extended: bool) -> Result<()> {
    Directive::parse(directive, extended)?.apply(root, value)
}

/// Options for applying a batch of directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveOptions {
    /// Recognize `+path` and `path+`.
    pub extended_syntax: bool,
    /// Log and skip failing directives instead of aborting the batch.
    pub ignore_errors: bool,
}

impl Default for DirectiveOptions {
    fn default() -> Self {
        Self {
            extended_syntax: true,
            ignore_errors: false,
        }
    }
}

impl DirectiveOptions {
    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    pub fn plain(mut self) -> Self {
        self.extended_syntax = false;
        self
    }
}

impl SchemaNode {
    /// Applies `(path, value)` directives in order.
    ///
    /// There is no rollback: when a directive fails, earlier ones stay
    /// applied.
    pub fn merge_from_directives<I, S, V>(&mut self, directives: I, options: DirectiveOptions) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        for (directive, value) in directives {
            let directive = directive.as_ref();
            let value = value.into();
            debug!(directive, value = %value, "applying directive");
            if let Err(err) = modify(self, directive, value, options.extended_syntax) {
                if !options.ignore_errors {
                    return Err(err);
                }
                warn!(directive, error = %err, "ignoring failed directive");
            }
        }
        Ok(self)
    }
}
