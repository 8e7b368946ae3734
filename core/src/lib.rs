//! Typed, freezable configuration trees.
//!
//! This crate defines the configuration tree and everything that gives it
//! meaning:
//!
//! - [`Type`]: the closed set of acceptable value types, with inference
//!   ([`infer`]), compatibility ([`compatible`]) and casting ([`cast`]).
//! - [`SchemaNode`]: leaves holding typed values and containers holding
//!   named children plus aliases. Trees are mutated freely, then
//!   [frozen](SchemaNode::freeze); afterwards only writable entries change.
//! - [`ListProxy`]: list values whose mutability only the hosting leaf can
//!   switch.
//! - [`Directive`]: dotted-path update, append and prepend instructions,
//!   applied in bulk from environment variables, arguments and remainder
//!   tokens.
//! - [`Template`]: a declarative builder producing fresh trees or a shared
//!   singleton.
//! - [`Snapshot`]: a serde-serializable record of a tree.
//!
//! # Example
//!
//! ```
//! use config_tree_core::*;
//!
//! let mut cfg = Template::new()
//!     .field("lr", 0.1)
//!     .field_with("epochs", 10, ["int", "env:EPOCHS"])
//!     .nested("data", Template::new().field("paths", vec!["a.csv"]).writable())
//!     .build()?;
//!
//! cfg.merge_from_remainder(&["epochs", "20", "data.paths+", "b.csv"], DirectiveOptions::default())?;
//! cfg.freeze()?;
//!
//! assert_eq!(cfg.get("epochs")?.to_value(), Value::Int(20));
//! assert!(cfg.set("lr", 0.2).unwrap_err().is_read_only());
//! assert_eq!(
//!     cfg.lookup("data.paths")?.to_value(),
//!     Value::from(vec!["a.csv", "b.csv"])
//! );
//! # Ok::<(), SchemaError>(())
//! ```

mod alias;
mod directive;
mod error;
mod list;
mod literal;
mod node;
mod snapshot;
mod sources;
mod template;
mod types;
mod value;

pub use directive::{Directive, DirectiveAction, DirectiveOptions, modify};
pub use error::{ErrorKind, Result, SchemaError};
pub use list::{HostToken, ListProxy};
pub use literal::parse_literal;
pub use node::{Attributes, Child, Lookup, SchemaNode, TypeTree};
pub use snapshot::{NodeSnapshot, Snapshot};
pub use template::{Annotation, Template};
pub use types::{Malformed, Type, cast, cast_or_err, compatible, default_value, fits, infer};
pub use value::Value;
