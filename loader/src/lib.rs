//! Configuration files for `config-tree-core` trees.
//!
//! This crate reads YAML (and JSON) documents into [`Value`]s, following
//! `_BASE_` inheritance chains, and writes trees back out as YAML.
//!
//! # Quick start
//!
//! ```no_run
//! use config_tree_core::{Attributes, Template};
//! use config_tree_loader::{FileSourceExt, load_tree};
//!
//! // Start from a declared schema and overlay a file on top
//! let mut cfg = Template::new().field("lr", 0.1).field("epochs", 10).build().unwrap();
//! cfg.merge_from_file("configs/finetune.yaml").unwrap();
//!
//! // Or infer the whole tree from a file
//! let inferred = load_tree("configs/base.yaml", Attributes::default()).unwrap();
//! inferred.dump(std::io::stdout()).unwrap();
//! ```
//!
//! [`Value`]: config_tree_core::Value

mod document;
mod error;
mod source;

pub use document::{BASE_KEY, deep_merge, dump_yaml, dump_yaml_to_path, load_yaml_with_base};
pub use error::{LoadError, Result};
pub use source::{FileSourceExt, load_tree};
