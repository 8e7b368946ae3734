//! File sourcing for [`SchemaNode`] trees.

use std::io::Write;
use std::path::Path;

use config_tree_core::{Attributes, SchemaNode};

use crate::document::{dump_yaml, load_yaml_with_base};
use crate::error::Result;

/// Adds file operations to [`SchemaNode`].
///
/// # Examples
///
/// ```no_run
/// use config_tree_loader::FileSourceExt;
/// use config_tree_core::Template;
///
/// let mut cfg = Template::new().field("lr", 0.1).build().unwrap();
/// cfg.merge_from_file("experiment.yaml").unwrap();
/// cfg.freeze().unwrap();
/// cfg.dump(std::io::stdout()).unwrap();
/// ```
pub trait FileSourceExt {
    /// Deep-merges a document (with its base chain) into the tree.
    fn merge_from_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self>;

    /// Writes the tree's values as YAML.
    fn dump<W: Write>(&self, writer: W) -> Result<()>;
}

impl FileSourceExt for SchemaNode {
    fn merge_from_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let value = load_yaml_with_base(path)?;
        self.merge_from_mapping(value)?;
        Ok(self)
    }

    fn dump<W: Write>(&self, writer: W) -> Result<()> {
        dump_yaml(&self.value_of_subtree(), writer)
    }
}

/// Builds a tree from a document, inferring every leaf type.
pub fn load_tree(path: impl AsRef<Path>, attributes: Attributes) -> Result<SchemaNode> {
    let value = load_yaml_with_base(path)?;
    Ok(SchemaNode::from_primitive(value, attributes)?)
}
