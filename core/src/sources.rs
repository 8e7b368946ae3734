//! Populating trees from environment variables, command-line arguments and
//! remainder tokens.
//!
//! Leaves opt in to environment and argument sourcing through their
//! [`Attributes`](crate::Attributes) (`env:NAME`, `arg:NAME`). Remainder
//! tokens need no binding: they are `path value` pairs interpreted as
//! directives.

use tracing::debug;

use crate::directive::{DirectiveOptions, modify};
use crate::error::{Result, SchemaError};
use crate::literal::parse_literal;
use crate::node::SchemaNode;
use crate::types::{Type, cast_or_err};
use crate::Value;

/// A leaf bound to an external name.
struct Binding {
    path: String,
    name: String,
    ty: Type,
}

impl SchemaNode {
    fn bindings(&self, name_of: impl Fn(&crate::Attributes) -> Option<&String>) -> Vec<Binding> {
        self.leaves()
            .into_iter()
            .filter_map(|(path, leaf)| {
                let name = name_of(leaf.attributes())?.clone();
                let ty = leaf.declared_type()?.clone();
                Some(Binding { path, name, ty })
            })
            .collect()
    }

    fn apply_bindings(&mut self, bindings: Vec<Binding>, mut fetch: impl FnMut(&Binding) -> Option<Value>) -> Result<()> {
        for binding in bindings {
            let Some(raw) = fetch(&binding) else {
                continue;
            };
            let value = cast_or_err(&raw, &binding.ty)?;
            debug!(path = %binding.path, source = %binding.name, "merging bound value");
            modify(self, &binding.path, value, false)?;
        }
        Ok(())
    }

    /// Updates every leaf bound with `env:NAME` whose variable is set in the
    /// process environment.
    pub fn merge_from_environment(&mut self) -> Result<&mut Self> {
        self.merge_from_env_with(|name| std::env::var(name).ok())
    }

    /// Like [`merge_from_environment`](Self::merge_from_environment) with an
    /// explicit variable lookup.
    ///
    /// Variable text is parsed as a literal and cast into the leaf's type;
    /// text that is not a literal is kept verbatim for string leaves.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_tree_core::{Template, Value};
    ///
    /// let mut cfg = Template::new()
    ///     .field_with("threshold", 42.0, ["float?", "env:THRESHOLD"])
    ///     .build()?;
    /// cfg.merge_from_env_with(|name| (name == "THRESHOLD").then(|| "36".to_string()))?;
    /// assert_eq!(cfg.get("threshold")?.to_value(), Value::Float(36.0));
    /// # Ok::<(), config_tree_core::SchemaError>(())
    /// ```
    pub fn merge_from_env_with<F>(&mut self, lookup: F) -> Result<&mut Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bindings = self.bindings(|attributes| attributes.env.as_ref());
        self.apply_bindings(bindings, |binding| lookup(&binding.name).map(Value::Str))?;
        Ok(self)
    }

    /// Updates every leaf bound with `arg:NAME` for which `lookup` yields a
    /// value. String values are cast into the leaf's type.
    pub fn merge_from_args<F>(&mut self, lookup: F) -> Result<&mut Self>
    where
        F: Fn(&str) -> Option<Value>,
    {
        let bindings = self.bindings(|attributes| attributes.arg.as_ref());
        self.apply_bindings(bindings, |binding| lookup(&binding.name))?;
        Ok(self)
    }

    /// Applies `path value path value ...` tokens as directives.
    ///
    /// Each value is parsed as a literal, falling back to the raw token.
    ///
    /// # Errors
    ///
    /// [`SchemaError::OddRemainder`] when a path has no value, plus any
    /// directive failure unless `options` ignores them.
    pub fn merge_from_remainder<S: AsRef<str>>(&mut self, tokens: &[S], options: DirectiveOptions) -> Result<&mut Self> {
        if tokens.len() % 2 != 0 {
            return Err(SchemaError::OddRemainder(tokens.len()));
        }
        let directives: Vec<(&str, Value)> = tokens
            .chunks_exact(2)
            .map(|pair| {
                let raw = pair[1].as_ref();
                let value = parse_literal(raw).unwrap_or_else(|| Value::from(raw));
                (pair[0].as_ref(), value)
            })
            .collect();
        self.merge_from_directives(directives, options)
    }
}
