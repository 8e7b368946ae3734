//! Declarative tree templates.
//!
//! A [`Template`] lists fields with defaults and annotations, nested
//! templates and aliases, and builds fresh [`SchemaNode`] trees from them.
//! Annotations are attribute strings whose first element may be a type:
//! `["float?", "env:FOO2"]`, `["w"]`, `["[int]"]`.
//!
//! # Examples
//!
//! ```
//! use config_tree_core::{Template, Type, Value};
//!
//! let server = Template::new()
//!     .field("host", "localhost")
//!     .field_with("port", 8080, ["int", "env:PORT"])
//!     .declare("tags", ["[str]", "w"])
//!     .alias("listen_port", "port");
//!
//! let cfg = Template::new().nested("server", server).build()?;
//! assert_eq!(cfg.lookup("server.listen_port")?.to_value(), Value::Int(8080));
//! assert_eq!(
//!     cfg.lookup("server.tags")?.as_list().map(|list| list.list_type().clone()),
//!     Some(Type::list(Type::Str))
//! );
//! # Ok::<(), config_tree_core::SchemaError>(())
//! ```

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::node::{Attributes, SchemaNode};
use crate::types::Type;
use crate::Value;

/// A parsed field annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub ty: Option<Type>,
    pub attributes: Attributes,
}

impl Annotation {
    /// Parses annotation strings.
    ///
    /// The first string is taken as a type when it looks like one; every
    /// other string must be an attribute.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnacceptableType`] for well-formed but unsupported
    /// types like `[[int]]`, [`SchemaError::MalformedAnnotation`] for
    /// anything else that is neither a type nor an attribute.
    pub fn parse<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<S> = items.into_iter().collect();
        let (ty, rest) = match items.split_first() {
            Some((first, rest)) => match first.as_ref().parse::<Type>() {
                Ok(ty) => (Some(ty), rest),
                Err(err @ SchemaError::UnacceptableType(_)) => return Err(err),
                Err(_) => (None, items.as_slice()),
            },
            None => (None, items.as_slice()),
        };
        Ok(Self {
            ty,
            attributes: Attributes::parse(rest)?,
        })
    }
}

#[derive(Debug, Clone)]
enum Field {
    Default {
        value: Value,
        annotation: Vec<String>,
    },
    Declared {
        annotation: Vec<String>,
    },
    Nested(Template),
}

#[derive(Debug, Default)]
enum SingletonState {
    #[default]
    Empty,
    Building,
    Ready(Arc<Mutex<SchemaNode>>),
}

/// Builder for schema trees.
///
/// Clones share singleton state, so a cloned singleton template still hands
/// out the same instance.
#[derive(Debug, Clone, Default)]
pub struct Template {
    fields: Vec<(String, Field)>,
    aliases: Vec<(String, String)>,
    writable: bool,
    singleton: Option<Arc<Mutex<SingletonState>>>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field whose type is inferred from `default`.
    ///
    /// Mapping defaults become nested containers.
    pub fn field(self, name: &str, default: impl Into<Value>) -> Self {
        self.field_with(name, default, Vec::<String>::new())
    }

    /// Adds a field with a default and an annotation.
    pub fn field_with<I, S>(mut self, name: &str, default: impl Into<Value>, annotation: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.push((
            name.to_string(),
            Field::Default {
                value: default.into(),
                annotation: collect_strings(annotation),
            },
        ));
        self
    }

    /// Adds a field with a type annotation only; the default is the type's
    /// zero value.
    pub fn declare<I, S>(mut self, name: &str, annotation: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields.push((
            name.to_string(),
            Field::Declared {
                annotation: collect_strings(annotation),
            },
        ));
        self
    }

    pub fn nested(mut self, name: &str, template: Template) -> Self {
        self.fields.push((name.to_string(), Field::Nested(template)));
        self
    }

    pub fn alias(mut self, name: &str, target: &str) -> Self {
        self.aliases.push((name.to_string(), target.to_string()));
        self
    }

    /// Makes the built container writable.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Makes [`instance`](Self::instance) hand out one shared tree.
    pub fn singleton(mut self) -> Self {
        self.singleton = Some(Arc::new(Mutex::new(SingletonState::Empty)));
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton.is_some()
    }

    /// Builds a fresh, unfrozen tree.
    ///
    /// # Errors
    ///
    /// Any declaration error of a field, such as a malformed annotation, a
    /// default that does not fit its type, or an invalid name.
    pub fn build(&self) -> Result<SchemaNode> {
        let attributes = if self.writable {
            Attributes::writable()
        } else {
            Attributes::default()
        };
        let mut node = SchemaNode::container_with(attributes);
        for (name, field) in &self.fields {
            let child = match field {
                Field::Default { value, annotation } => {
                    let Annotation { ty, attributes } = Annotation::parse(annotation)?;
                    match (value, ty) {
                        (Value::Map(_), None) => SchemaNode::from_primitive(value.clone(), attributes)?,
                        (value, ty) => SchemaNode::leaf(Some(value.clone()), ty, attributes)?,
                    }
                }
                Field::Declared { annotation } => {
                    let Annotation { ty, attributes } = Annotation::parse(annotation)?;
                    if ty.is_none() {
                        return Err(SchemaError::MissingTypeAndDefault);
                    }
                    SchemaNode::leaf(None, ty, attributes)?
                }
                Field::Nested(template) => template.build()?,
            };
            node.insert_entry(name, child)?;
        }
        for (name, target) in &self.aliases {
            node.insert_alias(name, target)?;
        }
        Ok(node)
    }

    /// Returns a shared tree.
    ///
    /// Singleton templates build on first use and return the same tree on
    /// every later call. Other templates return a fresh tree each time.
    ///
    /// # Errors
    ///
    /// [`SchemaError::SingletonReentrant`] when this singleton is still
    /// being built, [`SchemaError::SingletonPoisoned`] when a previous build
    /// panicked, plus any [`build`](Self::build) error.
    pub fn instance(&self) -> Result<Arc<Mutex<SchemaNode>>> {
        let Some(state) = &self.singleton else {
            return Ok(Arc::new(Mutex::new(self.build()?)));
        };

        {
            let mut guard = state.lock().map_err(|_| SchemaError::SingletonPoisoned)?;
            match &*guard {
                SingletonState::Ready(shared) => return Ok(Arc::clone(shared)),
                SingletonState::Building => return Err(SchemaError::SingletonReentrant),
                SingletonState::Empty => *guard = SingletonState::Building,
            }
        }

        let built = self.build();
        let mut guard = state.lock().map_err(|_| SchemaError::SingletonPoisoned)?;
        match built {
            Ok(node) => {
                let shared = Arc::new(Mutex::new(node));
                *guard = SingletonState::Ready(Arc::clone(&shared));
                debug!(entries = self.fields.len(), "constructed singleton schema");
                Ok(shared)
            }
            Err(err) => {
                *guard = SingletonState::Empty;
                Err(err)
            }
        }
    }
}

fn collect_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}
