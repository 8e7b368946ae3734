//! Error types for schema tree operations.
//!
//! A single [`SchemaError`] covers declaration, freeze-time, mutation,
//! directive and casting failures. Callers that need to branch (for example
//! to ignore read-only violations while applying a batch of directives) use
//! [`SchemaError::kind`] rather than matching every variant.

use thiserror::Error;

/// Coarse classification of a [`SchemaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid type, default, annotation or entry name at construction time.
    Declaration,
    /// Broken or cyclic alias detected while freezing.
    Alias,
    /// Write to a read-only entry, or extra keys on a read-only container.
    ReadOnly,
    /// Value does not fit the declared type.
    TypeMismatch,
    /// List mutability toggled from outside its hosting leaf.
    Ownership,
    /// Dotted path segment is not an identifier.
    InvalidPath,
    /// Entry does not exist.
    NotFound,
    /// Value cannot be cast into the target type.
    Cast,
    /// Singleton template misuse.
    Singleton,
}

/// Errors raised by schema trees, list proxies, directives and templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Type outside the acceptable set.
    #[error("unsupported type {0}")]
    UnacceptableType(String),

    /// A leaf was declared with neither a default nor a type.
    #[error("at least one of type or default must be provided")]
    MissingTypeAndDefault,

    /// Default value does not fit the declared type.
    #[error("value {value} is incompatible with type {ty}")]
    IncompatibleDefault { value: String, ty: String },

    /// Type annotation could not be parsed.
    #[error("cannot parse annotation {0}")]
    MalformedAnnotation(String),

    /// Entry or alias name is not a valid identifier.
    #[error("{0:?} is not a valid identifier")]
    InvalidIdentifier(String),

    /// Entry name collides with an operation of the node itself.
    #[error("cannot use reserved name {0:?} as entry")]
    ReservedName(String),

    /// Entry name already used in the same container.
    #[error("entry name {0:?} already exists")]
    DuplicateEntry(String),

    /// Alias names that also exist as direct entries.
    #[error("aliases {0} duplicated with existing entries")]
    AliasShadowsEntry(String),

    /// Alias chain ends at a name that is neither alias nor entry.
    #[error("broken alias {0} (not an entry)")]
    BrokenAlias(String),

    /// Alias chain revisits a name.
    #[error("cyclic alias {0}")]
    CyclicAlias(String),

    /// Operation not allowed in the node's current freeze state.
    #[error("cannot {action} {when} the node is frozen")]
    FrozenState { action: String, when: &'static str },

    /// Operation requires the other node kind.
    #[error("cannot {action} on {kind} node")]
    WrongNodeKind { action: String, kind: &'static str },

    /// Write to a frozen entry that is not writable.
    #[error("cannot update read-only entry {path:?}")]
    ReadOnly { path: String },

    /// New keys merged into a frozen-shape container that is not writable.
    #[error("adding extra entries {entries} to read-only container {path:?} is forbidden")]
    ExtraEntries { entries: String, path: String },

    /// Entry lookup failed.
    #[error("entry {name:?} not found on container {path:?}")]
    EntryNotFound { name: String, path: String },

    /// Value does not fit the declared type of a leaf.
    #[error("cannot update {ty} type entry {path:?} with value {value}")]
    TypeMismatch {
        path: String,
        ty: String,
        value: String,
    },

    /// Container update with a non-mapping value.
    #[error("expect a mapping for container entry {path:?}, got {value}")]
    ExpectedMapping { path: String, value: String },

    /// Type of a raw value cannot be inferred.
    #[error("cannot infer type for {0}")]
    Uninferable(String),

    /// Element does not fit a list's element type.
    #[error("cannot {action} {value} to {ty} type list")]
    ElementMismatch {
        action: &'static str,
        value: String,
        ty: String,
    },

    /// Mutation on a list whose mutability is switched off.
    #[error("cannot perform this action on immutable list")]
    ImmutableList,

    /// Mutability toggle on a list whose hosting leaf was dropped.
    #[error("host has been freed")]
    HostFreed,

    /// Mutability toggle with a token that does not belong to the host.
    #[error("mutability must be switched from within the hosting node")]
    NotHost,

    /// Directive path segment is not an identifier.
    #[error("invalid directive {0:?}")]
    InvalidDirective(String),

    /// Directive path does not resolve to an entry.
    #[error("{0:?} not found")]
    DirectiveNotFound(String),

    /// Append or prepend directive on a non-list leaf.
    #[error("cannot apply {directive:?} on {ty} type entry")]
    NotAList { directive: String, ty: String },

    /// Remainder token list with a dangling path.
    #[error("expect remainder to have an even number of elements, got {0}")]
    OddRemainder(usize),

    /// Value cannot be cast into the target type.
    #[error("cannot cast {value} into {ty}")]
    Cast { value: String, ty: String },

    /// Singleton template requested while it is being constructed.
    #[error("singleton is already being constructed")]
    SingletonReentrant,

    /// Singleton state lock was poisoned by a panic during construction.
    #[error("singleton state is poisoned")]
    SingletonPoisoned,
}

impl SchemaError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        use SchemaError::*;
        match self {
            UnacceptableType(_)
            | MissingTypeAndDefault
            | IncompatibleDefault { .. }
            | MalformedAnnotation(_)
            | InvalidIdentifier(_)
            | ReservedName(_)
            | DuplicateEntry(_)
            | FrozenState { .. }
            | WrongNodeKind { .. } => ErrorKind::Declaration,
            AliasShadowsEntry(_) | BrokenAlias(_) | CyclicAlias(_) => ErrorKind::Alias,
            ReadOnly { .. } | ExtraEntries { .. } | ImmutableList => ErrorKind::ReadOnly,
            TypeMismatch { .. }
            | ExpectedMapping { .. }
            | Uninferable(_)
            | ElementMismatch { .. }
            | NotAList { .. } => ErrorKind::TypeMismatch,
            HostFreed | NotHost => ErrorKind::Ownership,
            InvalidDirective(_) | OddRemainder(_) => ErrorKind::InvalidPath,
            EntryNotFound { .. } | DirectiveNotFound(_) => ErrorKind::NotFound,
            Cast { .. } => ErrorKind::Cast,
            SingletonReentrant | SingletonPoisoned => ErrorKind::Singleton,
        }
    }

    /// Returns `true` for read-only violations.
    pub fn is_read_only(&self) -> bool {
        self.kind() == ErrorKind::ReadOnly
    }

    /// Returns `true` for type mismatches.
    pub fn is_type_error(&self) -> bool {
        self.kind() == ErrorKind::TypeMismatch
    }

    /// Returns `true` for missing entries.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
