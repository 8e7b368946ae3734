//! Mutability-gated list values.
//!
//! List-valued leaves store their items in a [`ListProxy`]. Reading is always
//! allowed; mutation requires the proxy's `mutable` flag, and that flag can
//! only be switched by presenting the [`HostToken`] of the leaf that owns the
//! proxy. A proxy cloned out of a frozen tree therefore cannot be unlocked by
//! whoever holds the clone.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::error::{Result, SchemaError};
use crate::types::{Type, cast, fits};
use crate::Value;

#[derive(Debug)]
struct HostKey;

/// Capability held by a leaf node, proving it hosts a [`ListProxy`].
///
/// Every token is unique; a freshly created token never matches an existing
/// proxy.
#[derive(Debug)]
pub struct HostToken(Arc<HostKey>);

impl HostToken {
    pub fn new() -> Self {
        Self(Arc::new(HostKey))
    }
}

impl Default for HostToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed list whose mutation is gated by a host-controlled flag.
///
/// # Examples
///
/// ```
/// use config_tree_core::{SchemaNode, Template, Value};
///
/// let mut cfg = Template::new().field("ports", vec![80]).build().unwrap();
/// cfg.get_list_mut("ports").unwrap().push(443).unwrap();
/// assert_eq!(cfg.get("ports").unwrap().to_value(), Value::from(vec![80, 443]));
///
/// cfg.freeze().unwrap();
/// assert!(cfg.get_list_mut("ports").unwrap().push(8080).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ListProxy {
    items: Vec<Value>,
    ty: Type,
    mutable: bool,
    host: Weak<HostKey>,
}

impl ListProxy {
    pub(crate) fn new(items: Vec<Value>, ty: Type, mutable: bool, host: &HostToken) -> Self {
        Self {
            items,
            ty,
            mutable,
            host: Arc::downgrade(&host.0),
        }
    }

    /// Declared list type, e.g. `[float]`.
    pub fn list_type(&self) -> &Type {
        &self.ty
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Switches mutability on behalf of the hosting leaf.
    ///
    /// # Errors
    ///
    /// [`SchemaError::HostFreed`] when the hosting leaf no longer exists, and
    /// [`SchemaError::NotHost`] when `token` is not the host's token.
    pub fn set_mutable(&mut self, mutable: bool, token: &HostToken) -> Result<()> {
        let host = self.host.upgrade().ok_or(SchemaError::HostFreed)?;
        if !Arc::ptr_eq(&host, &token.0) {
            return Err(SchemaError::NotHost);
        }
        self.mutable = mutable;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(SchemaError::ImmutableList)
        }
    }

    fn checked_element(&self, action: &'static str, value: Value) -> Result<Value> {
        let mismatch = || SchemaError::ElementMismatch {
            action,
            value: value.to_string(),
            ty: self.ty.to_string(),
        };
        let elem = self.ty.element_type().ok_or_else(mismatch)?;
        if !fits(&value, elem) || matches!(value, Value::List(_) | Value::Map(_)) {
            return Err(mismatch());
        }
        cast(&value, elem).map_err(|_| mismatch())
    }

    /// Appends one element.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        self.ensure_mutable()?;
        let value = self.checked_element("append", value.into())?;
        self.items.push(value);
        Ok(())
    }

    /// Inserts one element; indices past the end append.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.ensure_mutable()?;
        let value = self.checked_element("insert", value.into())?;
        let index = index.min(self.items.len());
        self.items.insert(index, value);
        Ok(())
    }

    /// Appends every element, or none if any element does not fit.
    pub fn extend<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.ensure_mutable()?;
        let checked = values
            .into_iter()
            .map(|value| self.checked_element("extend", value.into()))
            .collect::<Result<Vec<_>>>()?;
        self.items.extend(checked);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Option<Value>> {
        self.ensure_mutable()?;
        Ok(self.items.pop())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.items.clear();
        Ok(())
    }

    pub fn reverse(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.items.reverse();
        Ok(())
    }

    /// New plain list of this list's items followed by `other`.
    pub fn concat(&self, other: &[Value]) -> Vec<Value> {
        self.items.iter().chain(other).cloned().collect()
    }

    /// Plain copy of the items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.clone()
    }
}

impl Deref for ListProxy {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a ListProxy {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl PartialEq for ListProxy {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl PartialEq<Vec<Value>> for ListProxy {
    fn eq(&self, other: &Vec<Value>) -> bool {
        &self.items == other
    }
}

impl PartialEq<[Value]> for ListProxy {
    fn eq(&self, other: &[Value]) -> bool {
        self.items.as_slice() == other
    }
}

impl fmt::Display for ListProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_list(token: &HostToken, mutable: bool) -> ListProxy {
        ListProxy::new(vec![Value::Float(0.0)], Type::list(Type::Float), mutable, token)
    }

    #[test]
    fn test_mutation_checks_element_type() {
        let token = HostToken::new();
        let mut list = float_list(&token, true);
        list.push(1).unwrap();
        list.insert(0, -1.0).unwrap();
        assert_eq!(list, vec![Value::Float(-1.0), Value::Float(0.0), Value::Float(1.0)]);

        let err = list.push("x").unwrap_err();
        assert!(matches!(err, SchemaError::ElementMismatch { action: "append", .. }));
        assert!(list.extend(vec![Value::Float(2.0), Value::Bool(true)]).is_err());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_immutable_list_rejects_mutation_but_allows_reads() {
        let token = HostToken::new();
        let mut list = float_list(&token, false);
        assert_eq!(list.push(1.0), Err(SchemaError::ImmutableList));
        assert_eq!(list.clear(), Err(SchemaError::ImmutableList));
        assert_eq!(list.pop(), Err(SchemaError::ImmutableList));
        assert_eq!(list[0], Value::Float(0.0));
        assert_eq!(list.iter().count(), 1);
        assert_eq!(list.concat(&[Value::Float(1.0)]).len(), 2);
        assert_eq!(list.to_string(), "[0.0]");
    }

    #[test]
    fn test_set_mutable_requires_host_token() {
        let token = HostToken::new();
        let mut list = float_list(&token, false);
        assert_eq!(list.set_mutable(true, &HostToken::new()), Err(SchemaError::NotHost));
        assert!(!list.is_mutable());

        list.set_mutable(true, &token).unwrap();
        assert!(list.is_mutable());

        drop(token);
        assert_eq!(
            list.set_mutable(false, &HostToken::new()),
            Err(SchemaError::HostFreed)
        );
    }
}
