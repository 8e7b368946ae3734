//! Type algebra for configuration values.
//!
//! The acceptable types form a small closed set: the four primitive kinds
//! (`int`, `float`, `bool`, `str`), a list of a primitive (optionally
//! nullable) kind, and an optional wrapping of either. This module infers
//! types from raw [`Value`]s, decides compatibility (with `int -> float`
//! widening), synthesizes defaults and casts values, including parsing
//! strings back into structured values.
//!
//! # Examples
//!
//! ```
//! use config_tree_core::{Type, Value, cast, compatible, infer};
//!
//! let ty: Type = "[int]?".parse().unwrap();
//! assert_eq!(ty, Type::optional(Type::list(Type::Int)));
//!
//! assert!(compatible(&Type::Int, &Type::Float));
//! assert!(!compatible(&Type::Float, &Type::Int));
//!
//! let inferred = infer(&Value::from(vec![1, 2]), false).unwrap();
//! assert_eq!(inferred.to_string(), "[int]");
//!
//! assert_eq!(cast(&Value::from("36"), &Type::Float), Ok(Value::Float(36.0)));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::literal::parse_literal;
use crate::Value;

/// A value type.
///
/// `Null` and `EmptyList` only come out of [`infer`]; they are never
/// acceptable as declared types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    List(Box<Type>),
    Optional(Box<Type>),
    /// Type of `None`.
    Null,
    /// Type of an empty sequence, compatible with every list type.
    EmptyList,
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    fn is_primitive(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool | Type::Str)
    }

    /// Returns `true` for types in the closed acceptable set.
    pub fn is_acceptable(&self) -> bool {
        match self {
            Type::Int | Type::Float | Type::Bool | Type::Str => true,
            Type::List(elem) => match elem.as_ref() {
                Type::Optional(inner) => inner.is_primitive(),
                other => other.is_primitive(),
            },
            Type::Optional(inner) => {
                !matches!(inner.as_ref(), Type::Optional(_)) && inner.is_acceptable()
            }
            Type::Null | Type::EmptyList => false,
        }
    }

    /// Fails with [`SchemaError::UnacceptableType`] outside the acceptable set.
    pub fn ensure_acceptable(&self) -> Result<()> {
        if self.is_acceptable() {
            Ok(())
        } else {
            Err(SchemaError::UnacceptableType(self.to_string()))
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// Returns `true` for list types, looking through one optional wrapper.
    pub fn is_list(&self) -> bool {
        matches!(self.unwrap_optional(), Type::List(_) | Type::EmptyList)
    }

    /// Strips an optional wrapper.
    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional(inner) => inner,
            other => other,
        }
    }

    /// Element type of a (possibly optional) list type.
    pub fn element_type(&self) -> Option<&Type> {
        match self.unwrap_optional() {
            Type::List(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::Str => f.write_str("str"),
            Type::List(elem) => write!(f, "[{elem}]"),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Null => f.write_str("None"),
            Type::EmptyList => f.write_str("[]"),
        }
    }
}

impl FromStr for Type {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let ty = parse_type(s.trim()).ok_or_else(|| SchemaError::MalformedAnnotation(s.to_string()))?;
        ty.ensure_acceptable()?;
        Ok(ty)
    }
}

fn parse_type(s: &str) -> Option<Type> {
    if let Some(inner) = s.strip_suffix('?') {
        return parse_type(inner.trim()).map(Type::optional);
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return parse_type(inner.trim()).map(Type::list);
    }
    match s {
        "int" => Some(Type::Int),
        "float" => Some(Type::Float),
        "bool" => Some(Type::Bool),
        "str" => Some(Type::Str),
        _ => None,
    }
}

impl TryFrom<String> for Type {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Type> for String {
    fn from(ty: Type) -> Self {
        ty.to_string()
    }
}

/// Returns `true` when every value of `t1` is also a value of `t2`.
pub fn compatible(t1: &Type, t2: &Type) -> bool {
    if t1 == t2 {
        return true;
    }
    match (t1, t2) {
        (Type::Null, other) => other.is_optional(),
        (Type::Int, Type::Float) => true,
        (Type::Optional(a), Type::Optional(b)) => compatible(a, b),
        (_, Type::Optional(inner)) => compatible(t1, inner),
        (Type::EmptyList, Type::List(_)) => true,
        (Type::List(a), Type::List(b)) => compatible(a, b),
        _ => false,
    }
}

/// Least common type of two list elements, if there is one.
fn join(t1: Type, t2: Type) -> Option<Type> {
    if t1 == t2 {
        return Some(t1);
    }
    match (t1, t2) {
        (Type::Int, Type::Float) | (Type::Float, Type::Int) => Some(Type::Float),
        (Type::Null, Type::Optional(inner)) | (Type::Optional(inner), Type::Null) => {
            Some(Type::Optional(inner))
        }
        (Type::Null, other) | (other, Type::Null) => Some(Type::optional(other)),
        (Type::Optional(a), Type::Optional(b)) => join(*a, *b).map(Type::optional),
        (Type::Optional(a), other) | (other, Type::Optional(a)) => {
            join(*a, other).map(Type::optional)
        }
        _ => None,
    }
}

/// Infers the type of a raw value.
///
/// Sequences infer `[elem]` where `elem` is the widened common type of all
/// elements. An empty sequence infers [`Type::EmptyList`] only when
/// `allow_empty_list` is set.
///
/// # Errors
///
/// Returns [`SchemaError::Uninferable`] for mappings, nested or empty
/// sequences (unless allowed) and heterogeneous elements.
pub fn infer(value: &Value, allow_empty_list: bool) -> Result<Type> {
    match value {
        Value::Null => Ok(Type::Null),
        Value::Bool(_) => Ok(Type::Bool),
        Value::Int(_) => Ok(Type::Int),
        Value::Float(_) => Ok(Type::Float),
        Value::Str(_) => Ok(Type::Str),
        Value::List(items) if items.is_empty() => {
            if allow_empty_list {
                Ok(Type::EmptyList)
            } else {
                Err(SchemaError::Uninferable(value.to_string()))
            }
        }
        Value::List(items) => {
            let mut elem: Option<Type> = None;
            for item in items {
                if matches!(item, Value::List(_) | Value::Map(_)) {
                    return Err(SchemaError::Uninferable(value.to_string()));
                }
                let item_type = infer(item, false)?;
                elem = match elem {
                    None => Some(item_type),
                    Some(prev) => Some(
                        join(prev, item_type)
                            .ok_or_else(|| SchemaError::Uninferable(value.to_string()))?,
                    ),
                };
            }
            match elem {
                Some(Type::Null) | None => Err(SchemaError::Uninferable(value.to_string())),
                Some(elem) => Ok(Type::list(elem)),
            }
        }
        Value::Map(_) => Err(SchemaError::Uninferable(value.to_string())),
    }
}

/// Returns `true` when `value` can be stored in a `ty` typed leaf as is.
pub fn fits(value: &Value, ty: &Type) -> bool {
    infer(value, true).is_ok_and(|inferred| compatible(&inferred, ty))
}

/// Zero value of a type: `None` for optionals, empty list for lists.
pub fn default_value(ty: &Type) -> Value {
    match ty {
        Type::Optional(_) | Type::Null => Value::Null,
        Type::List(_) | Type::EmptyList => Value::List(Vec::new()),
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Bool => Value::Bool(false),
        Type::Str => Value::Str(String::new()),
    }
}

/// Failed cast marker.
///
/// Returned instead of an error so callers can chain fallback attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed;

/// Casts `value` into `ty`.
///
/// Compatible values are widened (never narrowed). Strings that do not fit
/// are parsed with [`parse_literal`](crate::parse_literal) and retried; when
/// that also fails and the target is (optional) `str`, the original string
/// is kept.
pub fn cast(value: &Value, ty: &Type) -> std::result::Result<Value, Malformed> {
    if fits(value, ty) {
        return Ok(widen(value, ty));
    }
    let Value::Str(text) = value else {
        return Err(Malformed);
    };
    match parse_literal(text).map(|parsed| cast(&parsed, ty)) {
        Some(Ok(casted)) => Ok(casted),
        _ if *ty.unwrap_optional() == Type::Str => Ok(value.clone()),
        _ => Err(Malformed),
    }
}

/// Like [`cast`], reporting the value and rendered type on failure.
pub fn cast_or_err(value: &Value, ty: &Type) -> Result<Value> {
    cast(value, ty).map_err(|Malformed| SchemaError::Cast {
        value: value.to_string(),
        ty: ty.to_string(),
    })
}

fn widen(value: &Value, ty: &Type) -> Value {
    match (value, ty) {
        (Value::Null, _) => Value::Null,
        (_, Type::Optional(inner)) => widen(value, inner),
        (Value::List(items), Type::List(elem)) => {
            Value::List(items.iter().map(|item| widen(item, elem)).collect())
        }
        (Value::Int(i), Type::Float) => Value::Float(*i as f64),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_acceptable() -> Vec<Type> {
        let prims = [Type::Int, Type::Float, Type::Bool, Type::Str];
        let mut out: Vec<Type> = prims.to_vec();
        out.extend(prims.iter().cloned().map(Type::optional));
        let elems = out.clone();
        out.extend(elems.into_iter().map(Type::list));
        let lists: Vec<Type> = out[8..].to_vec();
        out.extend(lists.into_iter().map(Type::optional));
        out
    }

    #[test]
    fn test_acceptable_set() {
        for ty in all_acceptable() {
            assert!(ty.is_acceptable(), "{ty} should be acceptable");
        }
        assert!(!Type::list(Type::list(Type::Int)).is_acceptable());
        assert!(!Type::optional(Type::optional(Type::Int)).is_acceptable());
        assert!(!Type::list(Type::optional(Type::list(Type::Int))).is_acceptable());
        assert!(!Type::Null.is_acceptable());
        assert!(!Type::EmptyList.is_acceptable());
    }

    #[test]
    fn test_compatible_is_reflexive_with_widening() {
        for ty in all_acceptable() {
            assert!(compatible(&ty, &ty));
        }
        assert!(compatible(&Type::Int, &Type::Float));
        assert!(!compatible(&Type::Float, &Type::Int));
        assert!(!compatible(&Type::Bool, &Type::Int));
        assert!(compatible(&Type::Int, &Type::optional(Type::Float)));
        assert!(compatible(&Type::Null, &Type::optional(Type::Str)));
        assert!(!compatible(&Type::Null, &Type::Str));
        assert!(compatible(&Type::list(Type::Int), &Type::list(Type::Float)));
        assert!(!compatible(&Type::list(Type::Float), &Type::list(Type::Int)));
        assert!(compatible(&Type::EmptyList, &Type::list(Type::Bool)));
        assert!(compatible(
            &Type::list(Type::optional(Type::Int)),
            &Type::list(Type::optional(Type::Float))
        ));
    }

    #[test]
    fn test_infer() {
        assert_eq!(infer(&Value::Bool(true), false), Ok(Type::Bool));
        assert_eq!(
            infer(&Value::List(vec![Value::Float(1.0), Value::Int(2)]), false),
            Ok(Type::list(Type::Float))
        );
        assert_eq!(
            infer(&Value::List(vec![Value::Int(1), Value::Null]), false),
            Ok(Type::list(Type::optional(Type::Int)))
        );
        assert!(infer(&Value::List(vec![]), false).is_err());
        assert_eq!(infer(&Value::List(vec![]), true), Ok(Type::EmptyList));
        assert!(infer(&Value::List(vec![Value::Int(1), Value::from("a")]), false).is_err());
        assert!(infer(&Value::List(vec![Value::Int(1), Value::Bool(true)]), false).is_err());
        assert!(infer(&Value::List(vec![Value::Null]), false).is_err());
        assert!(infer(&Value::List(vec![Value::from(vec![1])]), false).is_err());
        assert!(infer(&Value::map(), false).is_err());
    }

    #[test]
    fn test_render_and_parse() {
        let ty = Type::optional(Type::list(Type::Int));
        assert_eq!(ty.to_string(), "[int]?");
        assert_eq!("[int]?".parse::<Type>(), Ok(ty));
        assert_eq!(
            "[str?]".parse::<Type>(),
            Ok(Type::list(Type::optional(Type::Str)))
        );
        assert!(matches!(
            "[[int]]".parse::<Type>(),
            Err(SchemaError::UnacceptableType(_))
        ));
        assert!(matches!(
            "dict".parse::<Type>(),
            Err(SchemaError::MalformedAnnotation(_))
        ));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_value(&Type::Int), Value::Int(0));
        assert_eq!(default_value(&Type::Float), Value::Float(0.0));
        assert_eq!(default_value(&Type::Str), Value::from(""));
        assert_eq!(default_value(&Type::Bool), Value::Bool(false));
        assert_eq!(default_value(&Type::list(Type::Int)), Value::List(vec![]));
        assert_eq!(default_value(&Type::optional(Type::Int)), Value::Null);
    }

    #[test]
    fn test_cast_is_identity_on_compatible_values() {
        let cases = [
            (Value::Int(3), Type::Int),
            (Value::from("x"), Type::Str),
            (Value::Bool(false), Type::Bool),
            (Value::from(vec![1, 2]), Type::list(Type::Int)),
            (Value::Null, Type::optional(Type::Float)),
        ];
        for (value, ty) in cases {
            assert_eq!(cast(&value, &ty), Ok(value.clone()));
        }
        assert_eq!(cast(&Value::Int(3), &Type::Float), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_cast_parses_strings() {
        assert_eq!(cast(&Value::from("36"), &Type::optional(Type::Float)), Ok(Value::Float(36.0)));
        assert_eq!(
            cast(&Value::from("[1]"), &Type::list(Type::Float)),
            Ok(Value::from(vec![1.0]))
        );
        assert_eq!(cast(&Value::from("None"), &Type::optional(Type::Int)), Ok(Value::Null));
        assert_eq!(cast(&Value::from("True"), &Type::Bool), Ok(Value::Bool(true)));
        assert_eq!(cast(&Value::from("abc"), &Type::Int), Err(Malformed));
        assert_eq!(cast(&Value::from("1.5"), &Type::Int), Err(Malformed));
        assert_eq!(cast(&Value::Float(1.5), &Type::Int), Err(Malformed));
        assert_eq!(cast(&Value::Int(1), &Type::Bool), Err(Malformed));
    }

    #[test]
    fn test_cast_error_reports_value_and_type() {
        let err = cast_or_err(&Value::from("abc"), &Type::optional(Type::list(Type::Int))).unwrap_err();
        assert_eq!(err.to_string(), "cannot cast 'abc' into [int]?");
    }
}
