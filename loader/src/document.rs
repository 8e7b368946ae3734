//! Configuration documents with base inheritance.
//!
//! A document is a YAML (or, by `.json` extension, JSON) mapping. When its
//! root contains the reserved [`BASE_KEY`], the referenced document is loaded
//! first and the current one is deep-merged on top of it. Base paths are
//! resolved against the including document's directory; a leading `~/`
//! expands to the home directory.
//!
//! Cyclic base chains are not detected.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use config_tree_core::Value;
use tracing::debug;

use crate::error::{LoadError, Result};

/// Root key naming the document to inherit from.
pub const BASE_KEY: &str = "_BASE_";

/// Loads a document, resolving its base chain.
///
/// An empty document loads as an empty mapping.
///
/// # Errors
///
/// I/O and parse failures, a root that is not a mapping, non-string keys,
/// and [`LoadError::CannotInherit`] when the document puts a mapping over a
/// base value that is not one.
pub fn load_yaml_with_base(path: impl AsRef<Path>) -> Result<Value> {
    load_mapping(&expand_home(path.as_ref())).map(Value::Map)
}

fn load_mapping(path: &Path) -> Result<BTreeMap<String, Value>> {
    let text = std::fs::read_to_string(path)?;
    let mut document = match parse_document(&text, path)? {
        Value::Map(map) => map,
        Value::Null => BTreeMap::new(),
        _ => return Err(LoadError::NotAMapping(path.to_path_buf())),
    };
    debug!(path = %path.display(), entries = document.len(), "loaded configuration document");

    let Some(base) = document.remove(BASE_KEY) else {
        return Ok(document);
    };
    let Value::Str(base) = base else {
        return Err(LoadError::InvalidBase(path.to_path_buf()));
    };
    let mut base_path = expand_home(Path::new(&base));
    if base_path.is_relative() {
        if let Some(parent) = path.parent() {
            base_path = parent.join(base_path);
        }
    }
    debug!(path = %path.display(), base = %base_path.display(), "inheriting base document");

    let mut merged = load_mapping(&base_path)?;
    deep_merge(document, &mut merged)?;
    Ok(merged)
}

fn parse_document(text: &str, path: &Path) -> Result<Value> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let json: serde_json::Value = serde_json::from_str(text)?;
        return Ok(Value::from(json));
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    from_yaml(yaml, path)
}

/// Converts a YAML value, ignoring tags.
fn from_yaml(yaml: serde_yaml::Value, path: &Path) -> Result<Value> {
    Ok(match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => Value::Str(s),
        serde_yaml::Value::Sequence(items) => Value::List(
            items
                .into_iter()
                .map(|item| from_yaml(item, path))
                .collect::<Result<_>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, value) in mapping {
                let serde_yaml::Value::String(key) = key else {
                    return Err(LoadError::NonStringKey {
                        key: serde_yaml::to_string(&key)?.trim_end().to_string(),
                        path: path.to_path_buf(),
                    });
                };
                map.insert(key, from_yaml(value, path)?);
            }
            Value::Map(map)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value, path)?,
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Deep-merges `overlay` into `base`.
///
/// Nested mappings merge key-wise; any other overlay value replaces the base
/// value.
///
/// # Errors
///
/// [`LoadError::CannotInherit`] when a mapping would replace a base value
/// that is not a mapping.
pub fn deep_merge(overlay: BTreeMap<String, Value>, base: &mut BTreeMap<String, Value>) -> Result<()> {
    for (key, value) in overlay {
        match (value, base.get_mut(&key)) {
            (Value::Map(nested), Some(Value::Map(target))) => deep_merge(nested, target)?,
            (Value::Map(_), Some(_)) => return Err(LoadError::CannotInherit(key)),
            (value, _) => {
                base.insert(key, value);
            }
        }
    }
    Ok(())
}

/// Writes `value` as block-style YAML.
pub fn dump_yaml<W: Write>(value: &Value, writer: W) -> Result<()> {
    serde_yaml::to_writer(writer, value)?;
    Ok(())
}

/// Writes `value` as YAML to a file, replacing it if it exists.
pub fn dump_yaml_to_path(value: &Value, path: impl AsRef<Path>) -> Result<()> {
    let path = expand_home(path.as_ref());
    let mut writer = BufWriter::new(File::create(&path)?);
    dump_yaml(value, &mut writer)?;
    writer.flush()?;
    debug!(path = %path.display(), "dumped configuration document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Value> {
        parse_document(text, Path::new("test.yaml"))
    }

    fn map(value: Value) -> BTreeMap<String, Value> {
        match value {
            Value::Map(map) => map,
            other => panic!("expected mapping, got {other}"),
        }
    }

    #[test]
    fn test_parse_scalars_and_nesting() {
        let value = parse("a: 1\nb: 1.5\nc: [x, true, null]\nd:\n  e: str\n").unwrap();
        assert_eq!(
            value,
            Value::map_of([
                ("a", Value::Int(1)),
                ("b", Value::Float(1.5)),
                (
                    "c",
                    Value::List(vec![Value::from("x"), Value::Bool(true), Value::Null])
                ),
                ("d", Value::map_of([("e", "str")])),
            ])
        );
    }

    #[test]
    fn test_parse_ignores_tags() {
        assert_eq!(parse("a: !custom 3\n").unwrap(), Value::map_of([("a", 3)]));
    }

    #[test]
    fn test_parse_rejects_non_string_keys() {
        let err = parse("1: a\n").unwrap_err();
        assert!(matches!(err, LoadError::NonStringKey { ref key, .. } if key == "1"));
    }

    #[test]
    fn test_parse_json_by_extension() {
        let value = parse_document(r#"{"a": [1, 2.5]}"#, Path::new("cfg.json")).unwrap();
        assert_eq!(
            value,
            Value::map_of([("a", Value::List(vec![Value::Int(1), Value::Float(2.5)]))])
        );
    }

    #[test]
    fn test_deep_merge_overrides_and_recurses() {
        let mut base = map(parse("a: 1\nsub:\n  x: 1\n  y: [1]\nother: {k: v}\n").unwrap());
        let overlay = map(parse("a: 2\nsub:\n  y: [2, 3]\nnew: true\nother: replaced\n").unwrap());
        deep_merge(overlay, &mut base).unwrap();
        assert_eq!(
            Value::Map(base),
            parse("a: 2\nsub:\n  x: 1\n  y: [2, 3]\nnew: true\nother: replaced\n").unwrap()
        );
    }

    #[test]
    fn test_deep_merge_rejects_mapping_over_scalar() {
        let mut base = map(parse("a: 1\n").unwrap());
        let err = deep_merge(map(parse("a: {b: 2}\n").unwrap()), &mut base).unwrap_err();
        assert_eq!(err.to_string(), "cannot inherit key \"a\" from base");
    }

    #[test]
    fn test_expand_home() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        assert_eq!(expand_home(Path::new("~/cfg.yaml")), PathBuf::from(home).join("cfg.yaml"));
        assert_eq!(expand_home(Path::new("cfg.yaml")), PathBuf::from("cfg.yaml"));
    }
}
