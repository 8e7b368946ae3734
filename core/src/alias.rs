//! Alias tables of containers.
//!
//! Aliases map a name to another alias or to an entry. Lookups follow the
//! chain lazily; freezing resolves every alias to its concrete entry up front
//! and rejects shadowed, broken and cyclic chains.

use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};

/// Follows aliases from `name` to an entry key.
///
/// Returns `None` for unknown names, broken chains and cycles.
pub(crate) fn resolve<'a, V>(
    entries: &'a BTreeMap<String, V>,
    aliases: &'a BTreeMap<String, String>,
    name: &str,
) -> Option<&'a str> {
    if let Some((key, _)) = entries.get_key_value(name) {
        return Some(key);
    }
    let mut ptr = aliases.get(name)?;
    for _ in 0..=aliases.len() {
        if let Some((key, _)) = entries.get_key_value(ptr.as_str()) {
            return Some(key);
        }
        ptr = aliases.get(ptr)?;
    }
    None
}

/// Resolves every alias to the entry its chain ends at.
///
/// # Errors
///
/// [`SchemaError::AliasShadowsEntry`] when an alias name is also an entry,
/// [`SchemaError::BrokenAlias`] when a chain ends at an unknown name and
/// [`SchemaError::CyclicAlias`] when a chain revisits a name.
pub(crate) fn resolve_all<V>(
    entries: &BTreeMap<String, V>,
    aliases: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let shadowed: Vec<String> = aliases
        .keys()
        .filter(|name| entries.contains_key(*name))
        .map(|name| format!("{name:?}"))
        .collect();
    if !shadowed.is_empty() {
        return Err(SchemaError::AliasShadowsEntry(shadowed.join(", ")));
    }

    let mut resolved = BTreeMap::new();
    for (name, target) in aliases {
        let mut visited = vec![name.as_str(), target.as_str()];
        let mut ptr = target.as_str();
        while !entries.contains_key(ptr) {
            let Some(next) = aliases.get(ptr) else {
                return Err(SchemaError::BrokenAlias(visited.join(" -> ")));
            };
            let revisits = visited.contains(&next.as_str());
            visited.push(next);
            if revisits {
                return Err(SchemaError::CyclicAlias(visited.join(" -> ")));
            }
            ptr = next;
        }
        resolved.insert(name.clone(), ptr.to_string());
    }
    Ok(resolved)
}
