//! JSONPath-style location strings (`$.items[2].id`, `$['odd key']`).

/// Path of `key` under `parent`.
pub fn child_key(parent: &str, key: &str) -> String {
    let simple = !key.is_empty()
        && key
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if simple {
        format!("{parent}.{key}")
    } else {
        format!("{parent}['{}']", key.replace('\'', "\\'"))
    }
}

/// Path of element `index` under `parent`.
pub fn child_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Path matching every element under `parent`.
pub fn child_wildcard(parent: &str) -> String {
    format!("{parent}[*]")
}
