//! Collision-safe file naming.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::ClientError;

/// Upper bound on rename probes for a single upload.
const MAX_SUFFIX_ATTEMPTS: usize = 10_000;

/// Returns `name` unchanged if it is free, otherwise the base name with the
/// smallest integer suffix (before the extension) that is not taken.
///
/// Given `{"a.txt"}`, `a.txt` resolves to `a1.txt`; given
/// `{"a.txt", "a1.txt"}` it resolves to `a2.txt`.
pub fn create_unique_name(name: &str, active: &HashSet<String>) -> Result<String, ClientError> {
    if !active.contains(name) {
        return Ok(name.to_string());
    }

    let (base, extension) = split_extension(name);
    for suffix in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}{suffix}{extension}");
        if !active.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(ClientError::Validation(format!(
        "no unique name found for {name} within {MAX_SUFFIX_ATTEMPTS} attempts"
    )))
}

/// Splits `name.ext` into (`name`, `.ext`). A leading dot is part of the
/// base name, not an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Set of names currently known to the client, shared between the transfer
/// engine and the event reconciler.
#[derive(Debug, Default)]
pub struct NameSet {
    names: RwLock<HashSet<String>>,
}

impl NameSet {
    /// Adds a name. Returns `false` if it was already present.
    pub fn insert(&self, name: &str) -> bool {
        self.names.write().unwrap().insert(name.to_string())
    }

    /// Removes a name. Returns `false` if it was not present.
    pub fn remove(&self, name: &str) -> bool {
        self.names.write().unwrap().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.read().unwrap().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().unwrap().is_empty()
    }

    /// Resolves a collision-free variant of `name` against the current set.
    pub fn resolve_unique(&self, name: &str) -> Result<String, ClientError> {
        let names = self.names.read().unwrap();
        create_unique_name(name, &names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn free_name_is_unchanged() {
        let active = set(&["other.txt"]);
        assert_eq!(create_unique_name("a.txt", &active).unwrap(), "a.txt");
    }

    #[test]
    fn first_collision_gets_suffix_one() {
        let active = set(&["a.txt"]);
        assert_eq!(create_unique_name("a.txt", &active).unwrap(), "a1.txt");
    }

    #[test]
    fn suffix_skips_taken_variants() {
        let active = set(&["a.txt", "a1.txt"]);
        assert_eq!(create_unique_name("a.txt", &active).unwrap(), "a2.txt");
    }

    #[test]
    fn suffix_goes_before_extension() {
        let active = set(&["report.tar.gz"]);
        assert_eq!(
            create_unique_name("report.tar.gz", &active).unwrap(),
            "report.tar1.gz"
        );
    }

    #[test]
    fn name_without_extension_gets_plain_suffix() {
        let active = set(&["Makefile"]);
        assert_eq!(create_unique_name("Makefile", &active).unwrap(), "Makefile1");
    }

    #[test]
    fn leading_dot_is_not_an_extension() {
        let active = set(&[".bashrc"]);
        assert_eq!(create_unique_name(".bashrc", &active).unwrap(), ".bashrc1");
    }

    #[test]
    fn attempt_cap_is_enforced() {
        let mut active = set(&["a.txt"]);
        for i in 1..=MAX_SUFFIX_ATTEMPTS {
            active.insert(format!("a{i}.txt"));
        }
        let result = create_unique_name("a.txt", &active);
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn name_set_insert_remove() {
        let names = NameSet::default();
        assert!(names.is_empty());
        assert!(names.insert("a.txt"));
        assert!(!names.insert("a.txt"));
        assert!(names.contains("a.txt"));
        assert_eq!(names.len(), 1);
        assert!(names.remove("a.txt"));
        assert!(!names.remove("a.txt"));
        assert!(names.is_empty());
    }

    #[test]
    fn name_set_resolves_against_contents() {
        let names = NameSet::default();
        names.insert("a.txt");
        assert_eq!(names.resolve_unique("a.txt").unwrap(), "a1.txt");
        assert_eq!(names.resolve_unique("b.txt").unwrap(), "b.txt");
    }
}
