// content-index/src/diff.rs

use serde::Serialize;
use std::path::PathBuf;
use crate::store::Mapping;


/// What changed between two builds, keyed by fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingDiff {
    /// Fingerprints only in the new mapping.
    pub added: Vec<String>,
    /// Fingerprints only in the old mapping.
    pub removed: Vec<String>,
    /// Same content, new location.
    pub moved: Vec<Moved>,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Moved {
    pub fingerprint: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl MappingDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}

/// Compare two mappings. Output lists are sorted so diffs are reproducible.
pub fn diff_mappings(old: &Mapping, new: &Mapping) -> MappingDiff {
    let mut d = MappingDiff::default();

    for (fp, new_path) in new {
        match old.get(fp) {
            None => d.added.push(fp.clone()),
            Some(old_path) if old_path != new_path => d.moved.push(Moved {
                fingerprint: fp.clone(),
                from: old_path.clone(),
                to: new_path.clone(),
            }),
            Some(_) => d.unchanged += 1,
        }
    }
    d.removed = old.keys().filter(|fp| !new.contains_key(*fp)).cloned().collect();

    d.added.sort_unstable();
    d.removed.sort_unstable();
    d.moved.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pairs: &[(&str, &str)]) -> Mapping {
        pairs.iter().map(|(k, v)| (k.to_string(), PathBuf::from(v))).collect()
    }

    #[test]
    fn classifies_changes() {
        let old = m(&[("a", "/i/a.jpg"), ("b", "/i/b.jpg"), ("c", "/i/c.jpg")]);
        let new = m(&[("a", "/i/a.jpg"), ("c", "/i/moved/c.jpg"), ("d", "/i/d.jpg")]);
        let d = diff_mappings(&old, &new);
        assert_eq!(d.added, vec!["d"]);
        assert_eq!(d.removed, vec!["b"]);
        assert_eq!(d.moved.len(), 1);
        assert_eq!(d.moved[0].from, PathBuf::from("/i/c.jpg"));
        assert_eq!(d.moved[0].to, PathBuf::from("/i/moved/c.jpg"));
        assert_eq!(d.unchanged, 1);
        assert!(!d.is_empty());
    }

    #[test]
    fn identical_mappings_are_empty_diff() {
        let a = m(&[("a", "/i/a.jpg")]);
        let d = diff_mappings(&a, &a.clone());
        assert!(d.is_empty());
        assert_eq!(d.unchanged, 1);
    }
}
