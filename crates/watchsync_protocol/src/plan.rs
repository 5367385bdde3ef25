//! Minimal write sets for bringing a store to a desired state.

use crate::item::{Entry, RawSnapshot};
use crate::key::Namespace;

/// Writes needed to turn one snapshot into another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    /// Entries that are new or whose value changed.
    pub set: RawSnapshot,
    /// Item keys present now but absent from the desired state.
    pub remove: Vec<String>,
}

impl WritePlan {
    /// Computes the plan from `current` to `desired`.
    ///
    /// Only well-formed item keys are ever scheduled for removal; settings
    /// and malformed entries are left alone.
    pub fn between(current: &RawSnapshot, desired: &RawSnapshot) -> Self {
        let set = desired
            .iter()
            .filter(|(k, v)| current.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let remove = current
            .iter()
            .filter(|(k, _)| !desired.contains_key(*k))
            .filter(|(k, v)| Entry::from_stored(k, v).is_ok())
            .map(|(k, _)| k.clone())
            .collect();

        Self { set, remove }
    }

    /// Returns true if nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Total number of keys touched.
    pub fn len(&self) -> usize {
        self.set.len() + self.remove.len()
    }

    /// Maps every key into the remote key space.
    pub fn namespaced(&self, namespace: &Namespace) -> Self {
        Self {
            set: self
                .set
                .iter()
                .map(|(k, v)| (namespace.apply(k), v.clone()))
                .collect(),
            remove: self.remove.iter().map(|k| namespace.apply(k)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_snapshots_need_no_writes() {
        let mut snap = RawSnapshot::new();
        snap.insert("video_a".into(), json!({"timestamp": 1}));
        assert!(WritePlan::between(&snap, &snap).is_empty());
    }

    #[test]
    fn changed_and_new_entries_are_set() {
        let mut current = RawSnapshot::new();
        current.insert("video_a".into(), json!({"timestamp": 1}));
        current.insert("video_b".into(), json!({"timestamp": 1}));

        let mut desired = current.clone();
        desired.insert("video_b".into(), json!({"timestamp": 2}));
        desired.insert("video_c".into(), json!({"timestamp": 3}));

        let plan = WritePlan::between(&current, &desired);
        assert_eq!(plan.set.len(), 2);
        assert!(plan.set.contains_key("video_b"));
        assert!(plan.set.contains_key("video_c"));
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn only_item_keys_are_removed() {
        let mut current = RawSnapshot::new();
        current.insert("video_a".into(), json!({"timestamp": 1}));
        current.insert("sync_settings".into(), json!({"enabled": true}));
        current.insert("video_broken".into(), json!(17));

        let plan = WritePlan::between(&current, &RawSnapshot::new());
        assert_eq!(plan.remove, vec!["video_a".to_string()]);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn namespaced_prefixes_every_key() {
        let mut desired = RawSnapshot::new();
        desired.insert("video_a".into(), json!({"timestamp": 1}));
        let mut current = RawSnapshot::new();
        current.insert("deleted_video_b".into(), json!({"deletedAt": 1}));

        let plan = WritePlan::between(&current, &desired).namespaced(&Namespace::default());
        assert!(plan.set.contains_key("ns_video_a"));
        assert_eq!(plan.remove, vec!["ns_deleted_video_b".to_string()]);
    }
}
