//! Snapshot change detection for suppressing redundant notifications

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde_json::{Map, Value, json};

use crate::model::BudgetSnapshot;

/// Stable fingerprint of a canonicalized snapshot.
///
/// An equality heuristic only. Collisions are possible and accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHash(pub u64);

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Canonical JSON form: sorted keys at every depth, sorted recommendations,
/// `-0.0` folded into `0.0`.
pub fn canonicalize(snapshot: &BudgetSnapshot) -> Value {
    let categories: BTreeMap<&str, f64> = snapshot
        .categories
        .iter()
        .map(|(name, amount)| (name.as_str(), fold_zero(*amount)))
        .collect();

    let mut recommendations = snapshot.recommendations.clone();
    recommendations.sort();

    json!({
        "total": fold_zero(snapshot.total),
        "categories": categories,
        "recommendations": recommendations,
        "questionnaire_answers": sort_value(&Value::Object(snapshot.questionnaire_answers.clone())),
    })
}

pub fn snapshot_hash(snapshot: &BudgetSnapshot) -> SnapshotHash {
    let mut hasher = DefaultHasher::new();
    canonicalize(snapshot).to_string().hash(&mut hasher);
    SnapshotHash(hasher.finish())
}

fn fold_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(key, value)| (key, sort_value(value))).collect();
            let mut out = Map::new();
            for (key, value) in sorted {
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// Remembers the last observed hash and reports whether a new snapshot differs.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<SnapshotHash>,
    changes: u64,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(snapshot: &BudgetSnapshot) -> SnapshotHash {
        snapshot_hash(snapshot)
    }

    /// Record `snapshot`. Returns true when it differs from the previous one.
    pub fn observe(&mut self, snapshot: &BudgetSnapshot) -> bool {
        let hash = snapshot_hash(snapshot);
        if self.last == Some(hash) {
            return false;
        }
        self.last = Some(hash);
        self.changes += 1;
        true
    }

    /// Would `snapshot` count as a change, without recording it.
    pub fn differs(&self, snapshot: &BudgetSnapshot) -> bool {
        self.last != Some(snapshot_hash(snapshot))
    }

    pub fn last(&self) -> Option<SnapshotHash> {
        self.last
    }

    /// Number of changes observed so far.
    pub fn changes(&self) -> u64 {
        self.changes
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BudgetSnapshot {
        let mut snapshot = BudgetSnapshot::from_categories([("Food", 2000.0), ("Travel", 1000.0)]);
        snapshot.recommendations = vec!["b".to_string(), "a".to_string()];
        snapshot
            .questionnaire_answers
            .insert("goal".to_string(), json!({"z": 1, "a": 2}));
        snapshot
    }

    #[test]
    fn test_hash_is_stable_for_unchanged_snapshot() {
        let snapshot = sample();
        assert_eq!(snapshot_hash(&snapshot), snapshot_hash(&snapshot.clone()));
    }

    #[test]
    fn test_hash_changes_with_any_category_value() {
        let snapshot = sample();
        let mut changed = snapshot.clone();
        changed.categories.insert("Travel".to_string(), 1001.0);
        assert_ne!(snapshot_hash(&snapshot), snapshot_hash(&changed));
    }

    #[test]
    fn test_recommendation_order_is_not_a_change() {
        let snapshot = sample();
        let mut reordered = snapshot.clone();
        reordered.recommendations.reverse();
        assert_eq!(snapshot_hash(&snapshot), snapshot_hash(&reordered));
    }

    #[test]
    fn test_negative_zero_is_folded() {
        let mut a = BudgetSnapshot::from_categories([("Food", 0.0)]);
        let mut b = a.clone();
        a.categories.insert("Food".to_string(), -0.0);
        b.total = -0.0;
        assert_eq!(snapshot_hash(&a), snapshot_hash(&b));
    }

    #[test]
    fn test_detector_suppresses_repeats() {
        let mut detector = ChangeDetector::new();
        let snapshot = sample();

        assert!(detector.observe(&snapshot));
        assert!(!detector.observe(&snapshot));
        assert!(!detector.differs(&snapshot));

        let mut changed = snapshot.clone();
        changed.total = 1.0;
        assert!(detector.differs(&changed));
        assert!(detector.observe(&changed));
        assert_eq!(detector.changes(), 2);

        detector.reset();
        assert!(detector.last().is_none());
        assert!(detector.observe(&changed));
    }

    #[test]
    fn test_hash_display_is_fixed_width_hex() {
        assert_eq!(SnapshotHash(255).to_string(), "00000000000000ff");
    }
}
