//! Tree merging for CI configuration values.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::ci::{key_label, CiError};

/// How [`deep_merge`] treats a key present on both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Mappings recurse, sequences concatenate, anything else is replaced.
    #[default]
    #[serde(alias = "override")]
    OverrideAllowed,
    /// Like `OverrideAllowed`, but replacing an existing value with a
    /// different one is a [`CiError::ConflictingKey`].
    Strict,
}

/// Deep-merges `overlay` into `base`.
///
/// Mapping/mapping pairs merge key by key and sequence/sequence pairs
/// concatenate (`base` first, no deduplication). Every other combination,
/// including type mismatches, resolves to `overlay`, unless the policy is
/// [`MergePolicy::Strict`] and the two values differ.
pub fn deep_merge(base: Value, overlay: Value, policy: MergePolicy) -> Result<Value, CiError> {
    let mut path = Vec::new();
    merge_at(base, overlay, policy, &mut path)
}

fn merge_at(
    base: Value,
    overlay: Value,
    policy: MergePolicy,
    path: &mut Vec<String>,
) -> Result<Value, CiError> {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                if let Some(existing) = base.get_mut(&key) {
                    path.push(key_label(&key));
                    let current = std::mem::replace(existing, Value::Null);
                    if policy == MergePolicy::Strict
                        && !is_mergeable(&current, &value)
                        && current != value
                    {
                        return Err(CiError::ConflictingKey {
                            key: path.join("."),
                        });
                    }
                    *existing = merge_at(current, value, policy, path)?;
                    path.pop();
                } else {
                    base.insert(key, value);
                }
            }
            Ok(Value::Mapping(base))
        }
        (Value::Sequence(mut base), Value::Sequence(overlay)) => {
            base.extend(overlay);
            Ok(Value::Sequence(base))
        }
        (_, overlay) => Ok(overlay),
    }
}

fn is_mergeable(base: &Value, overlay: &Value) -> bool {
    matches!(
        (base, overlay),
        (Value::Mapping(_), Value::Mapping(_)) | (Value::Sequence(_), Value::Sequence(_))
    )
}

/// Merges a template chain: mappings recurse, everything else is replaced.
///
/// Used for `extends`, where a job's `script: [...]` replaces the template's
/// script instead of accumulating onto it.
pub fn extends_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                if let Some(existing) = base.get_mut(&key) {
                    let current = std::mem::replace(existing, Value::Null);
                    *existing = extends_merge(current, value);
                } else {
                    base.insert(key, value);
                }
            }
            Value::Mapping(base)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn sequences_concatenate_without_dedup() {
        let merged = deep_merge(
            yaml("stages: [a, b]"),
            yaml("stages: [b, c]"),
            MergePolicy::OverrideAllowed,
        )
        .unwrap();
        assert_eq!(merged, yaml("stages: [a, b, b, c]"));
    }

    #[test]
    fn nested_maps_recurse() {
        let merged = deep_merge(
            yaml("job: { image: alpine, variables: { A: '1' } }"),
            yaml("job: { variables: { B: '2' } }"),
            MergePolicy::OverrideAllowed,
        )
        .unwrap();
        assert_eq!(
            merged,
            yaml("job: { image: alpine, variables: { A: '1', B: '2' } }")
        );
    }

    #[test]
    fn overlay_scalar_wins() {
        let merged = deep_merge(
            yaml("{ k: base, keep: 1 }"),
            yaml("{ k: overlay }"),
            MergePolicy::OverrideAllowed,
        )
        .unwrap();
        assert_eq!(merged, yaml("{ k: overlay, keep: 1 }"));
    }

    #[test]
    fn type_mismatch_replaces() {
        let merged = deep_merge(
            yaml("{ k: [a] }"),
            yaml("{ k: { nested: true } }"),
            MergePolicy::OverrideAllowed,
        )
        .unwrap();
        assert_eq!(merged, yaml("{ k: { nested: true } }"));
    }

    #[test]
    fn key_order_is_preserved() {
        let merged = deep_merge(
            yaml("{ b: 1, a: 2 }"),
            yaml("{ c: 3, b: 4 }"),
            MergePolicy::OverrideAllowed,
        )
        .unwrap();
        let keys: Vec<_> = merged
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn strict_rejects_scalar_conflict() {
        let err = deep_merge(yaml("{ k: 1 }"), yaml("{ k: 2 }"), MergePolicy::Strict).unwrap_err();
        assert_eq!(err, CiError::ConflictingKey { key: "k".into() });
        assert!(err.to_string().contains("'k'"));
    }

    #[test]
    fn strict_reports_nested_path() {
        let err = deep_merge(
            yaml("build: { image: alpine }"),
            yaml("build: { image: debian }"),
            MergePolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CiError::ConflictingKey {
                key: "build.image".into()
            }
        );
    }

    #[test]
    fn strict_accepts_equal_nested_maps() {
        let merged = deep_merge(
            yaml("k: { a: 1, b: [x] }"),
            yaml("k: { a: 1, b: [x] }"),
            MergePolicy::Strict,
        )
        .unwrap();
        assert_eq!(merged, yaml("k: { a: 1, b: [x, x] }"));
    }

    #[test]
    fn strict_rejects_type_mismatch() {
        let result = deep_merge(yaml("{ k: [a] }"), yaml("{ k: a }"), MergePolicy::Strict);
        assert!(result.is_err());
    }

    #[test]
    fn extends_merge_replaces_sequences() {
        let merged = extends_merge(
            yaml("{ script: [a], tags: [x], variables: { A: '1' } }"),
            yaml("{ script: [b], variables: { B: '2' } }"),
        );
        assert_eq!(
            merged,
            yaml("{ script: [b], tags: [x], variables: { A: '1', B: '2' } }")
        );
    }

    #[test]
    fn policy_deserializes_from_config_names() {
        let strict: MergePolicy = serde_yaml::from_str("strict").unwrap();
        let relaxed: MergePolicy = serde_yaml::from_str("override").unwrap();
        assert_eq!(strict, MergePolicy::Strict);
        assert_eq!(relaxed, MergePolicy::OverrideAllowed);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn concatenation_length(a in proptest::collection::vec("[a-z]{1,4}", 0..6),
                                    b in proptest::collection::vec("[a-z]{1,4}", 0..6)) {
                let base = Value::Sequence(a.iter().cloned().map(Value::String).collect());
                let overlay = Value::Sequence(b.iter().cloned().map(Value::String).collect());
                let merged = deep_merge(base, overlay, MergePolicy::OverrideAllowed).unwrap();
                prop_assert_eq!(merged.as_sequence().unwrap().len(), a.len() + b.len());
            }

            #[test]
            fn merging_into_empty_map_is_identity(keys in proptest::collection::vec("[a-z]{1,4}", 0..6)) {
                let mut map = serde_yaml::Mapping::new();
                for (i, key) in keys.iter().enumerate() {
                    map.insert(Value::String(key.clone()), Value::String(i.to_string()));
                }
                let value = Value::Mapping(map);
                let merged = deep_merge(Value::Mapping(serde_yaml::Mapping::new()), value.clone(), MergePolicy::Strict).unwrap();
                prop_assert_eq!(merged, value);
            }
        }
    }
}
