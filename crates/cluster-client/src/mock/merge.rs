//! JSON merge patch (RFC 7386) application for the mock store

use crate::error::ClusterError;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Merge `patch` into `target`: objects merge key by key, `null` deletes,
/// anything else replaces.
pub(crate) fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Apply a merge patch to a typed resource, enforcing any
/// `metadata.resourceVersion` precondition and stamping `new_version`.
pub(crate) fn apply<K>(current: &K, patch: &Value, new_version: u64) -> Result<K, ClusterError>
where
    K: Resource + Serialize + DeserializeOwned,
{
    if let Some(expected) = patch.pointer("/metadata/resourceVersion").and_then(Value::as_str) {
        let actual = current.meta().resource_version.as_deref().unwrap_or_default();
        if expected != actual {
            return Err(ClusterError::Conflict(format!(
                "resourceVersion {expected} does not match {actual}"
            )));
        }
    }

    let mut value = serde_json::to_value(current)?;
    merge(&mut value, patch);
    merge(
        &mut value,
        &serde_json::json!({ "metadata": { "resourceVersion": new_version.to_string() } }),
    );
    Ok(serde_json::from_value(value)?)
}
