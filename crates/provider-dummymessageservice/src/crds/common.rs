use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the ProviderConfig a managed resource uses.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProviderConfigReference {
    /// Name of the ProviderConfig.
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: super::defaults::provider_config_name(),
        }
    }
}

/// What happens to the external message when the managed resource is deleted.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Delete the external message.
    #[default]
    Delete,
    /// Leave the external message in place.
    Orphan,
}

/// Reference to a key within a Kubernetes Secret.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SecretKeySelector {
    /// Secret namespace.
    pub namespace: String,

    /// Secret name.
    pub name: String,

    /// Key within the Secret.
    pub key: String,
}

/// Reference to an environment variable of the provider process.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EnvSelector {
    /// Environment variable name.
    pub name: String,
}

/// Reference to a file on the provider's filesystem.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FsSelector {
    /// Absolute path of the file.
    pub path: String,
}

/// Reference to a managed resource, recorded on ProviderConfigUsage objects.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: Option<String>,
}

/// Kubernetes-style condition for status reporting.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type ("Ready" or "Synced").
    #[serde(rename = "type")]
    pub type_: String,

    /// Status: "True", "False", or "Unknown".
    pub status: String,

    /// Machine-readable reason (e.g., "Available").
    #[serde(default)]
    pub reason: Option<String>,

    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,

    /// Last transition time (RFC 3339 string).
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: bool, reason: &str, message: Option<String>) -> Self {
        Self {
            type_: type_.into(),
            status: if status { "True" } else { "False" }.into(),
            reason: Some(reason.into()),
            message,
            last_transition_time: None,
        }
    }
}

/// Merge `next` into `existing` conditions, keyed by type.
///
/// The transition time of a condition is only bumped when its status changes.
pub fn merge_conditions(existing: &[Condition], next: Vec<Condition>, now: &str) -> Vec<Condition> {
    let mut merged: Vec<Condition> = existing.to_vec();
    for mut cond in next {
        match merged.iter_mut().find(|c| c.type_ == cond.type_) {
            Some(current) => {
                cond.last_transition_time = if current.status == cond.status {
                    current.last_transition_time.clone()
                } else {
                    Some(now.to_string())
                };
                *current = cond;
            }
            None => {
                cond.last_transition_time = Some(now.to_string());
                merged.push(cond);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_policy_defaults_to_delete() {
        assert_eq!(DeletionPolicy::default(), DeletionPolicy::Delete);
        let p: DeletionPolicy = serde_json::from_str(r#""Orphan""#).unwrap();
        assert_eq!(p, DeletionPolicy::Orphan);
    }

    #[test]
    fn test_merge_conditions_appends_new_types() {
        let merged = merge_conditions(
            &[],
            vec![Condition::new("Ready", true, "Available", None)],
            "2024-01-01T00:00:00Z",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, "True");
        assert_eq!(
            merged[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_merge_conditions_keeps_time_when_status_unchanged() {
        let mut ready = Condition::new("Ready", true, "Available", None);
        ready.last_transition_time = Some("t0".into());

        let merged = merge_conditions(
            &[ready],
            vec![Condition::new("Ready", true, "Available", Some("still".into()))],
            "t1",
        );
        assert_eq!(merged[0].last_transition_time.as_deref(), Some("t0"));
        assert_eq!(merged[0].message.as_deref(), Some("still"));
    }

    #[test]
    fn test_merge_conditions_bumps_time_on_transition() {
        let mut synced = Condition::new("Synced", true, "ReconcileSuccess", None);
        synced.last_transition_time = Some("t0".into());

        let merged = merge_conditions(
            &[synced],
            vec![Condition::new("Synced", false, "ReconcileError", None)],
            "t1",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, "False");
        assert_eq!(merged[0].last_transition_time.as_deref(), Some("t1"));
    }
}
