//! The change-event payload (`spec.md` §4.5) emitted by every successful mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Published to both the granular (`registry.changed.{app}.{capability}`) and
/// global (`registry.changed`) subjects after a mutation commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryChanged {
    /// App component of the affected capability.
    pub app: String,
    /// Name component of the affected capability.
    pub capability: String,
    /// Which logical fields changed (`"version"`, `"methods"`, `"defaultMajor"`, `"status"`, ...).
    pub changed_fields: Vec<String>,
    /// Present only for `setDefaultMajor`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_default_major: Option<u32>,
    /// Majors touched by this mutation.
    pub affected_majors: Vec<u32>,
    /// The capability's revision after this mutation.
    pub revision: u64,
    /// `"{capability_id}-{revision}"`.
    pub etag: String,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Environment the mutation targeted, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl RegistryChanged {
    /// Build the etag string `"{capability_id}-{revision}"`.
    #[must_use]
    pub fn make_etag(capability_id: &str, revision: u64) -> String {
        format!("{capability_id}-{revision}")
    }

    /// Build the granular per-`(app, capability)` change subject.
    ///
    /// Dots in `capability` are preserved verbatim — bus subject tokens may
    /// contain dots (`spec.md` §4.5).
    #[must_use]
    pub fn granular_subject(app: &str, capability: &str) -> String {
        format!("registry.changed.{app}.{capability}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_format() {
        assert_eq!(RegistryChanged::make_etag("cap-1", 7), "cap-1-7");
    }

    #[test]
    fn granular_subject_preserves_dots_in_capability() {
        assert_eq!(
            RegistryChanged::granular_subject("intg", "resolve.cap"),
            "registry.changed.intg.resolve.cap"
        );
    }

    #[test]
    fn new_default_major_omitted_when_absent() {
        let ev = RegistryChanged {
            app: "a".into(),
            capability: "b".into(),
            changed_fields: vec!["status".into()],
            new_default_major: None,
            affected_majors: vec![1],
            revision: 2,
            etag: "id-2".into(),
            timestamp: Utc::now(),
            env: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json.get("newDefaultMajor").is_none());
        assert!(json.get("env").is_none());
    }
}
