//! Wire envelope shapes for the registry's request/reply protocol
//! (`spec.md` §4.4, component C7). These are shared by the dispatcher
//! (`capreg-protocol`) and the federation pool (`capreg-federation`), which
//! both need to build and decode the same envelope on opposite sides of a
//! bus request — kept here rather than in either crate so neither has to
//! depend on the other.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ResolutionContext;
use crate::{ErrorCode, RegistryError, RegistryErrorDto};

/// An inbound request envelope (`spec.md` §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Caller-assigned correlation id, echoed back on the response.
    pub id: String,
    /// Envelope kind, always `"request"` on the wire today.
    #[serde(rename = "type")]
    pub kind: String,
    /// Capability reference, when the method operates on one via this field
    /// rather than (or in addition to) `params`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<String>,
    /// Operation name; routes to one of the eight core operations or `health`.
    pub method: String,
    /// Opaque, method-specific payload.
    #[serde(default)]
    pub params: Value,
    /// Caller context: tenant, identity, deadlines, features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<RequestContext>,
}

/// The `ctx` object carried by a [`RequestEnvelope`] (`spec.md` §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Opaque tenant identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Caller identity; defaults to `"system"` when absent or empty, and is
    /// the audit identity stamped on writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Caller-supplied request id, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Caller-supplied correlation id, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Environment name (e.g. `"production"`, `"staging"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Audience identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Feature flags presented by the caller.
    #[serde(default)]
    pub features: Vec<String>,
    /// Roles presented by the caller (unused by the core today; carried for
    /// forward compatibility with an external authorization layer).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Absolute deadline, milliseconds since the Unix epoch. Preferred over
    /// `timeout_ms` when both are present (`spec.md` §4.4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<i64>,
    /// Relative timeout in milliseconds from when the request was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RequestContext {
    /// The audit identity for a write: `user_id` if non-empty, else `"system"`.
    #[must_use]
    pub fn user_id_or_system(&self) -> String {
        match &self.user_id {
            Some(u) if !u.is_empty() => u.clone(),
            _ => "system".to_string(),
        }
    }

    /// Project the wire context down to the domain [`ResolutionContext`]
    /// the registry core and tenant-rule evaluation operate on.
    #[must_use]
    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext {
            tenant_id: self.tenant_id.clone(),
            env: self.env.clone(),
            aud: self.aud.clone(),
            features: self.features.clone(),
        }
    }
}

/// A response envelope (`spec.md` §4.4): exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Echoes the request's `id`.
    pub id: String,
    /// `true` iff the operation succeeded.
    pub ok: bool,
    /// Present iff `ok == true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present iff `ok == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RegistryErrorDto>,
}

impl ResponseEnvelope {
    /// Build a success response by serializing `result`.
    ///
    /// # Errors
    ///
    /// Returns a synthetic `INTERNAL_ERROR` [`ResponseEnvelope`] if `result`
    /// fails to serialize (`spec.md` §7: "Response-encode failures yield a
    /// synthetic `INTERNAL_ERROR` response").
    #[must_use]
    pub fn ok(id: impl Into<String>, result: &impl Serialize) -> Self {
        let id = id.into();
        match serde_json::to_value(result) {
            Ok(value) => Self {
                id,
                ok: true,
                result: Some(value),
                error: None,
            },
            Err(e) => Self::err(
                id,
                &RegistryError::internal(format!("failed to encode response: {e}")),
            ),
        }
    }

    /// Build an error response from a [`RegistryError`].
    #[must_use]
    pub fn err(id: impl Into<String>, error: &RegistryError) -> Self {
        Self {
            id: id.into(),
            ok: false,
            result: None,
            error: Some(error.to_dto()),
        }
    }

    /// Reconstruct a [`RegistryError`] from this response's `error` field,
    /// used by the federation pool to propagate a remote failure verbatim
    /// (`spec.md` §4.6 step 4).
    #[must_use]
    pub fn into_registry_error(self) -> RegistryError {
        match self.error {
            Some(dto) => RegistryError {
                code: dto.code,
                message: dto.message,
                details: dto.details.unwrap_or_default(),
            },
            None => RegistryError::new(ErrorCode::InternalError, "error response with no error body"),
        }
    }
}

/// Arbitrary structured details carried on [`RegistryErrorDto`] — re-exported
/// here only so callers constructing one by hand don't need a separate import.
pub type ErrorDetails = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_defaults_to_system() {
        let ctx = RequestContext::default();
        assert_eq!(ctx.user_id_or_system(), "system");
        let ctx = RequestContext {
            user_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(ctx.user_id_or_system(), "system");
        let ctx = RequestContext {
            user_id: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(ctx.user_id_or_system(), "alice");
    }

    #[test]
    fn response_ok_round_trips_result() {
        let resp = ResponseEnvelope::ok("req-1", &serde_json::json!({"a": 1}));
        assert!(resp.ok);
        assert_eq!(resp.result.unwrap()["a"], 1);
    }

    #[test]
    fn response_err_carries_dto() {
        let resp = ResponseEnvelope::err("req-1", &RegistryError::not_found("missing"));
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, ErrorCode::NotFound);
    }

    #[test]
    fn into_registry_error_reconstructs_code_and_message() {
        let resp = ResponseEnvelope::err("req-1", &RegistryError::forbidden("denied"));
        let err = resp.into_registry_error();
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert_eq!(err.message, "denied");
    }

    #[test]
    fn request_envelope_decodes_minimal_json() {
        let raw = r#"{"id":"r1","type":"request","method":"health","params":{}}"#;
        let env: RequestEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.method, "health");
        assert!(env.ctx.is_none());
        assert!(env.cap.is_none());
    }
}
