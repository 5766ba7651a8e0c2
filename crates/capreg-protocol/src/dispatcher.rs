//! Routes a decoded [`RequestEnvelope`] to one of [`RegistryCore`]'s eight
//! operations plus `health` (`spec.md` §4.4's routing table), and encodes
//! the result back into a [`ResponseEnvelope`]. Grounded on the teacher's
//! `abp-protocol::router` (method-name → handler dispatch table) and
//! `abp-protocol::codec`/`builder` (envelope (de)construction).

use std::future::Future;
use std::time::Duration;

use capreg_config::RegistryConfig;
use capreg_core::envelope::{RequestEnvelope, ResponseEnvelope};
use capreg_core::{ErrorCode, RegistryError};
use capreg_events::EventPublisher;
use capreg_registry::{
    DeprecateOrDisableRequest, DescribeRequest, DiscoverFilters, DiscoverRequest, ListMajorsRequest,
    RegistryCore, ResolveRequest, SetDefaultMajorRequest, UpsertRequest,
};
use capreg_repo::Repository;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::deadline::compute_deadline;

/// Decode a raw request payload into a [`RequestEnvelope`].
///
/// # Errors
///
/// [`ErrorCode::InvalidRequest`] when `bytes` is not a well-formed envelope
/// (`spec.md` §4.4, §8 scenario 6).
pub fn decode_envelope(bytes: &[u8]) -> Result<RequestEnvelope, RegistryError> {
    serde_json::from_slice(bytes).map_err(|e| {
        RegistryError::new(ErrorCode::InvalidRequest, format!("malformed request envelope: {e}"))
    })
}

/// Binds a [`RegistryCore`] to the dispatcher's own view of configuration
/// (currently only `request_timeout` and `default_env`, both also known to
/// the core — kept here too since the envelope-level deadline computation
/// and the `upsert` `setAsDefault` env fallback are dispatcher
/// responsibilities, not core ones).
pub struct Dispatcher<R: Repository, P: EventPublisher> {
    registry: std::sync::Arc<RegistryCore<R, P>>,
    config: RegistryConfig,
}

impl<R: Repository, P: EventPublisher> Dispatcher<R, P> {
    /// Build a dispatcher over `registry`, binding deadlines to `config.request_timeout`.
    #[must_use]
    pub fn new(registry: std::sync::Arc<RegistryCore<R, P>>, config: RegistryConfig) -> Self {
        Self { registry, config }
    }

    /// Dispatch one request envelope to completion, never panicking and
    /// never propagating an `Err` — every failure mode becomes a
    /// [`ResponseEnvelope`] with `ok: false` (`spec.md` §4.4).
    #[instrument(skip(self, envelope), fields(method = %envelope.method, id = %envelope.id))]
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let deadline = compute_deadline(self.config.request_timeout, envelope.ctx.as_ref());
        match with_deadline(deadline, self.route(&envelope, deadline)).await {
            Ok(value) => ResponseEnvelope::ok(envelope.id, &value),
            Err(e) => ResponseEnvelope::err(envelope.id, &e),
        }
    }

    async fn route(&self, envelope: &RequestEnvelope, deadline: Duration) -> Result<Value, RegistryError> {
        match envelope.method.as_str() {
            "resolve" => self.handle_resolve(envelope, deadline).await,
            "discover" => self.handle_discover(envelope).await,
            "describe" => self.handle_describe(envelope).await,
            "upsert" => self.handle_upsert(envelope).await,
            "setDefaultMajor" => self.handle_set_default_major(envelope).await,
            "deprecate" => self.handle_deprecate_or_disable(envelope, false).await,
            "disable" => self.handle_deprecate_or_disable(envelope, true).await,
            "listMajors" => self.handle_list_majors(envelope).await,
            "health" => self.handle_health().await,
            other => Err(RegistryError::new(
                ErrorCode::MethodNotFound,
                format!("unknown method {other:?}"),
            )),
        }
    }

    fn cap_ref(&self, envelope: &RequestEnvelope, params_cap: Option<String>) -> Result<String, RegistryError> {
        params_cap
            .or_else(|| envelope.cap.clone())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RegistryError::invalid_argument("missing required field \"cap\""))
    }

    async fn handle_resolve(&self, envelope: &RequestEnvelope, deadline: Duration) -> Result<Value, RegistryError> {
        let params: ResolveParams = decode_params(envelope)?;
        let cap = self.cap_ref(envelope, params.cap)?;
        let ctx = envelope
            .ctx
            .as_ref()
            .map(capreg_core::envelope::RequestContext::resolution_context)
            .unwrap_or_default();

        let req = ResolveRequest {
            cap,
            ver: params.ver,
            ctx,
            include_methods: params.include_methods,
            include_schemas: params.include_schemas,
            deadline,
        };
        self.registry.resolve(req).await.and_then(to_value)
    }

    async fn handle_discover(&self, envelope: &RequestEnvelope) -> Result<Value, RegistryError> {
        let params: DiscoverParams = decode_params(envelope)?;
        let ctx = envelope
            .ctx
            .as_ref()
            .map(capreg_core::envelope::RequestContext::resolution_context);

        let req = DiscoverRequest {
            filters: DiscoverFilters {
                app: params.app,
                tags: params.tags,
                query: params.query,
                status: params.status,
                supports_method: params.supports_method,
            },
            ctx,
            page: params.page.unwrap_or(1),
            limit: params.limit.unwrap_or(20),
        };
        self.registry.discover(req).await.and_then(to_value)
    }

    async fn handle_describe(&self, envelope: &RequestEnvelope) -> Result<Value, RegistryError> {
        let params: DescribeParams = decode_params(envelope)?;
        let cap = self.cap_ref(envelope, params.cap)?;
        let req = DescribeRequest {
            cap,
            version: params.version,
            major: params.major,
        };
        self.registry.describe(req).await.and_then(to_value)
    }

    async fn handle_upsert(&self, envelope: &RequestEnvelope) -> Result<Value, RegistryError> {
        let params: UpsertParams = decode_params(envelope)?;
        let actor = envelope
            .ctx
            .as_ref()
            .map(capreg_core::envelope::RequestContext::user_id_or_system)
            .unwrap_or_else(|| "system".to_string());

        let set_default_env = if params.set_as_default.unwrap_or(false) {
            Some(params.env.clone().unwrap_or_else(|| self.config.default_env.clone()))
        } else {
            None
        };

        let req = UpsertRequest {
            app: params.app,
            name: params.name,
            description: params.description,
            tags: params.tags.unwrap_or_default(),
            version: capreg_registry::VersionInput {
                major: params.version.major,
                minor: params.version.minor,
                patch: params.version.patch,
                prerelease: params.version.prerelease,
                description: params.version.description,
                changelog: params.version.changelog,
                metadata: params.version.metadata.unwrap_or(Value::Null),
            },
            methods: params
                .methods
                .into_iter()
                .map(|m| capreg_registry::MethodInput {
                    name: m.name,
                    description: m.description,
                    input_schema: m.input_schema.unwrap_or(Value::Object(Default::default())),
                    output_schema: m.output_schema.unwrap_or(Value::Object(Default::default())),
                    modes: m.modes.unwrap_or_default(),
                    tags: m.tags.unwrap_or_default(),
                    policies: m.policies.unwrap_or(Value::Object(Default::default())),
                    examples: m.examples.unwrap_or_default(),
                })
                .collect(),
            set_default_env,
            actor,
        };
        self.registry.upsert(req).await.and_then(to_value)
    }

    async fn handle_set_default_major(&self, envelope: &RequestEnvelope) -> Result<Value, RegistryError> {
        let params: SetDefaultMajorParams = decode_params(envelope)?;
        let cap = self.cap_ref(envelope, params.cap)?;
        let req = SetDefaultMajorRequest {
            cap,
            major: params.major,
            env: params.env,
        };
        self.registry.set_default_major(req).await.and_then(to_value)
    }

    async fn handle_deprecate_or_disable(
        &self,
        envelope: &RequestEnvelope,
        disable: bool,
    ) -> Result<Value, RegistryError> {
        let params: DeprecateOrDisableParams = decode_params(envelope)?;
        let cap = self.cap_ref(envelope, params.cap)?;
        let req = DeprecateOrDisableRequest {
            cap,
            version: params.version,
            major: params.major,
            reason: params.reason,
        };
        if disable {
            self.registry.disable(req).await.and_then(to_value)
        } else {
            self.registry.deprecate(req).await.and_then(to_value)
        }
    }

    async fn handle_list_majors(&self, envelope: &RequestEnvelope) -> Result<Value, RegistryError> {
        let params: ListMajorsParams = decode_params(envelope)?;
        let cap = self.cap_ref(envelope, params.cap)?;
        let req = ListMajorsRequest {
            cap,
            include_inactive: params.include_inactive.unwrap_or(false),
        };
        self.registry.list_majors(req).await.and_then(to_value)
    }

    async fn handle_health(&self) -> Result<Value, RegistryError> {
        self.registry.health().await.and_then(to_value)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RegistryError> {
    serde_json::to_value(value).map_err(|e| RegistryError::internal(format!("failed to encode result: {e}")))
}

fn decode_params<T: for<'de> Deserialize<'de> + Default>(
    envelope: &RequestEnvelope,
) -> Result<T, RegistryError> {
    if envelope.params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(envelope.params.clone())
        .map_err(|e| RegistryError::new(ErrorCode::InvalidArgument, format!("invalid params: {e}")))
}

/// Abort `fut` with [`ErrorCode::InternalError`] if it does not resolve
/// within `deadline` (`spec.md` §5: "no operation may outlive its
/// context").
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, RegistryError>>,
) -> Result<T, RegistryError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RegistryError::internal("request deadline exceeded")),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveParams {
    #[serde(default)]
    cap: Option<String>,
    #[serde(default)]
    ver: Option<String>,
    #[serde(default)]
    include_methods: bool,
    #[serde(default)]
    include_schemas: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverParams {
    #[serde(default)]
    app: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    supports_method: Option<String>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeParams {
    #[serde(default)]
    cap: Option<String>,
    #[serde(default)]
    major: Option<u32>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionParams {
    #[serde(default)]
    major: u32,
    #[serde(default)]
    minor: u32,
    #[serde(default)]
    patch: u32,
    #[serde(default)]
    prerelease: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    changelog: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodParams {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
    #[serde(default)]
    output_schema: Option<Value>,
    #[serde(default)]
    modes: Option<Vec<capreg_core::MethodMode>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    policies: Option<Value>,
    #[serde(default)]
    examples: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertParams {
    #[serde(default)]
    app: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    version: VersionParams,
    #[serde(default)]
    methods: Vec<MethodParams>,
    #[serde(default)]
    set_as_default: Option<bool>,
    #[serde(default)]
    env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDefaultMajorParams {
    #[serde(default)]
    cap: Option<String>,
    #[serde(default)]
    major: u32,
    #[serde(default)]
    env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeprecateOrDisableParams {
    #[serde(default)]
    cap: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    major: Option<u32>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMajorsParams {
    #[serde(default)]
    cap: Option<String>,
    #[serde(default)]
    include_inactive: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use capreg_events::InMemoryEventPublisher;
    use capreg_repo::memory::InMemoryRepository;
    use serde_json::json;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher<InMemoryRepository, InMemoryEventPublisher> {
        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let config = RegistryConfig::default();
        let registry = Arc::new(RegistryCore::new(repo, events, config.clone()));
        Dispatcher::new(registry, config)
    }

    fn envelope(method: &str, params: Value) -> RequestEnvelope {
        RequestEnvelope {
            id: "req-1".to_string(),
            kind: "request".to_string(),
            cap: None,
            method: method.to_string(),
            params,
            ctx: None,
        }
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let d = dispatcher();
        let resp = d.dispatch(envelope("nope", json!({}))).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, ErrorCode::MethodNotFound);
    }

    #[tokio::test]
    async fn malformed_params_yield_invalid_argument() {
        let d = dispatcher();
        let resp = d.dispatch(envelope("discover", json!({"limit": "not-a-number"}))).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn health_round_trips_through_the_dispatcher() {
        let d = dispatcher();
        let resp = d.dispatch(envelope("health", Value::Null)).await;
        assert!(resp.ok);
        assert_eq!(resp.result.unwrap()["status"], "healthy");
    }

    #[tokio::test]
    async fn upsert_then_resolve_round_trips_through_the_dispatcher() {
        let d = dispatcher();
        let upsert_params = json!({
            "app": "intg",
            "name": "resolve.cap",
            "version": {"major": 1, "minor": 0, "patch": 0},
            "methods": [{"name": "run"}],
        });
        let resp = d.dispatch(envelope("upsert", upsert_params)).await;
        assert!(resp.ok, "{resp:?}");
        assert_eq!(resp.result.unwrap()["action"], "created");

        let resolve_params = json!({"cap": "intg.resolve.cap"});
        let resp = d.dispatch(envelope("resolve", resolve_params)).await;
        assert!(resp.ok, "{resp:?}");
        let result = resp.result.unwrap();
        assert_eq!(result["resolvedVersion"], "1.0.0");
        assert_eq!(result["subject"], "cap.intg.resolve_cap.v1");
    }

    #[tokio::test]
    async fn resolve_without_cap_yields_invalid_argument() {
        let d = dispatcher();
        let resp = d.dispatch(envelope("resolve", json!({}))).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn decode_envelope_rejects_malformed_json() {
        let err = decode_envelope(b"{not-json").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }
}
