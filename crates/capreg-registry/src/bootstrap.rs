//! `bootstrap` (`spec.md` §4.7, component C9): a directory snapshot handed
//! to clients that have not yet resolved a single capability.

use std::collections::BTreeMap;

use capreg_core::RegistryError;
use capreg_events::EventPublisher;
use capreg_repo::Repository;
use serde::Serialize;
use tracing::instrument;

use crate::RegistryCore;

/// Input to [`RegistryCore::bootstrap`].
#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    /// Environment to resolve defaults for; falls back to the configured
    /// default environment when absent.
    pub env: Option<String>,
    /// Capabilities the caller declares it cannot start without; echoed back
    /// verbatim so the caller can diff against what the snapshot actually
    /// carries.
    pub minimum_capabilities: Vec<String>,
}

/// The trimmed resolve-shaped entry carried per capability in a
/// [`BootstrapSnapshot`]: everything `resolve` returns except the fields that
/// require a revision lookup per capability, which `list_bootstrap_entries`
/// does not carry (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapCapabilityEntry {
    /// Bus subject clients should address requests for this version to.
    pub subject: String,
    /// The resolved default version string, if a version exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
    /// The resolved default major, if a default is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    /// The resolved default version's lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Bus URL clients should connect to; falls back to the client-facing
    /// URL when the registry carries no dedicated one.
    pub nats_url: String,
}

/// Output of [`RegistryCore::bootstrap`] (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSnapshot {
    /// The registry's own service name.
    pub name: String,
    /// Crate version of the running registry.
    pub version: String,
    /// Free-form human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Echoed back from the request.
    pub minimum_capabilities: Vec<String>,
    /// Every capability present, keyed by `"app.name"`.
    pub capabilities: BTreeMap<String, BootstrapCapabilityEntry>,
    /// Every capability reference present, as a flat list (same keys as
    /// `capabilities`, for clients that only need the set).
    pub aliases: Vec<String>,
    /// Every configured sibling registry.
    pub registry_aliases: Vec<capreg_core::RegistryAlias>,
    /// The alias this registry answers to as its own default.
    pub default_alias: String,
    /// Subjects a client should subscribe to for change notifications.
    pub change_event_subjects: Vec<String>,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Assemble a directory snapshot for clients bootstrapping cold
    /// (`spec.md` §4.7). Never fails: a repository error degrades to a
    /// snapshot with an empty `capabilities` map rather than a structured
    /// error, since this is the responder of last resort for clients that
    /// have nothing else to go on yet.
    #[instrument(skip(self, req))]
    pub async fn bootstrap(&self, req: BootstrapRequest) -> Result<BootstrapSnapshot, RegistryError> {
        let env = crate::shared::effective_env(req.env.as_deref(), &self.config.default_env);
        let default_alias = self.default_alias().await.unwrap_or_else(|_| capreg_core::DEFAULT_ALIAS.to_string());

        let entries = match self.repo.list_bootstrap_entries(&env).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "bootstrap entry listing failed, returning an empty snapshot");
                return Ok(BootstrapSnapshot {
                    name: self.config.service_name.clone(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    description: None,
                    minimum_capabilities: req.minimum_capabilities,
                    capabilities: BTreeMap::new(),
                    aliases: Vec::new(),
                    registry_aliases: Vec::new(),
                    default_alias,
                    change_event_subjects: vec![self.config.change_event_subject.clone()],
                });
            }
        };

        let mut capabilities = BTreeMap::new();
        for entry in entries {
            let cap_ref = format!("{}.{}", entry.app, entry.name);
            let subject = entry
                .default_major
                .map(|major| capreg_subject::build_subject(&self.config.subject_prefix, &entry.app, &entry.name, major))
                .unwrap_or_default();
            capabilities.insert(
                cap_ref,
                BootstrapCapabilityEntry {
                    subject,
                    resolved_version: entry.version_string,
                    major: entry.default_major,
                    status: entry.version_status.map(|s| format!("{s:?}").to_lowercase()),
                    nats_url: self.config.client_facing_url.clone(),
                },
            );
        }

        let mut registry_aliases = self.repo.list_registries().await.unwrap_or_default();
        registry_aliases.sort_by(|a, b| a.alias.cmp(&b.alias));

        let aliases = capabilities.keys().cloned().collect();

        Ok(BootstrapSnapshot {
            name: self.config.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            minimum_capabilities: req.minimum_capabilities,
            capabilities,
            aliases,
            registry_aliases,
            default_alias,
            change_event_subjects: vec![self.config.change_event_subject.clone()],
        })
    }
}
