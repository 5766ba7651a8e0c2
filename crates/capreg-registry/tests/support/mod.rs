//! Shared fixtures for `capreg-registry`'s integration suite: an
//! in-memory repository, a recording event publisher, and a couple of
//! builder helpers so each test file doesn't re-derive the same
//! boilerplate `UpsertRequest`.

use std::sync::Arc;

use capreg_config::RegistryConfig;
use capreg_events::InMemoryEventPublisher;
use capreg_registry::{MethodInput, RegistryCore, UpsertRequest, VersionInput};
use capreg_repo::memory::InMemoryRepository;
use serde_json::json;

pub type Core = RegistryCore<InMemoryRepository, InMemoryEventPublisher>;

pub fn new_core() -> Core {
    new_core_with_repo().0
}

/// Build a core plus a cloneable handle onto its backing repository, for
/// tests that need to seed rows (tenant rules, registry aliases) the core
/// itself has no write path for.
pub fn new_core_with_repo() -> (Core, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let events = Arc::new(InMemoryEventPublisher::new());
    let core = RegistryCore::new(repo.clone(), events, RegistryConfig::default());
    (core, repo)
}

/// Same as [`new_core_with_repo`] but also returns the event recorder, for
/// tests that assert on emitted `RegistryChanged` events.
pub fn new_core_with_events() -> (Core, Arc<InMemoryEventPublisher>) {
    let repo = Arc::new(InMemoryRepository::new());
    let events = Arc::new(InMemoryEventPublisher::new());
    let core = RegistryCore::new(repo, events.clone(), RegistryConfig::default());
    (core, events)
}

/// Build a minimal, valid `UpsertRequest` for `{app}.{name}@{major}.{minor}.{patch}`
/// carrying one method named `"run"`.
pub fn upsert_req(app: &str, name: &str, major: u32, minor: u32, patch: u32) -> UpsertRequest {
    UpsertRequest {
        app: app.to_string(),
        name: name.to_string(),
        description: None,
        tags: Vec::new(),
        version: VersionInput {
            major,
            minor,
            patch,
            prerelease: None,
            description: None,
            changelog: None,
            metadata: json!({}),
        },
        methods: vec![MethodInput {
            name: "run".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            modes: vec![capreg_core::MethodMode::Sync],
            tags: Vec::new(),
            policies: json!({}),
            examples: Vec::new(),
        }],
        set_default_env: None,
        actor: "tester".to_string(),
    }
}
