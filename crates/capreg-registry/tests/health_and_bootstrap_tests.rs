//! Coverage for `health` (`spec.md` §4.3.8) and `bootstrap` (`spec.md` §4.7).

mod support;

use capreg_core::RegistryAlias;
use capreg_registry::BootstrapRequest;
use capreg_repo::Repository;
use support::{new_core, new_core_with_repo, upsert_req};

#[tokio::test]
async fn health_reports_healthy_against_a_working_repository() {
    let core = new_core();
    let out = core.health().await.unwrap();
    assert_eq!(out.status, "healthy");
    assert_eq!(out.checks.get("database"), Some(&true));
}

#[tokio::test]
async fn bootstrap_assembles_capability_and_alias_entries() {
    let (core, repo) = new_core_with_repo();
    core.upsert(capreg_registry::UpsertRequest {
        set_default_env: Some("production".to_string()),
        ..upsert_req("intg", "boot.cap", 1, 0, 0)
    })
    .await
    .unwrap();
    repo.seed_registry_alias(RegistryAlias {
        id: "alias-partner".to_string(),
        alias: "partner".to_string(),
        nats_url: Some("nats://partner:4222".to_string()),
        registry_subject: Some("partner.registry.v1".to_string()),
        is_default: false,
        audit: capreg_core::AuditFields::created_now("system", chrono::Utc::now()),
    })
    .await;

    let snapshot = core
        .bootstrap(BootstrapRequest {
            env: Some("production".to_string()),
            minimum_capabilities: vec!["intg.boot.cap".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(snapshot.minimum_capabilities, vec!["intg.boot.cap".to_string()]);
    assert!(snapshot.capabilities.contains_key("intg.boot.cap"));
    let entry = &snapshot.capabilities["intg.boot.cap"];
    assert_eq!(entry.major, Some(1));
    assert_eq!(entry.subject, "cap.intg.boot_cap.v1");
    assert_eq!(snapshot.default_alias, "main");
    assert_eq!(snapshot.registry_aliases.len(), 1);
    assert!(snapshot.change_event_subjects.contains(&"registry.changed".to_string()));
}

#[tokio::test]
async fn bootstrap_never_fails_even_with_no_capabilities() {
    let core = new_core();
    let snapshot = core.bootstrap(BootstrapRequest::default()).await.unwrap();
    assert!(snapshot.capabilities.is_empty());
}
