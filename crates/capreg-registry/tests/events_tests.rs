//! `spec.md` §8: "every successful mutation increments revision exactly
//! once and emits exactly one `RegistryChanged`" — verified at the core
//! level (the granular/global subject fan-out itself is `capreg-events`'s
//! concern and is covered there).

mod support;

use capreg_registry::{DeprecateOrDisableRequest, SetDefaultMajorRequest};
use support::{new_core_with_events, upsert_req};

#[tokio::test]
async fn upsert_emits_exactly_one_event_and_bumps_revision() {
    let (core, events) = new_core_with_events();
    let out = core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    assert_eq!(events.events().await.len(), 1);
    assert_eq!(out.revision, 1);

    core.upsert(upsert_req("a", "b", 1, 1, 0)).await.unwrap();
    assert_eq!(events.events().await.len(), 2);
}

#[tokio::test]
async fn set_default_major_emits_exactly_one_event() {
    let (core, events) = new_core_with_events();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    assert_eq!(events.events().await.len(), 1);

    let out = core
        .set_default_major(SetDefaultMajorRequest {
            cap: "a.b".to_string(),
            major: 1,
            env: None,
        })
        .await
        .unwrap();
    assert_eq!(events.events().await.len(), 2);
    let last = events.events().await.into_iter().last().unwrap();
    assert_eq!(last.changed_fields, vec!["defaultMajor".to_string()]);
    assert_eq!(last.new_default_major, Some(1));
    assert_eq!(out.new_default_major, 1);
}

#[tokio::test]
async fn deprecate_emits_exactly_one_event_for_multiple_affected_versions() {
    let (core, events) = new_core_with_events();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "b", 2, 0, 0)).await.unwrap();
    assert_eq!(events.events().await.len(), 2);

    core.deprecate(DeprecateOrDisableRequest {
        cap: "a.b".to_string(),
        version: None,
        major: None,
        reason: "EOL".to_string(),
    })
    .await
    .unwrap();
    assert_eq!(events.events().await.len(), 3);
    let last = events.events().await.into_iter().last().unwrap();
    assert_eq!(last.changed_fields, vec!["status".to_string()]);
    let mut majors = last.affected_majors.clone();
    majors.sort_unstable();
    assert_eq!(majors, vec![1, 2]);
}

#[tokio::test]
async fn revision_is_monotonic_per_capability_across_mutations() {
    let (core, _events) = new_core_with_events();
    let r1 = core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    let r2 = core
        .set_default_major(SetDefaultMajorRequest {
            cap: "a.b".to_string(),
            major: 1,
            env: None,
        })
        .await
        .unwrap();
    let r3 = core
        .deprecate(DeprecateOrDisableRequest {
            cap: "a.b".to_string(),
            version: Some("1.0.0".to_string()),
            major: None,
            reason: "done".to_string(),
        })
        .await
        .unwrap();
    assert!(r1.revision < r2.revision);
    assert!(r2.revision < r3.revision);
}
