//! Coverage for [`capreg_registry::RegistryCore::list_majors`]
//! (`spec.md` §4.3.7).

mod support;

use capreg_core::VersionStatus;
use capreg_registry::{DeprecateOrDisableRequest, ListMajorsRequest, SetDefaultMajorRequest};
use support::{new_core, upsert_req};

#[tokio::test]
async fn sorts_majors_descending_with_per_major_latest() {
    let core = new_core();
    for (major, minor, patch) in [(1, 0, 0), (1, 2, 0), (3, 0, 0), (2, 5, 1)] {
        core.upsert(upsert_req("a", "b", major, minor, patch)).await.unwrap();
    }

    let out = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap();
    let majors: Vec<u32> = out.majors.iter().map(|m| m.major).collect();
    assert_eq!(majors, vec![3, 2, 1]);

    let major_1 = out.majors.iter().find(|m| m.major == 1).unwrap();
    assert_eq!(major_1.latest_version, "1.2.0");
    assert_eq!(major_1.version_count, 2);
}

#[tokio::test]
async fn is_default_reflects_any_environment() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "b", 2, 0, 0)).await.unwrap();
    core.set_default_major(SetDefaultMajorRequest {
        cap: "a.b".to_string(),
        major: 2,
        env: Some("staging".to_string()),
    })
    .await
    .unwrap();

    let out = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap();
    let major_2 = out.majors.iter().find(|m| m.major == 2).unwrap();
    assert!(major_2.is_default);
    let major_1 = out.majors.iter().find(|m| m.major == 1).unwrap();
    assert!(!major_1.is_default);
}

#[tokio::test]
async fn disabled_versions_are_dropped_per_version_not_per_major() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 3, 1, 0)).await.unwrap();
    core.upsert(upsert_req("a", "b", 3, 2, 0)).await.unwrap();
    core.disable(DeprecateOrDisableRequest {
        cap: "a.b".to_string(),
        version: Some("3.2.0".to_string()),
        major: None,
        reason: "bad release".to_string(),
    })
    .await
    .unwrap();

    let out = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap();
    let major_3 = out.majors.iter().find(|m| m.major == 3).unwrap();
    assert_eq!(major_3.latest_version, "3.1.0");
    assert_eq!(major_3.status, VersionStatus::Active);
    assert_eq!(major_3.version_count, 1);

    let out_inactive = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: true,
        })
        .await
        .unwrap();
    let major_3_inactive = out_inactive.majors.iter().find(|m| m.major == 3).unwrap();
    assert_eq!(major_3_inactive.latest_version, "3.2.0");
    assert_eq!(major_3_inactive.status, VersionStatus::Disabled);
    assert_eq!(major_3_inactive.version_count, 2);
}

#[tokio::test]
async fn a_major_disappears_only_once_every_version_under_it_is_disabled() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 4, 0, 0)).await.unwrap();
    core.disable(DeprecateOrDisableRequest {
        cap: "a.b".to_string(),
        version: Some("4.0.0".to_string()),
        major: None,
        reason: "bad release".to_string(),
    })
    .await
    .unwrap();

    let out = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap();
    assert!(out.majors.iter().all(|m| m.major != 4));
}

#[tokio::test]
async fn is_default_reflects_a_custom_environment_name() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    core.set_default_major(SetDefaultMajorRequest {
        cap: "a.b".to_string(),
        major: 1,
        env: Some("canary-us-east".to_string()),
    })
    .await
    .unwrap();

    let out = core
        .list_majors(ListMajorsRequest {
            cap: "a.b".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap();
    let major_1 = out.majors.iter().find(|m| m.major == 1).unwrap();
    assert!(major_1.is_default);
}

#[tokio::test]
async fn unknown_capability_is_not_found() {
    let core = new_core();
    let err = core
        .list_majors(ListMajorsRequest {
            cap: "nope.nothing".to_string(),
            include_inactive: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, capreg_core::ErrorCode::NotFound);
}
