//! Coverage for [`capreg_registry::RegistryCore::describe`]
//! (`spec.md` §4.3.3).

mod support;

use capreg_registry::DescribeRequest;
use support::{new_core, upsert_req};

#[tokio::test]
async fn exact_version_match_wins_over_major() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "b", 1, 1, 0)).await.unwrap();

    let out = core
        .describe(DescribeRequest {
            cap: "a.b".to_string(),
            version: Some("1.0.0".to_string()),
            major: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(out.version.version_string, "1.0.0");
}

#[tokio::test]
async fn falls_back_to_major_then_first_version() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 2, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "b", 1, 5, 0)).await.unwrap();

    let by_major = core
        .describe(DescribeRequest {
            cap: "a.b".to_string(),
            version: None,
            major: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(by_major.version.version_string, "1.5.0");

    let default = core
        .describe(DescribeRequest {
            cap: "a.b".to_string(),
            version: None,
            major: None,
        })
        .await
        .unwrap();
    assert_eq!(default.version.version_string, "2.0.0");
}

#[tokio::test]
async fn no_matching_selector_is_not_found() {
    let core = new_core();
    core.upsert(upsert_req("a", "b", 1, 0, 0)).await.unwrap();
    let err = core
        .describe(DescribeRequest {
            cap: "a.b".to_string(),
            version: Some("9.9.9".to_string()),
            major: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, capreg_core::ErrorCode::NotFound);
}

#[tokio::test]
async fn malformed_schema_json_decodes_leniently_to_empty_objects() {
    use capreg_registry::{MethodInput, UpsertRequest};
    use serde_json::json;

    let core = new_core();
    let mut req = upsert_req("a", "b", 1, 0, 0);
    req.methods = vec![MethodInput {
        name: "weird".to_string(),
        description: None,
        // Not a JSON object: describe must decode this leniently to `{}`.
        input_schema: json!("not-an-object"),
        output_schema: json!([1, 2, 3]),
        modes: vec![capreg_core::MethodMode::Sync],
        tags: Vec::new(),
        policies: json!(null),
        examples: vec![json!("also-not-an-object"), json!({"ok": true})],
    }];
    core.upsert(UpsertRequest { ..req }).await.unwrap();

    let out = core
        .describe(DescribeRequest {
            cap: "a.b".to_string(),
            version: Some("1.0.0".to_string()),
            major: None,
        })
        .await
        .unwrap();
    let method = &out.methods[0];
    assert!(method.input_schema.is_empty());
    assert!(method.output_schema.is_empty());
    assert!(method.policies.is_empty());
    // The non-object example is dropped, the object one survives.
    assert_eq!(method.examples.len(), 1);
}
