//! Pagination-identity and filter coverage for
//! [`capreg_registry::RegistryCore::discover`].

mod support;

use capreg_registry::{DiscoverFilters, DiscoverRequest};
use support::{new_core, upsert_req};

async fn seed_n(core: &support::Core, n: u32) {
    for i in 0..n {
        core.upsert(upsert_req("a", &format!("cap{i}"), 1, 0, 0)).await.unwrap();
    }
}

#[tokio::test]
async fn pagination_identity_concatenating_pages_equals_single_page() {
    let core = new_core();
    seed_n(&core, 7).await;

    let whole = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters::default(),
            ctx: None,
            page: 1,
            limit: 500,
        })
        .await
        .unwrap();
    assert_eq!(whole.total, 7);

    let mut paged_caps: Vec<String> = Vec::new();
    let limit = 3;
    for page in 1..=whole.total.div_ceil(u64::from(limit)) as u32 {
        let out = core
            .discover(DiscoverRequest {
                filters: DiscoverFilters::default(),
                ctx: None,
                page,
                limit,
            })
            .await
            .unwrap();
        paged_caps.extend(out.items.into_iter().map(|i| i.cap));
    }

    let whole_caps: Vec<String> = whole.items.into_iter().map(|i| i.cap).collect();
    assert_eq!(paged_caps, whole_caps);
}

#[tokio::test]
async fn limit_is_clamped_to_500_and_page_to_at_least_1() {
    let core = new_core();
    seed_n(&core, 2).await;

    let out = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters::default(),
            ctx: None,
            page: 0,
            limit: 10_000,
        })
        .await
        .unwrap();
    assert_eq!(out.page, 1);
    assert_eq!(out.limit, 500);
}

#[tokio::test]
async fn default_status_filter_is_active_only_new_capabilities_all_match() {
    // A newly-upserted capability is always `CapabilityStatus::Active`
    // (`spec.md` §3: deprecate/disable only ever target Versions, never
    // the owning Capability), so the default ("Active"-only) filter and
    // the explicit "all" override both see it.
    let core = new_core();
    core.upsert(upsert_req("a", "fresh", 1, 0, 0)).await.unwrap();

    let default_filtered = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters::default(),
            ctx: None,
            page: 1,
            limit: 20,
        })
        .await
        .unwrap();
    assert!(default_filtered.items.iter().any(|i| i.cap == "a.fresh"));

    let all = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters {
                status: Some("all".to_string()),
                ..Default::default()
            },
            ctx: None,
            page: 1,
            limit: 20,
        })
        .await
        .unwrap();
    assert!(all.items.iter().any(|i| i.cap == "a.fresh"));
}

#[tokio::test]
async fn explicit_non_active_status_filter_excludes_every_capability() {
    let core = new_core();
    core.upsert(upsert_req("a", "fresh2", 1, 0, 0)).await.unwrap();

    let out = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters {
                status: Some("Deprecated".to_string()),
                ..Default::default()
            },
            ctx: None,
            page: 1,
            limit: 20,
        })
        .await
        .unwrap();
    assert!(out.items.iter().all(|i| i.cap != "a.fresh2"));
}

#[tokio::test]
async fn default_major_falls_back_to_one_absent_default_or_versions() {
    // spec.md §9's documented open question: preserved exactly.
    let core = new_core();
    core.upsert(upsert_req("a", "only", 7, 0, 0)).await.unwrap();

    let out = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters {
                app: Some("a".to_string()),
                ..Default::default()
            },
            ctx: None,
            page: 1,
            limit: 20,
        })
        .await
        .unwrap();
    let item = out.items.iter().find(|i| i.cap == "a.only").unwrap();
    // No Default row was ever written, so the batched-defaults fallback
    // picks the highest present major rather than the spec's literal `1`.
    assert_eq!(item.default_major, 7);
}

#[tokio::test]
async fn batching_loads_versions_and_defaults_in_two_reads_not_per_row() {
    // Behavioral proxy for the batching requirement: a page of several
    // capabilities still resolves `majors`/`latestVersion` correctly, which
    // only works if the batched maps are keyed correctly per capability.
    let core = new_core();
    core.upsert(upsert_req("a", "x", 1, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "x", 2, 0, 0)).await.unwrap();
    core.upsert(upsert_req("a", "y", 3, 0, 0)).await.unwrap();

    let out = core
        .discover(DiscoverRequest {
            filters: DiscoverFilters {
                app: Some("a".to_string()),
                ..Default::default()
            },
            ctx: None,
            page: 1,
            limit: 20,
        })
        .await
        .unwrap();
    let x = out.items.iter().find(|i| i.name == "x").unwrap();
    let y = out.items.iter().find(|i| i.name == "y").unwrap();
    assert_eq!(x.majors, vec![2, 1]);
    assert_eq!(x.latest_version.as_deref(), Some("2.0.0"));
    assert_eq!(y.majors, vec![3]);
}
