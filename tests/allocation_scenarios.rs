//! End-to-end allocation through the service over in-memory stores.

mod common;

use common::*;
use compliance_core::ComplianceError;
use compliance_types::{EntitlementFilter, InventoryFilter, InventoryUnit, InventoryUnitId, Metric};
use rust_decimal::Decimal;

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

#[tokio::test]
async fn explicit_and_catch_all_share_demand() {
    let e1 = entitlement("AG-1", PROCESSOR_PART, 10).with_hosts(["h1"]);
    let e2 = entitlement("AG-2", PROCESSOR_PART, 5).as_catch_all();
    let f = fixture(
        vec![
            host("h1", 4, &[PROCESSOR_PART]),
            host("h2", 3, &[PROCESSOR_PART]),
        ],
        vec![e1.clone(), e2.clone()],
    );

    let result = f
        .service
        .allocate(PROCESSOR_PART, &InventoryFilter::default())
        .await
        .unwrap();

    assert_eq!(result.entitlement(e1.id).unwrap().available, dec(6));
    assert_eq!(result.entitlement(e2.id).unwrap().available, dec(2));
    assert_eq!(result.used_count, dec(7));
    assert_eq!(result.available_count, dec(8));
    assert!(result.compliant);
}

#[tokio::test]
async fn catch_all_deficit_reported_unclamped() {
    let e1 = entitlement("AG-1", PROCESSOR_PART, 10).with_hosts(["h1"]);
    let e2 = entitlement("AG-2", PROCESSOR_PART, 5).as_catch_all();
    let f = fixture(
        vec![
            host("h1", 4, &[PROCESSOR_PART]),
            host("h2", 6, &[PROCESSOR_PART]),
        ],
        vec![e1.clone(), e2.clone()],
    );

    let result = f
        .service
        .allocate(PROCESSOR_PART, &InventoryFilter::default())
        .await
        .unwrap();

    assert_eq!(result.entitlement(e2.id).unwrap().available, dec(-1));
    assert_eq!(result.available_count, dec(5));
    assert_eq!(result.used_count, dec(10));
}

#[tokio::test]
async fn unlimited_is_compliant_regardless_of_use() {
    let f = fixture(
        vec![host("h1", 500, &[PROCESSOR_PART])],
        vec![entitlement("ULA", PROCESSOR_PART, 0).as_unlimited()],
    );
    let result = f
        .service
        .allocate(PROCESSOR_PART, &InventoryFilter::default())
        .await
        .unwrap();
    assert!(result.unlimited);
    assert!(result.compliant);
    assert_eq!(result.used_count, dec(500));
    assert_eq!(result.coverage, Decimal::ONE);
}

#[tokio::test]
async fn no_entitlements_means_uncovered() {
    let f = fixture(vec![host("h1", 6, &["Oracle ENT"])], vec![]);
    let result = f
        .service
        .allocate(PROCESSOR_PART, &InventoryFilter::default())
        .await
        .unwrap();
    assert!(result.uncovered);
    assert!(!result.compliant);
    assert_eq!(result.available_count, -result.used_count);
    assert_eq!(result.used_count, dec(6));
}

#[tokio::test]
async fn allocate_accepts_alias_and_rejects_unknown_part() {
    let f = fixture(vec![host("h1", 2, &[PROCESSOR_PART])], vec![]);
    let by_alias = f
        .service
        .allocate("Oracle ENT", &InventoryFilter::default())
        .await
        .unwrap();
    assert_eq!(by_alias.part_id, PROCESSOR_PART);

    let err = f
        .service
        .allocate("nope", &InventoryFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ComplianceError::PartNotFound(_)));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn cluster_scoped_demand_counted_once_per_cluster() {
    let f = fixture(
        vec![
            InventoryUnit::cluster("c1").with_cores(24),
            host("vm1", 4, &[CLUSTER_PART]).in_cluster("c1"),
            host("vm2", 4, &[CLUSTER_PART]).in_cluster("c1"),
        ],
        vec![entitlement("AG-C", CLUSTER_PART, 24).with_hosts(["vm1"])],
    );
    let result = f
        .service
        .allocate(CLUSTER_PART, &InventoryFilter::default())
        .await
        .unwrap();
    assert_eq!(result.metric, Metric::ClusterPooled);
    assert_eq!(result.used_count, dec(24));
    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].unit, InventoryUnitId::cluster("c1"));
    assert_eq!(result.covered_count, dec(24));
    assert_eq!(result.clusters[0].hosts, vec!["vm1", "vm2"]);
}

#[tokio::test]
async fn missing_core_count_is_a_warning_not_an_error() {
    let f = fixture(
        vec![
            InventoryUnit::host("nocores").using([PROCESSOR_PART]),
            host("h1", 2, &[PROCESSOR_PART]),
        ],
        vec![entitlement("AG-1", PROCESSOR_PART, 4).as_catch_all()],
    );
    let result = f
        .service
        .allocate(PROCESSOR_PART, &InventoryFilter::default())
        .await
        .unwrap();
    assert_eq!(result.used_count, dec(2));
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].unit, InventoryUnitId::host("nocores"));
}

#[tokio::test]
async fn report_skips_idle_parts_and_honours_location() {
    let mut italy = host("it1", 4, &[PROCESSOR_PART]);
    italy.location = Some("Italy".into());
    let mut germany = host("de1", 8, &[PROCESSOR_PART]);
    germany.location = Some("Germany".into());
    let f = fixture(
        vec![italy, germany],
        vec![entitlement("AG-1", PROCESSOR_PART, 6).as_catch_all()],
    );

    let all = f
        .service
        .compliance_report(&InventoryFilter::default())
        .await
        .unwrap();
    assert_eq!(all.core_factor_version, "test-factors");
    assert_eq!(all.parts.len(), 1);
    let part = all.part(PROCESSOR_PART).unwrap();
    assert_eq!(part.used_count, dec(12));
    assert_eq!(all.non_compliant().count(), 1);

    let italy_only = f
        .service
        .compliance_report(&InventoryFilter {
            location: Some("Italy".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(italy_only.part(PROCESSOR_PART).unwrap().used_count, dec(4));
    assert_eq!(italy_only.non_compliant().count(), 0);
}

#[tokio::test]
async fn named_user_demand_uses_processor_floor() {
    let f = fixture(
        vec![
            host("h1", 2, &[]),
            InventoryUnit::database("h1", "ERP")
                .with_users(10)
                .using([NUP_PART]),
        ],
        vec![entitlement("AG-N", NUP_PART, 100).as_catch_all()],
    );
    let result = f
        .service
        .allocate(NUP_PART, &InventoryFilter::default())
        .await
        .unwrap();
    assert_eq!(result.used_count, dec(50));
    assert_eq!(result.available_count, dec(50));
}

#[tokio::test]
async fn search_returns_allocation_rows() {
    let e1 = entitlement("AG-100", PROCESSOR_PART, 10).with_hosts(["h1"]);
    let e2 = entitlement("AG-200", PROCESSOR_PART, 1).as_catch_all();
    let f = fixture(
        vec![
            host("h1", 4, &[PROCESSOR_PART]),
            host("h2", 3, &[PROCESSOR_PART]),
        ],
        vec![e1.clone(), e2.clone()],
    );

    let negative = f
        .service
        .search_entitlements(&EntitlementFilter {
            available_count_lte: Some(Decimal::ZERO),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(negative.len(), 1);
    assert_eq!(negative[0].entitlement.id, e2.id);
    assert_eq!(negative[0].allocation.as_ref().unwrap().available, dec(-2));

    let by_agreement = f
        .service
        .search_entitlements(&EntitlementFilter {
            agreement_id: "ag-1".into(),
            metric: Some(Metric::Processor),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_agreement.len(), 1);
    assert_eq!(by_agreement[0].entitlement.id, e1.id);
    assert_eq!(by_agreement[0].version, 1);
    assert_eq!(by_agreement[0].item_description, "A90611 description");
}
