mod common;

use common::{Mocks, World, POLL_INTERVAL};
use recycler_config::TransitConfig;
use recycler_domain::{
    Event, EventType, RecycleStatus, RecycleType, ResourceType, ReturnedWay, ShortRentalStatus,
    AUTO_HANDLER,
};
use recycler_testing_utils::{HostBuilder, MockInventoryClient, MockReturner, OrderBuilder};
use std::time::Duration;

#[tokio::test]
async fn test_other_resource_transit_to_done() {
    let world = World::new(Mocks::default());
    let order = OrderBuilder::new("A-1")
        .with_resource_type(ResourceType::Other)
        .with_status(RecycleStatus::Transiting)
        .with_total(5)
        .build();
    let hosts = HostBuilder::many(&order, 5, ReturnedWay::ProviderReturn);
    world.seed(&order, &hosts).await;

    world.dispatcher.add("A-1").await;
    world.dispatcher.run_once().await;

    let order = world.order("A-1").await;
    assert_eq!(order.status, RecycleStatus::Done);
    assert_eq!((order.success_num, order.pending_num, order.failed_num), (5, 0, 0));
    assert_eq!(order.handler, AUTO_HANDLER);
    assert!(world
        .hosts("A-1")
        .await
        .iter()
        .all(|h| h.status == RecycleStatus::Done));
    assert_eq!(world.mocks.shield.calls().len(), 1);
}

#[tokio::test]
async fn test_bulk_physical_machines_wait_for_audit() {
    let world = World::new(Mocks::default());
    let order = OrderBuilder::new("B-1")
        .with_resource_type(ResourceType::PhysicalMachine)
        .with_recycle_type(RecycleType::Regular)
        .with_status(RecycleStatus::Detecting)
        .with_total(15)
        .build();
    let hosts = HostBuilder::many(&order, 15, ReturnedWay::ProviderReturn);
    world.seed(&order, &hosts).await;

    world.dispatcher.add("B-1").await;
    assert_eq!(world.dispatcher.run_once().await, 1);

    assert_eq!(world.order("B-1").await.status, RecycleStatus::Audit);
    assert!(!world.dispatcher.queue().is_queued("B-1").await);
    assert!(world.mocks.inventory.moves().is_empty());
}

#[tokio::test]
async fn test_audit_rejection() {
    let world = World::new(Mocks::default());
    let order = OrderBuilder::new("C-1")
        .with_resource_type(ResourceType::PhysicalMachine)
        .with_recycle_type(RecycleType::Regular)
        .with_status(RecycleStatus::Audit)
        .with_total(12)
        .build();
    let hosts = HostBuilder::many(&order, 12, ReturnedWay::ProviderReturn);
    world.seed(&order, &hosts).await;

    let order = world
        .controller
        .audit_order("C-1", false, "policy violation")
        .await
        .unwrap();
    assert_eq!(order.status, RecycleStatus::Rejected);

    let stored = world.order("C-1").await;
    assert_eq!(stored.status, RecycleStatus::Rejected);
    assert_eq!(stored.message, "audit remark: policy violation");
    assert_eq!(stored.remark, "policy violation");
    assert_eq!(
        world.mocks.short_rental.notifications(),
        vec![("C-1".to_string(), ShortRentalStatus::Terminate)]
    );

    // 驳回后入队的终态只空转一次
    assert_eq!(world.dispatcher.run_once().await, 1);
    assert_eq!(world.order("C-1").await, stored);
}

#[tokio::test(start_paused = true)]
async fn test_return_handling_polls_after_delay() {
    let world = World::new(Mocks {
        returner: MockReturner::new().with_return_events(vec![Event::new(EventType::ReturnHandling)]),
        ..Mocks::default()
    });
    let order = OrderBuilder::new("D-1")
        .with_status(RecycleStatus::Returning)
        .with_total(2)
        .build();
    let hosts = HostBuilder::many(&order, 2, ReturnedWay::ProviderReturn);
    world.seed(&order, &hosts).await;
    let before = world.order("D-1").await;

    world.dispatcher.add("D-1").await;
    assert_eq!(world.dispatcher.run_once().await, 1);
    assert_eq!(world.order("D-1").await, before);
    assert!(!world.dispatcher.queue().is_queued("D-1").await);

    tokio::time::sleep(POLL_INTERVAL - Duration::from_secs(1)).await;
    assert!(!world.dispatcher.queue().is_queued("D-1").await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(world.dispatcher.queue().is_queued("D-1").await);
    assert_eq!(world.mocks.returner.return_count(), 1);
}

#[tokio::test]
async fn test_partial_transit_failure() {
    let pool = TransitConfig::default().pool_container_id;
    let world = World::new(Mocks {
        inventory: MockInventoryClient::new().failing_moves_to(pool),
        ..Mocks::default()
    });
    let order = OrderBuilder::new("E-1")
        .with_status(RecycleStatus::Transiting)
        .with_total(10)
        .build();
    let mut hosts = HostBuilder::many(&order, 8, ReturnedWay::ProviderReturn);
    hosts.push(
        HostBuilder::new(&order, 9)
            .with_returned_way(ReturnedWay::ResourcePool)
            .build(),
    );
    hosts.push(
        HostBuilder::new(&order, 10)
            .with_returned_way(ReturnedWay::ResourcePool)
            .build(),
    );
    world.seed(&order, &hosts).await;

    world.dispatcher.add("E-1").await;
    world.dispatcher.run_once().await;

    let order = world.order("E-1").await;
    assert_eq!(order.status, RecycleStatus::TransitFailed);
    assert_eq!((order.success_num, order.pending_num, order.failed_num), (8, 0, 2));
    assert_eq!(order.handler, "cmdb-ops");

    let failed: Vec<i64> = world
        .hosts("E-1")
        .await
        .into_iter()
        .filter(|h| h.status == RecycleStatus::TransitFailed)
        .map(|h| h.host_id)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.contains(&9) && failed.contains(&10));
}

#[tokio::test]
async fn test_full_lifecycle_vm() {
    let world = World::new(Mocks::default());
    let order = OrderBuilder::new("F-1").build();
    let hosts = HostBuilder::many(&order, 3, ReturnedWay::ProviderReturn);
    world.controller.create_order(order, hosts).await.unwrap();

    world.controller.commit_order("F-1").await.unwrap();
    world.dispatcher.run_once().await;

    let order = world.order("F-1").await;
    assert_eq!(order.status, RecycleStatus::Done);
    assert_eq!((order.total_num, order.success_num), (3, 3));
    assert_eq!(
        world.mocks.short_rental.notifications(),
        vec![("F-1".to_string(), ShortRentalStatus::Returned)]
    );
    assert_eq!(world.mocks.detector.run_count(), 1);
    assert_eq!(world.detect_tasks("F-1").await.len(), 3);
}
