//! Integration tests for the order lifecycle service.
//!
//! These tests check the write/publish discipline of every entry point with
//! recording doubles for the store and the publisher.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{Decimal, EventKind, LifecycleEvent, NewOrder, Order, OrderId, OrderStatus};
use domain::{DomainError, EventPublisher, OrderEventPublisher, OrderService, PublishHandle};
use event_bus::{Delivery, InMemoryEventBus};
use order_store::{InMemoryOrderStore, OrderQuery, OrderStore};

/// Store wrapper counting writes.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryOrderStore,
    saves: AtomicUsize,
}

impl CountingStore {
    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for CountingStore {
    async fn save(&self, order: Order) -> order_store::Result<Order> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(order).await
    }

    async fn find_by_id(&self, id: OrderId) -> order_store::Result<Option<Order>> {
        self.inner.find_by_id(id).await
    }

    async fn query(&self, query: OrderQuery) -> order_store::Result<Vec<Order>> {
        self.inner.query(query).await
    }
}

/// Publisher recording every event it is handed.
#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: LifecycleEvent) -> PublishHandle {
        self.events.lock().unwrap().push(event);
        tokio::spawn(async {
            Ok(Delivery {
                topic: "recorded".to_string(),
                partition: 0,
                offset: 0,
            })
        })
        .into()
    }
}

fn create_service() -> (
    OrderService<Arc<CountingStore>, Arc<RecordingPublisher>>,
    Arc<CountingStore>,
    Arc<RecordingPublisher>,
) {
    let store = Arc::new(CountingStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    (
        OrderService::new(store.clone(), publisher.clone()),
        store,
        publisher,
    )
}

fn laptop_order() -> NewOrder {
    NewOrder::new("John Doe", "Laptop", 2, Decimal::from_str("999.99").unwrap())
}

mod write_paths {
    use super::*;

    #[tokio::test]
    async fn create_writes_once_then_publishes_once() {
        let (service, store, publisher) = create_service();

        let order = service.create_order(laptop_order()).await.unwrap();

        assert_eq!(store.saves(), 1);
        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventKind::Create);
        assert_eq!(events[0].order_id, order.id);
        assert_eq!(events[0].customer_name, "John Doe");
        assert_eq!(events[0].product_name, "Laptop");
        assert_eq!(events[0].quantity, 2);
        assert_eq!(events[0].price, Decimal::from_str("999.99").unwrap());
    }

    #[tokio::test]
    async fn update_writes_once_then_publishes_once() {
        let (service, store, publisher) = create_service();
        let id = service.create_order(laptop_order()).await.unwrap().id.unwrap();

        service
            .update_order_status(id, OrderStatus::Completed)
            .await
            .unwrap();

        assert_eq!(store.saves(), 2);
        let events = publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, EventKind::Update);
        assert_eq!(events[1].partition_key(), id.to_string());
    }

    #[tokio::test]
    async fn update_of_missing_order_neither_writes_nor_publishes() {
        let (service, store, publisher) = create_service();

        let result = service
            .update_order_status(OrderId::new(99), OrderStatus::Processing)
            .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert_eq!(store.saves(), 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn reads_neither_write_nor_publish() {
        let (service, store, publisher) = create_service();
        service.create_order(laptop_order()).await.unwrap();

        service.list_orders().await.unwrap();
        service.list_by_status(OrderStatus::Pending).await.unwrap();
        service.list_by_customer("John Doe").await.unwrap();
        service
            .list_expensive_by_status(Decimal::from(500), OrderStatus::Pending)
            .await
            .unwrap();

        assert_eq!(store.saves(), 1);
        assert_eq!(publisher.events().len(), 1);
    }
}

mod with_bus {
    use super::*;

    #[tokio::test]
    async fn direct_completion_is_published_keyed_by_order() {
        let bus = InMemoryEventBus::new();
        let service = OrderService::new(
            InMemoryOrderStore::new(),
            OrderEventPublisher::new(bus.clone(), "order-events"),
        );

        let order = service.create_order(laptop_order()).await.unwrap();
        let id = order.id.unwrap();
        let updated = service
            .update_order_status(id, OrderStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.order_status, OrderStatus::Completed);

        let records = bus.records("order-events");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.key.as_deref() == Some("1")));
        assert_eq!(records[0].partition, records[1].partition);

        let last: LifecycleEvent = serde_json::from_slice(&records[1].payload).unwrap();
        assert_eq!(last.event_type, EventKind::Update);
        assert_eq!(last.order_id, Some(id));
    }

    #[tokio::test]
    async fn orders_spread_by_key() {
        let bus = InMemoryEventBus::new();
        let service = OrderService::new(
            InMemoryOrderStore::new(),
            OrderEventPublisher::new(bus.clone(), "order-events"),
        );

        for i in 0..10 {
            service
                .create_order(NewOrder::new(format!("C{i}"), "Item", 1, Decimal::ONE))
                .await
                .unwrap();
        }

        let records = bus.records("order-events");
        assert_eq!(records.len(), 10);
        for record in &records {
            let event: LifecycleEvent = serde_json::from_slice(&record.payload).unwrap();
            assert_eq!(record.key, Some(event.partition_key()));
        }
    }
}
