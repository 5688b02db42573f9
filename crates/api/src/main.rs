//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use domain::{EventPublisher, OrderEventPublisher};
use event_bus::{EventBus, InMemoryEventBus};
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use processor::{EventConsumer, OrderEventProcessor, SimulatedDelay};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn connect_store(config: &Config) -> Arc<dyn OrderStore> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresOrderStore::connect(url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL order store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory order store");
            Arc::new(InMemoryOrderStore::new())
        }
    }
}

#[cfg(feature = "kafka")]
async fn connect_kafka(config: &Config) -> Option<Arc<dyn EventBus>> {
    let brokers = config.kafka_brokers.as_deref()?;
    let bus = event_bus::KafkaEventBus::new(brokers).expect("failed to create Kafka producer");
    let partitions = i32::try_from(config.order_events_partitions).unwrap_or(i32::MAX);
    bus.ensure_topic(&config.order_events_topic, partitions)
        .await
        .expect("failed to provision order events topic");
    tracing::info!(%brokers, "using Kafka event bus");
    Some(Arc::new(bus))
}

#[cfg(not(feature = "kafka"))]
async fn connect_kafka(config: &Config) -> Option<Arc<dyn EventBus>> {
    if config.kafka_brokers.is_some() {
        tracing::warn!("KAFKA_BROKERS is set but the kafka feature is disabled");
    }
    None
}

async fn connect_bus(config: &Config) -> Arc<dyn EventBus> {
    if let Some(bus) = connect_kafka(config).await {
        return bus;
    }

    tracing::info!("using in-memory event bus");
    let bus = InMemoryEventBus::with_partitions(config.order_events_partitions);
    bus.ensure_topic(&config.order_events_topic, config.order_events_partitions);
    Arc::new(bus)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    api::telemetry::init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect the order store and the event bus
    let store = connect_store(&config).await;
    let bus = connect_bus(&config).await;

    // 4. Start the event processor
    let processor = Arc::new(OrderEventProcessor::new(
        store.clone(),
        SimulatedDelay::new(config.processing_delay()),
    ));
    let consumer = EventConsumer::new(
        processor,
        config.order_events_topic.as_str(),
        config.consumer_group.as_str(),
    );
    let consumer_bus = bus.clone();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(&consumer_bus).await {
            tracing::error!(error = %e, "event consumer failed");
        }
    });

    // 5. Build the application
    let publisher: Arc<dyn EventPublisher> = Arc::new(OrderEventPublisher::new(
        bus,
        config.order_events_topic.as_str(),
    ));
    let state = api::create_state(store, publisher);
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, topic = %config.order_events_topic, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop consuming once no more requests can arrive
    consumer_task.abort();

    tracing::info!("server shut down gracefully");
}
