//! Composition root for the fleetctl control plane: wires config, the
//! heartbeat broker, projection store, approval aggregate and cache engine
//! into one process and serves `fleetctl_ingress::router` over HTTP.
//!
//! Every collaborator has a production implementation (`rdkafka`, MongoDB)
//! and an in-memory stand-in; which one gets built is decided here, once,
//! from environment variables, so the rest of the workspace never needs to
//! know which backend it's running against.

use anyhow::Context;
use fleetctl_approval::{AllowAllAuthz, ApprovalAggregate, InMemoryApprovalStore, InMemoryDecisionStore, MongoApprovalStore, MongoDecisionStore};
use fleetctl_broker::{Broker, InMemoryBroker, KafkaBroker};
use fleetctl_cache::{CacheEngine, DistributedBackend, InMemoryDistributedBackend, LocalCache, NoopCache, TieredCache};
use fleetctl_consumer::BatchConsumer;
use fleetctl_core::config::{CacheMode, FleetConfig};
use fleetctl_core::observability::{init_tracing, TracingMetrics};
use fleetctl_ingress::AppState;
use fleetctl_projection::{InMemoryProjectionStore, ProjectionSweeper, ProjectionStore};
use std::sync::Arc;

const HEARTBEAT_TOPIC: &str = "heartbeats";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("FLEETCTL_CONFIG_PATH").ok();
    let config = FleetConfig::load(config_path.as_deref()).context("loading fleetctl configuration")?;

    let metrics = Arc::new(TracingMetrics);

    let broker = build_broker(&config).context("constructing broker")?;
    let projection_store = build_projection_store().await.context("constructing projection store")?;
    let (approval_store, decision_store) = build_approval_stores().await.context("constructing approval stores")?;
    let cache_engine = build_cache_engine(&config);

    let approvals = Arc::new(ApprovalAggregate::new(
        approval_store,
        decision_store,
        Arc::new(AllowAllAuthz),
        broker.clone(),
        chrono::Duration::from_std(config.approval.expiry_window).context("approval.expiry_window out of range")?,
    ));

    let projection_sweeper = ProjectionSweeper::spawn(
        projection_store.clone(),
        config.projection.sweep_interval,
        chrono::Duration::from_std(config.projection.miss_threshold).context("projection.miss_threshold out of range")?,
        chrono::Duration::from_std(config.projection.retirement_threshold).context("projection.retirement_threshold out of range")?,
    );
    let expiry_sweeper = fleetctl_approval::ExpirySweeper::spawn(approvals.clone(), config.approval.expiry_sweep_interval);

    let consumer = Arc::new(BatchConsumer::new(HEARTBEAT_TOPIC, config.consumer.clone(), projection_store.clone(), metrics.clone()));
    let consumer_brokers: Vec<Arc<dyn Broker>> = (0..config.consumer.concurrency).map(|_| broker.clone()).collect();
    let worker_handles = consumer.clone().run(consumer_brokers);

    let state = AppState { approvals, broker: broker.clone(), heartbeat_topic: HEARTBEAT_TOPIC.into(), cache: Arc::new(cache_engine) };
    let app = fleetctl_ingress::router(state);

    let bind_addr = std::env::var("FLEETCTL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "fleetctl.server.listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("serving http")?;

    tracing::info!("fleetctl.server.shutting_down");
    consumer.shutdown();
    for handle in worker_handles {
        let _ = handle.await;
    }
    projection_sweeper.shutdown().await;
    expiry_sweeper.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("installing ctrl_c handler must succeed");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("installing sigterm handler must succeed").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// `FLEETCTL_KAFKA_BOOTSTRAP_SERVERS` selects the Kafka-backed broker;
/// absent, falls back to an in-memory broker (single dev process, tests).
fn build_broker(config: &FleetConfig) -> anyhow::Result<Arc<dyn Broker>> {
    match std::env::var("FLEETCTL_KAFKA_BOOTSTRAP_SERVERS") {
        Ok(bootstrap_servers) => {
            let group_id = std::env::var("FLEETCTL_KAFKA_GROUP_ID").unwrap_or_else(|_| "fleetctl-control-plane".to_string());
            let broker = KafkaBroker::connect(&bootstrap_servers, &group_id)?;
            broker.subscribe(&[HEARTBEAT_TOPIC])?;
            Ok(Arc::new(broker))
        }
        Err(_) => {
            tracing::warn!("FLEETCTL_KAFKA_BOOTSTRAP_SERVERS unset, using in-memory broker");
            Ok(Arc::new(InMemoryBroker::new(config.consumer.concurrency.max(1) as i32)))
        }
    }
}

/// `FLEETCTL_MONGO_URI` selects the Mongo-backed projection store; absent,
/// falls back to an in-memory one.
async fn build_projection_store() -> anyhow::Result<Arc<dyn ProjectionStore>> {
    match std::env::var("FLEETCTL_MONGO_URI") {
        Ok(uri) => {
            let client = mongodb::Client::with_uri_str(&uri).await.context("connecting to mongodb")?;
            let db_name = std::env::var("FLEETCTL_MONGO_DATABASE").unwrap_or_else(|_| "fleetctl".to_string());
            let collection = client.database(&db_name).collection("fleet_projection");
            Ok(Arc::new(fleetctl_projection::MongoProjectionStore::new(collection)))
        }
        Err(_) => {
            tracing::warn!("FLEETCTL_MONGO_URI unset, using in-memory projection store");
            Ok(Arc::new(InMemoryProjectionStore::new()))
        }
    }
}

async fn build_approval_stores() -> anyhow::Result<(Arc<dyn fleetctl_approval::ApprovalStore>, Arc<dyn fleetctl_approval::DecisionStore>)> {
    match std::env::var("FLEETCTL_MONGO_URI") {
        Ok(uri) => {
            let client = mongodb::Client::with_uri_str(&uri).await.context("connecting to mongodb")?;
            let db_name = std::env::var("FLEETCTL_MONGO_DATABASE").unwrap_or_else(|_| "fleetctl".to_string());
            let db = client.database(&db_name);

            let approval_store = MongoApprovalStore::new(db.collection("approval_requests"));
            approval_store.ensure_indexes().await.context("ensuring approval_requests indexes")?;
            let decision_store = MongoDecisionStore::new(db.collection("approval_decisions"));
            decision_store.ensure_indexes().await.context("ensuring approval_decisions indexes")?;

            Ok((Arc::new(approval_store), Arc::new(decision_store)))
        }
        Err(_) => {
            tracing::warn!("FLEETCTL_MONGO_URI unset, using in-memory approval stores");
            Ok((Arc::new(InMemoryApprovalStore::new()), Arc::new(InMemoryDecisionStore::new())))
        }
    }
}

fn build_cache_engine(config: &FleetConfig) -> CacheEngine {
    let local = LocalCache::new(config.cache.local_capacity, config.cache.local_ttl);
    let provider: Box<dyn fleetctl_cache::CacheProvider> = match config.cache.mode {
        CacheMode::Noop => Box::new(NoopCache),
        CacheMode::Local => Box::new(local),
        CacheMode::Distributed | CacheMode::Tiered => {
            tracing::warn!(mode = ?config.cache.mode, "no L2 backend configured for this process, using an in-memory distributed stand-in");
            let distributed: Arc<dyn DistributedBackend> = Arc::new(InMemoryDistributedBackend::new());
            Box::new(TieredCache::new(local, distributed, config.cache.local_ttl))
        }
    };
    CacheEngine::new(provider, config.cache.compression_threshold_bytes, config.cache.local_ttl)
}
