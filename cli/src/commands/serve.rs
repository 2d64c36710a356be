// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Coordinator bootstrap: wires adapters, services and workers, then serves
//! the HTTP API until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hybrid_coordinator_core::{
    application::{
        AugmentationSettings, ContextAugmentationService, FeedbackEvaluator, HealingOrchestrator, HealingSettings,
        InteractionRecorder, MaintenanceWorker, RecorderSettings, SemanticCache, SessionContextManager,
        TelemetryForwarder,
    },
    domain::{
        coordinator_config::{CoordinatorConfigManifest, CoordinatorConfigSpec, EmbeddingType, VectorStoreType},
        embedding::Embedder,
        fault::ErrorPatternMatcher,
        telemetry::TelemetryLog,
        vector_store::VectorContextStore,
    },
    infrastructure::{
        cache::LruCacheStore,
        embedding_client::{HashingEmbedder, OllamaEmbedder},
        event_bus::EventBus,
        resilience::{CircuitBreakerRegistry, RetryExecutor, RetryPolicy},
        runtime::DockerRuntime,
        telemetry_log::JsonlTelemetryLog,
        vector_store::{InMemoryVectorStore, QdrantVectorStore},
    },
    presentation::{app, AppState},
};

const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";

pub async fn run(config: CoordinatorConfigManifest) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    let spec = &config.spec;

    info!(
        name = %config.metadata.name,
        vector_store = ?spec.vector_store.store_type,
        embedding = ?spec.embedding.embedding_type,
        healing = spec.healing.enabled,
        "Hybrid coordinator starting"
    );

    if spec.observability.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], spec.observability.metrics.port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port = spec.observability.metrics.port, "Prometheus metrics exporter listening");
    }

    let shutdown_token = CancellationToken::new();
    let event_bus = EventBus::with_default_capacity();
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        spec.resilience.circuit_breaker.clone(),
        Some(event_bus.clone()),
    ));

    let store = build_vector_store(spec);
    let embedder = build_embedder(spec);
    let telemetry: Arc<dyn TelemetryLog> = Arc::new(JsonlTelemetryLog::new(spec.learning.telemetry_path.clone()));

    let sessions = Arc::new(SessionContextManager::new(spec.sessions.ttl, spec.sessions.token_budget));
    let cache = Arc::new(SemanticCache::new(
        Arc::new(LruCacheStore::new(spec.cache.capacity)),
        spec.cache.ttl,
    ));

    let augmentation = Arc::new(ContextAugmentationService::new(
        sessions.clone(),
        cache.clone(),
        store.clone(),
        embedder.clone(),
        breakers.clone(),
        AugmentationSettings::from_config(spec),
    ));

    let recorder = Arc::new(InteractionRecorder::new(
        sessions.clone(),
        store,
        embedder,
        telemetry.clone(),
        breakers.clone(),
        RetryExecutor::new(RetryPolicy::from(&spec.resilience.retry)),
        event_bus.clone(),
        RecorderSettings {
            promotion_threshold: spec.learning.promotion_threshold,
            novelty_threshold: spec.learning.novelty_threshold,
            call_timeout: spec.vector_store.call_timeout,
        },
    ));

    let mut workers = Vec::new();

    let forwarder = Arc::new(TelemetryForwarder::new(telemetry, event_bus.clone(), shutdown_token.clone()));
    workers.push(forwarder.start());

    let maintenance = Arc::new(MaintenanceWorker::new(
        sessions.clone(),
        cache,
        spec.learning.maintenance_interval,
        shutdown_token.clone(),
    ));
    workers.push(maintenance.start());

    let healing = build_healing(spec, event_bus, recorder.clone(), shutdown_token.clone()).await?;
    if let Some(healing) = &healing {
        workers.push(healing.clone().start());
    }

    let state = AppState {
        augmentation,
        feedback: Arc::new(FeedbackEvaluator::new(sessions.clone())),
        recorder,
        healing,
        breakers,
        sessions,
        start_time: Instant::now(),
    };
    let router = app(state, spec.server.request_timeout);

    let addr = format!("{}:{}", spec.server.bind_address, spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Hybrid coordinator listening on {}", addr);

    let server_token = shutdown_token.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_token.cancel();
        })
        .await;

    // Workers stop on the same token, including when the server failed
    shutdown_token.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "Background worker terminated abnormally");
        }
    }

    served.context("Server error")?;
    info!("Hybrid coordinator stopped");

    Ok(())
}

fn build_vector_store(spec: &CoordinatorConfigSpec) -> Arc<dyn VectorContextStore> {
    match spec.vector_store.store_type {
        VectorStoreType::Qdrant => {
            // Presence of the url is checked by validate()
            let url = spec.vector_store.url.clone().unwrap_or_default();
            info!(url = %url, "Using Qdrant vector store");
            Arc::new(QdrantVectorStore::new(url))
        }
        VectorStoreType::Memory => {
            warn!("Using in-memory vector store, promoted patterns will not survive a restart");
            Arc::new(InMemoryVectorStore::new())
        }
    }
}

fn build_embedder(spec: &CoordinatorConfigSpec) -> Arc<dyn Embedder> {
    let embedding = &spec.embedding;
    match embedding.embedding_type {
        EmbeddingType::Hashing => Arc::new(HashingEmbedder::new(embedding.dimension)),
        EmbeddingType::Ollama => Arc::new(OllamaEmbedder::new(
            embedding.endpoint.clone().unwrap_or_default(),
            embedding
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            embedding.dimension,
        )),
    }
}

/// Healing runs only when enabled and the container runtime answers
async fn build_healing(
    spec: &CoordinatorConfigSpec,
    event_bus: EventBus,
    recorder: Arc<InteractionRecorder>,
    shutdown_token: CancellationToken,
) -> Result<Option<Arc<HealingOrchestrator>>> {
    if !spec.healing.enabled {
        info!("Self-healing disabled");
        return Ok(None);
    }

    let runtime = match DockerRuntime::new(spec.healing.docker_socket_path.clone()) {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "Container runtime unavailable, self-healing disabled");
            return Ok(None);
        }
    };
    if let Err(e) = runtime.healthcheck().await {
        warn!(error = %e, "Container runtime not responding, self-healing disabled");
        return Ok(None);
    }

    let matcher = ErrorPatternMatcher::new().context("Failed to compile fault patterns")?;
    let orchestrator = HealingOrchestrator::new(
        Arc::new(runtime),
        matcher,
        event_bus,
        HealingSettings::from_config(&spec.healing, spec.vector_store.call_timeout),
        shutdown_token,
    )
    .with_recorder(recorder);
    orchestrator.register_all(&spec.healing.services);

    Ok(Some(Arc::new(orchestrator)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_and_hashing_embedder_from_config() {
        let mut spec = CoordinatorConfigSpec::default();
        spec.vector_store.store_type = VectorStoreType::Memory;
        spec.embedding.dimension = 64;

        let _store = build_vector_store(&spec);
        assert_eq!(build_embedder(&spec).dimension(), 64);
    }

    #[tokio::test]
    async fn test_healing_disabled_builds_nothing() {
        let mut spec = CoordinatorConfigSpec::default();
        spec.healing.enabled = false;
        spec.learning.telemetry_path = std::env::temp_dir().join("hcoord-serve-test.jsonl");

        let sessions = Arc::new(SessionContextManager::new(spec.sessions.ttl, spec.sessions.token_budget));
        let recorder = Arc::new(InteractionRecorder::new(
            sessions,
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(JsonlTelemetryLog::new(spec.learning.telemetry_path.clone())),
            Arc::new(CircuitBreakerRegistry::new(Default::default(), None)),
            RetryExecutor::default(),
            EventBus::new(4),
            RecorderSettings {
                promotion_threshold: 0.7,
                novelty_threshold: 0.9,
                call_timeout: spec.vector_store.call_timeout,
            },
        ));

        let healing = build_healing(&spec, EventBus::new(4), recorder, CancellationToken::new())
            .await
            .unwrap();
        assert!(healing.is_none());
    }
}
