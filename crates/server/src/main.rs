//! ferry relay entry point.

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, routing::get};
use ferry_common::{Config, KeyStore, config::LoggingConfig};
use ferry_federation::{
    ActivityStreamsNormalizer, ActorDocument, ActorState, CachingDocumentLoader, InboxState,
    MemorySubscriptionManager, router as federation_router,
};
use ferry_queue::{
    MemoryTaskQueue, MemoryTaskStorage, RetryConfig, WorkerContext, WorkerPool, delivery_client,
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
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
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "ferry=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Relay routes: federation endpoints plus a liveness check.
fn app(inbox: InboxState, actor: ActorState) -> Router {
    federation_router(inbox, actor)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("could not load configuration")?;
    init_tracing(&config.logging);

    info!("Starting ferry relay...");

    let keys = KeyStore::load(&config.server.public_key, &config.server.private_key)
        .await
        .context("could not load relay keys")?;
    let actor = ActorState::new(ActorDocument::new(&config, &keys)?);
    let inbox_url = config.inbox_url()?;
    info!(inbox = %inbox_url, "Relay keys loaded");

    let client = delivery_client(config.delivery.timeout(), &config.delivery.user_agent)
        .context("could not build delivery client")?;
    let contexts =
        CachingDocumentLoader::with_timeout(config.delivery.timeout(), &config.delivery.user_agent)
            .context("could not build context loader")?;

    let queue = Arc::new(MemoryTaskQueue::new(config.queue.capacity));
    let storage = Arc::new(MemoryTaskStorage::new());
    let subscriptions = Arc::new(MemorySubscriptionManager::new());

    // Start delivery workers
    let ctx = WorkerContext::new(queue.clone(), storage.clone())
        .with_retry(RetryConfig::from(&config.delivery));
    let pool = WorkerPool::spawn(config.queue.workers, &ctx);
    info!(workers = pool.len(), "Delivery workers started");

    let inbox = InboxState::new(
        Arc::new(ActivityStreamsNormalizer::with_loader(Arc::new(contexts))),
        subscriptions,
        storage,
        queue.clone(),
        client,
        inbox_url,
    )
    .with_max_body_bytes(config.inbox.max_body_bytes);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app(inbox, actor))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop accepting forwards; tasks in flight finish, pending backoffs are cut short
    queue.close();
    pool.shutdown().await;
    let failed = ctx.dead_letters.len().await;
    if failed > 0 {
        warn!(failed, "Forwards left undelivered");
    }

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use ferry_common::config::ServerConfig;
    use ferry_common::keys::fixtures;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Config::new(ServerConfig::new(
            "https",
            "relay.example.org",
            "unused.pub",
            "unused.pem",
        ));
        let queue = Arc::new(MemoryTaskQueue::new(8));
        let inbox = InboxState::new(
            Arc::new(ActivityStreamsNormalizer::new()),
            Arc::new(MemorySubscriptionManager::new()),
            Arc::new(MemoryTaskStorage::new()),
            queue,
            delivery_client(Duration::from_secs(1), "ferry-test").unwrap(),
            config.inbox_url().unwrap(),
        );
        let actor =
            ActorState::new(ActorDocument::new(&config, &fixtures::key_store()).unwrap());
        app(inbox, actor)
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_inbox_is_mounted() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/inbox")
                    .method("POST")
                    .header("content-type", "application/activity+json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
