//! Queue integration tests.
//!
//! A worker pool drains forward tasks against a local HTTP endpoint.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use ferry_queue::{
    ForwardTask, MemoryTaskQueue, MemoryTaskStorage, RetryConfig, TaskId, TaskQueue, TaskStorage,
    WorkerContext, WorkerPool, delivery_client,
};
use tokio::sync::Mutex;
use url::Url;

#[derive(Clone, Default)]
struct Remote {
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Number of requests to reject before accepting.
    reject: Arc<Mutex<u32>>,
}

async fn inbox(State(remote): State<Remote>, body: Bytes) -> StatusCode {
    let mut reject = remote.reject.lock().await;
    if *reject > 0 {
        *reject -= 1;
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    remote.bodies.lock().await.push(body.to_vec());
    StatusCode::ACCEPTED
}

async fn spawn_remote(remote: Remote) -> Url {
    let app = Router::new()
        .route("/inbox", post(inbox))
        .with_state(remote);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/inbox")).unwrap()
}

#[tokio::test]
async fn test_pool_delivers_every_forward_task() {
    let remote = Remote::default();
    let target = spawn_remote(remote.clone()).await;
    let client = delivery_client(Duration::from_secs(5), "ferry-test").unwrap();

    let queue = Arc::new(MemoryTaskQueue::new(1));
    let storage = Arc::new(MemoryTaskStorage::new());
    let ctx = WorkerContext::new(queue.clone(), storage.clone());
    let pool = WorkerPool::spawn(2, &ctx);

    let mut ids = Vec::new();
    for n in 0..5 {
        let id = TaskId::generate();
        let payload = format!(r#"{{"n":{n}}}"#);
        let task = ForwardTask::new(id.clone(), target.clone(), payload, client.clone());
        assert!(storage.put(Arc::new(task), id.clone()).await);
        assert!(queue.enqueue(id.clone()).await);
        ids.push(id);
    }

    queue.close();
    tokio::time::timeout(Duration::from_secs(10), pool.join())
        .await
        .unwrap();

    let finished = queue.list_finished().await;
    for id in &ids {
        assert!(finished.contains(id));
    }
    assert_eq!(remote.bodies.lock().await.len(), 5);
    assert!(ctx.dead_letters.is_empty().await);
}

#[tokio::test]
async fn test_rejected_delivery_is_dead_lettered() {
    let remote = Remote {
        reject: Arc::new(Mutex::new(u32::MAX)),
        ..Remote::default()
    };
    let target = spawn_remote(remote.clone()).await;
    let client = delivery_client(Duration::from_secs(5), "ferry-test").unwrap();

    let queue = Arc::new(MemoryTaskQueue::new(1));
    let storage = Arc::new(MemoryTaskStorage::new());
    let ctx = WorkerContext::new(queue.clone(), storage.clone());
    let pool = WorkerPool::spawn(1, &ctx);

    let id = TaskId::generate();
    let task = ForwardTask::new(id.clone(), target, "{}", client);
    storage.put(Arc::new(task), id.clone()).await;
    queue.enqueue(id.clone()).await;

    queue.close();
    pool.join().await;

    let dead = ctx.dead_letters.list().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job, id);
    assert_eq!(dead[0].attempts, 1);
    assert!(queue.list_finished().await.contains(&id));
}

#[tokio::test]
async fn test_retry_recovers_from_transient_rejection() {
    let remote = Remote {
        reject: Arc::new(Mutex::new(2)),
        ..Remote::default()
    };
    let target = spawn_remote(remote.clone()).await;
    let client = delivery_client(Duration::from_secs(5), "ferry-test").unwrap();

    let queue = Arc::new(MemoryTaskQueue::new(1));
    let storage = Arc::new(MemoryTaskStorage::new());
    let ctx = WorkerContext::new(queue.clone(), storage.clone()).with_retry(RetryConfig {
        max_retries: 3,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
    });
    let pool = WorkerPool::spawn(1, &ctx);

    let id = TaskId::generate();
    let task = ForwardTask::new(id.clone(), target, r#"{"type":"Create"}"#, client);
    storage.put(Arc::new(task), id.clone()).await;
    queue.enqueue(id).await;

    queue.close();
    pool.join().await;

    assert!(ctx.dead_letters.is_empty().await);
    assert_eq!(
        remote.bodies.lock().await.as_slice(),
        &[br#"{"type":"Create"}"#.to_vec()]
    );
}
