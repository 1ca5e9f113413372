//! Async usage examples

use esox_connpool::{ConnectionPool, PoolConfiguration, PoolError, ResourceHooks};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Async Examples ===\n");

    // Example 1: Async get
    async_get().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

fn session_pool(config: PoolConfiguration) -> ConnectionPool<String> {
    let next = Arc::new(AtomicUsize::new(1));
    let hooks = ResourceHooks::new()
        .with_factory(move || Ok(format!("session-{}", next.fetch_add(1, Ordering::Relaxed))))
        .with_close(|_| Ok(()));
    ConnectionPool::new(config, hooks).expect("valid pool configuration")
}

async fn async_get() {
    println!("1. Async Get:");
    let pool = session_pool(PoolConfiguration::new().with_initial_cap(1).with_max_cap(2));

    {
        let conn = pool.get_async().await.unwrap();
        println!("   Got connection asynchronously: {}", *conn.get().unwrap());
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");

    let config = PoolConfiguration::new()
        .with_max_cap(1)
        .with_concurrent_base(1)
        .with_pool_timeout(Duration::from_millis(100));
    let pool = session_pool(config);

    // Hold the only admission token
    let _conn = pool.get_async().await.unwrap();

    // Try to get another (should timeout)
    match pool.get_async().await {
        Ok(_) => println!("   Got connection"),
        Err(PoolError::Timeout(after)) => println!("   Timed out after {:?}", after),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");

    let pool = session_pool(
        PoolConfiguration::new()
            .with_max_cap(3)
            .with_pool_timeout(Duration::from_secs(2)),
    );
    let mut tasks = Vec::new();

    for i in 0..10 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let conn = pool.get_async().await?;
            let name = conn.get()?.clone();
            tokio::time::sleep(Duration::from_millis(10)).await;
            pool.put(&conn)?;
            Ok::<_, PoolError>(format!("task {} used {}", i, name))
        }));
    }

    for task in tasks {
        match task.await {
            Ok(Ok(line)) => println!("   {}", line),
            Ok(Err(e)) => println!("   Error: {}", e),
            Err(e) => println!("   Task failed: {}", e),
        }
    }

    let metrics = pool.get_metrics();
    println!("   Created {} connections, reused {}", metrics.total_created, metrics.total_reused);
    println!();
}
