// EsoxSolutions.ConnectionPool
// Bounded, thread-safe connection pool with admission control

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
use std::sync::atomic::{AtomicUsize, Ordering};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== EsoxSolutions.ConnectionPool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let next_id = AtomicUsize::new(1);
    let hooks = ResourceHooks::new()
        .with_factory(move || Ok(next_id.fetch_add(1, Ordering::Relaxed)))
        .with_close(|id| {
            println!("  Closing connection #{}", id);
            Ok(())
        });
    let pool = ConnectionPool::new(PoolConfiguration::new().with_initial_cap(1).with_max_cap(2), hooks)?;

    {
        let conn = pool.get()?;
        println!("  Got connection #{}", *conn.get()?);
    }

    println!("  Idle after return: {}", pool.len());
    pool.shutdown();
    Ok(())
}
