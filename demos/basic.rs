//! Basic usage: pooling TCP connections to a local listener

use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== EsoxSolutions.ConnectionPool - Basic Examples ===\n");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || echo_server(listener));

    let hooks = ResourceHooks::new()
        .with_factory(move || Ok(TcpStream::connect(addr)?))
        .with_close(|stream: TcpStream| Ok(stream.shutdown(Shutdown::Both)?))
        .with_ping(|stream: &TcpStream| match stream.take_error()? {
            Some(err) => Err(err.into()),
            None => Ok(()),
        });

    let config = PoolConfiguration::new()
        .with_initial_cap(2)
        .with_max_cap(4)
        .with_idle_timeout(Duration::from_secs(30))
        .with_pool_timeout(Duration::from_millis(500));

    let pool = ConnectionPool::new(config, hooks)?;

    // Example 1: Checkout and return
    println!("1. Checkout and return:");
    {
        let conn = pool.get()?;
        let mut stream = conn.get_mut()?;
        stream.write_all(b"ping")?;
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply)?;
        println!("   Reply: {}", String::from_utf8_lossy(&reply));
        drop(stream);
        pool.put(&conn)?;
    }
    println!("   Idle after return: {}\n", pool.len());

    // Example 2: Release
    println!("2. Release:");
    let in_flight = pool.get()?;
    pool.release();
    println!("   Idle after release: {}", pool.len());
    pool.put(&in_flight)?;
    println!("   Idle after returning a pre-release connection: {}\n", pool.len());

    // Example 3: Metrics and health
    println!("3. Metrics and health:");
    let metrics = pool.get_metrics();
    println!("   Created: {}", metrics.total_created);
    println!("   Closed: {}", metrics.total_closed);
    println!("   Live: {}/{}", metrics.live_connections, metrics.max_live);
    let health = pool.get_health_status();
    println!("   Healthy: {}", health.is_healthy());
    for warning in &health.warnings {
        println!("   Warning: {}", warning);
    }

    pool.shutdown();
    Ok(())
}

fn echo_server(listener: TcpListener) {
    for stream in listener.incoming() {
        let Ok(mut stream) = stream else { continue };
        thread::spawn(move || {
            let mut buf = [0u8; 256];
            while let Ok(n) = stream.read(&mut buf) {
                if n == 0 || stream.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        });
    }
}
