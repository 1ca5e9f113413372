use esox_connpool::{ConnectionPool, PoolConfiguration, PoolError, ResourceHooks};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Fake backend that records every open and close
#[derive(Default)]
struct Backend {
    opened: AtomicUsize,
    live: AtomicUsize,
    closed: Mutex<Vec<usize>>,
}

impl Backend {
    fn hooks(self: &Arc<Self>) -> ResourceHooks<usize> {
        let open = Arc::clone(self);
        let close = Arc::clone(self);
        ResourceHooks::new()
            .with_factory(move || {
                open.live.fetch_add(1, Ordering::SeqCst);
                Ok(open.opened.fetch_add(1, Ordering::SeqCst))
            })
            .with_close(move |id| {
                close.live.fetch_sub(1, Ordering::SeqCst);
                close.closed.lock().unwrap().push(id);
                Ok(())
            })
    }

    fn closed(&self) -> Vec<usize> {
        self.closed.lock().unwrap().clone()
    }
}

fn pool(config: PoolConfiguration) -> (ConnectionPool<usize>, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let pool = ConnectionPool::new(config, backend.hooks()).unwrap();
    (pool, backend)
}

#[test]
fn len_matches_initial_cap_after_construction() {
    for initial in 0..=4 {
        let (pool, backend) = pool(PoolConfiguration::new().with_initial_cap(initial).with_max_cap(4));
        assert_eq!(pool.len(), initial);
        assert_eq!(backend.opened.load(Ordering::SeqCst), initial);
    }
}

#[test]
fn handle_accessor_fails_after_put_or_close() {
    let (pool, _) = pool(PoolConfiguration::new().with_max_cap(2));

    let put_back = pool.get().unwrap();
    let closed = pool.get().unwrap();
    assert!(put_back.get().is_ok());
    assert!(closed.get().is_ok());

    pool.put(&put_back).unwrap();
    pool.close(&closed).unwrap();

    assert!(matches!(put_back.get(), Err(PoolError::HandleClosed)));
    assert!(matches!(closed.get(), Err(PoolError::HandleClosed)));
}

#[test]
fn len_tracks_idle_checkouts_and_returns() {
    let (pool, _) = pool(PoolConfiguration::new().with_initial_cap(3).with_max_cap(3));

    let a = pool.get().unwrap();
    assert_eq!(pool.len(), 2);
    let b = pool.get().unwrap();
    assert_eq!(pool.len(), 1);

    pool.put(&a).unwrap();
    assert_eq!(pool.len(), 2);
    pool.put(&b).unwrap();
    assert_eq!(pool.len(), 3);
}

#[test]
fn capacity_exhaustion_times_out() {
    let (pool, _) = pool(
        PoolConfiguration::new()
            .with_max_cap(1)
            .with_concurrent_base(1)
            .with_pool_timeout(Duration::from_millis(100)),
    );

    let _held = pool.get().unwrap();

    let contender = pool.clone();
    let waited = thread::spawn(move || {
        let start = Instant::now();
        let result = contender.get();
        (result.map(|_| ()), start.elapsed())
    })
    .join()
    .unwrap();

    assert!(matches!(waited.0, Err(PoolError::Timeout(t)) if t == Duration::from_millis(100)));
    assert!(waited.1 >= Duration::from_millis(100));
}

#[test]
fn saturated_get_takes_connection_returned_while_waiting() {
    let (pool, backend) = pool(
        PoolConfiguration::new()
            .with_max_cap(1)
            .with_concurrent_base(1)
            .with_pool_timeout(Duration::from_millis(500)),
    );

    let held = pool.get().unwrap();
    let held_id = *held.get().unwrap();

    let contender = pool.clone();
    let waiter = thread::spawn(move || {
        let start = Instant::now();
        let result = contender.get().map(|handle| *handle.get().unwrap());
        (result, start.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    pool.put(&held).unwrap();

    let (result, waited) = waiter.join().unwrap();
    assert_eq!(result.unwrap(), held_id);
    assert!(waited < Duration::from_millis(500));
    assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    assert!(backend.closed().is_empty());
}

#[test]
fn unbounded_pool_timeout_is_accepted() {
    let (pool, backend) = pool(
        PoolConfiguration::new()
            .with_initial_cap(1)
            .with_max_cap(1)
            .with_concurrent_base(1)
            .with_pool_timeout(Duration::MAX),
    );

    let held = pool.get().unwrap();
    let contender = pool.clone();
    let waiter = thread::spawn(move || contender.get().map(|handle| *handle.get().unwrap()));

    thread::sleep(Duration::from_millis(20));
    pool.close(&held).unwrap();

    assert_eq!(waiter.join().unwrap().unwrap(), 1);
    assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
}

#[test]
fn reuse_does_not_call_factory() {
    let (pool, backend) = pool(PoolConfiguration::new().with_initial_cap(1).with_max_cap(1));

    let first = pool.get().unwrap();
    let id = *first.get().unwrap();
    pool.put(&first).unwrap();

    let second = pool.get().unwrap();
    assert_eq!(*second.get().unwrap(), id);
    assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
}

#[test]
fn idle_connection_is_replaced_and_closed_once() {
    let (pool, backend) = pool(
        PoolConfiguration::new()
            .with_initial_cap(1)
            .with_max_cap(1)
            .with_idle_timeout(Duration::from_millis(30)),
    );

    let handle = pool.get().unwrap();
    let old = *handle.get().unwrap();
    pool.put(&handle).unwrap();

    thread::sleep(Duration::from_millis(60));

    let fresh = pool.get().unwrap();
    assert_ne!(*fresh.get().unwrap(), old);
    assert_eq!(backend.closed(), vec![old]);
    assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
}

#[test]
fn release_mid_flight_discards_both_handles() {
    let (pool, backend) = pool(PoolConfiguration::new().with_max_cap(2));

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    pool.release();

    pool.put(&a).unwrap();
    pool.put(&b).unwrap();

    assert_eq!(pool.len(), 0);
    let mut closed = backend.closed();
    closed.sort();
    assert_eq!(closed, vec![0, 1]);
}

#[test]
fn release_keeps_only_new_connections() {
    let (pool, backend) = pool(PoolConfiguration::new().with_initial_cap(1).with_max_cap(2).with_concurrent_base(1));

    let c1 = pool.get().unwrap();
    let c2 = pool.get().unwrap();
    pool.put(&c1).unwrap();
    pool.put(&c2).unwrap();
    assert_eq!(pool.len(), 2);

    pool.release();
    assert_eq!(pool.len(), 0);
    assert_eq!(backend.closed().len(), 2);

    let in_flight = pool.get().unwrap();
    pool.release();
    assert_eq!(pool.len(), 0);
    pool.put(&in_flight).unwrap();
    assert_eq!(pool.len(), 0);

    let n1 = pool.get().unwrap();
    let n2 = pool.get().unwrap();
    pool.put(&n1).unwrap();
    pool.put(&n2).unwrap();
    assert_eq!(pool.len(), 2);

    let closed: HashSet<usize> = backend.closed().into_iter().collect();
    assert_eq!(closed.len(), 3);
    assert_eq!(backend.live.load(Ordering::SeqCst), 2);
}

#[test]
fn double_put_closes_at_most_once() {
    let (pool, backend) = pool(PoolConfiguration::new().with_max_cap(1).with_concurrent_base(1));

    let handle = pool.get().unwrap();
    pool.release();
    pool.put(&handle).unwrap();
    assert!(matches!(pool.put(&handle), Err(PoolError::HandleClosed)));
    assert!(matches!(pool.close(&handle), Err(PoolError::HandleClosed)));

    assert_eq!(backend.closed(), vec![0]);
}

#[test]
fn factory_error_surfaces_to_caller() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let hooks = ResourceHooks::new()
        .with_factory(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into())
            } else {
                Ok(1u32)
            }
        })
        .with_close(|_| Ok(()));
    let pool = ConnectionPool::new(PoolConfiguration::new().with_max_cap(1).with_concurrent_base(1), hooks).unwrap();

    assert!(matches!(pool.get(), Err(PoolError::GenerateFailed(_))));
    assert_eq!(pool.live_count(), 0);
    assert!(pool.get().is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn close_error_is_propagated() {
    let hooks = ResourceHooks::new()
        .with_factory(|| Ok(7u8))
        .with_close(|_| Err("socket already reset".into()));
    let pool = ConnectionPool::new(PoolConfiguration::new(), hooks).unwrap();

    let handle = pool.get().unwrap();
    match pool.close(&handle) {
        Err(PoolError::CloseFailed(source)) => assert_eq!(source.to_string(), "socket already reset"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(pool.live_count(), 0);
}

#[test]
fn admission_bound_holds_under_contention() {
    let (pool, backend) = pool(
        PoolConfiguration::new()
            .with_initial_cap(2)
            .with_max_cap(3)
            .with_concurrent_base(2)
            .with_pool_timeout(Duration::from_millis(200)),
    );
    let max_live = pool.max_live();

    thread::scope(|scope| {
        for worker in 0..12 {
            let pool = pool.clone();
            scope.spawn(move || {
                for round in 0..50 {
                    let Ok(handle) = pool.get() else { continue };
                    assert!(pool.live_count() <= max_live);
                    thread::yield_now();
                    if (worker + round) % 7 == 0 {
                        pool.close(&handle).unwrap();
                    } else {
                        pool.put(&handle).unwrap();
                    }
                    if worker == 0 && round % 10 == 0 {
                        pool.release();
                    }
                }
            });
        }
    });

    assert_eq!(pool.live_count(), backend.live.load(Ordering::SeqCst));
    assert_eq!(pool.len(), pool.live_count());

    let closed = backend.closed();
    let unique: HashSet<usize> = closed.iter().copied().collect();
    assert_eq!(unique.len(), closed.len(), "a connection was closed twice");
}

#[test]
fn shutdown_is_terminal() {
    let (pool, backend) = pool(PoolConfiguration::new().with_initial_cap(2).with_max_cap(2));

    pool.shutdown();
    assert!(pool.is_closed());
    assert!(matches!(pool.get(), Err(PoolError::PoolClosed)));
    assert_eq!(backend.closed().len(), 2);
    assert!(!pool.get_health_status().is_healthy());
}
