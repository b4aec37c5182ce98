use parking_lot::Mutex;
use stash_core::{Cache, CacheConfig, CacheError, Ttl};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_add_single_winner() {
    let cache: Arc<Cache<usize>> = Arc::new(Cache::new(Ttl::Never, Duration::ZERO).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || cache.add("shared", i, Ttl::from_secs(60)).map(|_| i))
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(i) => winners.push(i),
            Err(err) => assert_eq!(err, CacheError::KeyExists("shared".to_string())),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(cache.get("shared"), Some(winners[0]));
    assert_eq!(cache.item_count(), 1);
}

#[test]
fn test_concurrent_writers_and_readers() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(Ttl::Never, Duration::ZERO).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    cache.set(format!("{}:{}", w, i), format!("value-{}", i), Ttl::Default);
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    if let Some(value) = cache.get(&format!("0:{}", i)) {
                        assert_eq!(value, format!("value-{}", i));
                    }
                    let _ = cache.objects();
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(cache.item_count(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cleanup_task_with_eviction_log() {
    let config = CacheConfig::new()
        .with_default_ttl(Ttl::from_millis(10))
        .with_cleanup_interval(Duration::from_millis(25));
    let cache: Arc<Cache<u32>> = Arc::new(Cache::from_config(&config).unwrap());

    let evicted = Arc::new(Mutex::new(Vec::new()));
    let log = evicted.clone();
    cache.on_evicted(move |key, value| log.lock().push((key.to_string(), value)));

    for i in 0..20 {
        cache.set_default(format!("short:{}", i), i);
    }
    cache.set("pinned", 99, Ttl::Never);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.item_count(), 1);
    assert_eq!(cache.get("pinned"), Some(99));

    let mut evicted = evicted.lock().clone();
    evicted.sort();
    assert_eq!(evicted.len(), 20);
    assert!(evicted.iter().all(|(key, value)| *key == format!("short:{}", value)));

    cache.close().await;
}
