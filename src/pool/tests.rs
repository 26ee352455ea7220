use super::*;
use crate::error::message_error;
use crate::logging::{Logger, NoopLogger};
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn quick_config(min: usize, max: usize) -> PoolConfig {
    PoolConfig::builder()
        .name("unit")
        .min_workers(min)
        .max_workers(max)
        .check_interval(Duration::from_millis(10))
        .max_check_interval(Duration::from_millis(80))
        .logger(Arc::new(NoopLogger))
        .build()
        .unwrap()
}

fn identity() -> impl Handler<u64, u64> {
    handler_fn(|_ctx: &Context, err: Option<StageError>, data: Option<u64>| match err {
        Some(e) => Err(e),
        None => Ok(data),
    })
}

fn sleepy(delay: Duration) -> impl Handler<u64, u64> {
    async_handler_fn(move |_ctx: Context, _err, data: Option<u64>| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, StageError>(data)
    })
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[test]
fn test_new_outside_runtime_fails() {
    let result = Pool::new(quick_config(1, 1), identity());
    assert!(matches!(result, Err(PoolError::NoRuntime)));
}

#[tokio::test]
async fn test_new_rejects_invalid_bounds() {
    let mut config = quick_config(1, 1);
    config.min_workers = 3;
    config.max_workers = 2;
    let result = Pool::new(config, identity());
    assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_starts_floor_of_executors() {
    let pool = Pool::new(quick_config(3, 6), identity()).unwrap();
    assert_eq!(pool.stats().live_executors, 3);
    assert_eq!(pool.name(), "unit");
    assert!(!pool.is_closed());
    pool.shutdown().await;
}

#[tokio::test]
async fn test_default_name_is_short_id() {
    let mut config = quick_config(1, 1);
    config.name = None;
    let pool = Pool::new(config, identity()).unwrap();
    assert_eq!(pool.name().len(), 8);
    assert!(pool.id().simple().to_string().starts_with(pool.name()));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_next_registers_and_returns_stage() {
    let first = Pool::new(quick_config(1, 1), identity()).unwrap();
    let second = Pool::new(quick_config(1, 1), identity()).unwrap();
    let returned = first.next(second.clone());
    assert_eq!(returned.id(), second.id());
    assert_eq!(first.subscriber_count(), 1);

    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_grows_under_load_within_ceiling() {
    let pool = Pool::new(quick_config(1, 4), sleepy(Duration::from_millis(40))).unwrap();

    let mut producers = Vec::new();
    for i in 0..24u64 {
        let pool = pool.clone();
        producers.push(tokio::spawn(async move {
            pool.data(Context::new(), i).await;
        }));
    }

    let mut sampler = pool.sampler();
    let mut peak = 0;
    let grew = eventually(|| {
        let stat = sampler.sample();
        peak = peak.max(stat.live_executors);
        assert!(stat.live_executors <= 4, "live {} over ceiling", stat.live_executors);
        stat.live_executors > 1
    })
    .await;
    assert!(grew, "pool never scaled above its floor");

    for producer in producers {
        producer.await.unwrap();
    }
    pool.shutdown().await;
    assert!(peak <= 4);
    assert_eq!(pool.stats().completed, 24);
}

#[tokio::test]
async fn test_idle_pool_shrinks_to_floor() {
    let pool = Pool::new(quick_config(2, 8), sleepy(Duration::from_millis(20))).unwrap();

    let producers: Vec<_> = (0..30u64)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.data(Context::new(), i).await })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let settled = eventually(|| pool.stats().live_executors == 2).await;
    assert!(settled, "live stayed at {}", pool.stats().live_executors);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_fires_close_notify_once_drained() {
    let pool = Pool::new(quick_config(1, 1), sleepy(Duration::from_millis(30))).unwrap();
    let closed = pool.close_notify();

    pool.data(Context::new(), 1).await;
    assert!(!closed.is_fired());

    pool.shutdown().await;
    assert!(closed.is_fired());
    assert!(pool.is_closed());

    let stat = pool.stats();
    assert_eq!(stat.completed, 1);
    assert_eq!(stat.live_executors, 0);
    assert_eq!(stat.closed_executors, 1);
}

#[tokio::test]
async fn test_data_after_shutdown_is_ignored() {
    let pool = Pool::new(quick_config(1, 2), identity()).unwrap();
    pool.shutdown().await;

    tokio::time::timeout(Duration::from_millis(200), pool.data(Context::new(), 9))
        .await
        .expect("closed pool must not block producers");
    tokio::time::timeout(
        Duration::from_millis(200),
        pool.error(Context::new(), message_error("late")),
    )
    .await
    .expect("closed pool must not block producers");
    assert_eq!(pool.stats().completed, 0);
}

#[tokio::test]
async fn test_second_shutdown_returns_immediately() {
    let pool = Pool::new(quick_config(1, 1), identity()).unwrap();
    pool.shutdown().await;
    tokio::time::timeout(Duration::from_millis(100), pool.shutdown())
        .await
        .expect("repeat shutdown is a no-op");
}

struct CountingLogger {
    scaled_up: AtomicUsize,
    panics: AtomicUsize,
}

impl Logger for CountingLogger {
    fn log(&self, _pool: &PoolLabel, event: &PoolEvent) {
        if matches!(event, PoolEvent::ScaledUp { .. }) {
            self.scaled_up.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn error(&self, _pool: &PoolLabel, event: &PoolEvent) {
        if matches!(event, PoolEvent::HandlerPanicked { .. }) {
            self.panics.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_events_reach_configured_logger() {
    let logger = Arc::new(CountingLogger {
        scaled_up: AtomicUsize::new(0),
        panics: AtomicUsize::new(0),
    });
    let mut config = quick_config(1, 3);
    config.logger = logger.clone();

    let pool: Pool<u64, u64> = Pool::new(
        config,
        async_handler_fn(|_ctx: Context, _err, data: Option<u64>| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if data == Some(0) {
                panic!("zero");
            }
            Ok::<_, StageError>(data)
        }),
    )
    .unwrap();

    let producers: Vec<_> = (0..12u64)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.data(Context::new(), i).await })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }
    pool.shutdown().await;

    assert_eq!(logger.panics.load(Ordering::SeqCst), 1);
    assert!(logger.scaled_up.load(Ordering::SeqCst) >= 1);
    assert_eq!(pool.stats().completed, 11);
}
