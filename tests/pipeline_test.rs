//! Multi-stage wiring: error routing, fan-out, terminal receivers and the close cascade

mod common;

use common::*;
use stagepool::prelude::*;
use std::time::Duration;
use uuid::Uuid;

fn reject_bad() -> impl Handler<String, String> {
    handler_fn(|_ctx: &Context, err: Option<StageError>, data: Option<String>| {
        if let Some(err) = err {
            return Err(err);
        }
        match data {
            Some(word) if word == "bad" => Err(message_error(format!("rejected {word}"))),
            other => Ok(other.map(|w| w.to_uppercase())),
        }
    })
}

#[tokio::test]
async fn test_handler_error_reaches_only_error_receiver() {
    init_test_logging();
    let pool = Pool::new(test_config("validate", 1, 2), reject_bad()).unwrap();
    let (values, _data_sink) = receive(&pool).unwrap();
    let (errors, _error_sink) = receive_errors(&pool).unwrap();
    let values = tokio::spawn(collect(values));
    let errors = tokio::spawn(collect(errors));

    for word in ["good", "bad", "fine"] {
        pool.data(Context::new(), word.to_string()).await;
    }
    pool.shutdown().await;

    let mut values = values.await.unwrap();
    values.sort();
    assert_eq!(values, vec!["FINE".to_string(), "GOOD".to_string()]);

    let errors = errors.await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "rejected bad");
}

#[tokio::test]
async fn test_fan_out_reaches_every_subscriber() {
    init_test_logging();
    let source: Pool<u32, u32> = Pool::new(test_config("source", 1, 1), identity()).unwrap();
    let left: Pool<u32, u32> = Pool::new(test_config("left", 1, 1), identity()).unwrap();
    let right: Pool<u32, u32> = Pool::new(test_config("right", 1, 1), identity()).unwrap();
    source.next(left.clone());
    source.next(right.clone());
    assert_eq!(source.subscriber_count(), 2);

    let (left_rx, _l) = receive(&left).unwrap();
    let (right_rx, _r) = receive(&right).unwrap();
    let left_values = tokio::spawn(collect(left_rx));
    let right_values = tokio::spawn(collect(right_rx));

    source.data(Context::new(), 42).await;
    source.shutdown().await;
    left.shutdown().await;
    right.shutdown().await;

    assert_eq!(left_values.await.unwrap(), vec![42]);
    assert_eq!(right_values.await.unwrap(), vec![42]);
}

#[tokio::test]
async fn test_errors_flow_through_intermediate_stages() {
    init_test_logging();
    let first = Pool::new(test_config("first", 1, 2), reject_bad()).unwrap();
    let second: Pool<String, String> =
        first.next(Pool::new(test_config("second", 1, 2), identity()).unwrap());
    let (errors, _sink) = receive_errors(&second).unwrap();
    let errors = tokio::spawn(collect(errors));

    first.data(Context::new(), "bad".to_string()).await;
    first.shutdown().await;
    second.shutdown().await;

    let errors = errors.await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "rejected bad");
}

#[tokio::test]
async fn test_skip_errors_bypasses_handler() {
    init_test_logging();
    let logger = std::sync::Arc::new(RecordingLogger::default());
    let mut config = test_config("skip", 1, 1);
    config.skip_errors_to_handler = true;
    config.logger = logger.clone();

    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = std::sync::Arc::clone(&calls);
    let pool: Pool<u32, u32> = Pool::new(
        config,
        handler_fn(move |_ctx: &Context, _err, data: Option<u32>| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(data)
        }),
    )
    .unwrap();
    let (errors, _sink) = receive_errors(&pool).unwrap();
    let errors = tokio::spawn(collect(errors));

    pool.error(Context::new(), message_error("upstream failure")).await;
    pool.data(Context::new(), 1).await;
    pool.shutdown().await;

    let errors = errors.await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "upstream failure");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(
        logger.count(|e| matches!(e, stagepool::PoolEvent::ErrorSkipped { subscribers: 1, .. })),
        1
    );
}

#[tokio::test]
async fn test_receiver_closes_when_upstream_shuts_down() {
    init_test_logging();
    let pool: Pool<u32, u32> = Pool::new(test_config("cascade", 1, 1), identity()).unwrap();
    let (mut values, terminal) = receive(&pool).unwrap();

    pool.data(Context::new(), 7).await;
    assert_eq!(values.recv().await, Some(7));

    pool.shutdown().await;
    let closed = tokio::time::timeout(Duration::from_secs(2), values.recv())
        .await
        .expect("receiver should close after the cascade");
    assert_eq!(closed, None);
    assert!(terminal.is_closed());
    assert!(terminal.close_notify().is_fired());
}

#[tokio::test]
async fn test_context_travels_with_payload() {
    init_test_logging();
    let tag: Pool<u32, String> = Pool::new(
        test_config("tag", 1, 1),
        handler_fn(|ctx: &Context, _err, data: Option<u32>| {
            Ok(data.map(|v| format!("{}:{}", ctx.request_id(), v)))
        }),
    )
    .unwrap();
    let (mut tagged, _sink) = receive(&tag).unwrap();

    let request_id = Uuid::new_v4();
    tag.data(Context::with_request_id(request_id), 3).await;
    let value = tagged.recv().await.unwrap();
    assert_eq!(value, format!("{request_id}:3"));

    tag.shutdown().await;
}

#[tokio::test]
async fn test_three_stage_pipeline() {
    init_test_logging();
    let parse: Pool<String, i64> = Pool::new(
        test_config("parse", 1, 4),
        handler_fn(|_ctx: &Context, _err, line: Option<String>| {
            line.map(|l| l.trim().parse::<i64>().map_err(stage_error))
                .transpose()
        }),
    )
    .unwrap();
    let square: Pool<i64, i64> = parse.next(
        Pool::new(
            test_config("square", 1, 4),
            handler_fn(|_ctx: &Context, err: Option<StageError>, n: Option<i64>| match err {
                Some(e) => Err(e),
                None => Ok(n.map(|n| n * n)),
            }),
        )
        .unwrap(),
    );
    let (squares, _values) = receive(&square).unwrap();
    let (errors, _errors) = receive_errors(&square).unwrap();
    let squares = tokio::spawn(collect(squares));
    let errors = tokio::spawn(collect(errors));

    for line in [" 1", "2 ", "x", "3"] {
        parse.data(Context::new(), line.to_string()).await;
    }
    parse.shutdown().await;
    square.shutdown().await;

    let mut squares = squares.await.unwrap();
    squares.sort_unstable();
    assert_eq!(squares, vec![1, 4, 9]);
    assert_eq!(errors.await.unwrap().len(), 1);
}
