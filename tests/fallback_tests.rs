use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use cloudlink::{fallback, CloudLinkError, TransportConfig, TransportKind};

fn configs(kinds: &[TransportKind]) -> Vec<TransportConfig> {
    kinds.iter().map(|k| TransportConfig::new(*k)).collect()
}

#[tokio::test]
async fn attempts_follow_declared_order_until_success() {
    let configs = configs(&[
        TransportKind::Amqp,
        TransportKind::AmqpWebSocket,
        TransportKind::Mqtt,
    ]);
    let attempted = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let attempted_in = attempted.clone();
    let result = fallback::connect(&configs, &cancel, move |config| {
        let attempted = attempted_in.clone();
        let kind = config.kind;
        async move {
            attempted.lock().unwrap().push(kind);
            match kind {
                TransportKind::Mqtt => Ok(42u32),
                _ => Err(CloudLinkError::Transport(format!("{kind} unreachable"))),
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(
        *attempted.lock().unwrap(),
        vec![
            TransportKind::Amqp,
            TransportKind::AmqpWebSocket,
            TransportKind::Mqtt
        ]
    );
}

#[tokio::test]
async fn first_success_short_circuits_remaining_configs() {
    let configs = configs(&[TransportKind::Amqp, TransportKind::AmqpWebSocket]);
    let attempted = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let attempted_in = attempted.clone();
    let result = fallback::connect(&configs, &cancel, move |config| {
        let attempted = attempted_in.clone();
        let kind = config.kind;
        async move {
            attempted.lock().unwrap().push(kind);
            Ok(1u32)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(*attempted.lock().unwrap(), vec![TransportKind::Amqp]);
}

#[tokio::test]
async fn all_failures_surface_the_last_error() {
    let configs = configs(&[TransportKind::Amqp, TransportKind::AmqpWebSocket]);
    let cancel = CancellationToken::new();

    let result: Result<u32, _> = fallback::connect(&configs, &cancel, |config| {
        let kind = config.kind;
        async move { Err(CloudLinkError::Transport(format!("{kind} refused"))) }
    })
    .await;

    match result.unwrap_err() {
        CloudLinkError::TransportOpenFailed(inner) => match *inner {
            CloudLinkError::Transport(msg) => {
                assert_eq!(msg, "AMQP over WebSocket refused");
            }
            other => panic!("unexpected inner error: {other}"),
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_config_list_is_rejected() {
    let cancel = CancellationToken::new();
    let result: Result<u32, _> =
        fallback::connect(&[], &cancel, |_| async move { Ok(1u32) }).await;
    assert!(matches!(
        result,
        Err(CloudLinkError::NoTransportsConfigured)
    ));
}

#[tokio::test]
async fn cancelled_token_prevents_any_attempt() {
    let configs = configs(&[TransportKind::Amqp]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let attempted = Arc::new(Mutex::new(Vec::new()));
    let attempted_in = attempted.clone();
    let result: Result<u32, _> = fallback::connect(&configs, &cancel, move |config| {
        let attempted = attempted_in.clone();
        let kind = config.kind;
        async move {
            attempted.lock().unwrap().push(kind);
            Ok(1u32)
        }
    })
    .await;

    assert!(matches!(result, Err(CloudLinkError::Cancelled)));
    assert!(attempted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_mid_attempt_stops_the_sequence() {
    let configs = vec![
        TransportConfig::new(TransportKind::Amqp).with_operation_timeout(Duration::from_secs(600)),
        TransportConfig::new(TransportKind::AmqpWebSocket),
    ];
    let cancel = CancellationToken::new();
    let attempted = Arc::new(Mutex::new(Vec::new()));

    let attempted_in = attempted.clone();
    let cancel_in = cancel.clone();
    let handle = tokio::spawn(async move {
        fallback::connect(&configs, &cancel_in, move |config| {
            let attempted = attempted_in.clone();
            let kind = config.kind;
            async move {
                attempted.lock().unwrap().push(kind);
                // Hang until cancelled.
                futures::future::pending::<()>().await;
                Ok(1u32)
            }
        })
        .await
    });

    sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(CloudLinkError::Cancelled)));
    assert_eq!(*attempted.lock().unwrap(), vec![TransportKind::Amqp]);
}

#[tokio::test(start_paused = true)]
async fn slow_attempt_times_out_and_falls_back() {
    let configs = vec![
        TransportConfig::new(TransportKind::Amqp).with_operation_timeout(Duration::from_secs(1)),
        TransportConfig::new(TransportKind::AmqpWebSocket),
    ];
    let cancel = CancellationToken::new();
    let attempted = Arc::new(Mutex::new(Vec::new()));

    let attempted_in = attempted.clone();
    let result = fallback::connect(&configs, &cancel, move |config| {
        let attempted = attempted_in.clone();
        let kind = config.kind;
        async move {
            attempted.lock().unwrap().push(kind);
            if kind == TransportKind::Amqp {
                futures::future::pending::<()>().await;
            }
            Ok(7u32)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(
        *attempted.lock().unwrap(),
        vec![TransportKind::Amqp, TransportKind::AmqpWebSocket]
    );
}
