mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use crabada_runtime::BotError;
use crabada_runtime::contracts::IIdleGame;
use crabada_runtime::watcher::Watcher;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn test_handlers_run_in_order_per_entry() {
    let source = FakeLogSource::new(vec![
        Ok(vec![start_game_log(10, 1, 100), start_game_log(11, 2, 100)]),
        Ok(vec![]),
        Ok(vec![start_game_log(12, 3, 101)]),
    ]);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&seen);
    let second = Arc::clone(&seen);
    let watcher = Watcher::new(source)
        .add_handler(move |log| {
            let event = log
                .log_decode::<IIdleGame::StartGame>()
                .map_err(|e| BotError::HandlerFailed(e.to_string()))?;
            first
                .lock()
                .unwrap()
                .push(format!("a{}", event.inner.data.gameId));
            Ok(())
        })
        .add_handler(move |log| {
            second
                .lock()
                .unwrap()
                .push(format!("b{}", log.block_number.unwrap_or_default()));
            Ok(())
        });

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(watcher.run(rx));
    tokio::time::sleep(Duration::from_secs(7)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["a10", "b100", "a11", "b100", "a12", "b101"]
    );
    assert_eq!(stats.entries, 3);
    assert!(stats.polls >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_polls_every_interval_while_idle() {
    let source = FakeLogSource::new(vec![]);
    let polls = Arc::clone(&source.polls);
    let watcher = Watcher::new(source).with_poll_interval(Duration::from_secs(5));

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(watcher.run(rx));
    tokio::time::sleep(Duration::from_secs(21)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    // t = 0, 5, 10, 15, 20
    assert_eq!(polls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_sleep() {
    let source = FakeLogSource::new(vec![]);
    let watcher = Watcher::new(source).with_poll_interval(Duration::from_secs(3600));

    let (tx, rx) = watch::channel(false);
    let start = tokio::time::Instant::now();
    let handle = tokio::spawn(watcher.run(rx));
    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(stats.polls, 1);
    assert!(start.elapsed() < Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_stops_watcher() {
    let source = FakeLogSource::new(vec![]);
    let watcher = Watcher::new(source);

    let (tx, rx) = watch::channel(false);
    drop(tx);
    let stats = watcher.run(rx).await.unwrap();
    assert_eq!(stats.polls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_handler_error_ends_loop() {
    let source = FakeLogSource::new(vec![Ok(vec![
        start_game_log(10, 1, 100),
        start_game_log(11, 2, 100),
    ])]);
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let watcher = Watcher::new(source).add_handler(move |_log| {
        *counter.lock().unwrap() += 1;
        Err(BotError::HandlerFailed("boom".into()))
    });

    let (_tx, rx) = watch::channel(false);
    let result = watcher.run(rx).await;
    assert!(matches!(result, Err(BotError::HandlerFailed(_))));
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_filter_is_returned() {
    let source = FakeLogSource::new(vec![
        Ok(vec![]),
        Err(BotError::FilterInvalid("filter not found".into())),
    ]);
    let watcher = Watcher::new(source);

    let (_tx, rx) = watch::channel(false);
    let result = watcher.run(rx).await;
    assert!(matches!(result, Err(BotError::FilterInvalid(_))));
}
