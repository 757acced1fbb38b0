#![allow(non_snake_case)]
use lottery_client::{
    app::{
        AppController,
        Notice,
    },
    poller::PollerEvent,
    provider::ProviderError,
    test_helpers::*,
};
use std::{
    sync::Arc,
    time::Duration,
};

fn stocked_provider() -> Arc<FakeProvider> {
    let provider = Arc::new(FakeProvider::new());
    provider.stock_views(1_000, 10, 500_000, 10_000, 0, 3);
    provider.set_block_number(4);
    provider
}

#[tokio::test]
async fn reconnect__ticks_from_previous_session_are_discarded() {
    // given
    let provider = stocked_provider();
    let (mut controller, mut events) =
        AppController::new(provider.clone(), test_chain(), None, Duration::from_secs(3600));
    controller.connect().await;
    let old_tick = events.polls.recv().await.unwrap();
    let old_session = old_tick.session_id;

    // when
    controller.connect().await;
    let new_tick = events.polls.recv().await.unwrap();

    // then
    assert_ne!(new_tick.session_id, old_session);
    assert!(!controller.apply_poll_event(old_tick));
    assert!(controller.snapshot().is_none());
    assert!(controller.apply_poll_event(new_tick));
    assert_eq!(controller.snapshot().unwrap().current_block, 4);
}

#[tokio::test]
async fn refresh__failed_read_keeps_last_snapshot() {
    // given
    let provider = stocked_provider();
    let (mut controller, mut events) =
        AppController::new(provider.clone(), test_chain(), None, Duration::from_secs(3600));
    controller.connect().await;
    let first = events.polls.recv().await.unwrap();
    controller.apply_poll_event(first);
    let before = controller.snapshot().cloned().unwrap();

    // when
    provider.fail_block_number(ProviderError::new(-32000, "node unavailable"));
    controller.request_refresh();
    let failed: PollerEvent = events.polls.recv().await.unwrap();

    // then
    assert!(failed.tick.is_err());
    assert!(!controller.apply_poll_event(failed));
    assert_eq!(controller.snapshot(), Some(&before));
}

#[tokio::test]
async fn disconnect__stops_publishing_ticks() {
    // given
    let provider = stocked_provider();
    let (mut controller, mut events) =
        AppController::new(provider.clone(), test_chain(), None, Duration::from_millis(10));
    controller.connect().await;
    let _ = events.polls.recv().await.unwrap();

    // when
    controller.disconnect();
    while events.polls.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(50)).await;

    // then
    assert!(events.polls.try_recv().is_err());
    assert!(!controller.is_connected());
    assert_eq!(controller.activity().latest().unwrap().text, "Disconnected");
}

#[tokio::test]
async fn connect__wrong_network_is_surfaced_as_warning() {
    // given
    let provider = stocked_provider();
    provider.set_chain_id(1);
    provider.fail_chain_switch(ProviderError::new(4902, "Unrecognized chain ID"));
    let (mut controller, _events) =
        AppController::new(provider, test_chain(), None, Duration::from_secs(3600));

    // when
    controller.connect().await;

    // then
    assert!(controller.is_connected());
    match controller.notice() {
        Some(Notice::Warning(msg)) => assert!(msg.contains("wrong network")),
        other => panic!("expected wrong network warning, got {other:?}"),
    }
}

#[tokio::test]
async fn connect__preferred_account_is_used() {
    // given
    let provider = stocked_provider();
    let other = lottery_client::abi::Address([0x22; 20]);
    provider.set_accounts(vec![test_account(), other]);
    let (mut controller, _events) =
        AppController::new(provider, test_chain(), Some(other), Duration::from_secs(3600));

    // when
    controller.connect().await;

    // then
    assert_eq!(controller.view().connection.unwrap().account, other);
}
