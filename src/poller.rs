//! Periodic view-state synchronisation.
//!
//! Every tick reads the whole view batch concurrently. A tick either produces a
//! complete [`Snapshot`] or nothing; the previously published snapshot is never
//! patched field by field.

use crate::{
    abi::Address,
    chain::LotteryClient,
    eligibility,
    error::ClientError,
    provider::WalletProvider,
    session::Liveness,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub prize_wei: u128,
    pub entry_fee_wei: u128,
    pub win_chance_ppm: u32,
    pub contract_balance: u128,
    pub pending_prize: u128,
    pub last_played_block: u64,
    pub current_block: u64,
}

impl Snapshot {
    pub fn can_play(&self, account: Option<&Address>) -> bool {
        eligibility::eligible(account, self.last_played_block, self.current_block)
    }
}

pub async fn fetch_snapshot<P: WalletProvider>(
    client: &LotteryClient<P>,
) -> Result<Snapshot, ClientError> {
    let account = client.account();
    let (
        prize_wei,
        entry_fee_wei,
        win_chance_ppm,
        contract_balance,
        pending_prize,
        last_played_block,
        current_block,
    ) = futures::try_join!(
        client.prize_wei(),
        client.entry_fee_wei(),
        client.win_chance_ppm(),
        client.contract_balance(),
        client.pending_prizes(account),
        client.last_played_block(account),
        client.block_number(),
    )?;
    Ok(Snapshot {
        prize_wei,
        entry_fee_wei,
        win_chance_ppm,
        contract_balance,
        pending_prize,
        last_played_block,
        current_block,
    })
}

/// Holds the last successfully published snapshot.
#[derive(Clone, Debug, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
    updated_at: Option<DateTime<Utc>>,
    failed_ticks: u64,
}

impl SnapshotStore {
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    /// Replaces the snapshot on success; on failure logs and keeps the old one.
    /// Returns whether the published snapshot changed.
    pub fn apply_tick(&mut self, tick: Result<Snapshot, ClientError>) -> bool {
        match tick {
            Ok(snapshot) => {
                let changed = self.current.as_ref() != Some(&snapshot);
                self.current = Some(snapshot);
                self.updated_at = Some(Utc::now());
                changed
            }
            Err(err) => {
                self.failed_ticks += 1;
                warn!(
                    %err,
                    failed_ticks = self.failed_ticks,
                    "poll tick failed, keeping previous snapshot"
                );
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.updated_at = None;
    }
}

pub enum PollerCommand {
    FetchNow,
    Shutdown,
}

#[derive(Debug)]
pub struct PollerEvent {
    pub session_id: u64,
    pub tick: Result<Snapshot, ClientError>,
}

/// Owns the running poll task. Dropping the handle cancels it.
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn spawn<P: WalletProvider>(
        client: Arc<LotteryClient<P>>,
        session_id: u64,
        interval: Duration,
        liveness: Liveness,
        events: mpsc::UnboundedSender<PollerEvent>,
    ) -> Self {
        let (commands, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_worker(
            client, session_id, interval, liveness, cmd_rx, events,
        ));
        Self {
            commands,
            task: Some(task),
        }
    }

    pub fn fetch_now(&self) {
        let _ = self.commands.send(PollerCommand::FetchNow);
    }

    pub fn stop(&mut self) {
        let _ = self.commands.send(PollerCommand::Shutdown);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_worker<P: WalletProvider>(
    client: Arc<LotteryClient<P>>,
    session_id: u64,
    interval: Duration,
    liveness: Liveness,
    mut cmd_rx: mpsc::UnboundedReceiver<PollerCommand>,
    events: mpsc::UnboundedSender<PollerEvent>,
) {
    async fn tick<P: WalletProvider>(
        client: &LotteryClient<P>,
        session_id: u64,
        liveness: &Liveness,
        events: &mpsc::UnboundedSender<PollerEvent>,
    ) -> bool {
        let tick = fetch_snapshot(client).await;
        if !liveness.is_live() {
            tracing::debug!(session_id, "discarding poll result from closed session");
            return false;
        }
        events.send(PollerEvent { session_id, tick }).is_ok()
    }

    tracing::info!(session_id, ?interval, "poller started");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !tick(&client, session_id, &liveness, &events).await {
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollerCommand::FetchNow) => {
                        if !tick(&client, session_id, &liveness, &events).await {
                            break;
                        }
                    }
                    Some(PollerCommand::Shutdown) | None => break,
                }
            }
        }
    }
    tracing::info!(session_id, "poller stopped");
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        abi,
        chain::View,
        provider::ProviderError,
        test_helpers::{
            FakeProvider,
            test_account,
            test_contract,
        },
    };

    fn stocked_provider() -> Arc<FakeProvider> {
        let provider = Arc::new(FakeProvider::new());
        provider.stock_views(1_000, 10, 125_000, 5_000, 0, 0);
        provider.set_block_number(42);
        provider
    }

    fn client(provider: &Arc<FakeProvider>) -> Arc<LotteryClient<FakeProvider>> {
        Arc::new(LotteryClient::new(
            provider.clone(),
            test_contract(),
            test_account(),
        ))
    }

    #[tokio::test]
    async fn fetch_snapshot__collects_all_views() {
        // given
        let provider = stocked_provider();

        // when
        let snapshot = fetch_snapshot(&client(&provider)).await.unwrap();

        // then
        assert_eq!(
            snapshot,
            Snapshot {
                prize_wei: 1_000,
                entry_fee_wei: 10,
                win_chance_ppm: 125_000,
                contract_balance: 5_000,
                pending_prize: 0,
                last_played_block: 0,
                current_block: 42,
            }
        );
    }

    #[tokio::test]
    async fn apply_tick__failed_read_leaves_previous_snapshot_untouched() {
        // given
        let provider = stocked_provider();
        let client = client(&provider);
        let mut store = SnapshotStore::default();
        store.apply_tick(fetch_snapshot(&client).await);
        let before = store.current().cloned().unwrap();

        // when
        provider.set_view(View::PrizeWei, abi::uint_word(9_999));
        provider.set_block_number(43);
        provider.fail_view(
            View::PendingPrizes(test_account()),
            ProviderError::new(-32000, "header not found"),
        );
        let changed = store.apply_tick(fetch_snapshot(&client).await);

        // then
        assert!(!changed);
        assert_eq!(store.current(), Some(&before));
        assert_eq!(store.failed_ticks(), 1);
    }

    #[tokio::test]
    async fn apply_tick__success_replaces_whole_snapshot() {
        // given
        let provider = stocked_provider();
        let client = client(&provider);
        let mut store = SnapshotStore::default();
        store.apply_tick(fetch_snapshot(&client).await);

        // when
        provider.set_block_number(50);
        provider.set_view(View::LastPlayedBlock(test_account()), abi::uint_word(49));
        let changed = store.apply_tick(fetch_snapshot(&client).await);

        // then
        assert!(changed);
        let current = store.current().unwrap();
        assert_eq!(current.current_block, 50);
        assert_eq!(current.last_played_block, 49);
        assert!(current.can_play(Some(&test_account())));
    }

    #[tokio::test]
    async fn poller__publishes_ticks_until_stopped() {
        // given
        let provider = stocked_provider();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let liveness = Liveness::new();
        let mut handle = PollerHandle::spawn(
            client(&provider),
            7,
            Duration::from_millis(10),
            liveness.clone(),
            tx,
        );

        // when
        let event = rx.recv().await.unwrap();

        // then
        assert_eq!(event.session_id, 7);
        assert_eq!(event.tick.unwrap().current_block, 42);

        handle.stop();
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn poller__drops_results_once_liveness_is_revoked() {
        // given
        let provider = stocked_provider();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let liveness = Liveness::new();
        liveness.revoke();

        // when
        let _handle = PollerHandle::spawn(
            client(&provider),
            1,
            Duration::from_millis(5),
            liveness,
            tx,
        );

        // then
        assert!(rx.recv().await.is_none());
    }
}
