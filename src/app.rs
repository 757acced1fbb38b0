use crate::{
    abi::{
        Address,
        Word,
    },
    action::{
        ActionEvent,
        ActionHandle,
        ActionStage,
    },
    activity::{
        ActivityLog,
        LogEntry,
    },
    chain::{
        ContractCall,
        Receipt,
    },
    config::{
        AppConfig,
        ChainConfig,
    },
    decoder::{
        ActionOutcome,
        AuxiliaryEvent,
        ReceiptDecoder,
    },
    error::ClientError,
    format::{
        PPM_DENOMINATOR,
        format_ether,
        format_ppm_percent,
        short_address,
    },
    poller::{
        PollerEvent,
        Snapshot,
        SnapshotStore,
    },
    provider::{
        HttpProvider,
        WalletProvider,
    },
    session::Session,
    ui,
};
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    error,
    info,
    warn,
};

/// Transient, non-snapshot message shown next to the status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// The user declined a signature; informational, not a failure.
    UserRejected { action: &'static str },
    Warning(String),
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountView {
    pub account: Address,
    pub chain_id: u64,
    pub is_owner: bool,
    pub polling: bool,
}

/// Everything the UI needs for one frame.
#[derive(Clone, Debug)]
pub struct AppView {
    pub contract: Address,
    pub explorer_url: String,
    pub connection: Option<AccountView>,
    pub snapshot: Option<Snapshot>,
    pub snapshot_updated_at: Option<DateTime<Utc>>,
    pub can_play: bool,
    pub status: String,
    pub busy: Option<String>,
    pub notice: Option<Notice>,
    pub last_outcome: Option<ActionOutcome>,
    pub activity: Vec<LogEntry>,
}

pub struct AppController<P> {
    provider: Arc<P>,
    chain: ChainConfig,
    preferred_account: Option<Address>,
    poll_interval: Duration,
    session: Option<Session<P>>,
    next_session_id: u64,
    snapshots: SnapshotStore,
    activity: ActivityLog,
    decoder: ReceiptDecoder,
    status: String,
    busy: Option<String>,
    notice: Option<Notice>,
    last_outcome: Option<ActionOutcome>,
    poll_tx: mpsc::UnboundedSender<PollerEvent>,
    action_tx: mpsc::UnboundedSender<ActionEvent>,
    in_flight: Option<ActionHandle>,
    next_action_id: u64,
}

/// Receiving ends of the channels the background workers publish on.
pub struct AppEvents {
    pub polls: mpsc::UnboundedReceiver<PollerEvent>,
    pub actions: mpsc::UnboundedReceiver<ActionEvent>,
}

impl<P: WalletProvider> AppController<P> {
    pub fn new(
        provider: Arc<P>,
        chain: ChainConfig,
        preferred_account: Option<Address>,
        poll_interval: Duration,
    ) -> (Self, AppEvents) {
        let (poll_tx, polls) = mpsc::unbounded_channel();
        let (action_tx, actions) = mpsc::unbounded_channel();
        let decoder = ReceiptDecoder::new(chain.contract);
        let controller = Self {
            provider,
            chain,
            preferred_account,
            poll_interval,
            session: None,
            next_session_id: 1,
            snapshots: SnapshotStore::default(),
            activity: ActivityLog::default(),
            decoder,
            status: String::from("Not connected"),
            busy: None,
            notice: None,
            last_outcome: None,
            poll_tx,
            action_tx,
            in_flight: None,
            next_action_id: 1,
        };
        (controller, AppEvents { polls, actions })
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session<P>> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.current()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn last_outcome(&self) -> Option<ActionOutcome> {
        self.last_outcome
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_busy(&mut self, label: impl Into<String>) {
        self.busy = Some(label.into());
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn can_play(&self) -> bool {
        let account = self.session.as_ref().map(Session::account);
        self.snapshots
            .current()
            .is_some_and(|s| s.can_play(account.as_ref()))
    }

    pub fn view(&self) -> AppView {
        let connection = self.session.as_ref().map(|s| AccountView {
            account: s.account(),
            chain_id: s.chain_id(),
            is_owner: s.is_owner(),
            polling: s.is_polling(),
        });
        AppView {
            contract: self.chain.contract,
            explorer_url: self.chain.explorer_url.clone(),
            connection,
            snapshot: self.snapshots.current().cloned(),
            snapshot_updated_at: self.snapshots.updated_at(),
            can_play: self.can_play(),
            status: self.status.clone(),
            busy: self.busy.clone(),
            notice: self.notice.clone(),
            last_outcome: self.last_outcome,
            activity: self.activity.iter().cloned().collect(),
        }
    }

    pub async fn connect(&mut self) {
        self.disconnect_quietly();
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.busy = Some("Connecting wallet...".to_string());
        let result = Session::connect(
            self.provider.clone(),
            &self.chain,
            self.preferred_account,
            id,
        )
        .await;
        self.busy = None;
        match result {
            Ok(mut session) => {
                self.notice = session
                    .network_warning()
                    .map(|w| Notice::Warning(w.to_string()));
                session.start_polling(self.poll_interval, self.poll_tx.clone());
                self.set_status(format!("Connected as {}", short_address(&session.account())));
                self.activity
                    .record(format!("Connected {}", session.account()), None);
                self.session = Some(session);
            }
            Err(err) => {
                error!(%err, "wallet connection failed");
                self.set_status("Not connected");
                self.notice = Some(Notice::Error(err.to_string()));
                self.activity.record(format!("Error: {err}"), None);
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.disconnect_quietly() {
            self.set_status("Disconnected");
            self.activity.record("Disconnected", None);
        }
    }

    fn disconnect_quietly(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        self.in_flight = None;
        self.busy = None;
        session.disconnect();
        self.snapshots.clear();
        self.last_outcome = None;
        self.notice = None;
        true
    }

    /// Applies a poll tick if it belongs to the current, live session.
    /// Returns whether the published snapshot changed.
    pub fn apply_poll_event(&mut self, event: PollerEvent) -> bool {
        let Some(session) = self.session.as_ref() else {
            debug!(session_id = event.session_id, "poll result without session");
            return false;
        };
        if session.id() != event.session_id || !session.liveness().is_live() {
            debug!(session_id = event.session_id, "discarding stale poll result");
            return false;
        }
        self.snapshots.apply_tick(event.tick)
    }

    pub fn request_refresh(&self) {
        if let Some(session) = self.session.as_ref() {
            session.refresh_now();
        }
    }

    pub fn has_action_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn play(&mut self, user_salt: Word) {
        if self.session.is_none() {
            self.reject_locally("Connect a wallet before playing");
            return;
        }
        let Some(snapshot) = self.snapshots.current().cloned() else {
            self.reject_locally("Contract state not loaded yet");
            return;
        };
        if !self.can_play() {
            self.reject_locally(format!(
                "Already played in block {}; wait for the next block",
                snapshot.last_played_block
            ));
            return;
        }
        self.start_action(ContractCall::Play {
            user_salt,
            entry_fee_wei: snapshot.entry_fee_wei,
        });
    }

    pub fn claim(&mut self) {
        let nothing_pending = self
            .snapshots
            .current()
            .is_some_and(|snapshot| snapshot.pending_prize == 0);
        if nothing_pending {
            self.reject_locally("No pending prize to claim");
            return;
        }
        self.start_action(ContractCall::Claim);
    }

    pub fn fund(&mut self, amount_wei: u128) {
        if amount_wei == 0 {
            self.reject_locally("Enter an amount greater than zero");
            return;
        }
        self.start_action(ContractCall::Fund { amount_wei });
    }

    pub fn owner_withdraw(&mut self, amount_wei: u128) {
        if !self.ensure_owner() {
            return;
        }
        self.start_action(ContractCall::OwnerWithdraw { amount_wei });
    }

    pub fn set_params(&mut self, prize_wei: u128, entry_fee_wei: u128, win_chance_ppm: u32) {
        if !self.ensure_owner() {
            return;
        }
        if win_chance_ppm > PPM_DENOMINATOR {
            self.reject_locally(format!("Win chance cannot exceed {PPM_DENOMINATOR} ppm"));
            return;
        }
        self.start_action(ContractCall::SetParams {
            prize_wei,
            entry_fee_wei,
            win_chance_ppm,
        });
    }

    fn ensure_owner(&mut self) -> bool {
        let is_owner = self.session.as_ref().is_some_and(Session::is_owner);
        if !is_owner {
            self.reject_locally("Only the contract owner can do that");
        }
        is_owner
    }

    fn reject_locally(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(%message, "action not submitted");
        self.notice = Some(Notice::Warning(message.clone()));
        self.set_status(message);
    }

    /// Hands the call to a background task. Progress comes back through
    /// [`AppController::apply_action_event`].
    fn start_action(&mut self, call: ContractCall) {
        if self.in_flight.is_some() {
            self.reject_locally("Wait for the pending transaction to finish");
            return;
        }
        let Some(session) = self.session.as_ref() else {
            self.reject_locally("Connect a wallet first");
            return;
        };
        let label = call.label();
        let action_id = self.next_action_id;
        self.next_action_id += 1;
        self.in_flight = Some(ActionHandle::spawn(
            session.client().clone(),
            call,
            session.id(),
            action_id,
            session.liveness().clone(),
            self.action_tx.clone(),
        ));
        self.notice = None;
        let waiting = format!("{label}: waiting for wallet signature...");
        self.busy = Some(waiting.clone());
        self.set_status(waiting);
    }

    /// Applies progress of the in-flight action. Events for another action,
    /// another session or a revoked session are dropped. Returns whether
    /// anything changed.
    pub fn apply_action_event(&mut self, event: ActionEvent) -> bool {
        let Some(in_flight) = self.in_flight.as_ref() else {
            debug!(action_id = event.action_id, "action result without pending action");
            return false;
        };
        let live = self
            .session
            .as_ref()
            .is_some_and(|s| s.id() == event.session_id && s.liveness().is_live());
        if !in_flight.matches(&event) || !live {
            debug!(action_id = event.action_id, "discarding stale action result");
            return false;
        }
        let label = in_flight.call().label();
        let is_play = matches!(in_flight.call(), ContractCall::Play { .. });

        match event.stage {
            ActionStage::Submitted(hash) => {
                self.activity.record(format!("{label} submitted"), Some(hash));
                let waiting = format!("{label}: waiting for confirmation...");
                self.busy = Some(waiting.clone());
                self.set_status(waiting);
            }
            ActionStage::NotEligible { next_allowed_block } => {
                self.finish_action();
                self.reject_locally(format!(
                    "The contract only accepts your next play from block {next_allowed_block}"
                ));
            }
            ActionStage::Failed(err) => {
                self.finish_action();
                self.record_failure(label, err);
            }
            ActionStage::Confirmed(receipt) => {
                self.finish_action();
                self.record_receipt(label, is_play, &receipt);
            }
        }
        true
    }

    fn finish_action(&mut self) {
        self.in_flight = None;
        self.busy = None;
    }

    fn record_receipt(&mut self, label: &'static str, is_play: bool, receipt: &Receipt) {
        let decoded = self.decoder.decode(receipt);
        let hash = Some(receipt.transaction_hash);
        let text = if is_play {
            self.last_outcome = Some(decoded.outcome);
            describe_outcome(decoded.outcome)
        } else {
            format!("{label} confirmed")
        };
        self.set_status(text.clone());
        self.activity.record(text, hash);
        for aux in &decoded.auxiliary {
            self.activity.record(describe_auxiliary(aux), hash);
        }
        self.request_refresh();
    }

    fn record_failure(&mut self, label: &'static str, err: ClientError) {
        match err {
            ClientError::UserRejected => {
                info!(action = label, "signature request rejected in wallet");
                self.notice = Some(Notice::UserRejected { action: label });
                let text = format!("{label} cancelled in wallet");
                self.set_status(text.clone());
                self.activity.record(format!("Cancelled: {text}"), None);
            }
            other => {
                error!(action = label, err = %other, "action failed");
                self.notice = Some(Notice::Error(other.to_string()));
                self.set_status(format!("{label} failed"));
                self.activity
                    .record(format!("Error: {label}: {other}"), None);
            }
        }
    }
}

pub fn describe_outcome(outcome: ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Won(amount) => format!("You won {}!", format_ether(amount)),
        ActionOutcome::Lost => String::from("No win this time"),
        ActionOutcome::PendingEvent(amount) => format!(
            "You won {}; payout is pending, claim it when funds are available",
            format_ether(amount)
        ),
        ActionOutcome::Unknown => String::from("Play finished, outcome not decoded"),
    }
}

pub fn describe_auxiliary(event: &AuxiliaryEvent) -> String {
    match event {
        AuxiliaryEvent::PrizePaid { to, amount } => {
            format!("Prize paid: {} to {}", format_ether(*amount), short_address(to))
        }
        AuxiliaryEvent::PrizePending { to, amount } => {
            format!(
                "Prize pending: {} for {}",
                format_ether(*amount),
                short_address(to)
            )
        }
        AuxiliaryEvent::ParamsUpdated {
            prize_wei,
            entry_fee_wei,
            win_chance_ppm,
        } => format!(
            "Params updated: prize {} | fee {} | chance {}",
            format_ether(*prize_wei),
            format_ether(*entry_fee_wei),
            format_ppm_percent(*win_chance_ppm)
        ),
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let provider = Arc::new(
        HttpProvider::new(config.rpc_url.clone())
            .map_err(|e| eyre!("failed to create provider: {e}"))?,
    );
    info!(rpc_url = %config.rpc_url, contract = %config.chain.contract, "starting lottery client");
    let (mut controller, events) = AppController::new(
        provider,
        config.chain.clone(),
        config.account,
        config.poll_interval,
    );
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(&mut controller, events, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn redraw<P: WalletProvider>(
    controller: &AppController<P>,
    ui_state: &mut ui::UiState,
    context: &'static str,
) -> Result<()> {
    ui::draw(ui_state, &controller.view()).wrap_err(context)
}

async fn run_loop<P: WalletProvider>(
    controller: &mut AppController<P>,
    mut events: AppEvents,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    redraw(controller, ui_state, "initial draw failed")?;
    connect_and_draw(controller, ui_state).await?;

    loop {
        tokio::select! {
            maybe_event = events.polls.recv() => {
                let Some(event) = maybe_event else {
                    warn!("poll channel closed");
                    break;
                };
                if controller.apply_poll_event(event) {
                    redraw(controller, ui_state, "draw after poll tick failed")?;
                }
            }
            maybe_action = events.actions.recv() => {
                let Some(event) = maybe_action else {
                    warn!("action channel closed");
                    break;
                };
                if controller.apply_action_event(event) {
                    redraw(controller, ui_state, "draw after action update failed")?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Connect => connect_and_draw(controller, ui_state).await?,
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::Refresh => controller.request_refresh(),
                    ui::UserEvent::Play { salt } => controller.play(salt),
                    ui::UserEvent::Claim => controller.claim(),
                    ui::UserEvent::Fund { amount_wei } => controller.fund(amount_wei),
                    ui::UserEvent::Withdraw { amount_wei } => {
                        controller.owner_withdraw(amount_wei)
                    }
                    ui::UserEvent::SetParams {
                        prize_wei,
                        entry_fee_wei,
                        win_chance_ppm,
                    } => controller.set_params(prize_wei, entry_fee_wei, win_chance_ppm),
                }
                redraw(controller, ui_state, "draw after user action failed")?;
            }
        }
    }

    controller.disconnect();
    Ok(())
}

async fn connect_and_draw<P: WalletProvider>(
    controller: &mut AppController<P>,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    controller.set_busy("Connecting wallet...");
    redraw(controller, ui_state, "draw while connecting failed")?;
    controller.connect().await;
    redraw(controller, ui_state, "draw after connect failed")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        abi,
        provider::ProviderError,
        test_helpers::{
            FakeProvider,
            ReceiptBuilder,
            settle_action,
            test_account,
            test_chain,
        },
    };

    async fn connected(
        provider: &Arc<FakeProvider>,
    ) -> (AppController<FakeProvider>, AppEvents) {
        let (mut controller, mut events) = AppController::new(
            provider.clone(),
            test_chain(),
            None,
            Duration::from_secs(3600),
        );
        controller.connect().await;
        let first = events.polls.recv().await.expect("first poll tick");
        controller.apply_poll_event(first);
        (controller, events)
    }

    fn stocked_provider() -> Arc<FakeProvider> {
        let provider = Arc::new(FakeProvider::new());
        provider.stock_views(1_000, 10, 100_000, 50_000, 0, 0);
        provider.set_block_number(100);
        provider.set_owner(test_account());
        provider
    }

    #[tokio::test]
    async fn play__user_rejection_sets_notice_without_error_entry() {
        // given
        let provider = stocked_provider();
        provider.fail_send(ProviderError::new(4001, "User rejected the request."));
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.play(abi::uint_word(7));
        settle_action(&mut controller, &mut events).await;

        // then
        assert_eq!(
            controller.notice(),
            Some(&Notice::UserRejected { action: "Play" })
        );
        assert!(
            controller
                .activity()
                .iter()
                .all(|entry| !entry.text.starts_with("Error:"))
        );
        assert_eq!(controller.last_outcome(), None);
    }

    #[tokio::test]
    async fn play__other_failure_is_logged_as_error() {
        // given
        let provider = stocked_provider();
        provider.fail_send(
            ProviderError::new(-32603, "Internal error")
                .with_data(serde_json::json!({ "message": "execution reverted: too soon" })),
        );
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.play(abi::uint_word(7));
        settle_action(&mut controller, &mut events).await;

        // then
        assert_eq!(
            controller.notice(),
            Some(&Notice::Error("execution reverted: too soon".to_string()))
        );
        assert_eq!(
            controller.activity().latest().unwrap().text,
            "Error: Play: execution reverted: too soon"
        );
    }

    #[tokio::test]
    async fn play__decodes_receipt_into_outcome_and_log_entries() {
        // given
        let provider = stocked_provider();
        provider.set_default_receipt(
            ReceiptBuilder::new(Default::default())
                .prize_pending(test_account(), 5)
                .result(test_account(), false, 0),
        );
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.play(abi::uint_word(7));
        settle_action(&mut controller, &mut events).await;

        // then
        assert_eq!(controller.last_outcome(), Some(ActionOutcome::Lost));
        let texts: Vec<_> = controller
            .activity()
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(texts[0], "Prize pending: 0.000000000000000005 ETH for 0x111111…111111");
        assert_eq!(texts[1], "No win this time");
        assert_eq!(texts[2], "Play submitted");
        let sent = provider.sent_transactions();
        assert_eq!(sent[0]["value"], "0xa");
    }

    #[tokio::test]
    async fn play__unknown_outcome_gets_neutral_message() {
        // given
        let provider = stocked_provider();
        provider.set_default_receipt(ReceiptBuilder::new(Default::default()));
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.play(abi::uint_word(1));
        settle_action(&mut controller, &mut events).await;

        // then
        assert_eq!(controller.last_outcome(), Some(ActionOutcome::Unknown));
        assert_eq!(controller.status(), "Play finished, outcome not decoded");
    }

    #[tokio::test]
    async fn play__blocked_when_already_played_this_block() {
        // given
        let provider = stocked_provider();
        provider.stock_views(1_000, 10, 100_000, 50_000, 0, 100);
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.play(abi::uint_word(1));
        settle_action(&mut controller, &mut events).await;

        // then
        assert!(!controller.can_play());
        assert!(provider.sent_transactions().is_empty());
        assert!(matches!(controller.notice(), Some(Notice::Warning(_))));
    }

    #[tokio::test]
    async fn play__contract_refusal_is_a_warning_without_transaction() {
        // given
        let provider = stocked_provider();
        let (mut controller, mut events) = connected(&provider).await;
        provider.set_contract_eligibility(false, 101);

        // when
        controller.play(abi::uint_word(1));
        settle_action(&mut controller, &mut events).await;

        // then
        assert!(provider.sent_transactions().is_empty());
        assert_eq!(
            controller.notice(),
            Some(&Notice::Warning(
                "The contract only accepts your next play from block 101".to_string()
            ))
        );
        assert_eq!(controller.last_outcome(), None);
    }

    #[tokio::test]
    async fn fund__refused_while_another_action_is_in_flight() {
        // given
        let provider = stocked_provider();
        provider.set_pending_polls(u32::MAX);
        let (mut controller, _events) = connected(&provider).await;
        controller.play(abi::uint_word(1));

        // when
        controller.fund(5);

        // then
        assert!(controller.has_action_in_flight());
        assert_eq!(
            controller.notice(),
            Some(&Notice::Warning(
                "Wait for the pending transaction to finish".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn set_params__requires_owner() {
        // given
        let provider = stocked_provider();
        provider.set_owner(abi::Address([0x77; 20]));
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.set_params(1, 1, 1);
        settle_action(&mut controller, &mut events).await;

        // then
        assert!(provider.sent_transactions().is_empty());
        assert_eq!(
            controller.notice(),
            Some(&Notice::Warning("Only the contract owner can do that".to_string()))
        );
    }

    #[tokio::test]
    async fn set_params__logs_params_updated_event() {
        // given
        let provider = stocked_provider();
        provider.set_default_receipt(
            ReceiptBuilder::new(Default::default()).params_updated(2_000, 20, 250_000),
        );
        let (mut controller, mut events) = connected(&provider).await;

        // when
        controller.set_params(2_000, 20, 250_000);
        settle_action(&mut controller, &mut events).await;

        // then
        let latest = controller.activity().latest().unwrap();
        assert!(latest.text.starts_with("Params updated:"));
        assert!(latest.text.ends_with("chance 25%"));
        assert!(latest.tx_hash.is_some());
    }

    #[tokio::test]
    async fn apply_poll_event__ignores_ticks_from_previous_session() {
        // given
        let provider = stocked_provider();
        let (mut controller, _events) = connected(&provider).await;
        let before = controller.snapshot().cloned().unwrap();
        let stale = PollerEvent {
            session_id: 999,
            tick: Ok(Snapshot {
                current_block: 1,
                ..before.clone()
            }),
        };

        // when
        let changed = controller.apply_poll_event(stale);

        // then
        assert!(!changed);
        assert_eq!(controller.snapshot(), Some(&before));
    }

    #[tokio::test]
    async fn disconnect__clears_snapshot_and_stops_session() {
        // given
        let provider = stocked_provider();
        let (mut controller, _events) = connected(&provider).await;

        // when
        controller.disconnect();

        // then
        assert!(!controller.is_connected());
        assert!(controller.snapshot().is_none());
        assert!(!controller.can_play());
    }

    #[tokio::test]
    async fn connect__failure_is_caught_and_reported() {
        // given
        let provider = Arc::new(FakeProvider::new());
        provider.fail_accounts(ProviderError::new(-32000, "no wallet"));
        let (mut controller, _events) =
            AppController::new(provider, test_chain(), None, Duration::from_secs(60));

        // when
        controller.connect().await;

        // then
        assert!(!controller.is_connected());
        assert!(matches!(controller.notice(), Some(Notice::Error(_))));
    }
}
