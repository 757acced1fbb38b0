//! Scripted in-memory wallet provider and receipt builders for tests.

use crate::{
    abi::{
        self,
        Address,
        TxHash,
        Word,
    },
    app::{
        AppController,
        AppEvents,
    },
    chain::{
        Log,
        Receipt,
        View,
    },
    config::ChainConfig,
    decoder::{
        PARAMS_UPDATED_EVENT,
        PRIZE_PAID_EVENT,
        PRIZE_PENDING_EVENT,
        RESULT_EVENT,
    },
    provider::{
        METHOD_NOT_FOUND_CODE,
        ProviderError,
        WalletProvider,
    },
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashMap,
    sync::Mutex,
};

pub const TEST_CHAIN_ID: u64 = 31_337;

pub fn test_account() -> Address {
    Address([0x11; 20])
}

pub fn test_contract() -> Address {
    Address([0xc0; 20])
}

pub fn test_chain() -> ChainConfig {
    ChainConfig {
        chain_id: TEST_CHAIN_ID,
        contract: test_contract(),
        explorer_url: "https://explorer.test".to_string(),
    }
}

/// Feeds action events into the controller until its in-flight action ends.
pub async fn settle_action<P: WalletProvider>(
    controller: &mut AppController<P>,
    events: &mut AppEvents,
) {
    while controller.has_action_in_flight() {
        let Some(event) = events.actions.recv().await else {
            return;
        };
        controller.apply_action_event(event);
    }
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Address>,
    accounts_error: Option<ProviderError>,
    request_accounts_supported: bool,
    chain_id: u64,
    switch_error: Option<ProviderError>,
    views: HashMap<String, Vec<u8>>,
    view_errors: HashMap<String, ProviderError>,
    block_number: u64,
    block_number_error: Option<ProviderError>,
    send_error: Option<ProviderError>,
    sent: Vec<Value>,
    tx_counter: u64,
    last_tx_hash: Option<TxHash>,
    pending_polls: u32,
    receipts: HashMap<TxHash, Value>,
    default_receipt: Option<ReceiptBuilder>,
    calls: HashMap<String, usize>,
}

/// Answers the JSON-RPC methods the client uses from scripted state.
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        let state = FakeState {
            accounts: vec![test_account()],
            request_accounts_supported: true,
            chain_id: TEST_CHAIN_ID,
            ..FakeState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = self.state.lock().expect("fake provider state poisoned");
        f(&mut guard)
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.with_state(|s| s.accounts = accounts);
    }

    pub fn fail_accounts(&self, err: ProviderError) {
        self.with_state(|s| s.accounts_error = Some(err));
    }

    pub fn disable_request_accounts(&self) {
        self.with_state(|s| s.request_accounts_supported = false);
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.with_state(|s| s.chain_id = chain_id);
    }

    pub fn fail_chain_switch(&self, err: ProviderError) {
        self.with_state(|s| s.switch_error = Some(err));
    }

    pub fn set_view(&self, view: View, word: Word) {
        let key = abi::encode_hex(&view.calldata());
        self.with_state(|s| {
            s.view_errors.remove(&key);
            s.views.insert(key, word.to_vec());
        });
    }

    pub fn fail_view(&self, view: View, err: ProviderError) {
        let key = abi::encode_hex(&view.calldata());
        self.with_state(|s| {
            s.view_errors.insert(key, err);
        });
    }

    pub fn set_owner(&self, owner: Address) {
        self.set_view(View::Owner, owner.to_word());
    }

    /// Stocks every polled view for [`test_account`].
    pub fn stock_views(
        &self,
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
        contract_balance: u128,
        pending_prize: u128,
        last_played_block: u64,
    ) {
        let who = test_account();
        self.set_view(View::PrizeWei, abi::uint_word(prize_wei));
        self.set_view(View::EntryFeeWei, abi::uint_word(entry_fee_wei));
        self.set_view(View::WinChancePpm, abi::uint_word(u128::from(win_chance_ppm)));
        self.set_view(View::ContractBalance, abi::uint_word(contract_balance));
        self.set_view(View::PendingPrizes(who), abi::uint_word(pending_prize));
        self.set_view(
            View::LastPlayedBlock(who),
            abi::uint_word(u128::from(last_played_block)),
        );
        self.set_contract_eligibility(true, last_played_block + 1);
    }

    /// Scripts the contract-side `canPlayNow` / `nextAllowedBlock` views.
    pub fn set_contract_eligibility(&self, can_play_now: bool, next_allowed_block: u64) {
        let who = test_account();
        self.set_view(View::CanPlayNow(who), abi::uint_word(u128::from(can_play_now)));
        self.set_view(
            View::NextAllowedBlock(who),
            abi::uint_word(u128::from(next_allowed_block)),
        );
    }

    pub fn set_block_number(&self, block: u64) {
        self.with_state(|s| {
            s.block_number = block;
            s.block_number_error = None;
        });
    }

    pub fn fail_block_number(&self, err: ProviderError) {
        self.with_state(|s| s.block_number_error = Some(err));
    }

    pub fn fail_send(&self, err: ProviderError) {
        self.with_state(|s| s.send_error = Some(err));
    }

    pub fn sent_transactions(&self) -> Vec<Value> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn last_tx_hash(&self) -> Option<TxHash> {
        self.with_state(|s| s.last_tx_hash)
    }

    /// Number of `null` receipt responses served before a receipt appears.
    pub fn set_pending_polls(&self, polls: u32) {
        self.with_state(|s| s.pending_polls = polls);
    }

    pub fn set_receipt(&self, receipt: ReceiptBuilder) {
        self.with_state(|s| {
            s.receipts.insert(receipt.hash, receipt.to_json());
        });
    }

    /// Receipt served for any transaction sent after this call; the builder's
    /// hash is replaced with the real one.
    pub fn set_default_receipt(&self, receipt: ReceiptBuilder) {
        self.with_state(|s| s.default_receipt = Some(receipt));
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.with_state(|s| s.calls.get(method).copied().unwrap_or(0))
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        self.with_state(|s| {
            *s.calls.entry(method.to_string()).or_default() += 1;
            match method {
                "eth_requestAccounts" if !s.request_accounts_supported => Err(
                    ProviderError::new(METHOD_NOT_FOUND_CODE, "method not found"),
                ),
                "eth_requestAccounts" | "eth_accounts" => match &s.accounts_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(json!(
                        s.accounts.iter().map(Address::to_string).collect::<Vec<_>>()
                    )),
                },
                "eth_chainId" => Ok(json!(abi::encode_quantity(u128::from(s.chain_id)))),
                "wallet_switchEthereumChain" => {
                    if let Some(err) = &s.switch_error {
                        return Err(err.clone());
                    }
                    let requested = params[0]["chainId"]
                        .as_str()
                        .and_then(|raw| abi::parse_quantity(raw).ok())
                        .and_then(|v| u64::try_from(v).ok())
                        .ok_or_else(|| ProviderError::new(-32602, "invalid chainId"))?;
                    s.chain_id = requested;
                    Ok(Value::Null)
                }
                "eth_call" => {
                    let data = params[0]["data"].as_str().unwrap_or_default().to_string();
                    if let Some(err) = s.view_errors.get(&data) {
                        return Err(err.clone());
                    }
                    let bytes = s.views.get(&data).cloned().unwrap_or_default();
                    Ok(json!(abi::encode_hex(&bytes)))
                }
                "eth_blockNumber" => match &s.block_number_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(json!(abi::encode_quantity(u128::from(s.block_number)))),
                },
                "eth_sendTransaction" => {
                    if let Some(err) = &s.send_error {
                        return Err(err.clone());
                    }
                    s.tx_counter += 1;
                    let hash = TxHash(abi::keccak256(&s.tx_counter.to_be_bytes()));
                    s.sent.push(params[0].clone());
                    s.last_tx_hash = Some(hash);
                    if let Some(template) = s.default_receipt.clone() {
                        s.receipts.insert(hash, template.with_hash(hash).to_json());
                    }
                    Ok(json!(hash.to_string()))
                }
                "eth_getTransactionReceipt" => {
                    if s.pending_polls > 0 {
                        s.pending_polls -= 1;
                        return Ok(Value::Null);
                    }
                    let hash = params[0]
                        .as_str()
                        .and_then(|raw| raw.parse::<TxHash>().ok())
                        .ok_or_else(|| ProviderError::new(-32602, "invalid hash"))?;
                    Ok(s.receipts.get(&hash).cloned().unwrap_or(Value::Null))
                }
                other => Err(ProviderError::new(
                    METHOD_NOT_FOUND_CODE,
                    format!("method {other} not supported"),
                )),
            }
        })
    }
}

impl WalletProvider for FakeProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }
}

/// Builds receipts with lottery event logs, as domain values or RPC JSON.
#[derive(Clone, Debug)]
pub struct ReceiptBuilder {
    hash: TxHash,
    emitter: Address,
    success: bool,
    block_number: u64,
    logs: Vec<Log>,
}

impl ReceiptBuilder {
    pub fn new(hash: TxHash) -> Self {
        Self {
            hash,
            emitter: test_contract(),
            success: true,
            block_number: 1,
            logs: Vec::new(),
        }
    }

    pub fn with_hash(mut self, hash: TxHash) -> Self {
        self.hash = hash;
        self
    }

    /// Address used for logs added after this call.
    pub fn emitted_by(mut self, emitter: Address) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn reverted(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn raw_log(mut self, log: Log) -> Self {
        self.logs.push(log);
        self
    }

    pub fn result(self, player: Address, won: bool, prize_amount: u128) -> Self {
        let mut data = abi::uint_word(u128::from(won)).to_vec();
        data.extend_from_slice(&abi::uint_word(prize_amount));
        let topics = vec![abi::event_topic(RESULT_EVENT), player.to_word()];
        self.event(topics, data)
    }

    pub fn prize_paid(self, to: Address, amount: u128) -> Self {
        let topics = vec![abi::event_topic(PRIZE_PAID_EVENT), to.to_word()];
        self.event(topics, abi::uint_word(amount).to_vec())
    }

    pub fn prize_pending(self, to: Address, amount: u128) -> Self {
        let topics = vec![abi::event_topic(PRIZE_PENDING_EVENT), to.to_word()];
        self.event(topics, abi::uint_word(amount).to_vec())
    }

    pub fn params_updated(
        self,
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
    ) -> Self {
        let mut data = abi::uint_word(prize_wei).to_vec();
        data.extend_from_slice(&abi::uint_word(entry_fee_wei));
        data.extend_from_slice(&abi::uint_word(u128::from(win_chance_ppm)));
        self.event(vec![abi::event_topic(PARAMS_UPDATED_EVENT)], data)
    }

    fn event(mut self, topics: Vec<Word>, data: Vec<u8>) -> Self {
        let address = self.emitter;
        self.logs.push(Log {
            address,
            topics,
            data,
        });
        self
    }

    pub fn build(&self) -> Receipt {
        Receipt {
            transaction_hash: self.hash,
            block_number: self.block_number,
            success: self.success,
            logs: self.logs.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        let logs: Vec<Value> = self
            .logs
            .iter()
            .map(|log| {
                json!({
                    "address": log.address.to_string(),
                    "topics": log.topics.iter().map(|t| abi::encode_hex(t)).collect::<Vec<_>>(),
                    "data": abi::encode_hex(&log.data),
                })
            })
            .collect();
        json!({
            "transactionHash": self.hash.to_string(),
            "blockNumber": abi::encode_quantity(u128::from(self.block_number)),
            "status": if self.success { "0x1" } else { "0x0" },
            "logs": logs,
        })
    }
}
