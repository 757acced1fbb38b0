//! Adapter over a [`WalletProvider`] bound to the lottery contract.

use crate::{
    abi::{
        self,
        Address,
        HexParseError,
        TxHash,
        Word,
    },
    error::ClientError,
    provider::WalletProvider,
};
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::time;

pub const DEFAULT_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(1);

/// Side-effect-free contract functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    PrizeWei,
    EntryFeeWei,
    WinChancePpm,
    Owner,
    ContractBalance,
    LastPlayedBlock(Address),
    PendingPrizes(Address),
    CanPlayNow(Address),
    NextAllowedBlock(Address),
}

impl View {
    pub fn signature(&self) -> &'static str {
        match self {
            View::PrizeWei => "prizeWei()",
            View::EntryFeeWei => "entryFeeWei()",
            View::WinChancePpm => "winChancePpm()",
            View::Owner => "owner()",
            View::ContractBalance => "contractBalance()",
            View::LastPlayedBlock(_) => "lastPlayedBlock(address)",
            View::PendingPrizes(_) => "pendingPrizes(address)",
            View::CanPlayNow(_) => "canPlayNow(address)",
            View::NextAllowedBlock(_) => "nextAllowedBlock(address)",
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        match self {
            View::LastPlayedBlock(who)
            | View::PendingPrizes(who)
            | View::CanPlayNow(who)
            | View::NextAllowedBlock(who) => {
                abi::encode_call(self.signature(), &[who.to_word()])
            }
            _ => abi::encode_call(self.signature(), &[]),
        }
    }
}

/// State-changing contract functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractCall {
    Play { user_salt: Word, entry_fee_wei: u128 },
    Claim,
    Fund { amount_wei: u128 },
    OwnerWithdraw { amount_wei: u128 },
    SetParams {
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
    },
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::Play { .. } => "play(uint256)",
            ContractCall::Claim => "claim()",
            ContractCall::Fund { .. } => "fund()",
            ContractCall::OwnerWithdraw { .. } => "ownerWithdraw(uint256)",
            ContractCall::SetParams { .. } => "setParams(uint256,uint256,uint32)",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContractCall::Play { .. } => "Play",
            ContractCall::Claim => "Claim",
            ContractCall::Fund { .. } => "Fund",
            ContractCall::OwnerWithdraw { .. } => "Withdraw",
            ContractCall::SetParams { .. } => "Set params",
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        let args = match self {
            ContractCall::Play { user_salt, .. } => vec![*user_salt],
            ContractCall::Claim | ContractCall::Fund { .. } => vec![],
            ContractCall::OwnerWithdraw { amount_wei } => vec![abi::uint_word(*amount_wei)],
            ContractCall::SetParams {
                prize_wei,
                entry_fee_wei,
                win_chance_ppm,
            } => vec![
                abi::uint_word(*prize_wei),
                abi::uint_word(*entry_fee_wei),
                abi::uint_word(u128::from(*win_chance_ppm)),
            ],
        };
        abi::encode_call(self.signature(), &args)
    }

    /// Wei attached to the call.
    pub fn value(&self) -> u128 {
        match self {
            ContractCall::Play { entry_fee_wei, .. } => *entry_fee_wei,
            ContractCall::Fund { amount_wei } => *amount_wei,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: TxHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Word>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<Log>,
}

pub struct LotteryClient<P> {
    provider: Arc<P>,
    contract: Address,
    account: Address,
    confirmation_interval: Duration,
}

impl<P: WalletProvider> LotteryClient<P> {
    pub fn new(provider: Arc<P>, contract: Address, account: Address) -> Self {
        Self {
            provider,
            contract,
            account,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
        }
    }

    pub fn with_confirmation_interval(mut self, interval: Duration) -> Self {
        self.confirmation_interval = interval;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Raw return words of a view call.
    pub async fn read_view(&self, view: View) -> Result<Vec<Word>, ClientError> {
        let params = json!([
            {
                "from": self.account.to_string(),
                "to": self.contract.to_string(),
                "data": abi::encode_hex(&view.calldata()),
            },
            "latest"
        ]);
        let raw = self
            .provider
            .request("eth_call", params)
            .await
            .map_err(|e| ClientError::rpc(&e))?;
        let bytes = raw
            .as_str()
            .ok_or_else(|| ClientError::Rpc(format!("{}: non-string result", view.signature())))
            .and_then(|s| {
                abi::decode_hex(s)
                    .map_err(|e| ClientError::Rpc(format!("{}: {e}", view.signature())))
            })?;
        abi::split_words(&bytes).filter(|w| !w.is_empty()).ok_or_else(|| {
            ClientError::Rpc(format!(
                "{}: undecodable return data ({} bytes)",
                view.signature(),
                bytes.len()
            ))
        })
    }

    async fn read_first_word(&self, view: View) -> Result<Word, ClientError> {
        let words = self.read_view(view).await?;
        Ok(words[0])
    }

    async fn read_uint(&self, view: View) -> Result<u128, ClientError> {
        let word = self.read_first_word(view).await?;
        abi::word_to_u128(&word)
            .ok_or_else(|| ClientError::Rpc(format!("{}: value out of range", view.signature())))
    }

    pub async fn prize_wei(&self) -> Result<u128, ClientError> {
        self.read_uint(View::PrizeWei).await
    }

    pub async fn entry_fee_wei(&self) -> Result<u128, ClientError> {
        self.read_uint(View::EntryFeeWei).await
    }

    pub async fn win_chance_ppm(&self) -> Result<u32, ClientError> {
        let value = self.read_uint(View::WinChancePpm).await?;
        u32::try_from(value)
            .map_err(|_| ClientError::Rpc("winChancePpm(): value out of range".to_string()))
    }

    pub async fn owner(&self) -> Result<Address, ClientError> {
        let word = self.read_first_word(View::Owner).await?;
        Address::from_word(&word)
            .ok_or_else(|| ClientError::Rpc("owner(): malformed address".to_string()))
    }

    pub async fn contract_balance(&self) -> Result<u128, ClientError> {
        self.read_uint(View::ContractBalance).await
    }

    pub async fn last_played_block(&self, who: Address) -> Result<u64, ClientError> {
        let value = self.read_uint(View::LastPlayedBlock(who)).await?;
        u64::try_from(value)
            .map_err(|_| ClientError::Rpc("lastPlayedBlock(): value out of range".to_string()))
    }

    pub async fn pending_prizes(&self, who: Address) -> Result<u128, ClientError> {
        self.read_uint(View::PendingPrizes(who)).await
    }

    pub async fn can_play_now(&self, who: Address) -> Result<bool, ClientError> {
        let word = self.read_first_word(View::CanPlayNow(who)).await?;
        abi::word_to_bool(&word)
            .ok_or_else(|| ClientError::Rpc("canPlayNow(): malformed bool".to_string()))
    }

    pub async fn next_allowed_block(&self, who: Address) -> Result<u64, ClientError> {
        let value = self.read_uint(View::NextAllowedBlock(who)).await?;
        u64::try_from(value)
            .map_err(|_| ClientError::Rpc("nextAllowedBlock(): value out of range".to_string()))
    }

    pub async fn block_number(&self) -> Result<u64, ClientError> {
        let raw = self
            .provider
            .request("eth_blockNumber", json!([]))
            .await
            .map_err(|e| ClientError::rpc(&e))?;
        quantity_from_value(&raw)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| ClientError::Rpc(format!("eth_blockNumber: unexpected result {raw}")))
    }

    /// Sends a state-changing call. Nothing is retried.
    pub async fn submit(&self, call: &ContractCall) -> Result<TxHandle, ClientError> {
        let params = json!([{
            "from": self.account.to_string(),
            "to": self.contract.to_string(),
            "data": abi::encode_hex(&call.calldata()),
            "value": abi::encode_quantity(call.value()),
        }]);
        tracing::info!(call = call.label(), value = %call.value(), "submitting transaction");
        let raw = self
            .provider
            .request("eth_sendTransaction", params)
            .await
            .map_err(|e| ClientError::submission(&e))?;
        let hash = raw
            .as_str()
            .ok_or_else(|| ClientError::Transaction(format!("unexpected transaction hash {raw}")))?
            .parse::<TxHash>()
            .map_err(|e| ClientError::Transaction(format!("invalid transaction hash: {e}")))?;
        tracing::info!(%hash, "transaction submitted");
        Ok(TxHandle { hash })
    }

    /// Polls for the receipt until the transaction is mined.
    pub async fn await_confirmation(&self, handle: &TxHandle) -> Result<Receipt, ClientError> {
        loop {
            let raw = self
                .provider
                .request("eth_getTransactionReceipt", json!([handle.hash.to_string()]))
                .await
                .map_err(|e| ClientError::submission(&e))?;
            if raw.is_null() {
                time::sleep(self.confirmation_interval).await;
                continue;
            }
            let dto: ReceiptDto = serde_json::from_value(raw).map_err(|e| {
                ClientError::Transaction(format!("invalid receipt for {}: {e}", handle.hash))
            })?;
            let receipt = Receipt::try_from(dto).map_err(|e| {
                ClientError::Transaction(format!("invalid receipt for {}: {e}", handle.hash))
            })?;
            if !receipt.success {
                tracing::warn!(hash = %handle.hash, "transaction reverted");
                return Err(ClientError::Transaction(format!(
                    "transaction {} reverted",
                    handle.hash
                )));
            }
            tracing::info!(
                hash = %handle.hash,
                block = receipt.block_number,
                logs = receipt.logs.len(),
                "transaction confirmed"
            );
            return Ok(receipt);
        }
    }
}

pub(crate) fn quantity_from_value(raw: &Value) -> Option<u128> {
    raw.as_str().and_then(|s| abi::parse_quantity(s).ok())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptDto {
    transaction_hash: String,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<LogDto>,
}

#[derive(Deserialize)]
struct LogDto {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

impl TryFrom<ReceiptDto> for Receipt {
    type Error = HexParseError;

    fn try_from(dto: ReceiptDto) -> Result<Self, Self::Error> {
        let block_number = match dto.block_number.as_deref() {
            Some(raw) => u64::try_from(abi::parse_quantity(raw)?)
                .map_err(|_| HexParseError::Invalid(format!("block number {raw}")))?,
            None => 0,
        };
        // Pre-Byzantium receipts carry no status; treat them as successful.
        let success = match dto.status.as_deref() {
            Some(raw) => abi::parse_quantity(raw)? == 1,
            None => true,
        };
        let logs = dto
            .logs
            .into_iter()
            .map(Log::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Receipt {
            transaction_hash: dto.transaction_hash.parse()?,
            block_number,
            success,
            logs,
        })
    }
}

impl TryFrom<LogDto> for Log {
    type Error = HexParseError;

    fn try_from(dto: LogDto) -> Result<Self, Self::Error> {
        let topics = dto
            .topics
            .iter()
            .map(|t| t.parse::<TxHash>().map(|h| h.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Log {
            address: dto.address.parse()?,
            topics,
            data: abi::decode_hex(&dto.data)?,
        })
    }
}
