//! Wallet session lifecycle.
//!
//! A [`Session`] is created by [`Session::connect`] and torn down by
//! [`Session::disconnect`] (or by dropping it). Polling is bound to the
//! session: it starts once an account is known and stops with the session.

use crate::{
    abi::{
        self,
        Address,
    },
    chain::{
        LotteryClient,
        quantity_from_value,
    },
    config::ChainConfig,
    error::ClientError,
    poller::{
        PollerEvent,
        PollerHandle,
    },
    provider::WalletProvider,
};
use serde_json::{
    Value,
    json,
};
use std::{
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

/// Shared "still relevant" flag. Work started under a session checks it
/// before publishing anything.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Session<P> {
    id: u64,
    client: Arc<LotteryClient<P>>,
    chain_id: u64,
    owner: Option<Address>,
    network_warning: Option<ClientError>,
    liveness: Liveness,
    poller: Option<PollerHandle>,
}

impl<P: WalletProvider> Session<P> {
    /// Requests accounts, checks the chain and reads the contract owner.
    ///
    /// A chain mismatch is not fatal: a switch is attempted and, if the
    /// provider still reports another chain, the session carries a
    /// [`ClientError::WrongNetwork`] warning.
    pub async fn connect(
        provider: Arc<P>,
        chain: &ChainConfig,
        preferred_account: Option<Address>,
        id: u64,
    ) -> Result<Self, ClientError> {
        let accounts = request_accounts(provider.as_ref()).await?;
        let account = match preferred_account {
            Some(wanted) => accounts.into_iter().find(|a| *a == wanted).ok_or_else(|| {
                ClientError::Connection(format!("account {wanted} not available in wallet"))
            })?,
            None => accounts
                .into_iter()
                .next()
                .ok_or_else(|| ClientError::Connection("wallet returned no accounts".to_string()))?,
        };

        let mut chain_id = read_chain_id(provider.as_ref()).await?;
        let mut network_warning = None;
        if chain_id != chain.chain_id {
            warn!(expected = chain.chain_id, actual = chain_id, "wrong network, requesting switch");
            let switch = provider
                .request(
                    "wallet_switchEthereumChain",
                    json!([{ "chainId": abi::encode_quantity(u128::from(chain.chain_id)) }]),
                )
                .await;
            if let Err(err) = switch {
                warn!(%err, "chain switch failed");
            }
            chain_id = read_chain_id(provider.as_ref()).await.unwrap_or(chain_id);
            if chain_id != chain.chain_id {
                network_warning = Some(ClientError::WrongNetwork {
                    expected: chain.chain_id,
                    actual: chain_id,
                });
            }
        }

        let client = Arc::new(LotteryClient::new(provider, chain.contract, account));
        let owner = match client.owner().await {
            Ok(owner) => Some(owner),
            Err(err) => {
                warn!(%err, "could not read contract owner");
                None
            }
        };

        info!(session_id = id, %account, chain_id, "wallet connected");
        Ok(Self {
            id,
            client,
            chain_id,
            owner,
            network_warning,
            liveness: Liveness::new(),
            poller: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn account(&self) -> Address {
        self.client.account()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn client(&self) -> &Arc<LotteryClient<P>> {
        &self.client
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        self.owner == Some(self.account())
    }

    pub fn network_warning(&self) -> Option<&ClientError> {
        self.network_warning.as_ref()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn start_polling(
        &mut self,
        interval: Duration,
        events: mpsc::UnboundedSender<PollerEvent>,
    ) {
        if self.poller.as_ref().is_some_and(PollerHandle::is_running) {
            return;
        }
        self.poller = Some(PollerHandle::spawn(
            self.client.clone(),
            self.id,
            interval,
            self.liveness.clone(),
            events,
        ));
    }

    pub fn refresh_now(&self) {
        if let Some(poller) = self.poller.as_ref() {
            poller.fetch_now();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollerHandle::is_running)
    }

    pub fn disconnect(mut self) {
        self.shutdown();
        info!(session_id = self.id, "wallet disconnected");
    }
}

impl<P> Session<P> {
    fn shutdown(&mut self) {
        self.liveness.revoke();
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl<P> Drop for Session<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn request_accounts<P: WalletProvider>(provider: &P) -> Result<Vec<Address>, ClientError> {
    let raw = match provider.request("eth_requestAccounts", json!([])).await {
        Ok(raw) => raw,
        Err(err) if err.is_method_not_found() => provider
            .request("eth_accounts", json!([]))
            .await
            .map_err(|e| ClientError::connection(&e))?,
        Err(err) => return Err(ClientError::connection(&err)),
    };
    parse_accounts(&raw)
}

fn parse_accounts(raw: &Value) -> Result<Vec<Address>, ClientError> {
    let list = raw
        .as_array()
        .ok_or_else(|| ClientError::Connection(format!("unexpected accounts response {raw}")))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| ClientError::Connection(format!("unexpected account {v}")))
                .and_then(|s| {
                    s.parse::<Address>()
                        .map_err(|e| ClientError::Connection(format!("invalid account {s}: {e}")))
                })
        })
        .collect()
}

async fn read_chain_id<P: WalletProvider>(provider: &P) -> Result<u64, ClientError> {
    let raw = provider
        .request("eth_chainId", json!([]))
        .await
        .map_err(|e| ClientError::connection(&e))?;
    quantity_from_value(&raw)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| ClientError::Connection(format!("unexpected chain id {raw}")))
}
