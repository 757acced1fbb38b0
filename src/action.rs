//! Background execution of one contract transaction.
//!
//! Each action runs in its own task and reports its progress as
//! [`ActionEvent`]s: a submission hash, then a receipt or a failure. The run
//! loop keeps polling and reading input meanwhile. Dropping the
//! [`ActionHandle`] aborts the task, and nothing is published once the owning
//! session's liveness flag has been revoked.

use crate::{
    abi::TxHash,
    chain::{
        ContractCall,
        LotteryClient,
        Receipt,
    },
    error::ClientError,
    provider::WalletProvider,
    session::Liveness,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionStage {
    /// `canPlayNow` returned false; nothing was submitted.
    NotEligible { next_allowed_block: u64 },
    Submitted(TxHash),
    Confirmed(Receipt),
    Failed(ClientError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    pub session_id: u64,
    pub action_id: u64,
    pub stage: ActionStage,
}

pub struct ActionHandle {
    session_id: u64,
    action_id: u64,
    call: ContractCall,
    task: JoinHandle<()>,
}

impl ActionHandle {
    pub fn spawn<P: WalletProvider>(
        client: Arc<LotteryClient<P>>,
        call: ContractCall,
        session_id: u64,
        action_id: u64,
        liveness: Liveness,
        events: mpsc::UnboundedSender<ActionEvent>,
    ) -> Self {
        let task = tokio::spawn(action_worker(
            client,
            call.clone(),
            session_id,
            action_id,
            liveness,
            events,
        ));
        Self {
            session_id,
            action_id,
            call,
            task,
        }
    }

    pub fn call(&self) -> &ContractCall {
        &self.call
    }

    pub fn matches(&self, event: &ActionEvent) -> bool {
        self.session_id == event.session_id && self.action_id == event.action_id
    }
}

impl Drop for ActionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn action_worker<P: WalletProvider>(
    client: Arc<LotteryClient<P>>,
    call: ContractCall,
    session_id: u64,
    action_id: u64,
    liveness: Liveness,
    events: mpsc::UnboundedSender<ActionEvent>,
) {
    let publish = |stage: ActionStage| -> bool {
        if !liveness.is_live() {
            debug!(session_id, action_id, "session closed, dropping action result");
            return false;
        }
        events
            .send(ActionEvent {
                session_id,
                action_id,
                stage,
            })
            .is_ok()
    };

    let refused = match &call {
        ContractCall::Play { .. } => contract_refuses_play(&client).await,
        _ => None,
    };
    if let Some(next_allowed_block) = refused {
        info!(next_allowed_block, "contract refused play");
        publish(ActionStage::NotEligible { next_allowed_block });
        return;
    }

    let handle = match client.submit(&call).await {
        Ok(handle) => handle,
        Err(err) => {
            publish(ActionStage::Failed(err));
            return;
        }
    };
    if !publish(ActionStage::Submitted(handle.hash)) {
        return;
    }
    let stage = match client.await_confirmation(&handle).await {
        Ok(receipt) => ActionStage::Confirmed(receipt),
        Err(err) => ActionStage::Failed(err),
    };
    publish(stage);
}

/// Asks the contract itself whether the account may play in this block.
/// Returns the next allowed block when it may not. A failed read does not
/// block the play.
async fn contract_refuses_play<P: WalletProvider>(client: &LotteryClient<P>) -> Option<u64> {
    let account = client.account();
    match futures::try_join!(
        client.can_play_now(account),
        client.next_allowed_block(account)
    ) {
        Ok((true, _)) => None,
        Ok((false, next_allowed_block)) => Some(next_allowed_block),
        Err(err) => {
            warn!(%err, "eligibility views unavailable, submitting anyway");
            None
        }
    }
}
