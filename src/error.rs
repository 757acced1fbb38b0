use crate::provider::ProviderError;

pub const GENERIC_RPC_MESSAGE: &str = "RPC request failed";
pub const GENERIC_TRANSACTION_MESSAGE: &str = "Transaction failed";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("wallet connection failed: {0}")]
    Connection(String),
    #[error("wrong network: connected to chain {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("request rejected in wallet")]
    UserRejected,
    #[error("{0}")]
    Rpc(String),
    #[error("{0}")]
    Transaction(String),
}

impl ClientError {
    pub fn rpc(err: &ProviderError) -> Self {
        ClientError::Rpc(
            err.most_specific_message()
                .unwrap_or_else(|| GENERIC_RPC_MESSAGE.to_string()),
        )
    }

    /// Classifies a failure from a state-changing request.
    pub fn submission(err: &ProviderError) -> Self {
        if err.is_user_rejection() {
            return ClientError::UserRejected;
        }
        ClientError::Transaction(
            err.most_specific_message()
                .unwrap_or_else(|| GENERIC_TRANSACTION_MESSAGE.to_string()),
        )
    }

    pub fn connection(err: &ProviderError) -> Self {
        if err.is_user_rejection() {
            return ClientError::Connection("connection request declined".to_string());
        }
        ClientError::Connection(
            err.most_specific_message()
                .unwrap_or_else(|| "wallet provider unavailable".to_string()),
        )
    }

    pub fn is_user_rejected(&self) -> bool {
        matches!(self, ClientError::UserRejected)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use serde_json::json;

    #[test]
    fn submission__classifies_rejection_separately() {
        let err = ProviderError::new(4001, "User rejected the request.");
        assert_eq!(ClientError::submission(&err), ClientError::UserRejected);
    }

    #[test]
    fn submission__uses_most_specific_message() {
        let err = ProviderError::new(-32603, "Internal error")
            .with_data(json!({ "message": "execution reverted: already played" }));
        assert_eq!(
            ClientError::submission(&err),
            ClientError::Transaction("execution reverted: already played".to_string())
        );
    }

    #[test]
    fn submission__falls_back_to_generic_message() {
        let err = ProviderError::new(-32603, "");
        assert_eq!(
            ClientError::submission(&err).to_string(),
            GENERIC_TRANSACTION_MESSAGE
        );
    }

    #[test]
    fn connection__reports_declined_request() {
        let err = ProviderError::new(4001, "User rejected the request.");
        assert_eq!(
            ClientError::connection(&err),
            ClientError::Connection("connection request declined".to_string())
        );
    }
}
