use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    future::Future,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC code for an unsupported method.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;
/// Code used for transport-level failures that never reached a node.
pub const TRANSPORT_ERROR_CODE: i64 = -32000;

/// An EIP-1193 style request channel to a wallet or node.
pub trait WalletProvider: Send + Sync + 'static {
    fn request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, ProviderError>> + Send;
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, message)
    }

    pub fn is_user_rejection(&self) -> bool {
        if self.code == USER_REJECTED_CODE {
            return true;
        }
        let needle = "user rejected";
        self.message.to_lowercase().contains(needle)
            || self
                .data_message()
                .is_some_and(|m| m.to_lowercase().contains(needle))
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == METHOD_NOT_FOUND_CODE
    }

    /// Prefers the revert reason nested in `data` over the top-level message.
    pub fn most_specific_message(&self) -> Option<String> {
        self.data_message()
            .or_else(|| {
                let trimmed = self.message.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
    }

    fn data_message(&self) -> Option<String> {
        match self.data.as_ref()? {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            Value::String(s) if !s.trim().is_empty() && !s.starts_with("0x") => {
                Some(s.trim().to_string())
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProviderError>,
}

/// JSON-RPC over HTTP. Signing is left to the node (`eth_sendTransaction`),
/// which is how dev nodes and remote signers expose unlocked accounts.
pub struct HttpProvider {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            ProviderError::transport(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }
}

impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        tracing::debug!(id, method, "json-rpc request");
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("request to {} failed: {e}", self.url)))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            ProviderError::transport(format!("failed to read response body: {e}"))
        })?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            let body = String::from_utf8_lossy(&bytes);
            ProviderError::transport(format!(
                "invalid json-rpc response ({status}): {e}: {body}"
            ))
        })?;
        if let Some(err) = parsed.error {
            tracing::debug!(id, method, code = err.code, "json-rpc error");
            return Err(err);
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use serde_json::json;

    #[test]
    fn display__shows_code_and_message() {
        let err: Box<dyn std::error::Error> =
            Box::new(ProviderError::new(-32603, "Internal error"));
        assert_eq!(err.to_string(), "provider error -32603: Internal error");
    }

    #[test]
    fn is_user_rejection__matches_code_4001() {
        let err = ProviderError::new(4001, "denied");
        assert!(err.is_user_rejection());
    }

    #[test]
    fn is_user_rejection__matches_message_case_insensitively() {
        let err = ProviderError::new(-32603, "MetaMask: User Rejected the request.");
        assert!(err.is_user_rejection());
        let other = ProviderError::new(-32603, "execution reverted");
        assert!(!other.is_user_rejection());
    }

    #[test]
    fn most_specific_message__prefers_nested_data_message() {
        let err = ProviderError::new(-32603, "Internal JSON-RPC error.")
            .with_data(json!({ "code": 3, "message": "execution reverted: too early" }));
        assert_eq!(
            err.most_specific_message().as_deref(),
            Some("execution reverted: too early")
        );
    }

    #[test]
    fn most_specific_message__ignores_hex_revert_payloads() {
        let err = ProviderError::new(3, "execution reverted").with_data(json!("0x08c379a0"));
        assert_eq!(err.most_specific_message().as_deref(), Some("execution reverted"));
    }

    #[test]
    fn most_specific_message__is_none_when_everything_is_blank() {
        let err = ProviderError::new(-32000, "   ");
        assert_eq!(err.most_specific_message(), None);
    }

    #[test]
    fn json_rpc_response__deserializes_error_object() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":4001,"message":"User rejected"}}"#;
        let parsed: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        let err = parsed.error.unwrap();
        assert_eq!(err.code, 4001);
        assert!(parsed.result.is_none());
    }
}
