//! ABI Registry - Etherscan API Integration
//!
//! Fetches verified contract ABIs from Etherscan.
//!
//! API: https://api.etherscan.io/v2/api?chainid=1&module=contract&action=getabi&address=0x...

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Timeout for API calls
const API_TIMEOUT_SECS: u64 = 10;

/// Error from an ABI source; the directory turns it into `AbiUnavailable`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct AbiLookupError(pub String);

/// Anything that can resolve a contract address to its ABI
#[async_trait]
pub trait AbiSource: Send + Sync {
    async fn fetch_abi(&self, address: Address) -> Result<JsonAbi, AbiLookupError>;
}

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct EtherscanAbiResponse {
    status: String,
    message: String,
    /// JSON-encoded ABI on success, an error text otherwise
    result: String,
}

// ============================================
// ETHERSCAN CLIENT
// ============================================

pub struct EtherscanAbiSource {
    http_client: Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanAbiSource {
    pub fn new(api_url: String, api_key: String, chain_id: u64) -> Result<Self, AbiLookupError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .map_err(|e| AbiLookupError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_url,
            api_key,
            chain_id,
        })
    }
}

#[async_trait]
impl AbiSource for EtherscanAbiSource {
    async fn fetch_abi(&self, address: Address) -> Result<JsonAbi, AbiLookupError> {
        let address_param = address.to_checksum(None);
        let chain_param = self.chain_id.to_string();

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_param.as_str()),
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address_param.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AbiLookupError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AbiLookupError(format!("registry returned HTTP {status}")));
        }

        let body: EtherscanAbiResponse = response
            .json()
            .await
            .map_err(|e| AbiLookupError(format!("unreadable registry response: {e}")))?;

        debug!("ABI lookup for {:?}: {} {}", address, body.status, body.message);
        parse_registry_result(&body)
    }
}

fn parse_registry_result(body: &EtherscanAbiResponse) -> Result<JsonAbi, AbiLookupError> {
    if body.status != "1" {
        return Err(AbiLookupError(format!("{}: {}", body.message, body.result)));
    }

    serde_json::from_str(&body.result)
        .map_err(|e| AbiLookupError(format!("malformed ABI JSON: {e}")))
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verified_contract() {
        let body = EtherscanAbiResponse {
            status: "1".into(),
            message: "OK".into(),
            result: r#"[{"type":"function","name":"getPair","inputs":[{"name":"a","type":"address"},{"name":"b","type":"address"}],"outputs":[{"name":"","type":"address"}],"stateMutability":"view"}]"#.into(),
        };

        let abi = parse_registry_result(&body).unwrap();
        assert!(abi.function("getPair").is_some());
    }

    #[test]
    fn test_parse_unverified_contract() {
        let body = EtherscanAbiResponse {
            status: "0".into(),
            message: "NOTOK".into(),
            result: "Contract source code not verified".into(),
        };

        let err = parse_registry_result(&body).unwrap_err();
        assert!(err.0.contains("not verified"));
        assert_eq!(err.to_string(), err.0);
    }

    #[test]
    fn test_parse_garbage_abi() {
        let body = EtherscanAbiResponse {
            status: "1".into(),
            message: "OK".into(),
            result: "{not json".into(),
        };

        assert!(parse_registry_result(&body).is_err());
    }
}
