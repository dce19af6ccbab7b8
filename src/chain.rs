//! Chain access capabilities
//!
//! The engine talks to the node through two narrow traits:
//! - [`ChainReader`]: read-only queries (balances, nonce, gas, calls)
//! - [`TxSubmitter`]: raw transaction broadcast and receipt lookup
//!
//! Local signing lives in `executor::signer` and never touches the RPC.
//! [`RpcChainClient`] implements both traits over JSON-RPC/HTTP with a
//! timeout around every call.

use alloy_eips::BlockNumberOrTag;
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::time::Duration;
use tracing::trace;

use crate::error::{EngineError, Result};

/// Latest block header fields the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub base_fee_per_gas: Option<u64>,
}

/// A call or gas-estimation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl CallRequest {
    fn into_rpc(self) -> TransactionRequest {
        let mut tx = TransactionRequest::default()
            .to(self.to)
            .value(self.value)
            .input(self.data.into());
        if let Some(from) = self.from {
            tx = tx.from(from);
        }
        tx
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Native balance in wei
    async fn balance(&self, account: Address) -> Result<U256>;

    /// Transaction count including pending transactions. This is the only
    /// nonce source the engine uses
    async fn transaction_count(&self, account: Address) -> Result<u64>;

    /// Legacy gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    async fn latest_block(&self) -> Result<BlockInfo>;

    /// Read-only `eth_call` against the latest block
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64>;
}

#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Broadcast an already-signed transaction, returning its hash
    async fn send_raw(&self, raw: Bytes) -> Result<B256>;

    /// Receipt for `hash`, `None` while it is still pending
    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>>;
}

// ============================================
// JSON-RPC CLIENT
// ============================================

/// JSON-RPC client bound to one node endpoint
#[derive(Clone)]
pub struct RpcChainClient {
    provider: RootProvider,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| EngineError::Config(format!("invalid RPC_URL '{rpc_url}': {e}")))?;

        Ok(Self {
            provider: RootProvider::new_http(url),
            timeout,
        })
    }

    /// Run one RPC request under the configured timeout
    async fn bounded<F, T, E>(&self, operation: &'static str, request: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        trace!(operation, "rpc request");
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EngineError::chain(operation, e)),
            Err(_) => Err(EngineError::chain(
                operation,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainClient {
    async fn chain_id(&self) -> Result<u64> {
        self.bounded("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        self.bounded("eth_getBalance", self.provider.get_balance(account))
            .await
    }

    async fn transaction_count(&self, account: Address) -> Result<u64> {
        self.bounded(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(account).pending(),
        )
        .await
    }

    async fn gas_price(&self) -> Result<u128> {
        self.bounded("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        let block = self
            .bounded(
                "eth_getBlockByNumber",
                self.provider.get_block_by_number(BlockNumberOrTag::Latest),
            )
            .await?
            .ok_or_else(|| EngineError::chain("eth_getBlockByNumber", "latest block missing"))?;

        Ok(BlockInfo {
            base_fee_per_gas: block.header.base_fee_per_gas,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = CallRequest {
            to,
            data,
            ..Default::default()
        };
        self.bounded("eth_call", self.provider.call(request.into_rpc()))
            .await
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64> {
        self.bounded("eth_estimateGas", self.provider.estimate_gas(request.into_rpc()))
            .await
    }
}

#[async_trait]
impl TxSubmitter for RpcChainClient {
    async fn send_raw(&self, raw: Bytes) -> Result<B256> {
        let pending = self
            .bounded(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(&raw),
            )
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let receipt = self
            .bounded(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(hash),
            )
            .await?;

        Ok(receipt.map(|r| Receipt {
            hash: r.transaction_hash(),
            success: r.status(),
            block_number: r.block_number(),
            gas_used: r.gas_used(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_bad_url() {
        let result = RpcChainClient::connect("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_call_request_conversion() {
        let request = CallRequest {
            from: Some(Address::repeat_byte(1)),
            to: Address::repeat_byte(2),
            value: U256::from(7u64),
            data: Bytes::from(vec![0xde, 0xad]),
        };
        let rpc = request.into_rpc();
        assert_eq!(rpc.from, Some(Address::repeat_byte(1)));
        assert_eq!(rpc.value, Some(U256::from(7u64)));
        assert_eq!(rpc.input.input().map(|b| b.to_vec()), Some(vec![0xde, 0xad]));
    }
}
