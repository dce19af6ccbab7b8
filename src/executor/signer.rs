//! Wallet Signer - Local Transaction Signing
//!
//! This module handles:
//! - Loading the trading wallet's private key
//! - Signing legacy (EIP-155) and EIP-1559 transactions locally
//!
//! ⚠️  SECURITY WARNING:
//! - The key only ever exists inside `LocalSigner`
//! - Signed bytes are the only thing handed to the RPC
//! - Never log or expose private keys

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;
use tracing::debug;

use crate::config::PrivateKey;
use crate::error::{EngineError, Result};

/// Fee fields for the transaction type in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeFields {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeFields {
    /// Highest price per gas this transaction may pay
    pub fn max_price_per_gas(&self) -> u128 {
        match self {
            FeeFields::Legacy { gas_price } => *gas_price,
            FeeFields::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }
}

/// Everything needed to sign a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub fees: FeeFields,
}

/// EIP-2718 encoded, signed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
}

/// Local signing capability
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;
    fn sign(&self, tx: UnsignedTx) -> Result<SignedTransaction>;
}

/// Wallet backed by an in-memory private key
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    pub fn new(key: &PrivateKey) -> Result<Self> {
        let hex = key.expose().trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);

        let signer = PrivateKeySigner::from_str(hex)
            .map_err(|e| EngineError::Config(format!("invalid WALLET_PRIVATE_KEY: {e}")))?;

        Ok(Self { signer })
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.signer.address())
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign(&self, tx: UnsignedTx) -> Result<SignedTransaction> {
        let nonce = tx.nonce;
        let to = TxKind::Call(tx.to);

        let envelope: TxEnvelope = match tx.fees {
            FeeFields::Legacy { gas_price } => {
                let legacy = TxLegacy {
                    chain_id: Some(tx.chain_id),
                    nonce,
                    gas_price,
                    gas_limit: tx.gas_limit,
                    to,
                    value: tx.value,
                    input: tx.input,
                };
                let signature = self
                    .signer
                    .sign_hash_sync(&legacy.signature_hash())
                    .map_err(|e| EngineError::Signing(e.to_string()))?;
                legacy.into_signed(signature).into()
            }
            FeeFields::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let eip1559 = TxEip1559 {
                    chain_id: tx.chain_id,
                    nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to,
                    value: tx.value,
                    input: tx.input,
                    access_list: Default::default(),
                };
                let signature = self
                    .signer
                    .sign_hash_sync(&eip1559.signature_hash())
                    .map_err(|e| EngineError::Signing(e.to_string()))?;
                eip1559.into_signed(signature).into()
            }
        };

        let hash = *envelope.tx_hash();
        let raw = Bytes::from(envelope.encoded_2718());

        debug!(
            "Signed transaction: to={:?}, nonce={}, gas_limit={}, hash={:?}",
            tx.to, nonce, tx.gas_limit, hash
        );

        Ok(SignedTransaction { raw, hash })
    }
}

/// Generate a new random wallet, returning the hex key and its address
pub fn generate_new_wallet() -> (String, Address) {
    let signer = PrivateKeySigner::random();
    let address = signer.address();
    let private_key = format!("0x{}", hex::encode(signer.credential().to_bytes()));
    (private_key, address)
}
