//! Error taxonomy for the trading engine
//!
//! Every failure carries a tag the trading loop can branch on:
//! - Configuration errors are fatal at startup
//! - Permanent market errors stop the token's loop
//! - Transient infrastructure errors skip the current tick
//! - Execution errors become an ERROR trade event

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use thiserror::Error;

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preflight,
    Approval,
    Quote,
    Gas,
    Sign,
    Submit,
    Confirm,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Preflight => write!(f, "preflight"),
            Stage::Approval => write!(f, "approval"),
            Stage::Quote => write!(f, "quote"),
            Stage::Gas => write!(f, "gas"),
            Stage::Sign => write!(f, "sign"),
            Stage::Submit => write!(f, "submit"),
            Stage::Confirm => write!(f, "confirm"),
        }
    }
}

/// How the trading loop must react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Configuration,
    PermanentMarket,
    Transient,
    Execution,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Configuration => write!(f, "CONFIGURATION"),
            ErrorClass::PermanentMarket => write!(f, "PERMANENT"),
            ErrorClass::Transient => write!(f, "TRANSIENT"),
            ErrorClass::Execution => write!(f, "EXECUTION"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error("No pair exists for token {token:?} against base asset {base:?}")]
    PairNotFound { token: Address, base: Address },

    #[error("Pair {pair:?} has no token reserves")]
    EmptyReserves { pair: Address },

    #[error("Chain unavailable during {operation}: {reason}")]
    ChainUnavailable { operation: &'static str, reason: String },

    #[error("ABI unavailable for {address:?} (attempt {attempts}): {reason}")]
    AbiUnavailable {
        address: Address,
        reason: String,
        attempts: u32,
        exhausted: bool,
    },

    #[error("Receipt for {hash:?} not available after {waited_secs}s")]
    ReceiptTimeout { hash: B256, waited_secs: u64 },

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("Insufficient liquidity. Required: {required}, Available: {available}")]
    InsufficientLiquidity { required: U256, available: U256 },

    #[error("Gas price {gwei:.2} gwei exceeds limit of {max_gwei} gwei")]
    GasPriceTooHigh { gwei: f64, max_gwei: u64 },

    #[error("Approval failed: {hash:?}")]
    ApprovalFailed { hash: B256 },

    #[error("Router allowance for {token:?} is below {required}; approval stage was skipped")]
    ApprovalSkipped { token: Address, required: U256 },

    #[error("Transaction failed: {hash:?}")]
    TransactionFailed { hash: B256 },

    #[error("Swap deadline {deadline} already passed (now {now})")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("{stage} stage failed: {source}")]
    Pipeline {
        stage: Stage,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Classify per the engine's error taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Config(_) | EngineError::InvalidAddress(_) => ErrorClass::Configuration,
            EngineError::PairNotFound { .. } => ErrorClass::PermanentMarket,
            EngineError::AbiUnavailable { exhausted: true, .. } => ErrorClass::PermanentMarket,
            EngineError::AbiUnavailable { .. }
            | EngineError::ChainUnavailable { .. }
            | EngineError::EmptyReserves { .. }
            | EngineError::ReceiptTimeout { .. } => ErrorClass::Transient,
            EngineError::Pipeline { source, .. } => source.class(),
            _ => ErrorClass::Execution,
        }
    }

    /// Whether the trading loop must stop on this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Configuration | ErrorClass::PermanentMarket
        )
    }

    /// Attach the pipeline stage that produced this error
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ EngineError::Pipeline { .. } => already,
            other => EngineError::Pipeline {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if it came from the pipeline
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Transaction hash tied to the failure, when one was broadcast
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            EngineError::TransactionFailed { hash }
            | EngineError::ApprovalFailed { hash }
            | EngineError::ReceiptTimeout { hash, .. } => Some(*hash),
            EngineError::Pipeline { source, .. } => source.tx_hash(),
            _ => None,
        }
    }

    pub(crate) fn chain(operation: &'static str, reason: impl std::fmt::Display) -> Self {
        EngineError::ChainUnavailable {
            operation,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let pair = EngineError::PairNotFound {
            token: Address::ZERO,
            base: Address::ZERO,
        };
        assert_eq!(pair.class(), ErrorClass::PermanentMarket);
        assert!(pair.is_fatal());

        let rpc = EngineError::chain("eth_call", "connection reset");
        assert_eq!(rpc.class(), ErrorClass::Transient);
        assert!(!rpc.is_fatal());

        let failed = EngineError::TransactionFailed { hash: B256::ZERO };
        assert_eq!(failed.class(), ErrorClass::Execution);
    }

    #[test]
    fn test_exhausted_abi_lookup_is_permanent() {
        let retryable = EngineError::AbiUnavailable {
            address: Address::ZERO,
            reason: "timeout".into(),
            attempts: 1,
            exhausted: false,
        };
        assert_eq!(retryable.class(), ErrorClass::Transient);

        let exhausted = EngineError::AbiUnavailable {
            address: Address::ZERO,
            reason: "Contract source code not verified".into(),
            attempts: 3,
            exhausted: true,
        };
        assert!(exhausted.is_fatal());
    }

    #[test]
    fn test_stage_wrapping_keeps_inner_class_and_hash() {
        let hash = B256::repeat_byte(0xab);
        let err = EngineError::ReceiptTimeout { hash, waited_secs: 180 }.at(Stage::Confirm);

        assert_eq!(err.stage(), Some(Stage::Confirm));
        assert_eq!(err.class(), ErrorClass::Transient);
        assert_eq!(err.tx_hash(), Some(hash));

        // Re-wrapping keeps the innermost stage
        let again = err.at(Stage::Submit);
        assert_eq!(again.stage(), Some(Stage::Confirm));
        assert!(again.to_string().starts_with("confirm stage failed"));
    }
}
