//! Client error types

use nodelink_primitives::{CodecError, Quantity, H256};
use serde_json::Value;
use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes, plus the generic server error most nodes use
pub mod error_code {
    /// Parse error: invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request: the JSON is not a valid Request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Generic server error (geth, besu and friends)
    pub const SERVER_ERROR: i64 = -32000;
}

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// A wire value was not valid hex in the expected shape
    #[error(transparent)]
    MalformedHex(CodecError),

    /// A caller-supplied value could not be represented (negative quantity, unknown tag)
    #[error("invalid input: {0}")]
    InvalidInput(CodecError),

    /// Connectivity failure, timeout, or an unreadable HTTP body
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message as sent by the node
        message: String,
        /// Optional `data` member
        data: Option<Value>,
    },

    /// The response had the wrong shape for the method
    #[error("decode error: {0}")]
    Decode(String),

    /// The node refused a raw transaction
    #[error("transaction rejected ({code}): {reason}")]
    SubmissionRejected {
        /// Node error code
        code: i64,
        /// Node-supplied reason
        reason: String,
    },

    /// No receipt appeared within the polling policy. The transaction may still be mined.
    #[error("no receipt for {hash} after {attempts} attempts")]
    ConfirmationTimeout {
        /// Transaction hash that was polled
        hash: H256,
        /// Number of lookups performed
        attempts: u32,
    },

    /// The node no longer knows this filter id
    #[error("filter {id} expired or was uninstalled")]
    FilterExpired {
        /// Filter id
        id: Quantity,
    },

    /// The signing capability failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Chain id unusable for replay protection
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    /// Invalid private key
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// A detached call was aborted before completing
    #[error("call {0} was cancelled")]
    Cancelled(String),
}

impl ClientError {
    /// Shape mismatch while decoding the result of `method`
    pub fn decode(method: &str, err: impl std::fmt::Display) -> Self {
        ClientError::Decode(format!("{method}: {err}"))
    }

    /// Node-side error that may clear up on its own (transport hiccup, confirmation not yet seen)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::ConfirmationTimeout { .. }
        )
    }

    /// The node does not implement (or refuses to expose) the method
    pub fn is_method_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::Rpc { code, .. } if *code == error_code::METHOD_NOT_FOUND
        )
    }

    /// Node error text contains "filter not found"
    pub(crate) fn is_filter_not_found(&self) -> bool {
        match self {
            ClientError::Rpc { message, .. } => {
                message.to_ascii_lowercase().contains("filter not found")
            }
            _ => false,
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::MalformedHex { .. } => ClientError::MalformedHex(e),
            other => ClientError::InvalidInput(other),
        }
    }
}

impl From<nodelink_crypto::CryptoError> for ClientError {
    fn from(e: nodelink_crypto::CryptoError) -> Self {
        ClientError::Signing(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<hex::FromHexError> for ClientError {
    fn from(e: hex::FromHexError) -> Self {
        ClientError::InvalidPrivateKey(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_mapping() {
        let err: ClientError = Quantity::from_hex("0x01").unwrap_err().into();
        assert!(matches!(err, ClientError::MalformedHex(_)));

        let err: ClientError = Quantity::try_from(-1i64).unwrap_err().into();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[test]
    fn test_method_not_found() {
        let err = ClientError::Rpc {
            code: error_code::METHOD_NOT_FOUND,
            message: "Method not found".into(),
            data: None,
        };
        assert!(err.is_method_not_found());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_filter_not_found_detection() {
        let err = ClientError::Rpc {
            code: error_code::SERVER_ERROR,
            message: "Filter not found".into(),
            data: None,
        };
        assert!(err.is_filter_not_found());
        assert!(!ClientError::Transport("filter not found".into()).is_filter_not_found());
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let err = ClientError::ConfirmationTimeout {
            hash: H256::ZERO,
            attempts: 40,
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("40 attempts"));
    }
}
