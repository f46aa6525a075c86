//! Codec error types

use thiserror::Error;

/// Error raised when a wire value cannot be converted to or from its domain type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The hex string is not in the node's canonical form
    #[error("malformed hex {input:?}: {reason}")]
    MalformedHex {
        /// The offending input (truncated for very long values)
        input: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// A signed value below zero cannot be a Quantity
    #[error("quantity cannot be negative: {0}")]
    NegativeQuantity(String),

    /// Unknown block tag
    #[error("invalid block reference: {0:?}")]
    InvalidBlockTag(String),
}

impl CodecError {
    pub(crate) fn malformed(input: &str, reason: &'static str) -> Self {
        const MAX_ECHO: usize = 80;
        let input = if input.len() > MAX_ECHO {
            let mut cut = MAX_ECHO;
            while !input.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &input[..cut])
        } else {
            input.to_string()
        };
        CodecError::MalformedHex { input, reason }
    }

    /// True for hex-format failures
    pub fn is_malformed_hex(&self) -> bool {
        matches!(self, CodecError::MalformedHex { .. })
    }
}
