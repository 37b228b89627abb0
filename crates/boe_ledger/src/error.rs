//! Ledger client error types.

use std::time::Duration;

/// Errors that can occur while talking to the ledger or driving a widget.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The HTTP request itself failed (connection refused, TLS, non-2xx).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a JSON-RPC error object. `message` is the
    /// remote text, unmodified.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    /// A response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// ABI encoding/decoding or method lookup failed.
    #[error("ABI error: {0}")]
    Abi(String),

    /// User input rejected before anything was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A previous call from the same adapter has not finished yet.
    #[error("A previous request is still in flight")]
    SubmissionInFlight,

    /// A resubmission arrived too soon after the previous one.
    #[error("Resubmitted too quickly, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The wallet/signer refused or could not sign. Message is verbatim.
    #[error("{0}")]
    Signer(String),

    /// The endpoint did not answer within the transport's request timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The chain id is not one of the known networks.
    #[error("Unsupported chain id {0}")]
    UnsupportedChain(u64),
}

/// JSON-RPC implementation-defined server error range.
const SERVER_ERROR_CODES: std::ops::RangeInclusive<i64> = -32099..=-32000;
const INTERNAL_ERROR_CODE: i64 = -32603;

impl LedgerError {
    /// Whether the same request might succeed if attempted again later.
    ///
    /// Network failures and JSON-RPC server errors are transient. Malformed
    /// responses and ABI errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport(_) | LedgerError::Timeout(_) => true,
            LedgerError::Rpc { code, .. } => {
                SERVER_ERROR_CODES.contains(code) || *code == INTERNAL_ERROR_CODE
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_displays_remote_message_verbatim() {
        let err = LedgerError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
        };
        assert_eq!(err.to_string(), "User rejected the request.");
    }

    #[test]
    fn signer_error_displays_verbatim() {
        let err = LedgerError::Signer("insufficient funds for gas * price + value".into());
        assert_eq!(err.to_string(), "insufficient funds for gas * price + value");
    }

    #[test]
    fn transient_classification() {
        assert!(LedgerError::Transport("connection refused".into()).is_transient());
        assert!(LedgerError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!LedgerError::SubmissionInFlight.is_transient());
        assert!(!LedgerError::Decode("malformed JSON-RPC response".into()).is_transient());
        assert!(
            LedgerError::Rpc {
                code: -32005,
                message: "limit exceeded".into()
            }
            .is_transient()
        );
        assert!(
            !LedgerError::Rpc {
                code: 3,
                message: "execution reverted".into()
            }
            .is_transient()
        );
    }
}
