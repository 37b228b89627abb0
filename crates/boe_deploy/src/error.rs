use boe_ledger::LedgerError;

/// Errors that abort the deployment procedure.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Missing or malformed configuration. Raised before any network call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact loading, broadcast or confirmation failed.
    #[error("Deployment failed: {0}")]
    Deployment(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Config(_) => 2,
            DeployError::Deployment(_) | DeployError::Io(_) => 1,
        }
    }
}

impl From<LedgerError> for DeployError {
    fn from(err: LedgerError) -> Self {
        DeployError::Deployment(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(DeployError::Config("x".into()).exit_code(), 2);
        assert_eq!(DeployError::Deployment("x".into()).exit_code(), 1);
        let io = std::io::Error::other("disk full");
        assert_eq!(DeployError::from(io).exit_code(), 1);
    }

    #[test]
    fn ledger_errors_are_deployment_failures() {
        let err: DeployError = LedgerError::Transport("refused".into()).into();
        assert!(matches!(err, DeployError::Deployment(_)));
    }
}
