/// Errors produced by the transfer pipeline and its collaborators.
///
/// Every error is terminal for the request that produced it; nothing in this
/// crate retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Missing or expired {0} credential")]
    Unauthenticated(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("Not a version: {0}")]
    NotAVersion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not provision destination: {0}")]
    DestinationProvisioning(String),

    #[error("Could not dispatch transfer job: {0}")]
    Dispatch(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl TransferError {
    pub fn provider(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Provider(format!("{}: {}", context, err))
    }
}
