use thiserror::Error;

/// Failure reported by a host implementation.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host does not provide this capability (no audio session API, no
    /// settings backend).
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    /// The native call failed: unreachable URL, unsupported codec, a rejected
    /// write.
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The handle was used after it was unloaded or before it finished loading.
    #[error("Audio handle is not loaded")]
    NotLoaded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
