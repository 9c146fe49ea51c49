//! Transfer failure causes.

use std::io;

/// Why a single transfer failed. Local to that transfer; never affects others.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection reset, DNS, truncated body, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The body ended before the advertised Content-Length was reached.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// The destination filesystem is out of space.
    #[error("storage full: {0}")]
    StorageFull(#[source] io::Error),
    /// Creating, writing or finalizing the destination file failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    /// The worker running the transfer stopped without reporting an outcome.
    #[error("transfer worker stopped unexpectedly")]
    WorkerLost,
}

impl TransferError {
    /// Map a disk error to `StorageFull` or `Write`.
    pub fn from_io(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::StorageFull {
            TransferError::StorageFull(e)
        } else {
            TransferError::Write(e)
        }
    }

    /// True for network/HTTP causes, false for local storage causes.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TransferError::Curl(_) | TransferError::Http(_) | TransferError::PartialTransfer { .. }
        )
    }
}
