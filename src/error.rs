use thiserror::Error;

/// Why a resize or expand request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDenied {
    /// A migration is already in flight; only one target table may exist.
    #[error("rehashing already in progress")]
    RehashingInProgress,
    /// Resizing is administratively disabled on the shared config.
    #[error("resizing is disabled")]
    ResizeDisabled,
    /// The requested capacity cannot hold the entries already stored.
    #[error("requested capacity {requested} is below {used} stored entries")]
    TooSmall { requested: usize, used: usize },
}

/// Errors reported by dictionary operations. All are recoverable by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    #[error("key already exists")]
    KeyAlreadyExists,

    #[error("key not found")]
    KeyNotFound,

    /// Allocating a bucket array of `bytes` bytes failed.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("invalid resize request: {0}")]
    InvalidResize(ResizeDenied),
}

pub type Result<T> = std::result::Result<T, DictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_condition() {
        assert_eq!(DictError::KeyNotFound.to_string(), "key not found");
        let e = DictError::InvalidResize(ResizeDenied::TooSmall { requested: 2, used: 9 });
        assert_eq!(
            e.to_string(),
            "invalid resize request: requested capacity 2 is below 9 stored entries"
        );
    }
}
