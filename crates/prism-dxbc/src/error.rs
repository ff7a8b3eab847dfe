use thiserror::Error;

/// Errors produced while parsing or editing a `DXBC` container.
///
/// Every variant carries a human-readable context string describing what was
/// being read when the error occurred; this is what ends up on the diagnostic
/// channel when a caller degrades instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The fixed container header is malformed (bad magic, short buffer,
    /// inconsistent declared size).
    #[error("malformed DXBC header: {0}")]
    MalformedHeader(String),
    /// The chunk offset table is malformed or points outside the container.
    #[error("malformed chunk offsets: {0}")]
    MalformedOffsets(String),
    /// A chunk payload failed to parse.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),
    /// A read would have gone past the declared container bounds.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        DxbcError::MalformedHeader(context.into())
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        DxbcError::MalformedOffsets(context.into())
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        DxbcError::InvalidChunk(context.into())
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        DxbcError::OutOfBounds(context.into())
    }

    /// Returns the context string for this error.
    pub fn context(&self) -> &str {
        match self {
            DxbcError::MalformedHeader(s)
            | DxbcError::MalformedOffsets(s)
            | DxbcError::InvalidChunk(s)
            | DxbcError::OutOfBounds(s) => s,
        }
    }
}
