use thiserror::Error;

/// Errors produced while framing or unframing packets.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Truncated stream: expected {expected} bytes, got {got}")]
    TruncatedStream { expected: usize, got: usize },

    #[error("Body too large: {len} bytes (max {max})")]
    BodyTooLarge { len: u32, max: u32 },

    #[error("Body serialization error: {0}")]
    Body(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
