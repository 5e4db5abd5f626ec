use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds for the fingerprinting engine, each surfaced at the
/// boundary that produces it.
#[derive(Debug, Error)]
pub enum Error {
    /// The file extension matches no registered codec.
    #[error("unsupported audio format: .{0}")]
    UnsupportedFormat(String),

    /// The container or codec data could not be decoded.
    #[error("corrupt audio: {0}")]
    CorruptAudio(String),

    /// The file is not sampled at the rate the fingerprinter is tuned for.
    #[error("expected {expected} Hz input, got {got} Hz")]
    WrongSampleRate { expected: u32, got: u32 },

    /// No catalogue row for the given audio id.
    #[error("audio {0} not found")]
    NotFound(i32),

    #[error("storage error: {0}")]
    Storage(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
