#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("not enough bytes: got {actual}, need {minimum}")]
    NotEnoughData { actual: usize, minimum: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid timecode config: {0}")]
    TimecodeConfig(String),

    #[error("Overflow")]
    Overflow,
    #[error("Underflow")]
    Underflow,

    /// Header field values are impossible: truncated fields, an APID or
    /// sequence count out of range, or a `data_field_len` that overflows
    /// the buffer it claims to describe.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// An inconsistent profile, e.g. `data_field_len` smaller than the
    /// secondary header plus the MIC trailer. Fatal at construction.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A length tag on an input stream did not match the bytes actually
    /// delivered before end-of-stream.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A CRC or MIC check failed on decode. Reported on the decoded
    /// packet/frame; does not halt the pipeline.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// End-of-stream in the middle of a frame.
    #[error("truncated stream: {0}")]
    Truncation(String),

    /// Integrity check or correct error executing the algorithm.
    #[error("integrity algorithm error: {0}")]
    IntegrityAlgorithm(String),
}

pub type Result<T> = std::result::Result<T, Error>;
