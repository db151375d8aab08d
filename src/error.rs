use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HeapLensError>;

#[derive(Error, Debug)]
pub enum HeapLensError {
    /// The 16-byte dump prefix does not match the expected magic.
    #[error("invalid dump header: {0:?}")]
    InvalidHeader(String),

    /// A declared string or byte-slice length exceeds its sanity cap.
    #[error("declared length {declared} exceeds cap {max}")]
    CorruptLength { declared: u64, max: u64 },

    /// A varint ran past ten bytes or overflowed 64 bits.
    #[error("varint overflows 64 bits")]
    CorruptVarint,

    /// End of input reached in the middle of a record.
    #[error("truncated record: unexpected end of input")]
    TruncatedRecord,

    /// A record tag outside the recognized set.
    #[error("unknown record tag {0}")]
    UnknownTag(u64),

    /// The Params record failed to decode. Never recoverable.
    #[error("params record corrupt: {0}")]
    ParamsCorrupt(#[source] Box<HeapLensError>),

    /// Wrapper for errors raised by caller-supplied observers.
    ///
    /// Observer errors are propagated verbatim; this variant exists so a
    /// caller can construct a distinguishable error of its own.
    #[error("callback failed: {0}")]
    Callback(String),

    /// The recoverable-error budget was exhausted.
    #[error("error budget exceeded after {count} recoverable errors: {last}")]
    ErrorBudgetExceeded {
        count: usize,
        #[source]
        last: Box<HeapLensError>,
    },

    /// No registered adapter claimed the input.
    #[error("no parser found for dump format")]
    NoParserForFormat,

    /// JSON fixture dump failed to decode.
    #[error("json dump error: {0}")]
    Json(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeapLensError {
    /// Whether the streaming parser may skip past this failure when
    /// recovery is enabled.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            HeapLensError::CorruptLength { .. }
                | HeapLensError::CorruptVarint
                | HeapLensError::UnknownTag(_)
        )
    }
}
