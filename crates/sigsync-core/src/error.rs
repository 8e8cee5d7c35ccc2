use thiserror::Error;

/// Errors reported by the synchronized reader.
///
/// Attach and build time validation returns these directly. Read time calls
/// never return them as `Err`; they are carried inside a
/// [ReadResult](crate::ReadResult) with [ReadStatus::Fail](crate::ReadStatus::Fail).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// Unsupported domain unit or rule, zero streams, an unachievable
    /// explicit sample rate or mismatching rates.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A derived common delta or tick conversion does not fit in 64 bits.
    #[error("overflow while {context}")]
    Overflow { context: String },

    /// The reader was invalidated, a stream was detached or the reader is
    /// being destroyed.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// A stream has no descriptor assigned yet.
    #[error("stream {stream} has no {what} descriptor assigned")]
    NotAssigned { stream: usize, what: &'static str },

    /// Destination buffers do not match the attached streams.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A bounded packet queue is full; the reader has not caught up.
    #[error("packet queue is full ({capacity} packets)")]
    QueueFull { capacity: usize },

    /// Another read is already in progress on the same reader.
    #[error("a read is already in progress on this reader")]
    ConcurrentRead,
}

impl ReaderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn overflow(context: impl Into<String>) -> Self {
        Self::Overflow {
            context: context.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;
