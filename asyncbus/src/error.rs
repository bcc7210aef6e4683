use derive_more::{Display, Error};

/// Errors raised while walking a capture.
#[derive(Debug, Display, Error, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The capture ran out before the awaited condition was seen. This ends
    /// decoding; there is nothing more to wait for.
    #[display(fmt = "end of stream")]
    EndOfStream,
    /// A set of line states did not have exactly one entry per channel.
    #[display(fmt = "expected {} channels but got {}", expected, actual)]
    MalformedChannelCount { expected: usize, actual: usize },
    /// The record sink stopped accepting records.
    #[display(fmt = "record sink closed")]
    SinkClosed,
}
