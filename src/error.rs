use crate::frame_id::FrameId;

/// The recoverable faults of the protocol. None of these terminates a session: the receiver
///  logs them, drops the offending input and keeps going. The only fatal condition is an error
///  on the UDP socket itself, which travels as `anyhow::Error` out of the receive loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A datagram that does not decode as any protocol message: truncated, unknown tag, or
    ///  trailing bytes after a fixed-size message.
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    /// A structurally valid datagram whose fragment geometry is inconsistent, either in itself
    ///  or with the fragments already buffered for the same frame.
    #[error("invalid fragment {frag_id}/{frag_count} for frame #{frame_id}: {reason}")]
    InvalidFragment {
        frame_id: FrameId,
        frag_id: u16,
        frag_count: u16,
        reason: &'static str,
    },

    /// The decoder rejected a fully reassembled frame. Playout continues with the next frame.
    #[error("failed to decode frame #{frame_id}: {reason}")]
    DecodeFailure {
        frame_id: FrameId,
        reason: String,
    },
}
