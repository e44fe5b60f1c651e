use crate::error::ProtocolError;
use crate::frame_id::FrameId;
use bytes::{Bytes, BytesMut};

/// What happened to a fragment that was added to a [FrameBuffer].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Stored,
    /// this fragment id was already buffered; the first payload wins
    Duplicate,
}

/// Collects the fragments of a single frame, in whatever order they arrive, until all of them
///  are there. The fragment count is fixed at creation from the first fragment that shows up;
///  later fragments claiming a different count are rejected before they get here.
pub struct FrameBuffer {
    frame_id: FrameId,
    fragments: Vec<Option<Bytes>>,
    num_received: u16,
    /// advisory preallocation size for the assembled frame, derived from the first fragment
    byte_len_hint: usize,
}

impl FrameBuffer {
    pub fn new(frame_id: FrameId, frag_count: u16, byte_len_hint: usize) -> FrameBuffer {
        assert!(frag_count > 0);

        FrameBuffer {
            frame_id,
            fragments: vec![None; frag_count as usize],
            num_received: 0,
            byte_len_hint,
        }
    }

    pub fn frag_count(&self) -> u16 {
        self.fragments.len() as u16
    }

    pub fn num_received(&self) -> u16 {
        self.num_received
    }

    /// Stores a fragment's payload, idempotently: a duplicate fragment id leaves the buffer
    ///  unchanged. A fragment id outside the frame's geometry is rejected without altering
    ///  any state.
    pub fn add_fragment(&mut self, frag_id: u16, payload: Bytes) -> Result<AddOutcome, ProtocolError> {
        if frag_id >= self.frag_count() {
            return Err(ProtocolError::InvalidFragment {
                frame_id: self.frame_id,
                frag_id,
                frag_count: self.frag_count(),
                reason: "fragment id outside the frame's fragment count",
            });
        }

        let slot = &mut self.fragments[frag_id as usize];
        if slot.is_some() {
            return Ok(AddOutcome::Duplicate);
        }
        *slot = Some(payload);
        self.num_received += 1;
        Ok(AddOutcome::Stored)
    }

    pub fn is_complete(&self) -> bool {
        self.num_received as usize == self.fragments.len()
    }

    /// The frame's payload, i.e. all fragments concatenated in fragment order. Defined only
    ///  when the buffer is complete.
    pub fn assembled_bytes(&self) -> Bytes {
        assert!(self.is_complete());

        let mut assembled = BytesMut::with_capacity(self.byte_len_hint);
        for fragment in self.fragments.iter().flatten() {
            assembled.extend_from_slice(fragment);
        }
        assembled.freeze()
    }
}
