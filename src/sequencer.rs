use crate::error::ProtocolError;
use crate::frame_buffer::{AddOutcome, FrameBuffer};
use crate::frame_id::FrameId;
use crate::wire::Datagram;
use bytes::Bytes;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// What became of a datagram handed to the sequencer. All three outcomes are acknowledged by
///  the caller; the disposition only says whether the datagram advanced reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// the fragment was buffered (and may have completed its frame)
    Stored,
    /// an identical fragment was already buffered
    Duplicate,
    /// the frame is behind the playout cursor, i.e. it was already dispatched or skipped
    Stale,
}

/// Running counters over a session, for diagnostics and the shutdown summary. They impose no
///  behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub datagrams_seen: u64,
    pub fragments_stored: u64,
    pub duplicate_fragments: u64,
    pub stale_datagrams: u64,
    pub invalid_fragments: u64,
    pub frames_completed: u64,
    pub frames_skipped: u64,
}

/// Orders fragmented frames for playout.
///
/// The sequencer owns the playout cursor (`next_frame_id`, the id of the next frame to hand
///  to the decoder) and a window of per-frame fragment buffers at or above the cursor. It
///  decides nothing about pacing: *when* to give up on a frame is the driving loop's policy,
///  the sequencer only provides the mechanism ([FrameSequencer::skip_to]) and the queries the
///  policy needs.
pub struct FrameSequencer {
    /// the id of the next frame to be dispatched; everything below is stale
    next_frame_id: FrameId,

    /// fragment buffers for frames at or above the cursor, keyed by frame id. Frames in here
    ///  are created by whichever of their fragments arrives first.
    frame_buffers: BTreeMap<FrameId, FrameBuffer>,

    stats: SequencerStats,
}

impl FrameSequencer {
    pub fn new() -> FrameSequencer {
        FrameSequencer {
            next_frame_id: FrameId::ZERO,
            frame_buffers: Default::default(),
            stats: Default::default(),
        }
    }

    pub fn next_frame_id(&self) -> FrameId {
        self.next_frame_id
    }

    pub fn window_len(&self) -> usize {
        self.frame_buffers.len()
    }

    pub fn stats(&self) -> SequencerStats {
        self.stats
    }

    /// The lowest buffered frame that is fully reassembled, if any. This is where the driving
    ///  loop skips to when playout stalls: skipping there guarantees a dispatchable frame.
    pub fn first_complete_frame(&self) -> Option<FrameId> {
        self.frame_buffers.iter()
            .find(|(_, buffer)| buffer.is_complete())
            .map(|(&frame_id, _)| frame_id)
    }

    /// The id of the n-th buffered frame in frame order, if there are that many.
    pub fn nth_buffered(&self, n: usize) -> Option<FrameId> {
        self.frame_buffers.keys().nth(n).copied()
    }

    /// Routes one decoded datagram into its frame's fragment buffer.
    ///
    /// Geometry violations leave the window untouched: a fragment id at or above the datagram's
    ///  own fragment count, a fragment count of zero, or a fragment count that disagrees with
    ///  the frame's established buffer are all [ProtocolError::InvalidFragment].
    pub fn on_datagram(&mut self, datagram: Datagram) -> Result<Disposition, ProtocolError> {
        self.stats.datagrams_seen += 1;

        if datagram.frag_count == 0 || datagram.frag_id >= datagram.frag_count {
            self.stats.invalid_fragments += 1;
            return Err(ProtocolError::InvalidFragment {
                frame_id: datagram.frame_id,
                frag_id: datagram.frag_id,
                frag_count: datagram.frag_count,
                reason: "fragment id outside the frame's fragment count",
            });
        }

        if datagram.frame_id < self.next_frame_id {
            self.stats.stale_datagrams += 1;
            return Ok(Disposition::Stale);
        }

        let buffer = match self.frame_buffers.entry(datagram.frame_id) {
            Entry::Vacant(entry) => {
                let byte_len_hint = datagram.frag_count as usize * datagram.payload.len();
                entry.insert(FrameBuffer::new(datagram.frame_id, datagram.frag_count, byte_len_hint))
            }
            Entry::Occupied(entry) => {
                let buffer = entry.into_mut();
                if buffer.frag_count() != datagram.frag_count {
                    self.stats.invalid_fragments += 1;
                    return Err(ProtocolError::InvalidFragment {
                        frame_id: datagram.frame_id,
                        frag_id: datagram.frag_id,
                        frag_count: datagram.frag_count,
                        reason: "fragment count disagrees with the frame's established geometry",
                    });
                }
                buffer
            }
        };

        match buffer.add_fragment(datagram.frag_id, datagram.payload) {
            Ok(AddOutcome::Stored) => {
                self.stats.fragments_stored += 1;
                Ok(Disposition::Stored)
            }
            Ok(AddOutcome::Duplicate) => {
                self.stats.duplicate_fragments += 1;
                Ok(Disposition::Duplicate)
            }
            Err(e) => {
                self.stats.invalid_fragments += 1;
                Err(e)
            }
        }
    }

    /// Level-triggered readiness: is the frame at the cursor fully reassembled?
    pub fn next_frame_complete(&self) -> bool {
        self.frame_buffers.get(&self.next_frame_id)
            .map(|buffer| buffer.is_complete())
            .unwrap_or(false)
    }

    /// Removes the frame at the cursor and advances the cursor by one. Returns `None` while
    ///  the frame at the cursor is not complete.
    pub fn consume_next_frame(&mut self) -> Option<(FrameId, Bytes)> {
        if !self.next_frame_complete() {
            return None;
        }

        let frame_id = self.next_frame_id;
        let buffer = self.frame_buffers.remove(&frame_id)?;
        self.next_frame_id = frame_id.next();
        self.stats.frames_completed += 1;

        let assembled = buffer.assembled_bytes();
        trace!("consuming frame #{} ({} bytes)", frame_id, assembled.len());
        Some((frame_id, assembled))
    }

    /// Moves the cursor forward to `target`, discarding all buffered fragments of frames below
    ///  it. The cursor never moves backwards: a target at or below the cursor is a no-op.
    pub fn skip_to(&mut self, target: FrameId) {
        let skipped = match self.next_frame_id.distance_to(target) {
            Some(n) if n > 0 => n,
            _ => return,
        };

        self.frame_buffers = self.frame_buffers.split_off(&target);
        debug!("skipping playout from frame #{} to frame #{}", self.next_frame_id, target);
        self.next_frame_id = target;
        self.stats.frames_skipped += skipped as u64;
    }
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn datagram(frame_id: u32, frag_id: u16, frag_count: u16, payload: &'static [u8]) -> Datagram {
        Datagram {
            frame_id: FrameId::from_raw(frame_id),
            frag_id,
            frag_count,
            send_ts: 1000 + frame_id as u64,
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn test_in_order_single_fragment_frames() {
        let mut sequencer = FrameSequencer::new();

        for frame_id in 0..3u32 {
            assert_eq!(sequencer.on_datagram(datagram(frame_id, 0, 1, b"frame")).unwrap(), Disposition::Stored);
        }

        let mut consumed = Vec::new();
        while let Some((frame_id, _)) = sequencer.consume_next_frame() {
            consumed.push(frame_id.to_raw());
        }
        assert_eq!(consumed, vec![0, 1, 2]);
        assert_eq!(sequencer.next_frame_id(), FrameId::from_raw(3));
        assert_eq!(sequencer.window_len(), 0);
    }

    #[test]
    fn test_fragmented_frame_completes_out_of_order() {
        let mut sequencer = FrameSequencer::new();

        assert_eq!(sequencer.on_datagram(datagram(0, 1, 3, b"BB")).unwrap(), Disposition::Stored);
        assert!(!sequencer.next_frame_complete());
        assert_eq!(sequencer.on_datagram(datagram(0, 0, 3, b"A")).unwrap(), Disposition::Stored);
        assert!(!sequencer.next_frame_complete());
        assert_eq!(sequencer.on_datagram(datagram(0, 1, 3, b"bb")).unwrap(), Disposition::Duplicate);
        assert!(!sequencer.next_frame_complete());
        assert_eq!(sequencer.on_datagram(datagram(0, 2, 3, b"CCC")).unwrap(), Disposition::Stored);
        assert!(sequencer.next_frame_complete());

        let (frame_id, assembled) = sequencer.consume_next_frame().unwrap();
        assert_eq!(frame_id, FrameId::ZERO);
        assert_eq!(assembled.as_ref(), b"ABBCCC");
    }

    #[test]
    fn test_head_of_line_blocking_until_cursor_frame_completes() {
        let mut sequencer = FrameSequencer::new();

        // frames 1 and 2 are complete, frame 0 is not even started
        sequencer.on_datagram(datagram(1, 0, 1, b"one")).unwrap();
        sequencer.on_datagram(datagram(2, 0, 1, b"two")).unwrap();
        assert!(!sequencer.next_frame_complete());
        assert_eq!(sequencer.consume_next_frame(), None);

        sequencer.on_datagram(datagram(0, 0, 1, b"zero")).unwrap();

        let mut consumed = Vec::new();
        while let Some((frame_id, _)) = sequencer.consume_next_frame() {
            consumed.push(frame_id.to_raw());
        }
        assert_eq!(consumed, vec![0, 1, 2]);
    }

    #[test]
    fn test_stale_datagram_is_not_buffered() {
        let mut sequencer = FrameSequencer::new();
        sequencer.skip_to(FrameId::from_raw(4));

        assert_eq!(sequencer.on_datagram(datagram(3, 0, 2, b"late")).unwrap(), Disposition::Stale);
        assert_eq!(sequencer.window_len(), 0);
        assert_eq!(sequencer.stats().stale_datagrams, 1);
    }

    #[test]
    fn test_datagram_for_consumed_frame_is_stale() {
        let mut sequencer = FrameSequencer::new();
        sequencer.on_datagram(datagram(0, 0, 1, b"frame")).unwrap();
        sequencer.consume_next_frame().unwrap();

        assert_eq!(sequencer.on_datagram(datagram(0, 0, 1, b"frame")).unwrap(), Disposition::Stale);
        assert_eq!(sequencer.window_len(), 0);
    }

    #[rstest]
    #[case::frag_id_at_count(2, 2)]
    #[case::frag_id_above_count(7, 2)]
    #[case::zero_frag_count(0, 0)]
    fn test_intrinsic_geometry_violation(#[case] frag_id: u16, #[case] frag_count: u16) {
        let mut sequencer = FrameSequencer::new();

        let result = sequencer.on_datagram(datagram(0, frag_id, frag_count, b"x"));
        assert!(matches!(result, Err(ProtocolError::InvalidFragment { .. })));
        assert_eq!(sequencer.window_len(), 0);
        assert_eq!(sequencer.stats().invalid_fragments, 1);
    }

    #[test]
    fn test_fragment_count_mismatch_leaves_established_buffer_intact() {
        let mut sequencer = FrameSequencer::new();
        sequencer.on_datagram(datagram(0, 0, 3, b"A")).unwrap();

        let result = sequencer.on_datagram(datagram(0, 1, 4, b"B"));
        assert!(matches!(result, Err(ProtocolError::InvalidFragment { .. })));

        // the frame still completes with its established geometry
        sequencer.on_datagram(datagram(0, 1, 3, b"B")).unwrap();
        sequencer.on_datagram(datagram(0, 2, 3, b"C")).unwrap();
        let (_, assembled) = sequencer.consume_next_frame().unwrap();
        assert_eq!(assembled.as_ref(), b"ABC");
    }

    #[test]
    fn test_skip_to_discards_incomplete_frames_below_target() {
        let mut sequencer = FrameSequencer::new();
        sequencer.skip_to(FrameId::from_raw(7));

        // frame 7 incomplete, frame 8 never arrives, frame 9 complete
        sequencer.on_datagram(datagram(7, 0, 2, b"partial")).unwrap();
        sequencer.on_datagram(datagram(9, 0, 1, b"nine")).unwrap();
        assert!(!sequencer.next_frame_complete());
        assert_eq!(sequencer.first_complete_frame(), Some(FrameId::from_raw(9)));

        sequencer.skip_to(FrameId::from_raw(9));
        assert_eq!(sequencer.window_len(), 1);

        let (frame_id, assembled) = sequencer.consume_next_frame().unwrap();
        assert_eq!(frame_id, FrameId::from_raw(9));
        assert_eq!(assembled.as_ref(), b"nine");

        // 0..=6 from the first skip, 7 and 8 from the second
        assert_eq!(sequencer.stats().frames_skipped, 9);
    }

    #[test]
    fn test_skip_past_a_complete_frame_discards_it_undispatched() {
        let mut sequencer = FrameSequencer::new();
        sequencer.skip_to(FrameId::from_raw(7));

        sequencer.on_datagram(datagram(7, 0, 2, b"partial")).unwrap();
        sequencer.on_datagram(datagram(9, 0, 1, b"nine")).unwrap();

        sequencer.skip_to(FrameId::from_raw(10));
        assert_eq!(sequencer.next_frame_id(), FrameId::from_raw(10));
        assert_eq!(sequencer.window_len(), 0);
        assert_eq!(sequencer.consume_next_frame(), None);
        assert_eq!(sequencer.stats().frames_completed, 0);
    }

    #[rstest]
    #[case::backwards(3)]
    #[case::on_cursor(5)]
    fn test_skip_to_never_moves_cursor_backwards(#[case] target: u32) {
        let mut sequencer = FrameSequencer::new();
        sequencer.skip_to(FrameId::from_raw(5));

        sequencer.skip_to(FrameId::from_raw(target));
        assert_eq!(sequencer.next_frame_id(), FrameId::from_raw(5));
        assert_eq!(sequencer.stats().frames_skipped, 5);
    }

    #[test]
    fn test_nth_buffered() {
        let mut sequencer = FrameSequencer::new();
        for frame_id in [5u32, 1, 3] {
            sequencer.on_datagram(datagram(frame_id, 0, 2, b"x")).unwrap();
        }

        assert_eq!(sequencer.nth_buffered(0), Some(FrameId::from_raw(1)));
        assert_eq!(sequencer.nth_buffered(1), Some(FrameId::from_raw(3)));
        assert_eq!(sequencer.nth_buffered(2), Some(FrameId::from_raw(5)));
        assert_eq!(sequencer.nth_buffered(3), None);
    }

    #[test]
    fn test_stats_over_a_mixed_session() {
        let mut sequencer = FrameSequencer::new();

        sequencer.on_datagram(datagram(0, 0, 2, b"a")).unwrap();
        sequencer.on_datagram(datagram(0, 1, 2, b"b")).unwrap();
        sequencer.on_datagram(datagram(0, 1, 2, b"b")).unwrap();
        let _ = sequencer.on_datagram(datagram(1, 9, 2, b"bad"));
        sequencer.consume_next_frame().unwrap();
        sequencer.on_datagram(datagram(0, 0, 2, b"late")).unwrap();

        let stats = sequencer.stats();
        assert_eq!(stats.datagrams_seen, 5);
        assert_eq!(stats.fragments_stored, 2);
        assert_eq!(stats.duplicate_fragments, 1);
        assert_eq!(stats.invalid_fragments, 1);
        assert_eq!(stats.stale_datagrams, 1);
        assert_eq!(stats.frames_completed, 1);
        assert_eq!(stats.frames_skipped, 0);
    }
}
