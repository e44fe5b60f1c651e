//! Receiving end of a low-latency video transport over UDP.
//!
//! A sender captures, encodes and fragments video frames and ships each fragment as one UDP
//!  datagram. This crate implements the receiver: it reassembles frames from fragments,
//!  acknowledges every datagram it can decode, and hands completed frames to a decode/display
//!  pipeline in strict frame order.
//!
//! ## Design goals
//!
//! * Latency beats completeness: there are no retransmissions and no FEC. A fragment that is
//!   lost stays lost, and the frame it belongs to is eventually skipped rather than waited for.
//! * The abstraction is *frames* (defined-length chunks of encoded video), not a byte stream.
//!   Frames are fragmented by the sender so that every fragment fits into a single UDP datagram
//!   without IP-level fragmentation.
//! * Every datagram that decodes as a `Datagram` message is acknowledged, including duplicates
//!   and datagrams for frames the receiver has already given up on. The ack stream is the
//!   sender's feedback signal for its rate control; suppressing acks would distort it.
//! * Frames are dispatched to the decoder strictly in frame-id order. The receiver skips ahead
//!   over incomplete frames when playout stalls, it never goes back.
//! * A single sender per session. The first valid `Config` message binds the peer address and
//!   the UDP socket is connected to it; the OS filters everything else from that point on.
//!
//! ## Wire format
//!
//! All messages travel as single UDP datagrams. The first byte is a tag identifying the message
//!  kind, all integers are in network byte order (BE).
//!
//! *CONFIG* (sender -> receiver, tag 1) announces the session parameters:
//!
//! ```ascii
//!  0: tag (u8) = 1
//!  1: width (u16)
//!  3: height (u16)
//!  5: frame rate (u16)
//!  7: target bitrate (u32)
//! ```
//!
//! 11 bytes, no payload. Datagrams arriving before the first well-formed CONFIG are ignored.
//!
//! *DATAGRAM* (sender -> receiver, tag 2) carries one fragment of one encoded frame:
//!
//! ```ascii
//!  0: tag (u8) = 2
//!  1: frame id (u32)
//!  5: fragment id (u16)
//!  7: fragment count (u16) - the total number of fragments in this frame
//!  9: send timestamp (u64) - microseconds, assigned by the sender, echoed in the ack
//! 17: payload - the rest of the UDP datagram, no length prefix
//! ```
//!
//! The fragment count is repeated in every fragment of a frame so that reassembly can start
//!  with whichever fragment arrives first.
//!
//! *ACK* (receiver -> sender, tag 3) acknowledges exactly one received DATAGRAM:
//!
//! ```ascii
//!  0: tag (u8) = 3
//!  1: frame id (u32)
//!  5: fragment id (u16)
//!  7: send timestamp (u64) - echoed verbatim from the acked DATAGRAM
//! ```
//!
//! 15 bytes. The timestamp echo lets the sender compute RTT without keeping per-fragment state.
//!
//! ## Reassembly and playout
//!
//! The receiver keeps a playout cursor (the id of the next frame to hand to the decoder) and a
//!  bounded window of per-frame fragment buffers above the cursor. Fragments for frames below
//!  the cursor are stale: they are acknowledged but not buffered. A frame is dispatched when
//!  all its fragments have arrived and every frame below it was dispatched or skipped.
//!
//! Skipping is driven by the playout pace: when no frame could be dispatched for a configured
//!  number of presentation intervals while fragments are buffered, the cursor jumps to the
//!  lowest buffered frame that is complete. A hard cap on the window size bounds memory even
//!  when no frame is complete.

pub mod error;
pub mod frame_id;
pub mod wire;
pub mod frame_buffer;
pub mod sequencer;
pub mod sink;
pub mod perf_log;
pub mod session;
pub mod ack_socket;
pub mod receiver;
