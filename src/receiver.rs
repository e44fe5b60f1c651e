use crate::ack_socket::AckSocket;
use crate::sequencer::{Disposition, FrameSequencer};
use crate::session::SessionConfig;
use crate::sink::FrameSink;
use crate::wire::{AckMsg, Datagram, Msg, MAX_DATAGRAM_SIZE};
use anyhow::Context;
use bytes::{Bytes, BytesMut};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::select;
use tokio::time::interval;
use tracing::{debug, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;

/// The playout policy knobs of the driving loop. The reassembly engine provides the skip
///  mechanism; when to use it is decided here.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverConfig {
    /// consecutive presentation intervals without a dispatched frame, while fragments are
    ///  buffered, before the receiver gives up on the frames blocking the cursor and skips to
    ///  the lowest complete one
    pub skip_grace_ticks: u32,

    /// hard cap for the number of buffered frames. When it is exceeded the oldest buffers are
    ///  dropped immediately, without waiting for the grace period, so memory stays bounded even
    ///  when no frame ever completes.
    pub max_window: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            skip_grace_ticks: 3,
            max_window: 32,
        }
    }
}

/// The driving loop of a connected session: reads datagrams from the socket, acknowledges
///  every one that parses, routes fragments through the reassembly engine and hands completed
///  frames to the sink in frame order, at a pace that gives up on lost fragments rather than
///  wait for them.
///
/// Everything malformed a sender can put on the wire is dropped with a log line. The one fatal
///  condition is an error from the socket's receive side, which ends the session.
pub struct Receiver {
    socket: Arc<UdpSocket>,
    ack_socket: Arc<dyn AckSocket>,
    sequencer: FrameSequencer,
    sink: Box<dyn FrameSink>,
    presentation_interval: Duration,
    config: ReceiverConfig,

    /// pacing ticks since the last dispatched frame, counted only while fragments are buffered
    stalled_ticks: u32,
}

impl Receiver {
    pub fn new(
        socket: Arc<UdpSocket>,
        ack_socket: Arc<dyn AckSocket>,
        session: &SessionConfig,
        config: ReceiverConfig,
        sink: Box<dyn FrameSink>,
    ) -> Receiver {
        Receiver {
            socket,
            ack_socket,
            sequencer: FrameSequencer::new(),
            sink,
            presentation_interval: session.presentation_interval(),
            config,
            stalled_ticks: 0,
        }
    }

    /// Runs the session. This only returns when the socket fails, logging a final summary of
    ///  the session's counters on the way out.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.run_loop().await;
        info!("session ended: {:?}", self.sequencer.stats());
        result
    }

    async fn run_loop(&mut self) -> anyhow::Result<()> {
        info!("starting receive loop (presentation interval {:?})", self.presentation_interval);

        let mut pacing = interval(self.presentation_interval);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            select! {
                recv_result = self.socket.recv(&mut buf) => {
                    let num_read = recv_result.context("receiving from UDP socket")?;
                    self.process_datagram(&buf[..num_read]).await;
                    self.drain_socket(&mut buf).await?;
                }
                _ = pacing.tick() => {
                    self.on_pacing_tick();
                }
            }

            self.dispatch_complete_frames().await;
        }
    }

    /// Processes whatever else is already queued on the socket, without blocking. Draining
    ///  before dispatching keeps a burst of fragments from interleaving with decode work.
    async fn drain_socket(&mut self, buf: &mut [u8; MAX_DATAGRAM_SIZE]) -> anyhow::Result<()> {
        loop {
            match self.socket.try_recv(buf) {
                Ok(num_read) => self.process_datagram(&buf[..num_read]).await,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e).context("receiving from UDP socket"),
            }
        }
    }

    /// Decodes and routes one datagram. Every datagram that decodes as a `Datagram` message is
    ///  acknowledged before anything else happens to it, whatever the sequencer decides
    ///  afterwards. Anything that does not decode is dropped with a log line.
    async fn process_datagram(&mut self, raw: &[u8]) {
        let correlation_id = Uuid::new_v4();
        let span = span!(Level::TRACE, "datagram_received", ?correlation_id);

        async {
            trace!("received datagram of {} bytes", raw.len());

            if raw.len() == MAX_DATAGRAM_SIZE {
                debug!("datagram fills the whole receive buffer and may be truncated - dropping");
                return;
            }

            let mut parse_buf = Bytes::copy_from_slice(raw);
            let datagram = match Msg::deser(&mut parse_buf) {
                Ok(Msg::Datagram(datagram)) => datagram,
                Ok(Msg::Config(_)) => {
                    debug!("ignoring config message - the session is already configured");
                    return;
                }
                Ok(Msg::Ack(_)) => {
                    debug!("ignoring ack message - the receiver does not consume acks");
                    return;
                }
                Err(e) => {
                    debug!("discarding undecodable datagram: {}", e);
                    return;
                }
            };

            self.send_ack(&datagram).await;

            let frame_id = datagram.frame_id;
            let frag_id = datagram.frag_id;
            match self.sequencer.on_datagram(datagram) {
                Ok(Disposition::Stored) => {
                    trace!("stored fragment {} of frame #{}", frag_id, frame_id);
                }
                Ok(Disposition::Duplicate) => {
                    debug!("duplicate fragment {} of frame #{}", frag_id, frame_id);
                }
                Ok(Disposition::Stale) => {
                    debug!("stale datagram for frame #{} - playout cursor is already at #{}",
                        frame_id, self.sequencer.next_frame_id());
                }
                Err(e) => {
                    debug!("discarding fragment: {}", e);
                }
            }
        }.instrument(span).await
    }

    async fn send_ack(&mut self, datagram: &Datagram) {
        let ack = AckMsg::for_datagram(datagram);
        let mut ack_buf = BytesMut::with_capacity(AckMsg::SERIALIZED_LEN);
        Msg::Ack(ack).ser(&mut ack_buf);

        self.ack_socket.do_send_ack(&ack_buf).await;
        debug!("acked datagram: frame_id={} frag_id={}", ack.frame_id, ack.frag_id);
    }

    async fn dispatch_complete_frames(&mut self) {
        while let Some((frame_id, frame_data)) = self.sequencer.consume_next_frame() {
            self.stalled_ticks = 0;
            self.sink.on_frame(frame_id, frame_data).await;
        }
    }

    /// The skip policy, invoked once per presentation interval. After `skip_grace_ticks`
    ///  intervals without playout progress the cursor jumps to the lowest complete buffered
    ///  frame, sacrificing the incomplete ones blocking it. Independent of grace, the window
    ///  cap drops the oldest buffers whenever it is exceeded.
    fn on_pacing_tick(&mut self) {
        if self.sequencer.window_len() == 0 {
            // nothing buffered: the stream is idle or fully dispatched, not stalled
            self.stalled_ticks = 0;
            return;
        }

        self.stalled_ticks += 1;

        if self.stalled_ticks >= self.config.skip_grace_ticks {
            if let Some(target) = self.sequencer.first_complete_frame() {
                if target > self.sequencer.next_frame_id() {
                    warn!("playout stalled at frame #{} for {} intervals - skipping to complete frame #{}",
                        self.sequencer.next_frame_id(), self.stalled_ticks, target);
                    self.sequencer.skip_to(target);
                    self.stalled_ticks = 0;
                }
                return;
            }
        }

        let excess = self.sequencer.window_len().saturating_sub(self.config.max_window);
        if excess > 0 {
            if let Some(target) = self.sequencer.nth_buffered(excess) {
                warn!("receive window exceeds {} frames - dropping the {} oldest buffered frames",
                    self.config.max_window, excess);
                self.sequencer.skip_to(target);
            }
        }
    }
}
