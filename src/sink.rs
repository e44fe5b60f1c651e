use crate::error::ProtocolError;
use crate::frame_id::FrameId;
use crate::perf_log::PerfLog;
use crate::session::SessionConfig;
use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::time::Instant;
use tracing::{info, trace, warn};

/// How much work the receiver performs on completed frames. Higher levels do less, turning the
///  receiver into a pure transport measurement tool.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum LazyLevel {
    /// decode and display frames
    DecodeAndRender = 0,
    /// decode but do not display frames
    DecodeOnly = 1,
    /// neither decode nor display frames
    TransportOnly = 2,
}

/// A decoded picture as produced by a [VideoDecoder].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u16,
    pub height: u16,
    pub pixel_data: Bytes,
}

/// The video codec seam. Implementations own all codec state; they see completed frames in
///  strict frame order, skipped frames are simply absent.
#[cfg_attr(test, automock)]
pub trait VideoDecoder: Send + 'static {
    fn decode(&mut self, frame_id: FrameId, frame_data: &[u8]) -> anyhow::Result<DecodedFrame>;
}

/// The display surface seam.
#[cfg_attr(test, automock)]
pub trait FrameRenderer: Send + 'static {
    fn render(&mut self, frame: &DecodedFrame) -> anyhow::Result<()>;
}

/// Where the driving loop delivers completed frames, in frame order. This is an abstraction
///  to facilitate mocking the decode pipeline away when testing the receive loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn on_frame(&mut self, frame_id: FrameId, frame_data: Bytes);
}

/// The regular frame sink: decodes and renders completed frames through the collaborator
///  seams, as far as the configured laziness level allows, and keeps per-frame timing records
///  when a performance log is attached.
///
/// A decode failure is logged and counted, nothing else: the frame is dropped and playout
///  continues with the next one.
pub struct DecodeSink {
    lazy_level: LazyLevel,
    decoder: Box<dyn VideoDecoder>,
    renderer: Box<dyn FrameRenderer>,
    perf_log: Option<PerfLog>,
    decode_failures: u64,
}

impl DecodeSink {
    pub fn new(
        session: &SessionConfig,
        lazy_level: LazyLevel,
        decoder: Box<dyn VideoDecoder>,
        renderer: Box<dyn FrameRenderer>,
        perf_log: Option<PerfLog>,
    ) -> DecodeSink {
        info!("initialized decode pipeline: {}x{} lazy level {:?}", session.width, session.height, lazy_level);

        DecodeSink {
            lazy_level,
            decoder,
            renderer,
            perf_log,
            decode_failures: 0,
        }
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    fn write_perf_record(&mut self, frame_id: FrameId, frame_bytes: usize, decode_micros: u64, render_micros: u64) {
        if let Some(perf_log) = &mut self.perf_log {
            if let Err(e) = perf_log.record(frame_id, frame_bytes, decode_micros, render_micros) {
                warn!("failed to write performance record for frame #{}: {}", frame_id, e);
            }
        }
    }
}

#[async_trait]
impl FrameSink for DecodeSink {
    async fn on_frame(&mut self, frame_id: FrameId, frame_data: Bytes) {
        trace!("sink received frame #{} ({} bytes)", frame_id, frame_data.len());

        if self.lazy_level == LazyLevel::TransportOnly {
            self.write_perf_record(frame_id, frame_data.len(), 0, 0);
            return;
        }

        let decode_started = Instant::now();
        let decoded = match self.decoder.decode(frame_id, &frame_data) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.decode_failures += 1;
                let error = ProtocolError::DecodeFailure { frame_id, reason: e.to_string() };
                warn!("{} - continuing playout", error);
                return;
            }
        };
        let decode_micros = decode_started.elapsed().as_micros() as u64;

        let mut render_micros = 0;
        if self.lazy_level == LazyLevel::DecodeAndRender {
            let render_started = Instant::now();
            if let Err(e) = self.renderer.render(&decoded) {
                warn!("failed to render frame #{}: {} - continuing playout", frame_id, e);
            }
            render_micros = render_started.elapsed().as_micros() as u64;
        }

        self.write_perf_record(frame_id, frame_data.len(), decode_micros, render_micros);
    }
}

/// A codec stand-in that produces empty pictures. With it (and [NullRenderer]) the receiver
///  exercises the full transport path without depending on an actual codec, which is all the
///  higher laziness levels need anyway.
pub struct NullDecoder {
    width: u16,
    height: u16,
}

impl NullDecoder {
    pub fn new(width: u16, height: u16) -> NullDecoder {
        NullDecoder { width, height }
    }
}

impl VideoDecoder for NullDecoder {
    fn decode(&mut self, _frame_id: FrameId, _frame_data: &[u8]) -> anyhow::Result<DecodedFrame> {
        Ok(DecodedFrame {
            width: self.width,
            height: self.height,
            pixel_data: Bytes::new(),
        })
    }
}

/// A display stand-in that drops every picture.
pub struct NullRenderer;

impl FrameRenderer for NullRenderer {
    fn render(&mut self, _frame: &DecodedFrame) -> anyhow::Result<()> {
        Ok(())
    }
}
