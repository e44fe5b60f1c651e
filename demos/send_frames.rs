use anyhow::anyhow;
use bytes::{Bytes, BytesMut};
use clap::Parser;
use clap_derive::Parser;
use framelink::frame_id::FrameId;
use framelink::wire::{ConfigMsg, Datagram, Msg, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::UdpSocket;
use tokio::time::interval;
use tracing::{debug, info, Level};

/// Hand-test traffic generator: announces a session to a running receiver and streams
///  synthetic fragmented frames at the configured pace, printing the RTT of every ack.
#[derive(Parser)]
struct Args {
    /// address of the receiver, e.g. 127.0.0.1:9000
    receiver: String,

    #[clap(long, default_value_t = 640)]
    width: u16,

    #[clap(long, default_value_t = 480)]
    height: u16,

    #[clap(long, default_value_t = 30)]
    fps: u16,

    #[clap(long, default_value_t = 1_000_000)]
    bitrate: u32,

    /// number of frames to send
    #[clap(long, default_value_t = 300)]
    frames: u32,

    /// synthetic frame size in bytes
    #[clap(long, default_value_t = 4000)]
    frame_bytes: usize,

    /// fragment payload size in bytes
    #[clap(long, default_value_t = 1200)]
    frag_size: usize,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,
}

fn now_micros() -> anyhow::Result<u64> {
    Ok(SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_micros() as u64)
}

async fn print_acks(socket: Arc<UdpSocket>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        let num_read = match socket.recv(&mut buf).await {
            Ok(num_read) => num_read,
            Err(e) => {
                debug!("ack socket error: {}", e);
                continue;
            }
        };
        match Msg::deser(&mut &buf[..num_read]) {
            Ok(Msg::Ack(ack)) => {
                let rtt_micros = now_micros().unwrap_or(ack.send_ts).saturating_sub(ack.send_ts);
                debug!("ack for frame #{} frag {} - rtt {}us", ack.frame_id, ack.frag_id, rtt_micros);
            }
            other => debug!("unexpected message from receiver: {:?}", other),
        }
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    // a datagram that fills the receiver's buffer exactly is indistinguishable from a truncated
    //  one and gets dropped, so the payload must stay at least one byte below that
    if args.frag_size == 0 || args.frag_size >= MAX_DATAGRAM_SIZE - Datagram::HEADER_LEN {
        return Err(anyhow!("fragment size must be between 1 and {}", MAX_DATAGRAM_SIZE - Datagram::HEADER_LEN - 1));
    }
    if args.frame_bytes == 0 {
        return Err(anyhow!("frame size must be at least 1 byte"));
    }

    let receiver_addr: SocketAddr = args.receiver.parse()?;
    let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    socket.connect(receiver_addr).await?;
    info!("sending to {} from {}", receiver_addr, socket.local_addr()?);

    let mut buf = BytesMut::new();
    Msg::Config(ConfigMsg {
        width: args.width,
        height: args.height,
        frame_rate: args.fps,
        target_bitrate: args.bitrate,
    }).ser(&mut buf);
    socket.send(&buf).await?;
    info!("announced session: {}x{} at {} fps", args.width, args.height, args.fps);

    let ack_task = tokio::spawn(print_acks(socket.clone()));

    let frag_count = args.frame_bytes.div_ceil(args.frag_size).max(1) as u16;
    let mut pacing = interval(Duration::from_secs(1) / args.fps.max(1) as u32);

    for raw_frame_id in 0..args.frames {
        pacing.tick().await;

        // a recognizable synthetic payload: every byte names its frame
        let frame_data = vec![(raw_frame_id % 251) as u8; args.frame_bytes];

        for (frag_id, chunk) in frame_data.chunks(args.frag_size).enumerate() {
            buf.clear();
            Msg::Datagram(Datagram {
                frame_id: FrameId::from_raw(raw_frame_id),
                frag_id: frag_id as u16,
                frag_count,
                send_ts: now_micros()?,
                payload: Bytes::copy_from_slice(chunk),
            }).ser(&mut buf);
            socket.send(&buf).await?;
        }
    }
    info!("sent {} frames of {} fragments each", args.frames, frag_count);

    // give the last acks a moment to come back
    tokio::time::sleep(Duration::from_millis(500)).await;
    ack_task.abort();
    Ok(())
}
