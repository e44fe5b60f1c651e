use clap::error::ErrorKind;
use clap::Parser;
use clap_derive::Parser;
use framelink::ack_socket::AckSocket;
use framelink::perf_log::PerfLog;
use framelink::receiver::{Receiver, ReceiverConfig};
use framelink::session::await_config;
use framelink::sink::{DecodeSink, LazyLevel, NullDecoder, NullRenderer};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    /// UDP port to listen on
    port: u16,

    /// 0: decode and display frames, 1: decode but not display, 2: neither decode nor display
    #[clap(long, default_value_t = 0)]
    lazy: u8,

    /// file to write per-frame performance records to
    #[clap(short, long)]
    output: Option<PathBuf>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // help and version requests are not failures; actual parse errors exit 1
            exit(match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            });
        }
    };

    let lazy_level = match LazyLevel::try_from(args.lazy) {
        Ok(lazy_level) => lazy_level,
        Err(_) => {
            eprintln!("invalid lazy level {}, expected 0, 1 or 2", args.lazy);
            exit(1);
        }
    };

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let socket = UdpSocket::bind(("0.0.0.0", args.port)).await?;
    info!("local address: {}", socket.local_addr()?);

    info!("waiting for sender...");
    let (peer_addr, session) = await_config(&socket).await?;
    info!("peer address: {}", peer_addr);
    socket.connect(peer_addr).await?;

    let perf_log = match &args.output {
        Some(path) => Some(PerfLog::create(path)?),
        None => None,
    };
    let sink = DecodeSink::new(
        &session,
        lazy_level,
        Box::new(NullDecoder::new(session.width, session.height)),
        Box::new(NullRenderer),
        perf_log,
    );

    let socket = Arc::new(socket);
    let ack_socket: Arc<dyn AckSocket> = Arc::new(socket.clone());
    let mut receiver = Receiver::new(socket, ack_socket, &session, ReceiverConfig::default(), Box::new(sink));
    receiver.run().await
}
