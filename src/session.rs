use crate::wire::{ConfigMsg, Msg, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// The session parameters announced by the sender during bootstrap. Immutable for the rest of
///  the session; there is no re-handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub width: u16,
    pub height: u16,
    /// frames per second; at least 1, enforced during bootstrap
    pub frame_rate: u16,
    pub target_bitrate: u32,
}

impl SessionConfig {
    /// The nominal time between consecutive frames, i.e. the playout pace.
    pub fn presentation_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate as u32
    }
}

impl From<ConfigMsg> for SessionConfig {
    fn from(msg: ConfigMsg) -> Self {
        SessionConfig {
            width: msg.width,
            height: msg.height,
            frame_rate: msg.frame_rate,
            target_bitrate: msg.target_bitrate,
        }
    }
}

/// Waits on an unconnected socket until a well-formed `Config` message arrives and returns it
///  together with the sender's address. Everything else - datagrams, acks, undecodable noise -
///  is ignored; there is nothing useful the receiver could do with them before it knows its
///  peer. Only a socket error terminates the wait.
pub async fn await_config(socket: &UdpSocket) -> anyhow::Result<(SocketAddr, SessionConfig)> {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (num_read, from) = socket.recv_from(&mut buf).await?;

        match Msg::deser(&mut &buf[..num_read]) {
            Ok(Msg::Config(config_msg)) => {
                if config_msg.frame_rate == 0 {
                    warn!("ignoring config from {} with a frame rate of zero", from);
                    continue;
                }
                info!("received config from {}: width={} height={} fps={} bitrate={}",
                    from, config_msg.width, config_msg.height, config_msg.frame_rate, config_msg.target_bitrate);
                return Ok((from, config_msg.into()));
            }
            Ok(_) => {
                debug!("ignoring non-config message from {} while awaiting config", from);
            }
            Err(e) => {
                debug!("ignoring undecodable datagram from {} while awaiting config: {}", from, e);
            }
        }
    }
}
