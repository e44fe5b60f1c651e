use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{error, trace};

/// This is an abstraction for sending an ack buffer back to the connected peer, introduced to
///  facilitate mocking the I/O part away for testing.
///
/// An ack that cannot be sent is logged and forgotten: the protocol has no retransmissions, so
///  there is nothing to do about it, and the socket's receive side decides session fate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AckSocket: Send + Sync + 'static {
    async fn do_send_ack(&self, ack_buf: &[u8]);
}

#[async_trait]
impl AckSocket for Arc<UdpSocket> {
    async fn do_send_ack(&self, ack_buf: &[u8]) {
        trace!("UDP socket: sending ack to connected peer");

        if let Err(e) = self.send(ack_buf).await {
            error!("error sending ack: {}", e);
        }
    }
}
