use crate::error::ProtocolError;
use crate::frame_id::FrameId;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Size of the receive buffer, and with that the largest UDP payload the receiver accepts.
///  The sender fragments frames to fit single non-fragmented datagrams, which caps payloads
///  well below one Ethernet MTU, so 2 KiB leaves ample headroom.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum MsgKind {
    Config = 1,
    Datagram = 2,
    Ack = 3,
}

/// Session parameters, announced by the sender as the first message of a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ConfigMsg {
    pub width: u16,
    pub height: u16,
    pub frame_rate: u16,
    pub target_bitrate: u32,
}

impl ConfigMsg {
    pub const SERIALIZED_LEN: usize = 11;

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        buf.put_u16(self.frame_rate);
        buf.put_u32(self.target_bitrate);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<ConfigMsg, ProtocolError> {
        if buf.remaining() != Self::SERIALIZED_LEN - 1 {
            return Err(ProtocolError::MalformedMessage("config message has wrong length"));
        }
        Ok(ConfigMsg {
            width: buf.get_u16(),
            height: buf.get_u16(),
            frame_rate: buf.get_u16(),
            target_bitrate: buf.get_u32(),
        })
    }
}

/// One fragment of one encoded video frame. The fragment count is repeated in every fragment
///  so reassembly can start with whichever fragment arrives first.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Datagram {
    pub frame_id: FrameId,
    pub frag_id: u16,
    pub frag_count: u16,
    /// sender-side timestamp in microseconds, echoed in the ack. The receiver does not
    ///  interpret it.
    pub send_ts: u64,
    pub payload: Bytes,
}

impl Datagram {
    pub const HEADER_LEN: usize = 17;

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32(self.frame_id.to_raw());
        buf.put_u16(self.frag_id);
        buf.put_u16(self.frag_count);
        buf.put_u64(self.send_ts);
        buf.put_slice(&self.payload);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<Datagram, ProtocolError> {
        if buf.remaining() < Self::HEADER_LEN - 1 {
            return Err(ProtocolError::MalformedMessage("datagram header is truncated"));
        }
        Ok(Datagram {
            frame_id: FrameId::from_raw(buf.get_u32()),
            frag_id: buf.get_u16(),
            frag_count: buf.get_u16(),
            send_ts: buf.get_u64(),
            payload: buf.copy_to_bytes(buf.remaining()),
        })
    }
}

/// Acknowledges exactly one received [Datagram].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AckMsg {
    pub frame_id: FrameId,
    pub frag_id: u16,
    pub send_ts: u64,
}

impl AckMsg {
    pub const SERIALIZED_LEN: usize = 15;

    pub fn for_datagram(datagram: &Datagram) -> AckMsg {
        AckMsg {
            frame_id: datagram.frame_id,
            frag_id: datagram.frag_id,
            send_ts: datagram.send_ts,
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32(self.frame_id.to_raw());
        buf.put_u16(self.frag_id);
        buf.put_u64(self.send_ts);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<AckMsg, ProtocolError> {
        if buf.remaining() != Self::SERIALIZED_LEN - 1 {
            return Err(ProtocolError::MalformedMessage("ack message has wrong length"));
        }
        Ok(AckMsg {
            frame_id: FrameId::from_raw(buf.get_u32()),
            frag_id: buf.get_u16(),
            send_ts: buf.get_u64(),
        })
    }
}

/// All messages of the protocol, dispatched on the leading tag byte.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Msg {
    Config(ConfigMsg),
    Datagram(Datagram),
    Ack(AckMsg),
}

impl Msg {
    pub fn ser(&self, buf: &mut BytesMut) {
        match self {
            Msg::Config(msg) => {
                buf.put_u8(MsgKind::Config.into());
                msg.ser(buf);
            }
            Msg::Datagram(msg) => {
                buf.put_u8(MsgKind::Datagram.into());
                msg.ser(buf);
            }
            Msg::Ack(msg) => {
                buf.put_u8(MsgKind::Ack.into());
                msg.ser(buf);
            }
        }
    }

    pub fn deser(buf: &mut impl Buf) -> Result<Msg, ProtocolError> {
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedMessage("empty datagram"));
        }
        match MsgKind::try_from(buf.get_u8()) {
            Ok(MsgKind::Config) => Ok(Msg::Config(ConfigMsg::deser(buf)?)),
            Ok(MsgKind::Datagram) => Ok(Msg::Datagram(Datagram::deser(buf)?)),
            Ok(MsgKind::Ack) => Ok(Msg::Ack(AckMsg::deser(buf)?)),
            Err(_) => Err(ProtocolError::MalformedMessage("unknown message tag")),
        }
    }
}
