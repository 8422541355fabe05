//! MQTT 3.1.1 control packet codec.
//!
//! Encoders append a complete packet to a caller-provided [`PacketBuf`] so a
//! packet always goes out in one `write`. The decoder works on a receive
//! buffer that may hold a partial packet: [`frame_len`] tells how many bytes the
//! next packet needs, [`decode`] parses one complete packet in place.

use heapless::Vec;

use super::QoS;
use crate::network::error::Error;

/// Largest topic the session will send or deliver.
pub const MAX_TOPIC_LEN: usize = 128;
/// Largest publish payload the session will send or deliver.
pub const MAX_PAYLOAD_LEN: usize = 1024;
/// Largest client identifier.
pub const MAX_CLIENT_ID_LEN: usize = 64;
/// Largest complete packet: fixed header, topic, packet id and payload.
pub const MAX_PACKET_SIZE: usize = 5 + 2 + MAX_TOPIC_LEN + 2 + MAX_PAYLOAD_LEN;

/// Buffer holding one encoded packet.
pub type PacketBuf = Vec<u8, MAX_PACKET_SIZE>;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
pub const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
pub const PUBACK: u8 = 0x40;
/// MQTT PUBREC packet type identifier.
pub const PUBREC: u8 = 0x50;
/// MQTT PUBREL packet type identifier (flags fixed at 0b0010).
pub const PUBREL: u8 = 0x62;
/// MQTT PUBCOMP packet type identifier.
pub const PUBCOMP: u8 = 0x70;
/// MQTT SUBSCRIBE packet type identifier (flags fixed at 0b0010).
pub const SUBSCRIBE: u8 = 0x82;
/// MQTT SUBACK packet type identifier.
pub const SUBACK: u8 = 0x90;
/// MQTT UNSUBACK packet type identifier.
pub const UNSUBACK: u8 = 0xB0;
/// MQTT PINGREQ packet type identifier.
pub const PINGREQ: u8 = 0xC0;
/// MQTT PINGRESP packet type identifier.
pub const PINGRESP: u8 = 0xD0;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

// Protocol constants defined by MQTT 3.1.1 specification
/// MQTT protocol name as defined in the specification.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;
/// Largest value the remaining-length field can carry.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// SUBACK return code for a refused subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// A decoded control packet, borrowing from the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Answer to CONNECT.
    ConnAck {
        /// The broker resumed a stored session.
        session_present: bool,
        /// Raw return code, 0 means accepted.
        return_code: u8,
    },
    /// An application message.
    Publish {
        /// Topic name.
        topic: &'a str,
        /// Message body.
        payload: &'a [u8],
        /// Delivery level.
        qos: QoS,
        /// Retained-message flag.
        retain: bool,
        /// Redelivery flag.
        dup: bool,
        /// Present for QoS 1 and 2.
        packet_id: Option<u16>,
    },
    /// QoS 1 acknowledgement.
    PubAck(u16),
    /// QoS 2 step one.
    PubRec(u16),
    /// QoS 2 step two.
    PubRel(u16),
    /// QoS 2 step three.
    PubComp(u16),
    /// Answer to SUBSCRIBE; only the first return code is kept since the
    /// session subscribes to one filter per packet.
    SubAck {
        /// Identifier of the SUBSCRIBE being answered.
        packet_id: u16,
        /// Granted QoS (0..=2) or [`SUBACK_FAILURE`].
        return_code: u8,
    },
    /// Answer to UNSUBSCRIBE.
    UnsubAck(u16),
    /// Answer to PINGREQ.
    PingResp,
}

/// Append `bytes` to `buf`.
fn put(buf: &mut PacketBuf, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(bytes).map_err(|_| Error::BufferOverflow)
}

fn put_u8(buf: &mut PacketBuf, byte: u8) -> Result<(), Error> {
    buf.push(byte).map_err(|_| Error::BufferOverflow)
}

fn put_u16(buf: &mut PacketBuf, value: u16) -> Result<(), Error> {
    put(buf, &value.to_be_bytes())
}

/// Append a length-prefixed UTF-8 string.
fn put_str(buf: &mut PacketBuf, s: &str) -> Result<(), Error> {
    let len = u16::try_from(s.len()).map_err(|_| Error::BufferOverflow)?;
    put_u16(buf, len)?;
    put(buf, s.as_bytes())
}

/// Encode the remaining length field for an MQTT packet.
///
/// The encoding uses up to 4 bytes where each byte encodes 7 bits of the length
/// value. The most significant bit indicates if another byte follows.
fn put_remaining_length(buf: &mut PacketBuf, mut len: usize) -> Result<(), Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::ProtocolError);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        put_u8(buf, byte)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}

fn put_fixed_header(buf: &mut PacketBuf, first: u8, remaining: usize) -> Result<(), Error> {
    put_u8(buf, first)?;
    put_remaining_length(buf, remaining)
}

/// Encode a CONNECT packet.
///
/// No will message, username or password: the firmware does not negotiate
/// authentication.
pub fn encode_connect(
    buf: &mut PacketBuf,
    client_id: &str,
    keep_alive_seconds: u16,
    clean_session: bool,
) -> Result<(), Error> {
    // Variable header: protocol name, level, flags, keep alive.
    let vh_len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2;
    let remaining = vh_len + 2 + client_id.len();

    put_fixed_header(buf, CONNECT, remaining)?;
    put_u16(buf, PROTOCOL_NAME.len() as u16)?;
    put(buf, PROTOCOL_NAME)?;
    put_u8(buf, PROTOCOL_LEVEL)?;
    let connect_flags = if clean_session { 0x02 } else { 0x00 };
    put_u8(buf, connect_flags)?;
    put_u16(buf, keep_alive_seconds)?;
    put_str(buf, client_id)
}

/// Encode a PUBLISH packet. `packet_id` is required for QoS 1 and 2 and
/// ignored for QoS 0.
pub fn encode_publish(
    buf: &mut PacketBuf,
    topic: &str,
    payload: &[u8],
    qos: QoS,
    retain: bool,
    packet_id: Option<u16>,
) -> Result<(), Error> {
    let id = match (qos, packet_id) {
        (QoS::AtMostOnce, _) => None,
        (_, Some(id)) if id != 0 => Some(id),
        _ => return Err(Error::ProtocolError),
    };

    let mut first = PUBLISH | ((qos as u8) << 1);
    if retain {
        first |= 0x01;
    }
    let remaining = 2 + topic.len() + id.map_or(0, |_| 2) + payload.len();

    put_fixed_header(buf, first, remaining)?;
    put_str(buf, topic)?;
    if let Some(id) = id {
        put_u16(buf, id)?;
    }
    put(buf, payload)
}

/// Encode a SUBSCRIBE packet for a single topic filter.
pub fn encode_subscribe(
    buf: &mut PacketBuf,
    packet_id: u16,
    topic: &str,
    qos: QoS,
) -> Result<(), Error> {
    let remaining = 2 + 2 + topic.len() + 1;
    put_fixed_header(buf, SUBSCRIBE, remaining)?;
    put_u16(buf, packet_id)?;
    put_str(buf, topic)?;
    put_u8(buf, qos as u8)
}

/// Encode one of the two-byte acknowledgements (PUBACK, PUBREC, PUBREL, PUBCOMP).
pub fn encode_ack(buf: &mut PacketBuf, kind: u8, packet_id: u16) -> Result<(), Error> {
    match kind {
        PUBACK | PUBREC | PUBREL | PUBCOMP => {}
        _ => return Err(Error::ProtocolError),
    }
    put_fixed_header(buf, kind, 2)?;
    put_u16(buf, packet_id)
}

/// Encode a PINGREQ packet.
pub fn encode_pingreq(buf: &mut PacketBuf) -> Result<(), Error> {
    put(buf, &[PINGREQ, 0])
}

/// Encode a DISCONNECT packet.
pub fn encode_disconnect(buf: &mut PacketBuf) -> Result<(), Error> {
    put(buf, &[DISCONNECT, 0])
}

/// Parse a fixed header at the start of `buf`.
///
/// Returns `Ok(None)` while the header is incomplete, otherwise
/// `(header_len, remaining_len)`.
fn fixed_header(buf: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut remaining = 0usize;
    let mut multiplier = 1usize;
    for i in 1..=4 {
        let Some(&byte) = buf.get(i) else {
            return Ok(None);
        };
        remaining += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((i + 1, remaining)));
        }
        multiplier *= 128;
    }
    Err(Error::ProtocolError)
}

/// Total size of the packet at the start of `buf`, once its fixed header is in.
///
/// The returned size may exceed `buf.len()` (more bytes to come) or even
/// [`MAX_PACKET_SIZE`] (the packet can never be buffered).
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, Error> {
    Ok(fixed_header(buf)?.map(|(header, remaining)| header + remaining))
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16, Error> {
    match buf.get(at..at + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(Error::ProtocolError),
    }
}

/// Decode the single complete packet in `buf`.
///
/// `buf` must hold exactly one packet, as measured by [`frame_len`].
pub fn decode(buf: &[u8]) -> Result<Packet<'_>, Error> {
    let (header, remaining) = fixed_header(buf)?.ok_or(Error::ProtocolError)?;
    if buf.len() != header + remaining {
        return Err(Error::ProtocolError);
    }
    let first = buf[0];
    let body = &buf[header..];

    match first & 0xF0 {
        CONNACK => {
            if remaining != 2 {
                return Err(Error::ProtocolError);
            }
            Ok(Packet::ConnAck {
                session_present: body[0] & 0x01 != 0,
                return_code: body[1],
            })
        }
        PUBLISH => {
            let qos = QoS::try_from((first >> 1) & 0x03).map_err(|_| Error::ProtocolError)?;
            let topic_len = read_u16(body, 0)? as usize;
            let topic_bytes = body.get(2..2 + topic_len).ok_or(Error::ProtocolError)?;
            let topic = core::str::from_utf8(topic_bytes).map_err(|_| Error::ProtocolError)?;
            let mut cursor = 2 + topic_len;
            let packet_id = if qos == QoS::AtMostOnce {
                None
            } else {
                let id = read_u16(body, cursor)?;
                cursor += 2;
                Some(id)
            };
            Ok(Packet::Publish {
                topic,
                payload: &body[cursor..],
                qos,
                retain: first & 0x01 != 0,
                dup: first & 0x08 != 0,
                packet_id,
            })
        }
        PUBACK => Ok(Packet::PubAck(read_u16(body, 0)?)),
        PUBREC => Ok(Packet::PubRec(read_u16(body, 0)?)),
        0x60 => Ok(Packet::PubRel(read_u16(body, 0)?)),
        PUBCOMP => Ok(Packet::PubComp(read_u16(body, 0)?)),
        SUBACK => {
            let packet_id = read_u16(body, 0)?;
            let return_code = *body.get(2).ok_or(Error::ProtocolError)?;
            Ok(Packet::SubAck {
                packet_id,
                return_code,
            })
        }
        UNSUBACK => Ok(Packet::UnsubAck(read_u16(body, 0)?)),
        PINGRESP => Ok(Packet::PingResp),
        _ => Err(Error::ProtocolError),
    }
}
