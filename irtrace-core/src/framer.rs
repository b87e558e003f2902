//! Packet framing: recover packet boundaries from a stream with no length
//! field by scanning for the next header carrying the session id.

use serde::Serialize;

use crate::session::SessionId;

/// Packet header size: command, extra, checksum (2), session id (4).
pub const HEADER_LEN: usize = 8;

/// Largest legal packet: 8-byte header plus a 128-byte payload.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + 128;

/// One framed packet, borrowing the capture buffer. Immutable once framed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Packet<'a> {
    pub command: u8,
    pub extra: u8,
    /// Pass-through; not verified here.
    pub checksum: u16,
    pub session_id: u32,
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Parse a framed slice (header + payload) into its fields.
    pub fn parse(bytes: &'a [u8]) -> Result<Packet<'a>, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TruncatedHeader {
                remaining: bytes.len(),
            });
        }
        Ok(Packet {
            command: bytes[0],
            extra: bytes[1],
            checksum: u16::from_le_bytes([bytes[2], bytes[3]]),
            session_id: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            payload: &bytes[HEADER_LEN..],
        })
    }
}

/// Framing failure. Each ends the framing of the remaining buffer.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Serialize)]
pub enum FrameError {
    #[error("remaining buffer shorter than a packet header: {remaining} bytes")]
    TruncatedHeader { remaining: usize },
    #[error("packet session id {found:08x} does not match session id {expected:08x}")]
    SessionMismatch { found: u32, expected: u32 },
    #[error("no packet boundary within {scanned} bytes, aborting")]
    TooLong { scanned: usize },
}

fn session_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Find the length of the packet at the start of `buf`.
///
/// The protocol has no length field, so the end of a packet is wherever the
/// next packet's header begins: scan forward from the minimum length and
/// accept the first offset whose would-be session field matches. A payload
/// that happens to contain the session id bytes will mis-split here; that
/// ambiguity is inherent to the protocol.
///
/// Returns `Ok(None)` on clean end of input, `Ok(Some(len))` with
/// `8 <= len <= 136` otherwise. If no boundary exists before the buffer
/// ends, the whole remainder is the final packet.
pub fn next_packet(session: SessionId, buf: &[u8]) -> Result<Option<usize>, FrameError> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf.len() < HEADER_LEN {
        return Err(FrameError::TruncatedHeader {
            remaining: buf.len(),
        });
    }
    let found = session_at(buf, 4);
    if found != session.value() {
        return Err(FrameError::SessionMismatch {
            found,
            expected: session.value(),
        });
    }

    let mut len = HEADER_LEN;
    while len + HEADER_LEN <= buf.len() {
        if session_at(buf, len + 4) == session.value() {
            break;
        }
        len += 1;
    }
    if len + HEADER_LEN > buf.len() {
        // No boundary before the tail; the remainder is one final packet.
        len = buf.len();
    }
    if len > MAX_PACKET_LEN {
        return Err(FrameError::TooLong { scanned: len });
    }
    Ok(Some(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: SessionId = SessionId::from_raw(0xdead_beef);

    fn packet(command: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![command, 0x01, 0, 0];
        buf.extend_from_slice(&SESSION.value().to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn reframes_concatenated_packets() {
        let parts = [
            packet(0x24, &[]),
            packet(0x0c, &[0x10, 0x00, 0x10]),
            packet(0x0e, &[0xaa; 16]),
        ];
        let mut buf = Vec::new();
        for p in &parts {
            buf.extend_from_slice(p);
        }

        let mut cursor = 0;
        let mut lens = Vec::new();
        while let Some(len) = next_packet(SESSION, &buf[cursor..]).unwrap() {
            lens.push(len);
            cursor += len;
        }
        assert_eq!(cursor, buf.len());
        let expected: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(lens, expected);
    }

    #[test]
    fn empty_buffer_is_end_of_input() {
        assert_eq!(next_packet(SESSION, &[]), Ok(None));
    }

    #[test]
    fn short_tail_is_truncated_header() {
        let buf = [0x24, 0x01, 0, 0, 0xef];
        assert_eq!(
            next_packet(SESSION, &buf),
            Err(FrameError::TruncatedHeader { remaining: 5 })
        );
    }

    #[test]
    fn wrong_session_at_cursor_is_mismatch() {
        let mut buf = packet(0x24, &[]);
        buf[4] ^= 0xff;
        assert!(matches!(
            next_packet(SESSION, &buf),
            Err(FrameError::SessionMismatch { .. })
        ));
    }

    #[test]
    fn remainder_without_boundary_is_one_final_packet() {
        let buf = packet(0x0e, &[0x55; 40]);
        assert_eq!(next_packet(SESSION, &buf), Ok(Some(buf.len())));
    }

    #[test]
    fn oversized_remainder_is_too_long() {
        // 8-byte header plus 150 payload bytes with no embedded session id.
        let buf = packet(0x0e, &[0x55; 150]);
        assert_eq!(
            next_packet(SESSION, &buf),
            Err(FrameError::TooLong { scanned: buf.len() })
        );
    }

    #[test]
    fn max_size_packet_is_accepted() {
        let mut buf = packet(0x02, &[0x55; 128]);
        buf.extend_from_slice(&packet(0x04, &[]));
        assert_eq!(next_packet(SESSION, &buf), Ok(Some(MAX_PACKET_LEN)));
    }

    #[test]
    fn parse_extracts_header_fields() {
        let buf = packet(0x0c, &[0x10, 0x00, 0x10]);
        let p = Packet::parse(&buf).unwrap();
        assert_eq!(p.command, 0x0c);
        assert_eq!(p.extra, 0x01);
        assert_eq!(p.session_id, SESSION.value());
        assert_eq!(p.payload, &[0x10, 0x00, 0x10]);
    }
}
