//! Whole-log drive loop: prelude, framing, run coalescing, classification.
//! Host-driven: the host passes one fully-buffered capture and receives an
//! event list; nothing here performs I/O.

use serde::Serialize;

use crate::command::{classify, Command};
use crate::framer::{self, FrameError, Packet};
use crate::runs::{RunReport, RunTracker};
use crate::session::{self, CaptureError, SessionId};

/// Default bound on the packet table, matching the expected size of one
/// capture session.
pub const DEFAULT_MAX_PACKETS: usize = 1024;

/// Per-decode options.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Capacity limit on framed packets; exceeding it is
    /// [`DecodeError::TooManyPackets`].
    pub max_packets: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_packets: DEFAULT_MAX_PACKETS,
        }
    }
}

/// Which device sent a packet. The protocol alternates strictly, so role is
/// a convention of stream position, not a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    /// Role of the packet at `index` in stream order.
    pub fn of_index(index: usize) -> Role {
        if index % 2 == 0 {
            Role::Master
        } else {
            Role::Slave
        }
    }
}

/// One classified, non-absorbed packet.
#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord<'a> {
    /// Position in the framed stream (absorbed packets count too).
    pub index: usize,
    pub role: Role,
    pub command: u8,
    pub extra: u8,
    pub decoded: Command<'a>,
}

/// Decoded trace events in stream order.
#[derive(Debug, Clone, Serialize)]
pub enum Event<'a> {
    /// A closed read/write run.
    Run(RunReport),
    /// A packet that was not absorbed into a run.
    Packet(PacketRecord<'a>),
}

/// Result of decoding one capture.
#[derive(Debug, Serialize)]
pub struct DecodedLog<'a> {
    pub session: SessionId,
    pub events: Vec<Event<'a>>,
    /// Total packets framed, including run-absorbed ones.
    pub packet_count: usize,
    /// Packets classified as unrecognized.
    pub unrecognized: usize,
    /// Set when framing stopped early; everything framed before the failure
    /// is still decoded. The caller decides whether this is fatal.
    pub framing_error: Option<FrameError>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("more than {limit} packets in capture")]
    TooManyPackets { limit: usize },
}

/// Decode one captured transaction log.
///
/// Packets are processed strictly in stream order: run coalescing and
/// master/slave attribution both depend on sequence position.
pub fn decode_log<'a>(
    bytes: &'a [u8],
    options: &DecodeOptions,
) -> Result<DecodedLog<'a>, DecodeError> {
    let session = session::derive_session(bytes)?;

    let mut frames: Vec<&'a [u8]> = Vec::new();
    let mut cursor = session::PRELUDE_LEN;
    let mut framing_error = None;
    loop {
        match framer::next_packet(session, &bytes[cursor..]) {
            Ok(None) => break,
            Ok(Some(len)) => {
                if frames.len() == options.max_packets {
                    return Err(DecodeError::TooManyPackets {
                        limit: options.max_packets,
                    });
                }
                frames.push(&bytes[cursor..cursor + len]);
                cursor += len;
            }
            // A malformed tail ends framing but not the decode.
            Err(err) => {
                framing_error = Some(err);
                break;
            }
        }
    }

    let mut tracker = RunTracker::new();
    let mut events = Vec::new();
    let mut unrecognized = 0;
    for (index, &frame) in frames.iter().enumerate() {
        let packet = match Packet::parse(frame) {
            Ok(p) => p,
            // Unreachable for frames the framer produced; surface it the
            // same way as a framing stop rather than panicking.
            Err(err) => {
                framing_error = Some(err);
                break;
            }
        };
        let outcome = tracker.offer(&packet);
        if let Some(run) = outcome.closed {
            events.push(Event::Run(run));
        }
        if !outcome.absorbed {
            let decoded = classify(&packet);
            if matches!(decoded, Command::Unrecognized { .. }) {
                unrecognized += 1;
            }
            events.push(Event::Packet(PacketRecord {
                index,
                role: Role::of_index(index),
                command: packet.command,
                extra: packet.extra,
                decoded,
            }));
        }
    }
    if let Some(run) = tracker.finish() {
        events.push(Event::Run(run));
    }

    Ok(DecodedLog {
        session,
        events,
        packet_count: frames.len(),
        unrecognized,
        framing_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::cmd;
    use crate::runs::Direction;

    const SESSION: u32 = 0x3333_3333;

    fn push_packet(buf: &mut Vec<u8>, command: u8, extra: u8, payload: &[u8]) {
        buf.push(command);
        buf.push(extra);
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&SESSION.to_le_bytes());
        buf.extend_from_slice(payload);
    }

    fn capture_with(packets: &[(u8, u8, Vec<u8>)]) -> Vec<u8> {
        let mut buf = vec![cmd::ADVERTISING];
        // Handshake session fields XOR to SESSION.
        buf.extend_from_slice(&[cmd::ASSERT_MASTER, 0x01, 0, 0]);
        buf.extend_from_slice(&0x1111_1111u32.to_le_bytes());
        buf.extend_from_slice(&[cmd::SLAVE_ACK, 0x02, 0, 0]);
        buf.extend_from_slice(&0x2222_2222u32.to_le_bytes());
        for (command, extra, payload) in packets {
            push_packet(&mut buf, *command, *extra, payload);
        }
        buf
    }

    #[test]
    fn read_requests_coalesce_into_one_run() {
        let capture = capture_with(&[
            (cmd::EEPROM_READ_REQ, 0x01, vec![0x10, 0x00, 0x10]),
            (cmd::EEPROM_READ_REQ, 0x01, vec![0x10, 0x10, 0x10]),
            (cmd::EEPROM_READ_REQ, 0x01, vec![0x10, 0x20, 0x10]),
        ]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        assert_eq!(log.session.value(), SESSION);
        assert_eq!(log.packet_count, 3);
        assert!(log.framing_error.is_none());
        assert_eq!(log.events.len(), 1);
        match &log.events[0] {
            Event::Run(run) => {
                assert_eq!(run.direction, Direction::Read);
                assert_eq!(run.start, 0x1000);
                assert_eq!(run.len, 0x30);
                assert_eq!(run.packets, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn roles_alternate_by_parity() {
        let capture = capture_with(&[
            (cmd::PING, 0x01, vec![]),
            (cmd::PONG, 0x02, vec![]),
            (cmd::PING, 0x01, vec![]),
        ]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        let roles: Vec<Role> = log
            .events
            .iter()
            .map(|e| match e {
                Event::Packet(p) => p.role,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(roles, vec![Role::Master, Role::Slave, Role::Master]);
    }

    #[test]
    fn run_followed_by_command_keeps_stream_order() {
        let capture = capture_with(&[
            (cmd::EEPROM_READ_REQ, 0x01, vec![0x10, 0x00, 0x10]),
            (cmd::EEPROM_READ_RSP, 0x02, vec![0xaa; 0x10]),
            (cmd::PING, 0x01, vec![]),
        ]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        assert_eq!(log.events.len(), 2);
        assert!(matches!(&log.events[0], Event::Run(run) if run.packets == 2));
        match &log.events[1] {
            Event::Packet(p) => {
                assert_eq!(p.decoded, Command::Ping);
                assert_eq!(p.index, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_commands_are_counted_not_fatal() {
        let capture = capture_with(&[
            (0x72, 0x01, vec![1, 2, 3]),
            (cmd::PING, 0x02, vec![]),
        ]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        assert_eq!(log.unrecognized, 1);
        assert_eq!(log.events.len(), 2);
    }

    #[test]
    fn packet_cap_is_enforced() {
        let capture = capture_with(&[
            (cmd::PING, 0x01, vec![]),
            (cmd::PONG, 0x02, vec![]),
            (cmd::PING, 0x01, vec![]),
        ]);
        let options = DecodeOptions { max_packets: 2 };
        assert!(matches!(
            decode_log(&capture, &options),
            Err(DecodeError::TooManyPackets { limit: 2 })
        ));
    }

    #[test]
    fn short_garbage_tail_joins_final_packet() {
        let mut capture = capture_with(&[(cmd::PING, 0x01, vec![]), (cmd::PONG, 0x02, vec![])]);
        // No length field: a tail too short to hold another header is
        // indistinguishable from payload and rides along with the last
        // packet (resynchronization edge case, not an error).
        capture.extend_from_slice(&[0xde, 0xad, 0xbe]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        assert_eq!(log.packet_count, 2);
        assert!(log.framing_error.is_none());
        match &log.events[1] {
            Event::Packet(p) => assert_eq!(p.decoded, Command::Pong),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unframeable_tail_preserves_decoded_prefix() {
        let mut capture = capture_with(&[(cmd::PING, 0x01, vec![])]);
        // A 158-byte remainder with no session id anywhere exceeds the
        // maximum packet size, so framing stops there.
        push_packet(&mut capture, cmd::PONG, 0x02, &[0x55; 150]);
        let log = decode_log(&capture, &DecodeOptions::default()).unwrap();
        assert_eq!(log.packet_count, 1);
        assert!(matches!(
            log.framing_error,
            Some(FrameError::TooLong { scanned: 158 })
        ));
        assert_eq!(log.events.len(), 1);
    }

    #[test]
    fn prelude_failure_is_fatal() {
        let err = decode_log(&[0x00, 0x01], &DecodeOptions::default());
        assert!(matches!(err, Err(DecodeError::Capture(_))));
    }
}
