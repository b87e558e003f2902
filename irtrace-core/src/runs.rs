//! Run coalescing: fold consecutive read/write packets addressing
//! contiguous ranges into one logical transfer per direction.
//!
//! Large EEPROM transfers arrive fragmented into many protocol packets; a
//! trace that printed each one would bury everything else. The tracker
//! absorbs those packets and reports one [`RunReport`] per transfer.

use serde::Serialize;

use crate::command::cmd;
use crate::command::write_address;
use crate::framer::Packet;

/// Transfer direction relative to the target device's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Read,
    Write,
}

/// One closed run: a contiguous same-direction transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    pub start: u16,
    pub len: usize,
    pub packets: usize,
}

#[derive(Debug)]
struct Run {
    direction: Direction,
    start: u16,
    len: usize,
    packets: usize,
}

impl Run {
    fn report(&self) -> RunReport {
        RunReport {
            direction: self.direction,
            start: self.start,
            len: self.len,
            packets: self.packets,
        }
    }
}

#[derive(Debug)]
enum RunState {
    Idle,
    Open(Run),
}

/// Outcome of offering one packet to the tracker.
#[derive(Debug)]
pub struct Absorbed {
    /// The packet was consumed into run tracking and must not be
    /// independently classified.
    pub absorbed: bool,
    /// A run that this packet caused to close.
    pub closed: Option<RunReport>,
}

/// What a run-class packet contributes.
enum Contribution {
    /// Ack/response: counts toward the open run, carries no address.
    Count(Direction),
    /// Address-bearing read/write: can seed or extend a run.
    Range {
        direction: Direction,
        start: u16,
        len: usize,
    },
}

fn contribution(packet: &Packet<'_>) -> Option<Contribution> {
    match packet.command {
        cmd::EEPROM_WRITE_CMP_00
        | cmd::EEPROM_WRITE_CMP_80
        | cmd::EEPROM_WRITE_RAW_00
        | cmd::EEPROM_WRITE_RAW_80 => Some(Contribution::Range {
            direction: Direction::Write,
            start: write_address(packet),
            len: 0x80,
        }),
        cmd::EEPROM_WRITE_RND => Some(Contribution::Range {
            direction: Direction::Write,
            start: write_address(packet),
            len: packet.payload.len(),
        }),
        cmd::EEPROM_WRITE_ACK => Some(Contribution::Count(Direction::Write)),
        // A request without address and length bytes is not run material.
        cmd::EEPROM_READ_REQ if packet.payload.len() >= 3 => Some(Contribution::Range {
            direction: Direction::Read,
            start: ((packet.payload[0] as u16) << 8) | packet.payload[1] as u16,
            len: packet.payload[2] as usize,
        }),
        cmd::EEPROM_READ_RSP => Some(Contribution::Count(Direction::Read)),
        _ => None,
    }
}

/// Stateful accumulator folding a packet stream into runs. Feed packets in
/// stream order via [`offer`](Self::offer); flush with
/// [`finish`](Self::finish) at end of stream.
#[derive(Debug, Default)]
pub struct RunTracker {
    state: RunState,
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    /// Offer the next packet in stream order.
    pub fn offer(&mut self, packet: &Packet<'_>) -> Absorbed {
        match contribution(packet) {
            None => Absorbed {
                absorbed: false,
                closed: self.take_open(),
            },
            Some(Contribution::Count(_)) => {
                if let RunState::Open(run) = &mut self.state {
                    run.packets += 1;
                }
                Absorbed {
                    absorbed: true,
                    closed: None,
                }
            }
            Some(Contribution::Range {
                direction,
                start,
                len,
            }) => {
                if let RunState::Open(run) = &mut self.state {
                    if run.direction == direction
                        && start as u32 == run.start as u32 + run.len as u32
                    {
                        run.len += len;
                        run.packets += 1;
                        return Absorbed {
                            absorbed: true,
                            closed: None,
                        };
                    }
                }
                // Breaking packet: report the old run without it; it seeds
                // the new run instead.
                let closed = self.take_open();
                self.state = RunState::Open(Run {
                    direction,
                    start,
                    len,
                    packets: 1,
                });
                Absorbed {
                    absorbed: true,
                    closed,
                }
            }
        }
    }

    /// Close and report a run left open at end of stream.
    pub fn finish(&mut self) -> Option<RunReport> {
        self.take_open()
    }

    fn take_open(&mut self) -> Option<RunReport> {
        match std::mem::take(&mut self.state) {
            RunState::Idle => None,
            RunState::Open(run) => Some(run.report()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_raw(addr: u16) -> Packet<'static> {
        static PAYLOAD: [u8; 128] = [0u8; 128];
        let command = if addr & 0x80 != 0 {
            cmd::EEPROM_WRITE_RAW_80
        } else {
            cmd::EEPROM_WRITE_RAW_00
        };
        Packet {
            command,
            extra: (addr >> 8) as u8,
            checksum: 0,
            session_id: 0,
            payload: &PAYLOAD,
        }
    }

    fn read_req(payload: &[u8]) -> Packet<'_> {
        Packet {
            command: cmd::EEPROM_READ_REQ,
            extra: 0x01,
            checksum: 0,
            session_id: 0,
            payload,
        }
    }

    fn bare(command: u8) -> Packet<'static> {
        Packet {
            command,
            extra: 0x01,
            checksum: 0,
            session_id: 0,
            payload: &[],
        }
    }

    #[test]
    fn contiguous_writes_coalesce_into_one_run() {
        let mut tracker = RunTracker::new();
        for i in 0..6u16 {
            let out = tracker.offer(&write_raw(0x2000 + i * 0x80));
            assert!(out.absorbed);
            assert!(out.closed.is_none());
        }
        assert_eq!(
            tracker.finish(),
            Some(RunReport {
                direction: Direction::Write,
                start: 0x2000,
                len: 6 * 0x80,
                packets: 6,
            })
        );
    }

    #[test]
    fn write_acks_count_toward_open_run() {
        let mut tracker = RunTracker::new();
        for i in 0..3u16 {
            tracker.offer(&write_raw(0x2000 + i * 0x80));
            tracker.offer(&bare(cmd::EEPROM_WRITE_ACK));
        }
        let report = tracker.finish().unwrap();
        assert_eq!(report.len, 3 * 0x80);
        assert_eq!(report.packets, 6);
    }

    #[test]
    fn non_contiguous_write_breaks_run_and_seeds_next() {
        let mut tracker = RunTracker::new();
        tracker.offer(&write_raw(0x2000));
        tracker.offer(&write_raw(0x2080));
        let out = tracker.offer(&write_raw(0x5000));
        assert!(out.absorbed);
        // The breaking packet is excluded from the closing run's count.
        assert_eq!(
            out.closed,
            Some(RunReport {
                direction: Direction::Write,
                start: 0x2000,
                len: 0x100,
                packets: 2,
            })
        );
        assert_eq!(
            tracker.finish(),
            Some(RunReport {
                direction: Direction::Write,
                start: 0x5000,
                len: 0x80,
                packets: 1,
            })
        );
    }

    #[test]
    fn read_run_absorbs_responses() {
        let mut tracker = RunTracker::new();
        let reqs = [[0x10u8, 0x00, 0x10], [0x10, 0x10, 0x10], [0x10, 0x20, 0x10]];
        for req in &reqs {
            assert!(tracker.offer(&read_req(req)).absorbed);
            assert!(tracker.offer(&bare(cmd::EEPROM_READ_RSP)).absorbed);
        }
        assert_eq!(
            tracker.finish(),
            Some(RunReport {
                direction: Direction::Read,
                start: 0x1000,
                len: 0x30,
                packets: 6,
            })
        );
    }

    #[test]
    fn direction_change_closes_even_when_contiguous() {
        let mut tracker = RunTracker::new();
        tracker.offer(&write_raw(0x2000));
        // Read request addressing exactly the next byte of the write run.
        let out = tracker.offer(&read_req(&[0x20, 0x80, 0x10]));
        assert!(out.absorbed);
        let closed = out.closed.unwrap();
        assert_eq!(closed.direction, Direction::Write);
        assert_eq!(closed.packets, 1);
        let next = tracker.finish().unwrap();
        assert_eq!(next.direction, Direction::Read);
        assert_eq!(next.start, 0x2080);
    }

    #[test]
    fn non_run_packet_closes_run_but_is_not_absorbed() {
        let mut tracker = RunTracker::new();
        tracker.offer(&write_raw(0x2000));
        let out = tracker.offer(&bare(cmd::PING));
        assert!(!out.absorbed);
        assert_eq!(
            out.closed,
            Some(RunReport {
                direction: Direction::Write,
                start: 0x2000,
                len: 0x80,
                packets: 1,
            })
        );
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn stray_ack_while_idle_counts_toward_no_run() {
        let mut tracker = RunTracker::new();
        let out = tracker.offer(&bare(cmd::EEPROM_WRITE_ACK));
        assert!(out.absorbed);
        assert!(out.closed.is_none());
        tracker.offer(&write_raw(0x2000));
        assert_eq!(tracker.finish().unwrap().packets, 1);
    }

    #[test]
    fn short_read_request_is_not_run_material() {
        let mut tracker = RunTracker::new();
        tracker.offer(&read_req(&[0x10, 0x00, 0x10]));
        let out = tracker.offer(&read_req(&[0x10]));
        assert!(!out.absorbed);
        assert!(out.closed.is_some());
    }

    #[test]
    fn random_length_write_extends_by_payload_length() {
        let payload = [0u8; 0x20];
        let rnd = Packet {
            command: cmd::EEPROM_WRITE_RND,
            extra: 0x20,
            checksum: 0,
            session_id: 0,
            payload: &payload,
        };
        let mut tracker = RunTracker::new();
        tracker.offer(&write_raw(0x1f80));
        assert!(tracker.offer(&rnd).absorbed);
        let report = tracker.finish().unwrap();
        assert_eq!(report.start, 0x1f80);
        assert_eq!(report.len, 0x80 + 0x20);
        assert_eq!(report.packets, 2);
    }
}
