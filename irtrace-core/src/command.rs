//! Command table and per-packet structured decode.
//!
//! The command byte selects the packet's semantics; the `extra` byte is a
//! command-specific modifier (high address byte for EEPROM writes, direction
//! flag elsewhere). Unknown commands decode to [`Command::Unrecognized`]
//! rather than failing: captured logs legitimately contain commands outside
//! the known set.

use serde::Serialize;

use crate::framer::Packet;

/// Known command bytes.
pub mod cmd {
    pub const EEPROM_WRITE_CMP_00: u8 = 0x00;
    pub const EEPROM_WRITE_RAW_00: u8 = 0x02;
    pub const EEPROM_WRITE_ACK: u8 = 0x04;
    pub const RAM_WRITE: u8 = 0x06;
    /// EEPROM write with payload-determined length.
    pub const EEPROM_WRITE_RND: u8 = 0x0a;
    pub const EEPROM_READ_REQ: u8 = 0x0c;
    pub const EEPROM_READ_RSP: u8 = 0x0e;

    pub const PEER_PLAY_START: u8 = 0x10;
    pub const PEER_PLAY_RSP: u8 = 0x12;
    pub const PEER_PLAY_DX: u8 = 0x14;
    pub const PEER_PLAY_END: u8 = 0x16;
    /// Sent if the peer was seen too recently.
    pub const PEER_PLAY_SEEN: u8 = 0x1c;

    pub const IDENTITY_REQ: u8 = 0x20;
    pub const IDENTITY_RSP: u8 = 0x22;
    pub const PING: u8 = 0x24;
    pub const PONG: u8 = 0x26;

    /// Clear events only.
    pub const DEVICE_RESET_EVENTS: u8 = 0x2a;
    /// Keep events and lifetime stats.
    pub const DEVICE_RESET_KEEP: u8 = 0x2c;
    /// Clear events and lifetime stats.
    pub const DEVICE_RESET_FULL: u8 = 0xe0;

    /// Master's identity to slave (used in the first walk session).
    pub const IDENTITY_SEND: u8 = 0x32;
    pub const IDENTITY_ACK: u8 = 0x34;
    pub const IDENTITY_SEND_ALIAS1: u8 = 0x40;
    pub const IDENTITY_ACK_ALIAS1: u8 = 0x42;
    pub const IDENTITY_SEND_ALIAS2: u8 = 0x52;
    pub const IDENTITY_ACK_ALIAS2: u8 = 0x54;
    /// Alias used in item dumps.
    pub const IDENTITY_SEND_ALIAS3: u8 = 0x60;
    pub const IDENTITY_ACK_ALIAS3: u8 = 0x62;

    pub const NOCOMPLETE: u8 = 0x36;
    pub const NOCOMPLETE_ALIAS1: u8 = 0x56;
    pub const NOCOMPLETE_ALIAS2: u8 = 0x64;
    pub const NOCOMPLETE_ALIAS3: u8 = 0x44;

    pub const WALK_START_INIT: u8 = 0x38;
    pub const WALK_END_REQ: u8 = 0x4e;
    pub const WALK_END_ACK: u8 = 0x50;
    pub const WALK_START: u8 = 0x5a;
    pub const CONNECT_COMPLETE: u8 = 0x66;
    pub const CONNECT_COMPLETE_ACK: u8 = 0x68;

    pub const EEPROM_WRITE_CMP_80: u8 = 0x80;
    pub const EEPROM_WRITE_RAW_80: u8 = 0x82;

    pub const NORX: u8 = 0x9c;
    pub const NORX_ACK: u8 = 0x9e;

    pub const EVENT_MAP: u8 = 0xc0;
    pub const EVENT_COMPANION: u8 = 0xc2;
    pub const EVENT_ITEM: u8 = 0xc4;
    pub const EVENT_ROUTE: u8 = 0xc6;
    pub const EVENT_MAP_STAMPS: u8 = 0xd0;
    pub const EVENT_COMPANION_STAMPS: u8 = 0xd2;
    pub const EVENT_ITEM_STAMPS: u8 = 0xd4;
    pub const EVENT_ROUTE_STAMPS: u8 = 0xd6;

    pub const DISCONNECT: u8 = 0xf4;
    pub const SLAVE_ACK: u8 = 0xf8;
    pub const ASSERT_MASTER: u8 = 0xfa;
    pub const ADVERTISING: u8 = 0xfc;
}

/// Which of the protocol-revision command pairs carried an identity
/// send/ack. All four have identical payload semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentityChannel {
    Primary,
    Alias1,
    Alias2,
    Alias3,
}

/// Which state a device-reset command clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetScope {
    /// Keep events and lifetime stats.
    Keep,
    /// Clear events only.
    Events,
    /// Clear events and lifetime stats.
    Full,
}

/// Event-data exchange kind (one command byte per table, plus a stamp
/// variant of each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Map,
    Companion,
    Item,
    Route,
    MapStamps,
    CompanionStamps,
    ItemStamps,
    RouteStamps,
}

/// Structured decode of one framed packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Command<'a> {
    /// EEPROM write whose payload is backreference-compressed (see
    /// [`crate::decomp`]). Expands to a 128-byte block at `addr`.
    EepromWriteCompressed { addr: u16, compressed: &'a [u8] },
    /// Uncompressed 128-byte EEPROM write.
    EepromWriteRaw { addr: u16, data: &'a [u8] },
    /// EEPROM write whose length is the payload length.
    EepromWriteRandom { addr: u16, data: &'a [u8] },
    EepromWriteAck,
    EepromReadRequest { addr: u16, len: u8 },
    EepromReadResponse { data: &'a [u8] },
    RamWrite { data: &'a [u8] },
    IdentityRequest,
    IdentityResponse { info: Box<IdentityRecord> },
    IdentitySend {
        channel: IdentityChannel,
        info: Box<IdentityRecord>,
    },
    IdentityAck { channel: IdentityChannel },
    Ping,
    Pong,
    PeerPlayStart,
    PeerPlayResponse,
    PeerPlayData { data: &'a [u8] },
    PeerPlayEnd,
    PeerPlaySeen,
    NoComplete,
    NoRx,
    NoRxAck,
    WalkStart,
    WalkStartInit,
    WalkEndRequest,
    WalkEndAck,
    ConnectComplete,
    ConnectCompleteAck,
    Disconnect,
    DeviceReset { scope: ResetScope, payload: &'a [u8] },
    Event { kind: EventKind, payload: &'a [u8] },
    Advertising,
    SlaveAck,
    AssertMaster,
    Unrecognized { command: u8, payload_len: usize },
}

/// Size of the identity record carried by identity response/send packets.
pub const IDENTITY_RECORD_LEN: usize = 104;

/// Fixed-layout identity record shared by the identity exchange commands.
/// Every field is exposed; flag combinations are not interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRecord {
    pub unk0: u32,
    pub unk1: u32,
    pub unk2: u16,
    pub unk3: u16,
    pub trainer_id: u16,
    pub secret_id: u16,
    /// Opaque per-pairing identity blob.
    #[serde(with = "serde_big_array::BigArray")]
    pub identity_data: [u8; 40],
    pub event_bitmap: [u8; 16],
    pub event_index: u8,
    pub trainer_name: [u16; 8],
    pub flags: u8,
    pub protocol_ver: u8,
    pub protocol_subver: u8,
    /// Stored big-endian on the wire, unlike every other field.
    pub last_sync: u32,
    /// Stored big-endian on the wire, unlike every other field.
    pub step_count: u32,
    pub unk4: [u8; 2],
    pub unk5: u8,
    pub unk8: u8,
}

impl IdentityRecord {
    pub const FLAG_INIT: u8 = 0x01;
    pub const FLAG_HAS_COMPANION: u8 = 0x02;
    pub const FLAG_COMPANION_JOINED: u8 = 0x04;

    /// Parse the record from the front of a packet payload. `None` if the
    /// payload is too short to hold one.
    pub fn parse(payload: &[u8]) -> Option<IdentityRecord> {
        if payload.len() < IDENTITY_RECORD_LEN {
            return None;
        }
        let u16_at = |o: usize| u16::from_le_bytes([payload[o], payload[o + 1]]);
        let u32_at = |o: usize| {
            u32::from_le_bytes([payload[o], payload[o + 1], payload[o + 2], payload[o + 3]])
        };

        let mut identity_data = [0u8; 40];
        identity_data.copy_from_slice(&payload[0x10..0x38]);
        let mut event_bitmap = [0u8; 16];
        event_bitmap.copy_from_slice(&payload[0x38..0x48]);
        let mut trainer_name = [0u16; 8];
        for (i, name) in trainer_name.iter_mut().enumerate() {
            *name = u16_at(0x49 + 2 * i);
        }

        Some(IdentityRecord {
            unk0: u32_at(0x00),
            unk1: u32_at(0x04),
            unk2: u16_at(0x08),
            unk3: u16_at(0x0a),
            trainer_id: u16_at(0x0c),
            secret_id: u16_at(0x0e),
            identity_data,
            event_bitmap,
            event_index: payload[0x48],
            trainer_name,
            flags: payload[0x59],
            protocol_ver: payload[0x5a],
            protocol_subver: payload[0x5b],
            // The two counters are the only big-endian fields in the record.
            last_sync: u32_at(0x5c).swap_bytes(),
            step_count: u32_at(0x60).swap_bytes(),
            unk4: [payload[0x64], payload[0x65]],
            unk5: payload[0x66],
            unk8: payload[0x67],
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.flags & Self::FLAG_INIT != 0
    }

    pub fn has_companion(&self) -> bool {
        self.flags & Self::FLAG_HAS_COMPANION != 0
    }

    pub fn companion_joined(&self) -> bool {
        self.flags & Self::FLAG_COMPANION_JOINED != 0
    }
}

/// Target address of an address-bearing EEPROM write: the `extra` byte is
/// the high address byte; bit 7 of the command selects the half-page.
pub fn write_address(packet: &Packet<'_>) -> u16 {
    ((packet.extra as u16) << 8) | ((packet.command & 0x80) as u16)
}

fn identity_or_unrecognized<'a>(
    packet: &Packet<'a>,
    build: impl FnOnce(Box<IdentityRecord>) -> Command<'a>,
) -> Command<'a> {
    match IdentityRecord::parse(packet.payload) {
        Some(info) => build(Box::new(info)),
        None => Command::Unrecognized {
            command: packet.command,
            payload_len: packet.payload.len(),
        },
    }
}

/// Decode one framed packet into a structured record. Never fails: commands
/// outside the known table decode to [`Command::Unrecognized`].
pub fn classify<'a>(packet: &Packet<'a>) -> Command<'a> {
    let payload = packet.payload;
    match packet.command {
        cmd::EEPROM_WRITE_CMP_00 | cmd::EEPROM_WRITE_CMP_80 => Command::EepromWriteCompressed {
            addr: write_address(packet),
            compressed: payload,
        },
        cmd::EEPROM_WRITE_RAW_00 | cmd::EEPROM_WRITE_RAW_80 => Command::EepromWriteRaw {
            addr: write_address(packet),
            data: payload,
        },
        cmd::EEPROM_WRITE_RND => Command::EepromWriteRandom {
            addr: write_address(packet),
            data: payload,
        },
        cmd::EEPROM_WRITE_ACK => Command::EepromWriteAck,
        cmd::EEPROM_READ_REQ if payload.len() >= 3 => Command::EepromReadRequest {
            addr: ((payload[0] as u16) << 8) | payload[1] as u16,
            len: payload[2],
        },
        cmd::EEPROM_READ_RSP => Command::EepromReadResponse { data: payload },
        cmd::RAM_WRITE => Command::RamWrite { data: payload },
        cmd::IDENTITY_REQ => Command::IdentityRequest,
        cmd::IDENTITY_RSP => {
            identity_or_unrecognized(packet, |info| Command::IdentityResponse { info })
        }
        cmd::IDENTITY_SEND => identity_or_unrecognized(packet, |info| Command::IdentitySend {
            channel: IdentityChannel::Primary,
            info,
        }),
        cmd::IDENTITY_SEND_ALIAS1 => identity_or_unrecognized(packet, |info| {
            Command::IdentitySend {
                channel: IdentityChannel::Alias1,
                info,
            }
        }),
        cmd::IDENTITY_SEND_ALIAS2 => identity_or_unrecognized(packet, |info| {
            Command::IdentitySend {
                channel: IdentityChannel::Alias2,
                info,
            }
        }),
        cmd::IDENTITY_SEND_ALIAS3 => identity_or_unrecognized(packet, |info| {
            Command::IdentitySend {
                channel: IdentityChannel::Alias3,
                info,
            }
        }),
        cmd::IDENTITY_ACK => Command::IdentityAck {
            channel: IdentityChannel::Primary,
        },
        cmd::IDENTITY_ACK_ALIAS1 => Command::IdentityAck {
            channel: IdentityChannel::Alias1,
        },
        cmd::IDENTITY_ACK_ALIAS2 => Command::IdentityAck {
            channel: IdentityChannel::Alias2,
        },
        cmd::IDENTITY_ACK_ALIAS3 => Command::IdentityAck {
            channel: IdentityChannel::Alias3,
        },
        cmd::PING => Command::Ping,
        cmd::PONG => Command::Pong,
        cmd::PEER_PLAY_START => Command::PeerPlayStart,
        cmd::PEER_PLAY_RSP => Command::PeerPlayResponse,
        cmd::PEER_PLAY_DX => Command::PeerPlayData { data: payload },
        cmd::PEER_PLAY_END => Command::PeerPlayEnd,
        cmd::PEER_PLAY_SEEN => Command::PeerPlaySeen,
        cmd::NOCOMPLETE | cmd::NOCOMPLETE_ALIAS1 | cmd::NOCOMPLETE_ALIAS2
        | cmd::NOCOMPLETE_ALIAS3 => Command::NoComplete,
        cmd::NORX => Command::NoRx,
        cmd::NORX_ACK => Command::NoRxAck,
        cmd::WALK_START => Command::WalkStart,
        cmd::WALK_START_INIT => Command::WalkStartInit,
        cmd::WALK_END_REQ => Command::WalkEndRequest,
        cmd::WALK_END_ACK => Command::WalkEndAck,
        cmd::CONNECT_COMPLETE => Command::ConnectComplete,
        cmd::CONNECT_COMPLETE_ACK => Command::ConnectCompleteAck,
        cmd::DISCONNECT => Command::Disconnect,
        cmd::DEVICE_RESET_KEEP => Command::DeviceReset {
            scope: ResetScope::Keep,
            payload,
        },
        cmd::DEVICE_RESET_EVENTS => Command::DeviceReset {
            scope: ResetScope::Events,
            payload,
        },
        cmd::DEVICE_RESET_FULL => Command::DeviceReset {
            scope: ResetScope::Full,
            payload,
        },
        cmd::EVENT_MAP => Command::Event {
            kind: EventKind::Map,
            payload,
        },
        cmd::EVENT_COMPANION => Command::Event {
            kind: EventKind::Companion,
            payload,
        },
        cmd::EVENT_ITEM => Command::Event {
            kind: EventKind::Item,
            payload,
        },
        cmd::EVENT_ROUTE => Command::Event {
            kind: EventKind::Route,
            payload,
        },
        cmd::EVENT_MAP_STAMPS => Command::Event {
            kind: EventKind::MapStamps,
            payload,
        },
        cmd::EVENT_COMPANION_STAMPS => Command::Event {
            kind: EventKind::CompanionStamps,
            payload,
        },
        cmd::EVENT_ITEM_STAMPS => Command::Event {
            kind: EventKind::ItemStamps,
            payload,
        },
        cmd::EVENT_ROUTE_STAMPS => Command::Event {
            kind: EventKind::RouteStamps,
            payload,
        },
        cmd::ADVERTISING => Command::Advertising,
        cmd::SLAVE_ACK => Command::SlaveAck,
        cmd::ASSERT_MASTER => Command::AssertMaster,
        other => Command::Unrecognized {
            command: other,
            payload_len: payload.len(),
        },
    }
}
