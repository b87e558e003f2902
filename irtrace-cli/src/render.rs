//! Human-readable rendering of decoded records. The core emits structured
//! values only; every formatting decision lives here.

use std::fmt::Write;

use irtrace_core::command::{Command, EventKind, IdentityChannel, IdentityRecord, ResetScope};
use irtrace_core::decoder::{PacketRecord, Role};
use irtrace_core::runs::{Direction, RunReport};

pub fn run_report(run: &RunReport) -> String {
    match run.direction {
        Direction::Write => format!(
            "[Write 0x{:04x} bytes to addr 0x{:04x} ({} packets)]",
            run.len, run.start, run.packets
        ),
        Direction::Read => format!(
            "[Read 0x{:04x} bytes from addr 0x{:04x} ({} packets)]",
            run.len, run.start, run.packets
        ),
    }
}

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::Master => "master:",
        Role::Slave => "slave: ",
    }
}

/// Hex dump with a blank every 8 bytes and a fresh indented line every 16.
fn hex_block(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, b) in bytes.iter().enumerate() {
        if i % 16 == 0 {
            out.push_str("\n\t\t");
        } else if i % 8 == 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn channel_suffix(channel: IdentityChannel) -> &'static str {
    match channel {
        IdentityChannel::Primary => "",
        IdentityChannel::Alias1 => " (alias 1)",
        IdentityChannel::Alias2 => " (alias 2)",
        IdentityChannel::Alias3 => " (alias 3)",
    }
}

fn event_kind_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Map => "map",
        EventKind::Companion => "companion",
        EventKind::Item => "item",
        EventKind::Route => "route",
        EventKind::MapStamps => "map stamps",
        EventKind::CompanionStamps => "companion stamps",
        EventKind::ItemStamps => "item stamps",
        EventKind::RouteStamps => "route stamps",
    }
}

pub fn identity_record(info: &IdentityRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\tunk0: 0x{:08x}; unk1: 0x{:08x}", info.unk0, info.unk1);
    let _ = writeln!(out, "\tunk2:     0x{:04x}; unk3:     0x{:04x}", info.unk2, info.unk3);
    let _ = writeln!(out, "\ttid: {}", info.trainer_id);
    let _ = writeln!(out, "\tsid: {}", info.secret_id);
    let _ = write!(out, "\tidentity_data: {}", hex_block(&info.identity_data));
    let _ = write!(out, "\n\tevent_bitmap: {}", hex_block(&info.event_bitmap));
    let _ = writeln!(out, "\n\tevent_index: {}", info.event_index);
    let _ = write!(out, "\ttrainer_name: ");
    for name in info.trainer_name {
        let _ = write!(out, "0x{name:04x} ");
    }
    let _ = write!(out, "\n\tflags: 0x{:02x}", info.flags);
    let mut names = Vec::new();
    if info.is_initialized() {
        names.push("INIT");
    }
    if info.has_companion() {
        names.push("HAS_COMPANION");
    }
    if info.companion_joined() {
        names.push("COMPANION_JOINED");
    }
    if names.is_empty() {
        out.push('\n');
    } else {
        let _ = writeln!(out, " [{}]", names.join(", "));
    }
    let _ = writeln!(
        out,
        "\tprotocol_ver: 0x{:02x}; subver: 0x{:02x}",
        info.protocol_ver, info.protocol_subver
    );
    let _ = writeln!(out, "\tlast_sync: {}", info.last_sync);
    let _ = writeln!(out, "\tstep_count: {}", info.step_count);
    let _ = writeln!(out, "\tunk4: 0x{:02x} 0x{:02x}", info.unk4[0], info.unk4[1]);
    let _ = writeln!(out, "\tunk5: 0x{:02x}", info.unk5);
    let _ = writeln!(out, "\tunk8: 0x{:02x}", info.unk8);
    out
}

fn command_body(decoded: &Command<'_>) -> String {
    match decoded {
        Command::EepromWriteCompressed { addr, compressed } => format!(
            "(EEPROM_WRITE_CMP)\n\taddr: 0x{:04x}; compressed_len: {}; len: 128\n",
            addr,
            compressed.len()
        ),
        Command::EepromWriteRaw { addr, .. } => {
            format!("(EEPROM_WRITE_RAW)\n\taddr: 0x{addr:04x}; len: 128\n")
        }
        Command::EepromWriteRandom { addr, data } => format!(
            "(EEPROM_WRITE_RND)\n\taddr: 0x{:04x}; len: {}\n",
            addr,
            data.len()
        ),
        Command::EepromWriteAck => "(EEPROM_WRITE_ACK)\n".into(),
        Command::EepromReadRequest { addr, len } => {
            format!("(EEPROM_READ_REQ)\n\taddr: 0x{addr:04x}; len: {len}\n")
        }
        Command::EepromReadResponse { data } => {
            format!("(EEPROM_READ_RSP)\n\tpayload_len: {}\n", data.len())
        }
        Command::RamWrite { data } => format!("(RAM_WRITE)\n\tpayload_len: {}\n", data.len()),
        Command::IdentityRequest => "(IDENTITY_REQ)\n".into(),
        Command::IdentityResponse { info } => {
            format!("(IDENTITY_RSP)\n{}", identity_record(info))
        }
        Command::IdentitySend { channel, info } => format!(
            "(IDENTITY_SEND{})\n{}",
            channel_suffix(*channel),
            identity_record(info)
        ),
        Command::IdentityAck { channel } => {
            format!("(IDENTITY_ACK{})\n", channel_suffix(*channel))
        }
        Command::Ping => "(PING)\n".into(),
        Command::Pong => "(PONG)\n".into(),
        Command::PeerPlayStart => "(PEER_PLAY_START)\n".into(),
        Command::PeerPlayResponse => "(PEER_PLAY_RSP)\n".into(),
        Command::PeerPlayData { data } => {
            format!("(PEER_PLAY_DX)\n\tpayload_len: {}\n", data.len())
        }
        Command::PeerPlayEnd => "(PEER_PLAY_END)\n".into(),
        Command::PeerPlaySeen => "(PEER_PLAY_SEEN)\n".into(),
        Command::NoComplete => "(NOCOMPLETE)\n".into(),
        Command::NoRx => "(NORX)\n".into(),
        Command::NoRxAck => "(NORX_ACK)\n".into(),
        Command::WalkStart => "(WALK_START)\n".into(),
        Command::WalkStartInit => "(WALK_START_INIT)\n".into(),
        Command::WalkEndRequest => "(WALK_END_REQ)\n".into(),
        Command::WalkEndAck => "(WALK_END_ACK)\n".into(),
        Command::ConnectComplete => "(CONNECT_COMPLETE)\n".into(),
        Command::ConnectCompleteAck => "(CONNECT_COMPLETE_ACK)\n".into(),
        Command::Disconnect => "(DISCONNECT)\n".into(),
        Command::DeviceReset { scope, payload } => {
            let name = match scope {
                ResetScope::Keep => "DEVICE_RESET_KEEP",
                ResetScope::Events => "DEVICE_RESET_EVENTS",
                ResetScope::Full => "DEVICE_RESET_FULL",
            };
            if payload.is_empty() {
                format!("({name})\n")
            } else {
                format!("({name})\n\tpayload:{}\n", hex_block(payload))
            }
        }
        Command::Event { kind, payload } => format!(
            "(EVENT: {})\n\tpayload_len: {}\n",
            event_kind_name(*kind),
            payload.len()
        ),
        Command::Advertising => "(ADVERTISING)\n".into(),
        Command::SlaveAck => "(SLAVE_ACK)\n".into(),
        Command::AssertMaster => "(ASSERT_MASTER)\n".into(),
        Command::Unrecognized {
            command,
            payload_len,
        } => format!("(unrecognized 0x{command:02x})\n\tpayload_len: {payload_len}\n"),
    }
}

pub fn packet_record(record: &PacketRecord<'_>) -> String {
    format!(
        "{} {:02x} (extra: 0x{:02x}) {}",
        role_prefix(record.role),
        record.command,
        record.extra,
        command_body(&record.decoded)
    )
}
