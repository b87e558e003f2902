//! Capture prelude: advertising byte, handshake pair, session id derivation.

use serde::Serialize;

use crate::command::cmd;

/// Bytes consumed before the framed packet stream begins: one advertising
/// byte followed by the two 8-byte handshake acknowledgement records.
pub const PRELUDE_LEN: usize = 1 + 8 + 8;

/// Session id exchanged during the handshake. Used only to validate that a
/// byte offset is a genuine packet start; never interpreted beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn from_raw(value: u32) -> Self {
        SessionId(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Malformed capture prelude. The decode cannot start without a session id.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture too short for prelude: {len} bytes, need {PRELUDE_LEN}")]
    TooShort { len: usize },
    #[error("capture does not start with advertising byte 0xfc (found 0x{found:02x})")]
    MissingAdvertising { found: u8 },
    #[error("first handshake record is not master-assert 0xfa (found 0x{found:02x})")]
    MissingMasterAssert { found: u8 },
}

/// Derive the session id from the start of a capture: XOR of the session
/// fields of the two handshake records following the advertising byte.
pub fn derive_session(bytes: &[u8]) -> Result<SessionId, CaptureError> {
    if bytes.len() < PRELUDE_LEN {
        return Err(CaptureError::TooShort { len: bytes.len() });
    }
    if bytes[0] != cmd::ADVERTISING {
        return Err(CaptureError::MissingAdvertising { found: bytes[0] });
    }
    if bytes[1] != cmd::ASSERT_MASTER {
        return Err(CaptureError::MissingMasterAssert { found: bytes[1] });
    }
    // Session field sits at offset 4 of each 8-byte handshake header.
    let ack1 = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let ack2 = u32::from_le_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]);
    Ok(SessionId(ack1 ^ ack2))
}
