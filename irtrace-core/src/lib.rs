//! Decoder for captured IR transaction logs between two paired handhelds.
//! Host-driven: no I/O; host passes the capture buffer and receives events.

pub mod command;
pub mod decoder;
pub mod decomp;
pub mod framer;
pub mod runs;
pub mod session;

pub use command::{classify, Command, IdentityChannel, IdentityRecord};
pub use decoder::{decode_log, DecodeError, DecodeOptions, DecodedLog, Event, Role};
pub use decomp::{decompress, DecompressError, DecompressedBlock};
pub use framer::{next_packet, FrameError, Packet};
pub use runs::{Direction, RunReport, RunTracker};
pub use session::{derive_session, CaptureError, SessionId};
