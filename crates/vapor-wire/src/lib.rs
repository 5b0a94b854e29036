//! Wire layer for the connection-manager protocol
//!
//! Frames carry a little-endian `(kind | PROTO_FLAG, header_length)`
//! prefix, a protobuf routing header and a protobuf body. A `Multi`
//! frame bundles a length-prefixed sequence of nested frames, optionally
//! gzip-compressed as a whole.

pub mod error;
pub mod frame;
pub mod kind;
pub mod proto;
pub mod result_code;
pub mod vdf;

pub use error::{Error, Result};
pub use frame::{Frame, PROTO_FLAG, decode, encode, unwrap_multi};
pub use kind::MsgKind;
pub use proto::header::FrameHeader;
pub use result_code::ResultCode;

/// Protocol version announced in hello and logon messages.
pub const PROTOCOL_VERSION: u32 = 65580;

/// Client package version announced during logon.
pub const CLIENT_PACKAGE_VERSION: u32 = 1_561_159_470;

/// Mask that turns a 32-bit account id into a full individual-account id.
/// An unauthenticated session uses the bare mask as its identity.
pub const ACCOUNT_ID_MASK: u64 = 0x0110_0001_0000_0000;

/// XOR mask applied to the private IPv4 address sent during logon.
pub const IP_OBFUSCATION_MASK: u32 = 0x6065_73A4;

/// Inbound messages larger than this are dropped before decoding.
pub const MAX_MESSAGE_SIZE: usize = 1 << 24;

/// Persona-state facets requested for friend data updates.
pub const PERSONA_STATE_FLAGS: u32 = 1106;
