//! Hand-written protobuf payload definitions
//!
//! Field numbers follow the live protocol. Enum-typed wire fields are
//! kept as raw `i32`/`u32` and converted through the typed enums in
//! this crate so unknown values survive decoding.

pub mod entitlements;
pub mod friends;
pub mod header;
pub mod login;
pub mod service;
pub mod stats;
