//! filesync-core — wire format, type registry, codec, and auth primitives.
//! The daemon and services crates depend on this one.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod message;
pub mod registry;
pub mod wire;

pub use codec::{Decoder, Encoder, Value};
pub use registry::Shape;
pub use wire::{Frame, Header, TransactionId, TypeId, WireError};
