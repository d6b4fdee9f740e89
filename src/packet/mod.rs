//! Packet module - debug packet representation and bit-level codec.
//!
//! This module implements the binary format of a debug-bus packet:
//! - Flags-word bit layout, packet types and register-access subtypes
//! - The [`Packet`] type with allocation, frame decode/encode and header
//!   accessors

mod layout;
#[allow(clippy::module_inception)]
mod packet;

pub use layout::{
    compose_flags, extract_type, extract_type_sub, PacketType, RegSubtype, BROADCAST_ADDR,
    FLAGS_RESERVED_MASK, HEADER_WORDS, TYPE_MASK, TYPE_SHIFT, TYPE_SUB_MASK, TYPE_SUB_SHIFT,
};
pub use packet::{data_size_words_from_payload, Packet};
