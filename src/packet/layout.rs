//! Bit layout of the packet header.
//!
//! A packet's data region is a sequence of 16-bit words. The first three
//! words form the header:
//! ```text
//! ┌──────────┬──────────┬───────────────────────────┐
//! │ Word 0   │ Word 1   │ Word 2 (flags)            │
//! │ dest     │ src      │ [15:14] type              │
//! │ 16 bits  │ 16 bits  │ [13:10] type_sub          │
//! │          │          │ [9:0]   reserved, zero    │
//! └──────────┴──────────┴───────────────────────────┘
//! ```
//!
//! This module is the single home of the layout: widths, shifts and masks
//! live here and are exercised only through the codec's accessors.

/// Number of 16-bit header words (dest, src, flags).
pub const HEADER_WORDS: usize = 3;

/// Reserved destination address: fan out to all connected parties.
pub const BROADCAST_ADDR: u16 = 0xFFFF;

/// Bit position of the `type` field within the flags word.
pub const TYPE_SHIFT: u32 = 14;
/// Mask of the `type` field (applied after shifting).
pub const TYPE_MASK: u16 = 0b11;

/// Bit position of the `type_sub` field within the flags word.
pub const TYPE_SUB_SHIFT: u32 = 10;
/// Mask of the `type_sub` field (applied after shifting).
pub const TYPE_SUB_MASK: u16 = 0b1111;

/// Reserved bits of the flags word: must be zero on write, ignored on read.
pub const FLAGS_RESERVED_MASK: u16 = (1 << TYPE_SUB_SHIFT) - 1;

/// Packet types, bits [15:14] of the flags word.
///
/// The field is 2 bits wide, so the mapping from raw bits is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Register access.
    RegAccess = 0,
    /// Plain (unspecified content).
    Plain = 1,
    /// Debug event.
    Event = 2,
    /// Reserved (will be discarded).
    Reserved = 3,
}

impl PacketType {
    /// Map a raw 2-bit value to a packet type. Total: any input maps to
    /// exactly one variant after masking.
    #[inline]
    pub fn from_bits(bits: u16) -> Self {
        match bits & TYPE_MASK {
            0 => PacketType::RegAccess,
            1 => PacketType::Plain,
            2 => PacketType::Event,
            _ => PacketType::Reserved,
        }
    }

    /// Raw 2-bit value of this type.
    #[inline]
    pub fn to_bits(self) -> u16 {
        self as u16
    }
}

/// Values of the `type_sub` field when `type == PacketType::RegAccess`.
///
/// For other packet types the 4-bit field is opaque to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegSubtype {
    /// 16 bit register read request.
    ReqReadReg16 = 0b0000,
    /// 32 bit register read request.
    ReqReadReg32 = 0b0001,
    /// 64 bit register read request.
    ReqReadReg64 = 0b0010,
    /// 128 bit register read request.
    ReqReadReg128 = 0b0011,
    /// 16 bit register write request.
    ReqWriteReg16 = 0b0100,
    /// 32 bit register write request.
    ReqWriteReg32 = 0b0101,
    /// 64 bit register write request.
    ReqWriteReg64 = 0b0110,
    /// 128 bit register write request.
    ReqWriteReg128 = 0b0111,
    /// 16 bit register read response.
    RespReadRegSuccess16 = 0b1000,
    /// 32 bit register read response.
    RespReadRegSuccess32 = 0b1001,
    /// 64 bit register read response.
    RespReadRegSuccess64 = 0b1010,
    /// 128 bit register read response.
    RespReadRegSuccess128 = 0b1011,
    /// Register read failure.
    RespReadRegError = 0b1100,
    /// The preceding write request was successful.
    RespWriteRegSuccess = 0b1110,
    /// The preceding write request failed.
    RespWriteRegError = 0b1111,
}

impl RegSubtype {
    /// Map a raw 4-bit value to a register-access subtype.
    ///
    /// Returns `None` for the undefined value `0b1101` and for inputs
    /// wider than 4 bits.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0b0000 => RegSubtype::ReqReadReg16,
            0b0001 => RegSubtype::ReqReadReg32,
            0b0010 => RegSubtype::ReqReadReg64,
            0b0011 => RegSubtype::ReqReadReg128,
            0b0100 => RegSubtype::ReqWriteReg16,
            0b0101 => RegSubtype::ReqWriteReg32,
            0b0110 => RegSubtype::ReqWriteReg64,
            0b0111 => RegSubtype::ReqWriteReg128,
            0b1000 => RegSubtype::RespReadRegSuccess16,
            0b1001 => RegSubtype::RespReadRegSuccess32,
            0b1010 => RegSubtype::RespReadRegSuccess64,
            0b1011 => RegSubtype::RespReadRegSuccess128,
            0b1100 => RegSubtype::RespReadRegError,
            0b1110 => RegSubtype::RespWriteRegSuccess,
            0b1111 => RegSubtype::RespWriteRegError,
            _ => return None,
        })
    }

    /// Raw 4-bit value of this subtype.
    #[inline]
    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// True for the request subtypes (reads and writes).
    #[inline]
    pub fn is_request(self) -> bool {
        self.to_bits() < 0b1000
    }

    /// True for the response subtypes (success and error).
    #[inline]
    pub fn is_response(self) -> bool {
        !self.is_request()
    }
}

/// Compose a flags word from a packet type and a raw 4-bit subtype.
///
/// The reserved bits [9:0] are written as zero. `type_sub` must already be
/// within 4 bits; callers validate before composing.
#[inline]
pub fn compose_flags(ty: PacketType, type_sub: u8) -> u16 {
    debug_assert!(u16::from(type_sub) <= TYPE_SUB_MASK);
    (ty.to_bits() << TYPE_SHIFT) | ((u16::from(type_sub) & TYPE_SUB_MASK) << TYPE_SUB_SHIFT)
}

/// Extract the packet type from a flags word.
#[inline]
pub fn extract_type(flags: u16) -> PacketType {
    PacketType::from_bits((flags >> TYPE_SHIFT) & TYPE_MASK)
}

/// Extract the raw 4-bit `type_sub` value from a flags word.
#[inline]
pub fn extract_type_sub(flags: u16) -> u8 {
    ((flags >> TYPE_SUB_SHIFT) & TYPE_SUB_MASK) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_is_total() {
        assert_eq!(PacketType::from_bits(0), PacketType::RegAccess);
        assert_eq!(PacketType::from_bits(1), PacketType::Plain);
        assert_eq!(PacketType::from_bits(2), PacketType::Event);
        assert_eq!(PacketType::from_bits(3), PacketType::Reserved);

        // Inputs wider than 2 bits are masked, never rejected
        assert_eq!(PacketType::from_bits(0b111), PacketType::Reserved);
        assert_eq!(PacketType::from_bits(0b100), PacketType::RegAccess);
    }

    #[test]
    fn test_type_roundtrip() {
        for ty in [
            PacketType::RegAccess,
            PacketType::Plain,
            PacketType::Event,
            PacketType::Reserved,
        ] {
            assert_eq!(PacketType::from_bits(ty.to_bits()), ty);
        }
    }

    #[test]
    fn test_compose_flags_bit_positions() {
        // EVENT (0b10) with subtype 0b1010 and nothing else set
        let flags = compose_flags(PacketType::Event, 0b1010);
        assert_eq!(flags, 0b10_1010_0000000000);

        assert_eq!(extract_type(flags), PacketType::Event);
        assert_eq!(extract_type_sub(flags), 0b1010);
        assert_eq!(flags & FLAGS_RESERVED_MASK, 0);
    }

    #[test]
    fn test_extract_ignores_reserved_bits() {
        // Reserved bits set by a noncompliant sender must be ignored on read
        let flags = compose_flags(PacketType::RegAccess, 0b0001) | 0b11_1111_1111;
        assert_eq!(extract_type(flags), PacketType::RegAccess);
        assert_eq!(extract_type_sub(flags), 0b0001);
    }

    #[test]
    fn test_reg_subtype_values() {
        assert_eq!(RegSubtype::ReqReadReg16.to_bits(), 0b0000);
        assert_eq!(RegSubtype::ReqReadReg128.to_bits(), 0b0011);
        assert_eq!(RegSubtype::ReqWriteReg16.to_bits(), 0b0100);
        assert_eq!(RegSubtype::ReqWriteReg128.to_bits(), 0b0111);
        assert_eq!(RegSubtype::RespReadRegSuccess16.to_bits(), 0b1000);
        assert_eq!(RegSubtype::RespReadRegError.to_bits(), 0b1100);
        assert_eq!(RegSubtype::RespWriteRegSuccess.to_bits(), 0b1110);
        assert_eq!(RegSubtype::RespWriteRegError.to_bits(), 0b1111);
    }

    #[test]
    fn test_reg_subtype_from_bits() {
        for bits in 0u8..16 {
            let sub = RegSubtype::from_bits(bits);
            if bits == 0b1101 {
                assert!(sub.is_none(), "0b1101 is undefined");
            } else {
                assert_eq!(sub.unwrap().to_bits(), bits);
            }
        }

        // Wider than 4 bits
        assert!(RegSubtype::from_bits(0b10000).is_none());
        assert!(RegSubtype::from_bits(0xFF).is_none());
    }

    #[test]
    fn test_reg_subtype_request_response_split() {
        assert!(RegSubtype::ReqReadReg32.is_request());
        assert!(RegSubtype::ReqWriteReg64.is_request());
        assert!(RegSubtype::RespReadRegSuccess32.is_response());
        assert!(RegSubtype::RespWriteRegError.is_response());
        assert!(!RegSubtype::RespReadRegError.is_request());
    }
}
