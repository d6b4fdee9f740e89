//! The [`Packet`] type: a single debug-bus message.
//!
//! A packet owns its data region as 16-bit words. The word count is fixed at
//! allocation time and is the single source of truth for the packet's total
//! size; the payload is always exactly `data_size_words - 3` words.
//!
//! # Example
//!
//! ```
//! use debugbus::packet::{Packet, PacketType, RegSubtype};
//!
//! let mut packet = Packet::new(5).unwrap(); // header + 2 payload words
//! packet
//!     .set_header(0x0042, 0x0001, PacketType::RegAccess, RegSubtype::ReqReadReg32.to_bits())
//!     .unwrap();
//!
//! assert_eq!(packet.dest(), 0x0042);
//! assert_eq!(packet.size_bytes(), 10);
//! ```

use std::fmt;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use super::layout::{
    compose_flags, extract_type, extract_type_sub, PacketType, HEADER_WORDS, TYPE_SUB_MASK,
};
use crate::error::{BusError, Result};

// Header word indices within the data region.
const WORD_DEST: usize = 0;
const WORD_SRC: usize = 1;
const WORD_FLAGS: usize = 2;

/// Get the data size in words (including headers) for a given payload size.
///
/// Pure function; callers use it to size an allocation.
#[inline]
pub fn data_size_words_from_payload(payload_words: usize) -> usize {
    payload_words + HEADER_WORDS
}

/// A single debug-bus message: three header words plus a variable payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The data region. `words.len()` is `data_size_words` and never changes
    /// for the lifetime of the packet.
    words: Vec<u16>,
}

impl Packet {
    /// Allocate a packet with the given data size and zero all words.
    ///
    /// `word_count` includes the header words. A count of 0 is permitted
    /// for headerless raw containers; header accessors on such a packet
    /// panic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Allocation`] if `word_count` exceeds the
    /// representable range of the size field (`u16`).
    pub fn new(word_count: usize) -> Result<Self> {
        if word_count > usize::from(u16::MAX) {
            return Err(BusError::Allocation(format!(
                "word count {} exceeds maximum {}",
                word_count,
                u16::MAX
            )));
        }
        Ok(Self {
            words: vec![0u16; word_count],
        })
    }

    /// Decode a packet from a raw frame, requiring a complete header.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::MalformedFrame`] if the byte length is odd or
    /// shorter than the three header words (6 bytes).
    pub fn from_frame(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_WORDS * 2 {
            return Err(BusError::MalformedFrame(format!(
                "frame of {} bytes is shorter than the {}-byte header",
                bytes.len(),
                HEADER_WORDS * 2
            )));
        }
        Self::from_frame_raw(bytes)
    }

    /// Decode a packet from a raw frame without requiring a header.
    ///
    /// Only word alignment is checked; the result may have fewer than three
    /// words, in which case header accessors must not be used on it.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::MalformedFrame`] if the byte length is odd or the
    /// frame holds more words than the size field can represent.
    pub fn from_frame_raw(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(BusError::MalformedFrame(format!(
                "frame length {} is not word-aligned",
                bytes.len()
            )));
        }

        let word_count = bytes.len() / 2;
        if word_count > usize::from(u16::MAX) {
            return Err(BusError::MalformedFrame(format!(
                "frame of {} words exceeds the maximum packet size of {} words",
                word_count,
                u16::MAX
            )));
        }

        let mut packet = Self::new(word_count)?;
        for (word, chunk) in packet.words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(packet)
    }

    /// Encode the packet into a raw frame (Big Endian words).
    ///
    /// The exact inverse of [`Packet::from_frame`].
    pub fn to_frame(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_bytes());
        for word in &self.words {
            buf.put_u16(*word);
        }
        buf.freeze()
    }

    /// Number of 16-bit words in the data region, including header words.
    #[inline]
    pub fn data_size_words(&self) -> u16 {
        self.words.len() as u16
    }

    /// Size of the packet in bytes, the exact wire size including headers.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.words.len() * 2
    }

    /// True if the packet has a complete header.
    #[inline]
    pub fn has_header(&self) -> bool {
        self.words.len() >= HEADER_WORDS
    }

    /// Destination module address.
    ///
    /// # Panics
    ///
    /// Panics if the packet has fewer than three words. Header access on a
    /// headerless packet is a caller error, not a recoverable condition.
    #[inline]
    pub fn dest(&self) -> u16 {
        self.header_guard();
        self.words[WORD_DEST]
    }

    /// Source module address.
    ///
    /// # Panics
    ///
    /// Panics if the packet has fewer than three words.
    #[inline]
    pub fn src(&self) -> u16 {
        self.header_guard();
        self.words[WORD_SRC]
    }

    /// Packet type, bits [15:14] of the flags word.
    ///
    /// # Panics
    ///
    /// Panics if the packet has fewer than three words.
    #[inline]
    pub fn packet_type(&self) -> PacketType {
        self.header_guard();
        extract_type(self.words[WORD_FLAGS])
    }

    /// Raw 4-bit `type_sub` value, bits [13:10] of the flags word.
    ///
    /// The value is only interpreted (see
    /// [`RegSubtype`](super::RegSubtype)) when
    /// [`packet_type`](Packet::packet_type) is
    /// [`PacketType::RegAccess`]; for other types it is opaque.
    ///
    /// # Panics
    ///
    /// Panics if the packet has fewer than three words.
    #[inline]
    pub fn type_sub(&self) -> u8 {
        self.header_guard();
        extract_type_sub(self.words[WORD_FLAGS])
    }

    /// Populate the packet header.
    ///
    /// Overwrites any prior header contents; the payload is untouched.
    /// Validation happens before any write, so a failed call leaves the
    /// packet unmodified. `dest` and `src` are `u16`, so their 16-bit range
    /// is enforced by the type system.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidField`] if `type_sub` does not fit in
    /// 4 bits.
    ///
    /// # Panics
    ///
    /// Panics if the packet has fewer than three words.
    pub fn set_header(&mut self, dest: u16, src: u16, ty: PacketType, type_sub: u8) -> Result<()> {
        self.header_guard();

        if u16::from(type_sub) > TYPE_SUB_MASK {
            return Err(BusError::InvalidField(format!(
                "type_sub {:#x} does not fit in 4 bits",
                type_sub
            )));
        }

        self.words[WORD_DEST] = dest;
        self.words[WORD_SRC] = src;
        self.words[WORD_FLAGS] = compose_flags(ty, type_sub);
        Ok(())
    }

    /// Payload words, exactly `data_size_words - 3` of them.
    ///
    /// Empty for headerless packets.
    #[inline]
    pub fn payload(&self) -> &[u16] {
        self.words.get(HEADER_WORDS..).unwrap_or(&[])
    }

    /// Mutable payload words. The payload length cannot change.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u16] {
        self.words.get_mut(HEADER_WORDS..).unwrap_or(&mut [])
    }

    /// Dump the packet in human-readable form to an output stream.
    ///
    /// Same representation as the `Display` impl; for diagnostics only.
    pub fn dump<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        write!(sink, "{}", self)
    }

    #[inline]
    fn header_guard(&self) {
        assert!(
            self.has_header(),
            "header access on a packet of {} words (need at least {})",
            self.words.len(),
            HEADER_WORDS
        );
    }
}

/// Human-readable rendering of a packet.
///
/// For debugging only: the format is unspecified and may change at any
/// time. Never parse it back.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packet of {} data words:", self.words.len())?;
        if !self.has_header() {
            return writeln!(f, "  (no header)");
        }
        writeln!(
            f,
            "  DEST = {:#06x}, SRC = {:#06x}, TYPE = {:?} ({}), TYPE_SUB = {:#x}",
            self.dest(),
            self.src(),
            self.packet_type(),
            self.packet_type().to_bits(),
            self.type_sub()
        )?;
        for (idx, word) in self.payload().iter().enumerate() {
            writeln!(f, "  Payload word {}: {:#06x} ({})", idx, word, word)?;
        }
        Ok(())
    }
}
