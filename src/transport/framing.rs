//! Length-prefixed frame assembly for bus streams.
//!
//! Every frame on a bus connection is sent as a 4-byte Big Endian length
//! followed by that many body bytes. The [`FrameAssembler`] accumulates
//! partial stream reads and yields complete frame bodies, using a state
//! machine:
//! - `WaitingForLength`: need 4 bytes
//! - `WaitingForBody`: length parsed, need N more body bytes
//!
//! # Example
//!
//! ```
//! use debugbus::transport::{encode_frame, FrameAssembler};
//!
//! let wire = encode_frame(b"hello");
//!
//! let mut assembler = FrameAssembler::new();
//! let frames = assembler.push(&wire).unwrap();
//! assert_eq!(&frames[0][..], b"hello");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BusError, Result};

/// Size of the frame length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame body size (16 MiB). A debug packet is at most
/// 64 Ki words, so this is generous.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the complete 4-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for body bytes.
    WaitingForBody { body_len: u32 },
}

/// Buffer accumulating incoming bytes and extracting complete frames.
///
/// All data is stored in a single `BytesMut` buffer; completed frame bodies
/// are split off without copying.
pub struct FrameAssembler {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame body size.
    max_frame_size: u32,
}

impl FrameAssembler {
    /// Create a frame assembler with default limits.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame assembler with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the assembler and extract all complete frames.
    ///
    /// Fragmented data is buffered internally for the next push; the
    /// returned vector may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::MalformedFrame`] if a frame's declared body
    /// length exceeds the configured maximum. The connection should be
    /// dropped after this; the stream position is no longer trustworthy.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame body from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let body_len = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]);

                if body_len > self.max_frame_size {
                    return Err(BusError::MalformedFrame(format!(
                        "frame body of {} bytes exceeds maximum {}",
                        body_len, self.max_frame_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);

                if body_len == 0 {
                    return Ok(Some(Bytes::new()));
                }

                self.state = State::WaitingForBody { body_len };
                self.try_extract_one()
            }

            State::WaitingForBody { body_len } => {
                let body_len = body_len as usize;
                if self.buffer.len() < body_len {
                    return Ok(None);
                }

                let body = self.buffer.split_to(body_len).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(body))
            }
        }
    }

    /// Number of buffered bytes not yet assembled into a frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the assembler holds no partial data.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a frame body into its on-stream representation (length prefix +
/// body) as a single contiguous buffer.
pub fn encode_frame(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(body);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_frame() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(&encode_frame(b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"hello");
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut assembler = FrameAssembler::new();

        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_frame(b"first"));
        wire.extend_from_slice(&encode_frame(b"second"));
        wire.extend_from_slice(&encode_frame(b"third"));

        let frames = assembler.push(&wire).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"first");
        assert_eq!(&frames[1][..], b"second");
        assert_eq!(&frames[2][..], b"third");
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_fragmented_length_prefix() {
        let mut assembler = FrameAssembler::new();
        let wire = encode_frame(b"test");

        let frames = assembler.push(&wire[..2]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(assembler.state_name(), "WaitingForLength");

        let frames = assembler.push(&wire[2..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"test");
    }

    #[test]
    fn test_fragmented_body() {
        let mut assembler = FrameAssembler::new();
        let body = b"a longer body that will arrive in two reads";
        let wire = encode_frame(body);

        let split = LENGTH_PREFIX_SIZE + 10;
        let frames = assembler.push(&wire[..split]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(assembler.state_name(), "WaitingForBody");

        let frames = assembler.push(&wire[split..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &body[..]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut assembler = FrameAssembler::new();
        let wire = encode_frame(b"hi");

        let mut all_frames = Vec::new();
        for byte in &wire {
            all_frames.extend(assembler.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], b"hi");
    }

    #[test]
    fn test_empty_body_frame() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(&encode_frame(b"")).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut assembler = FrameAssembler::with_max_frame_size(100);

        let mut wire = Vec::new();
        wire.extend_from_slice(&1000u32.to_be_bytes());

        let result = assembler.push(&wire);
        assert!(matches!(result, Err(BusError::MalformedFrame(_))));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut assembler = FrameAssembler::new();

        let frame1 = encode_frame(b"first");
        let frame2 = encode_frame(b"second");

        let mut wire = frame1.to_vec();
        wire.extend_from_slice(&frame2[..3]);

        let frames = assembler.push(&wire).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"first");

        let frames = assembler.push(&frame2[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"second");
    }

    #[test]
    fn test_odd_sized_body_passes_framing() {
        // Word alignment is the packet codec's concern, not the framing's
        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(&encode_frame(&[0xAB; 7])).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 7);
    }
}
