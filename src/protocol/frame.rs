//! Frame struct with typed accessors.
//!
//! A frame is one message: header plus payload. Payloads are `bytes::Bytes`
//! so a decoded frame can be handed from the read loop to the dispatch
//! queue without copying.
//!
//! # Example
//!
//! ```
//! use bearer_dispatch::protocol::{Frame, msg_id};
//! use bytes::Bytes;
//!
//! let frame = Frame::with_payload(msg_id::REJECT_PCSCF_DISCOVERY, Bytes::from_static(&[3, 1, 0, 0]));
//! assert_eq!(frame.message_id(), msg_id::REJECT_PCSCF_DISCOVERY);
//! assert_eq!(frame.payload_len(), 4);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a frame for `message_id`, deriving the header length from the payload.
    pub fn with_payload(message_id: u32, payload: Bytes) -> Self {
        Self {
            header: Header::new(message_id, payload.len() as u32),
            payload,
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn message_id(&self) -> u32 {
        self.header.message_id
    }

    /// Check if this frame is an inbound request.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.header.is_request()
    }

    /// Serialize header and payload into one contiguous buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        build_frame(&self.header, &self.payload)
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use bearer_dispatch::protocol::{build_frame, Header, HEADER_SIZE};
///
/// let header = Header::new(1003, 4);
/// let frame = build_frame(&header, &[1, 0, 1, 5]);
/// assert_eq!(frame.len(), HEADER_SIZE + 4);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
