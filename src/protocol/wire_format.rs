//! Socket header encoding and decoding.
//!
//! Every message on the peer socket starts with an 8-byte header:
//! ```text
//! ┌────────────┬────────────┐
//! │ Message ID │ Length     │
//! │ 4 bytes    │ 4 bytes    │
//! │ uint32 LE  │ uint32 LE  │
//! └────────────┴────────────┘
//! ```
//!
//! The payload follows immediately. All multi-byte integers are Little Endian,
//! matching the C structs on the peer side.

use crate::error::{EngineError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Largest payload the peer ever produces.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 40_960;

/// Message identifiers shared with the peer.
pub mod msg_id {
    /// Default bearer (PDN) activation request.
    pub const REQUEST_BEARER_ACTIVATION: u32 = 1001;
    /// Dedicated bearer activation request.
    pub const REQUEST_DEDICATE_BEARER_ACTIVATION: u32 = 1002;
    /// Bearer deactivation request (default or dedicated, or abort).
    pub const REQUEST_BEARER_DEACTIVATION: u32 = 1003;
    /// Dedicated bearer modification request.
    pub const REQUEST_BEARER_MODIFICATION: u32 = 1004;
    /// P-CSCF discovery request.
    pub const REQUEST_PCSCF_DISCOVERY: u32 = 1005;

    pub const RESPONSE_BEARER_ACTIVATION: u32 = 1101;
    pub const REJECT_BEARER_ACTIVATION: u32 = 1102;
    pub const RESPONSE_DEDICATE_BEARER_ACTIVATION: u32 = 1103;
    pub const REJECT_DEDICATE_BEARER_ACTIVATION: u32 = 1104;
    pub const RESPONSE_BEARER_DEACTIVATION: u32 = 1105;
    pub const REJECT_BEARER_DEACTIVATION: u32 = 1106;
    pub const RESPONSE_BEARER_MODIFICATION: u32 = 1107;
    pub const REJECT_BEARER_MODIFICATION: u32 = 1108;
    pub const RESPONSE_PCSCF_DISCOVERY: u32 = 1109;
    pub const REJECT_PCSCF_DISCOVERY: u32 = 1110;

    pub const NOTIFY_DEDICATE_BEARER_ACTIVATED: u32 = 1201;
    pub const NOTIFY_BEARER_MODIFIED: u32 = 1202;
    pub const NOTIFY_BEARER_DEACTIVATED: u32 = 1203;
    pub const NOTIFY_IPV4_GLOBAL_ADDR: u32 = 1204;
    pub const NOTIFY_IPV6_GLOBAL_ADDR: u32 = 1205;

    /// Check if a message id is one of the five inbound requests.
    #[inline]
    pub fn is_request(id: u32) -> bool {
        (REQUEST_BEARER_ACTIVATION..=REQUEST_PCSCF_DISCOVERY).contains(&id)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message kind (see [`msg_id`]).
    pub message_id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(message_id: u32, payload_length: u32) -> Self {
        Self {
            message_id,
            payload_length,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use bearer_dispatch::protocol::{Header, msg_id};
    ///
    /// let header = Header::new(msg_id::REJECT_PCSCF_DISCOVERY, 4);
    /// let bytes = header.encode();
    /// assert_eq!(bytes, [0x56, 0x04, 0, 0, 4, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.message_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            message_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Reject payloads larger than `max_payload_size`.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(EngineError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }

    /// Check if this header carries an inbound request.
    #[inline]
    pub fn is_request(&self) -> bool {
        msg_id::is_request(self.message_id)
    }
}
