//! Protocol module - socket header, framing, and frame types.
//!
//! - 8-byte little-endian header encoding/decoding
//! - Message identifiers shared with the peer
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{msg_id, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
