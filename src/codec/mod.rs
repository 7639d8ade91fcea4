//! Codec module - fixed-layout primitives shared by every payload.
//!
//! The peer speaks C structs laid out in little-endian order with explicit
//! padding members. Two cursor types cover every field kind:
//!
//! - [`WireReader`] - advances over a received payload, failing with
//!   [`EngineError::TruncatedFrame`](crate::error::EngineError::TruncatedFrame)
//!   when a field would run past the end
//! - [`WireWriter`] - appends to a `BytesMut`, zero-padding fixed strings and
//!   emitting padding as zero bytes
//!
//! # Example
//!
//! ```
//! use bearer_dispatch::codec::{WireReader, WireWriter};
//!
//! let mut w = WireWriter::new();
//! w.encode_u8(7);
//! w.pad(3);
//! w.encode_u32(40_000);
//! w.encode_string("rmnet0", 8);
//!
//! let bytes = w.freeze();
//! let mut r = WireReader::new(&bytes);
//! assert_eq!(r.decode_u8().unwrap(), 7);
//! r.skip(3).unwrap();
//! assert_eq!(r.decode_u32().unwrap(), 40_000);
//! assert_eq!(r.decode_string(8).unwrap(), "rmnet0");
//! ```

mod decode;
mod encode;

pub use decode::WireReader;
pub use encode::WireWriter;
