//! EPS QoS descriptor.

use crate::codec::{WireReader, WireWriter};
use crate::error::Result;

/// Encoded size of a QoS block.
pub const QOS_SIZE: usize = 20;

/// QoS parameters of a bearer.
///
/// Whether guaranteed/maximum bit rates are "present" is derived from the
/// rates themselves when encoding and is not stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QosStatus {
    pub qci: u8,
    pub dl_gbr: u32,
    pub ul_gbr: u32,
    pub dl_mbr: u32,
    pub ul_mbr: u32,
}

impl QosStatus {
    /// Both guaranteed rates are non-zero.
    #[inline]
    pub fn gbr_present(&self) -> bool {
        self.dl_gbr > 0 && self.ul_gbr > 0
    }

    /// Both maximum rates are non-zero.
    #[inline]
    pub fn mbr_present(&self) -> bool {
        self.dl_mbr > 0 && self.ul_mbr > 0
    }

    /// Decode a 20-byte QoS block. The two presence bytes are read and ignored.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let qci = r.decode_u8()?;
        let _gbr_present = r.decode_u8()?;
        let _mbr_present = r.decode_u8()?;
        r.skip(1)?;
        Ok(Self {
            qci,
            dl_gbr: r.decode_u32()?,
            ul_gbr: r.decode_u32()?,
            dl_mbr: r.decode_u32()?,
            ul_mbr: r.decode_u32()?,
        })
    }

    pub fn encode(&self, w: &mut WireWriter) {
        w.encode_u8(self.qci);
        w.encode_u8(self.gbr_present() as u8);
        w.encode_u8(self.mbr_present() as u8);
        w.pad(1);
        w.encode_u32(self.dl_gbr);
        w.encode_u32(self.ul_gbr);
        w.encode_u32(self.dl_mbr);
        w.encode_u32(self.ul_mbr);
    }
}
