//! Dedicated bearer context and PDN context.
//!
//! A dedicated bearer context (1528 bytes) is the peer's
//! "single concatenated message": ids, QoS, TFT and P-CSCF list with
//! presence flags. A PDN context (18344 bytes) wraps a main context and a
//! fixed array of eleven concatenated contexts.
//!
//! # Layout
//!
//! ```text
//! bearer:  cid | default_cid | bearer_id | qos_present | QoS(20)
//!          msg_type | tft_present | signaling | pcscf_present | TFT(1212) | P-CSCF(288)
//! pdn:     pdp_addr_type | pad3 | bearer | concat_count | pad3 | 11 x bearer
//! ```

use std::net::IpAddr;

use crate::codec::{WireReader, WireWriter};
use crate::error::Result;

use super::pcscf::{PcscfInfo, PCSCF_LIST_SIZE};
use super::qos::{QosStatus, QOS_SIZE};
use super::tft::{TftStatus, TFT_SIZE};

/// Concatenated contexts carried after a main context.
pub const MAX_CONCATENATED: usize = 11;

pub const DEDICATED_BEARER_SIZE: usize = 4 + QOS_SIZE + 4 + TFT_SIZE + PCSCF_LIST_SIZE;
pub const PDN_CONTEXT_SIZE: usize = 4 + DEDICATED_BEARER_SIZE + 4 + MAX_CONCATENATED * DEDICATED_BEARER_SIZE;

/// Tag written into every context of a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ConcatenatedMsgType {
    #[default]
    None = 0,
    Activation = 1,
    Modification = 2,
}

/// PDP address type of a PDN context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PdpAddrType {
    #[default]
    None = 0x00,
    Ipv4 = 0x21,
    Ipv6 = 0x57,
    Ipv4v6 = 0x8D,
}

impl PdpAddrType {
    /// Classify a set of link addresses.
    pub fn from_addresses(addresses: &[IpAddr]) -> Self {
        let v4 = addresses.iter().any(IpAddr::is_ipv4);
        let v6 = addresses.iter().any(IpAddr::is_ipv6);
        match (v4, v6) {
            (true, true) => Self::Ipv4v6,
            (true, false) => Self::Ipv4,
            (false, true) => Self::Ipv6,
            (false, false) => Self::None,
        }
    }
}

/// Properties of one bearer as reported by the bearer control backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicateBearerProperties {
    pub cid: i32,
    pub default_cid: i32,
    pub bearer_id: i32,
    pub qos: Option<QosStatus>,
    pub signaling_flag: i32,
    pub tft: Option<TftStatus>,
    pub pcscf: Option<PcscfInfo>,
    /// Backend interface id. Not carried on the wire.
    pub interface_id: i32,
    /// Sibling contexts activated together with this one.
    pub concatenated: Vec<DedicateBearerProperties>,
}

impl Default for DedicateBearerProperties {
    fn default() -> Self {
        Self {
            cid: -1,
            default_cid: -1,
            bearer_id: -1,
            qos: None,
            signaling_flag: 0,
            tft: None,
            pcscf: None,
            interface_id: -1,
            concatenated: Vec::new(),
        }
    }
}

impl DedicateBearerProperties {
    /// A context with neither a cid nor an interface is a placeholder, not a bearer.
    pub fn is_placeholder(&self) -> bool {
        self.cid == -1 && self.interface_id == -1
    }

    /// Decode one 1528-byte context. Context-id bytes are sign extended so
    /// `0xFF` reads back as `-1`.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let cid = r.decode_u8()? as i8 as i32;
        let default_cid = r.decode_u8()? as i8 as i32;
        let bearer_id = r.decode_u8()? as i8 as i32;
        let has_qos = r.decode_u8()? == 1;
        let qos = QosStatus::decode(r)?;
        let _msg_type = r.decode_u8()?;
        let has_tft = r.decode_u8()? == 1;
        let signaling_flag = r.decode_u8()? as i32;
        let has_pcscf = r.decode_u8()? == 1;
        let tft = TftStatus::decode(r)?;
        let pcscf = PcscfInfo::decode(r)?;

        Ok(Self {
            cid,
            default_cid,
            bearer_id,
            qos: has_qos.then_some(qos),
            signaling_flag,
            tft: has_tft.then_some(tft),
            pcscf: has_pcscf.then_some(pcscf),
            ..Default::default()
        })
    }

    /// Encode this context without its siblings.
    pub fn encode(&self, w: &mut WireWriter, msg_type: ConcatenatedMsgType) {
        w.encode_u8(self.cid as u8);
        w.encode_u8(self.default_cid as u8);
        w.encode_u8(self.bearer_id as u8);
        w.encode_u8(self.qos.is_some() as u8);
        self.qos.unwrap_or_default().encode(w);
        w.encode_u8(msg_type as u8);
        w.encode_u8(self.tft.is_some() as u8);
        w.encode_u8(self.signaling_flag as u8);
        w.encode_u8(self.pcscf.is_some() as u8);
        match &self.tft {
            Some(tft) => tft.encode(w),
            None => TftStatus::default().encode(w),
        }
        match &self.pcscf {
            Some(pcscf) => pcscf.encode(w),
            None => PcscfInfo::default().encode(w),
        }
    }

    /// Encode `count` sibling slots, filling missing ones with placeholders.
    pub fn encode_concatenated(&self, w: &mut WireWriter, msg_type: ConcatenatedMsgType, count: usize) {
        let placeholder = Self::default();
        for i in 0..count {
            self.concatenated
                .get(i)
                .unwrap_or(&placeholder)
                .encode(w, msg_type);
        }
    }

    /// Encode a full PDN context around this bearer.
    pub fn encode_pdn_context(&self, w: &mut WireWriter, msg_type: ConcatenatedMsgType, pdp_type: PdpAddrType) {
        w.encode_u8(pdp_type as u8);
        w.pad(3);
        self.encode(w, msg_type);
        w.encode_u8(self.concatenated.len().min(MAX_CONCATENATED) as u8);
        w.pad(3);
        self.encode_concatenated(w, msg_type, MAX_CONCATENATED);
    }

    /// Decode a PDN context, returning the raw pdp type byte and the bearer
    /// with its counted siblings attached.
    pub fn decode_pdn_context(r: &mut WireReader<'_>) -> Result<(u8, Self)> {
        let pdp_type = r.decode_u8()?;
        r.skip(3)?;
        let mut main = Self::decode(r)?;
        let count = r.decode_u8()? as usize;
        r.skip(3)?;
        for i in 0..MAX_CONCATENATED {
            let sibling = Self::decode(r)?;
            if i < count {
                main.concatenated.push(sibling);
            }
        }
        Ok((pdp_type, main))
    }
}
