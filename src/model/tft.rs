//! Traffic flow template: packet filters plus the optional parameter list.
//!
//! # Layout
//!
//! ```text
//! opcode u8 | ebit u8 | pad2
//! 16 x packet filter (64 bytes each, slot i holds filter id i+1)
//! linked_pf_num u8 | pad3 | linked_pf[16]
//! authtoken_num u8 | pad3 | 4 x auth-token group (56 bytes each)
//! ```

use crate::codec::{WireReader, WireWriter};
use crate::error::Result;

use super::address::{dotted, parse_dotted, IPV4_ADDR_LEN, IPV6_ADDR_LEN};

pub const MAX_PACKET_FILTERS: usize = 16;
pub const MAX_AUTH_TOKEN_GROUPS: usize = 4;
pub const MAX_AUTH_TOKEN_LEN: usize = 16;
pub const MAX_FLOW_IDS: usize = 4;
pub const FLOW_ID_LEN: usize = 4;
pub const ADDR_AND_MASK_LEN: usize = 32;

pub const PACKET_FILTER_SIZE: usize = 64;
const AUTH_TOKEN_GROUP_SIZE: usize = 4 + MAX_AUTH_TOKEN_LEN + 4 + MAX_FLOW_IDS * FLOW_ID_LEN;
pub const TFT_SIZE: usize = 4
    + MAX_PACKET_FILTERS * PACKET_FILTER_SIZE
    + 4
    + MAX_PACKET_FILTERS
    + 4
    + MAX_AUTH_TOKEN_GROUPS * AUTH_TOKEN_GROUP_SIZE;

/// Bitmap flag: remote address block holds an IPv4 address and mask.
pub const BMP_V4_ADDR: u32 = 0x01;
/// Bitmap flag: remote address block holds an IPv6 address and mask.
pub const BMP_V6_ADDR: u32 = 0x02;

/// One packet filter of a TFT. `id == 0` marks an unused slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFilterInfo {
    pub id: u8,
    pub precedence: u8,
    pub direction: u8,
    pub network_pf_identifier: u8,
    pub bitmap: u32,
    /// Remote address, dotted decimal. Empty when the bitmap carries no address.
    pub address: String,
    pub mask: String,
    pub protocol_next_header: u8,
    pub local_port_low: u16,
    pub local_port_high: u16,
    pub remote_port_low: u16,
    pub remote_port_high: u16,
    pub spi: u32,
    pub tos: u8,
    pub tos_mask: u8,
    pub flow_label: u32,
}

impl PacketFilterInfo {
    fn addr_len(&self) -> Option<usize> {
        if self.bitmap & BMP_V4_ADDR != 0 {
            Some(IPV4_ADDR_LEN)
        } else if self.bitmap & BMP_V6_ADDR != 0 {
            Some(IPV6_ADDR_LEN)
        } else {
            None
        }
    }

    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let mut filter = Self {
            id: r.decode_u8()?,
            precedence: r.decode_u8()?,
            direction: r.decode_u8()?,
            network_pf_identifier: r.decode_u8()?,
            bitmap: r.decode_u32()?,
            ..Default::default()
        };

        let block = r.decode_bytes(ADDR_AND_MASK_LEN)?;
        if let Some(len) = filter.addr_len() {
            let mask_at = if len == IPV4_ADDR_LEN { 4 } else { 16 };
            filter.address = dotted(&block[..len]);
            filter.mask = dotted(&block[mask_at..mask_at + len]);
        }

        filter.protocol_next_header = r.decode_u8()?;
        r.skip(3)?;
        filter.local_port_low = r.decode_u16()?;
        filter.local_port_high = r.decode_u16()?;
        filter.remote_port_low = r.decode_u16()?;
        filter.remote_port_high = r.decode_u16()?;
        filter.spi = r.decode_u32()?;
        filter.tos = r.decode_u8()?;
        filter.tos_mask = r.decode_u8()?;
        r.skip(2)?;
        filter.flow_label = r.decode_u32()?;
        Ok(filter)
    }

    pub fn encode(&self, w: &mut WireWriter) {
        w.encode_u8(self.id);
        w.encode_u8(self.precedence);
        w.encode_u8(self.direction);
        w.encode_u8(self.network_pf_identifier);
        w.encode_u32(self.bitmap);

        // The mask is only written alongside a non-empty address.
        let mut block = [0u8; ADDR_AND_MASK_LEN];
        if !self.address.is_empty() {
            let addr = parse_dotted(&self.address);
            let n = addr.len().min(IPV6_ADDR_LEN);
            block[..n].copy_from_slice(&addr[..n]);

            if let Some(len) = self.addr_len() {
                let mask_at = if len == IPV4_ADDR_LEN { 4 } else { 16 };
                let mask = parse_dotted(&self.mask);
                let n = mask.len().min(ADDR_AND_MASK_LEN - mask_at);
                block[mask_at..mask_at + n].copy_from_slice(&mask[..n]);
            }
        }
        w.encode_bytes(&block);

        w.encode_u8(self.protocol_next_header);
        w.pad(3);
        w.encode_u16(self.local_port_low);
        w.encode_u16(self.local_port_high);
        w.encode_u16(self.remote_port_low);
        w.encode_u16(self.remote_port_high);
        w.encode_u32(self.spi);
        w.encode_u8(self.tos);
        w.encode_u8(self.tos_mask);
        w.pad(2);
        w.encode_u32(self.flow_label);
    }
}

/// Authorization token with its flow identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TftAuthToken {
    /// Token bytes, at most 16.
    pub auth_token: Vec<u8>,
    /// Flow identifiers, at most 4.
    pub flow_ids: Vec<[u8; FLOW_ID_LEN]>,
}

/// Parameter list carried when the TFT's E bit is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TftParameter {
    /// Linked packet filter ids, at most 16.
    pub linked_packet_filter_ids: Vec<u8>,
    /// Auth-token groups, at most 4.
    pub auth_token_flow_ids: Vec<TftAuthToken>,
}

impl TftParameter {
    pub fn is_empty(&self) -> bool {
        self.linked_packet_filter_ids.is_empty() && self.auth_token_flow_ids.is_empty()
    }
}

/// Traffic flow template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TftStatus {
    pub operation: u8,
    /// Filters with `id > 0`, in any order.
    pub packet_filters: Vec<PacketFilterInfo>,
    pub parameter: Option<TftParameter>,
}

impl TftStatus {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let operation = r.decode_u8()?;
        let ebit = r.decode_u8()? == 1;
        r.skip(2)?;

        let mut packet_filters = Vec::new();
        for _ in 0..MAX_PACKET_FILTERS {
            let filter = PacketFilterInfo::decode(r)?;
            if filter.id > 0 {
                packet_filters.push(filter);
            }
        }

        let mut parameter = TftParameter::default();
        let linked_num = r.decode_u8()? as usize;
        r.skip(3)?;
        let linked = r.decode_bytes(MAX_PACKET_FILTERS)?;
        parameter.linked_packet_filter_ids = linked[..linked_num.min(MAX_PACKET_FILTERS)].to_vec();

        let group_num = r.decode_u8()? as usize;
        r.skip(3)?;
        for i in 0..MAX_AUTH_TOKEN_GROUPS {
            let token_len = r.decode_u8()? as usize;
            r.skip(3)?;
            let token = r.decode_bytes(MAX_AUTH_TOKEN_LEN)?;
            let flow_num = r.decode_u8()? as usize;
            r.skip(3)?;

            let mut group = TftAuthToken {
                auth_token: token[..token_len.min(MAX_AUTH_TOKEN_LEN)].to_vec(),
                flow_ids: Vec::new(),
            };
            for j in 0..MAX_FLOW_IDS {
                let raw = r.decode_bytes(FLOW_ID_LEN)?;
                if j < flow_num {
                    let mut flow_id = [0u8; FLOW_ID_LEN];
                    flow_id.copy_from_slice(raw);
                    group.flow_ids.push(flow_id);
                }
            }
            if i < group_num {
                parameter.auth_token_flow_ids.push(group);
            }
        }

        Ok(Self {
            operation,
            packet_filters,
            parameter: ebit.then_some(parameter),
        })
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let empty = TftParameter::default();
        let parameter = self.parameter.as_ref().unwrap_or(&empty);

        w.encode_u8(self.operation);
        w.encode_u8(!parameter.is_empty() as u8);
        w.pad(2);

        let unused = PacketFilterInfo::default();
        for slot in 0..MAX_PACKET_FILTERS {
            let id = (slot + 1) as u8;
            self.packet_filters
                .iter()
                .find(|f| f.id == id)
                .unwrap_or(&unused)
                .encode(w);
        }

        let linked = &parameter.linked_packet_filter_ids;
        let linked = &linked[..linked.len().min(MAX_PACKET_FILTERS)];
        w.encode_u8(linked.len() as u8);
        w.pad(3);
        w.encode_bytes(linked);
        w.pad(MAX_PACKET_FILTERS - linked.len());

        let groups = &parameter.auth_token_flow_ids;
        let groups = &groups[..groups.len().min(MAX_AUTH_TOKEN_GROUPS)];
        w.encode_u8(groups.len() as u8);
        w.pad(3);
        for i in 0..MAX_AUTH_TOKEN_GROUPS {
            match groups.get(i) {
                Some(group) => {
                    let token = &group.auth_token[..group.auth_token.len().min(MAX_AUTH_TOKEN_LEN)];
                    w.encode_u8(token.len() as u8);
                    w.pad(3);
                    w.encode_bytes(token);
                    w.pad(MAX_AUTH_TOKEN_LEN - token.len());

                    let flows = &group.flow_ids[..group.flow_ids.len().min(MAX_FLOW_IDS)];
                    w.encode_u8(flows.len() as u8);
                    w.pad(3);
                    for flow in flows {
                        w.encode_bytes(flow);
                    }
                    w.pad((MAX_FLOW_IDS - flows.len()) * FLOW_ID_LEN);
                }
                None => w.pad(AUTH_TOKEN_GROUP_SIZE),
            }
        }
    }
}
