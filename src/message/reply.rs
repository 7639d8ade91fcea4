//! Outbound frame builders.
//!
//! Each builder returns a complete [`Frame`] whose payload matches the
//! peer's struct for that message id. Causes and context ids are written as
//! a single byte.

use std::net::IpAddr;

use crate::codec::WireWriter;
use crate::model::address::ip_octets;
use crate::model::{
    ConcatenatedMsgType, DedicateBearerProperties, PcscfInfo, PdpAddrType, DEDICATED_BEARER_SIZE,
    MAX_CONCATENATED, PCSCF_LIST_SIZE, PDN_CONTEXT_SIZE,
};
use crate::protocol::{msg_id, Frame};

use super::request::IF_NAME_LEN;

pub const DEFAULT_RESPONSE_SIZE: usize = 4 + 2 * PDN_CONTEXT_SIZE;
pub const DEDICATED_RESPONSE_SIZE: usize = 4 + DEDICATED_BEARER_SIZE + 4 + MAX_CONCATENATED * DEDICATED_BEARER_SIZE;
pub const DEDICATED_REJECT_SIZE: usize = 4 + MAX_CONCATENATED * DEDICATED_BEARER_SIZE;
pub const DEDICATED_NOTIFY_SIZE: usize = 4 + DEDICATED_BEARER_SIZE + 3 + MAX_CONCATENATED * DEDICATED_BEARER_SIZE;
pub const PCSCF_RESPONSE_SIZE: usize = 4 + PCSCF_LIST_SIZE;

/// Which dedicated-bearer operation a reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedicatedOp {
    Activation,
    Modification,
}

impl DedicatedOp {
    fn msg_type(self) -> ConcatenatedMsgType {
        match self {
            Self::Activation => ConcatenatedMsgType::Activation,
            Self::Modification => ConcatenatedMsgType::Modification,
        }
    }
}

fn finish(message_id: u32, w: WireWriter) -> Frame {
    Frame::with_payload(message_id, w.freeze())
}

/// `{ first, cause, pad2 }`, shared by every short reject and notify.
fn short_reply(message_id: u32, first: u8, cause: i32) -> Frame {
    let mut w = WireWriter::with_capacity(4);
    w.encode_u8(first);
    w.encode_u8(cause as u8);
    w.pad(2);
    finish(message_id, w)
}

/// Default bearer activation response: the default bearer as an activation
/// context followed by an empty context.
pub fn default_activation_response(
    transaction_id: u8,
    pdn_count: u8,
    pdp_type: PdpAddrType,
    bearer: &DedicateBearerProperties,
) -> Frame {
    let mut w = WireWriter::with_capacity(DEFAULT_RESPONSE_SIZE);
    w.encode_u8(transaction_id);
    w.encode_u8(pdn_count);
    w.pad(2);
    bearer.encode_pdn_context(&mut w, ConcatenatedMsgType::Activation, pdp_type);
    DedicateBearerProperties::default().encode_pdn_context(&mut w, ConcatenatedMsgType::None, pdp_type);
    finish(msg_id::RESPONSE_BEARER_ACTIVATION, w)
}

pub fn default_activation_reject(transaction_id: u8, cause: i32) -> Frame {
    short_reply(msg_id::REJECT_BEARER_ACTIVATION, transaction_id, cause)
}

/// A rejected default deactivation goes out under the activation reject id.
pub fn default_deactivation_reject(transaction_id: u8, cause: i32) -> Frame {
    short_reply(msg_id::REJECT_BEARER_ACTIVATION, transaction_id, cause)
}

pub fn deactivation_response(transaction_id: u8, cid: i32) -> Frame {
    let mut w = WireWriter::with_capacity(4);
    w.encode_u8(transaction_id);
    w.encode_u8(cid as u8);
    w.pad(2);
    finish(msg_id::RESPONSE_BEARER_DEACTIVATION, w)
}

pub fn deactivation_reject(transaction_id: u8, cause: i32) -> Frame {
    short_reply(msg_id::REJECT_BEARER_DEACTIVATION, transaction_id, cause)
}

/// Dedicated activation or modification response. The sibling count is
/// capped at the eleven slots the struct carries.
pub fn dedicated_response(transaction_id: u8, op: DedicatedOp, bearer: &DedicateBearerProperties) -> Frame {
    let message_id = match op {
        DedicatedOp::Activation => msg_id::RESPONSE_DEDICATE_BEARER_ACTIVATION,
        DedicatedOp::Modification => msg_id::RESPONSE_BEARER_MODIFICATION,
    };
    let msg_type = op.msg_type();

    let mut w = WireWriter::with_capacity(DEDICATED_RESPONSE_SIZE);
    w.encode_u8(transaction_id);
    w.encode_u8(0);
    w.pad(2);
    bearer.encode(&mut w, msg_type);
    w.encode_u8(bearer.concatenated.len().min(MAX_CONCATENATED) as u8);
    w.pad(3);
    bearer.encode_concatenated(&mut w, msg_type, MAX_CONCATENATED);
    finish(message_id, w)
}

/// Dedicated activation or modification reject. The count covers the main
/// context plus its siblings, or is zero without a bearer.
pub fn dedicated_reject(
    transaction_id: u8,
    cause: i32,
    op: DedicatedOp,
    bearer: Option<&DedicateBearerProperties>,
) -> Frame {
    let message_id = match op {
        DedicatedOp::Activation => msg_id::REJECT_DEDICATE_BEARER_ACTIVATION,
        DedicatedOp::Modification => msg_id::REJECT_BEARER_MODIFICATION,
    };
    let msg_type = op.msg_type();
    let placeholder = DedicateBearerProperties::default();
    let main = bearer.unwrap_or(&placeholder);

    let mut w = WireWriter::with_capacity(DEDICATED_REJECT_SIZE);
    w.encode_u8(transaction_id);
    w.encode_u8(cause as u8);
    let count = bearer.map_or(0, |b| b.concatenated.len().min(MAX_CONCATENATED - 1) + 1);
    w.encode_u8(count as u8);
    w.pad(1);
    main.encode(&mut w, msg_type);
    main.encode_concatenated(&mut w, msg_type, MAX_CONCATENATED - 1);
    finish(message_id, w)
}

/// Network-initiated dedicated activation or modification. This struct has
/// no concatenated count.
pub fn dedicated_notify(op: DedicatedOp, bearer: &DedicateBearerProperties) -> Frame {
    let message_id = match op {
        DedicatedOp::Activation => msg_id::NOTIFY_DEDICATE_BEARER_ACTIVATED,
        DedicatedOp::Modification => msg_id::NOTIFY_BEARER_MODIFIED,
    };
    let msg_type = op.msg_type();

    let mut w = WireWriter::with_capacity(DEDICATED_NOTIFY_SIZE);
    w.encode_u8(0);
    w.pad(3);
    bearer.encode(&mut w, msg_type);
    w.pad(3);
    bearer.encode_concatenated(&mut w, msg_type, MAX_CONCATENATED);
    finish(message_id, w)
}

pub fn bearer_deactivated_notify(cid: i32, cause: i32) -> Frame {
    short_reply(msg_id::NOTIFY_BEARER_DEACTIVATED, cid as u8, cause)
}

pub fn pcscf_response(transaction_id: u8, info: &PcscfInfo) -> Frame {
    let mut w = WireWriter::with_capacity(PCSCF_RESPONSE_SIZE);
    w.encode_u8(transaction_id);
    w.encode_u8(info.source as u8);
    w.pad(2);
    info.encode(&mut w);
    finish(msg_id::RESPONSE_PCSCF_DISCOVERY, w)
}

pub fn pcscf_reject(transaction_id: u8, cause: i32) -> Frame {
    short_reply(msg_id::REJECT_PCSCF_DISCOVERY, transaction_id, cause)
}

/// Global address notification; the message id follows the address family.
pub fn global_ip_notify(cid: i32, network_id: i32, address: &IpAddr, interface_name: &str) -> Frame {
    let message_id = match address {
        IpAddr::V4(_) => msg_id::NOTIFY_IPV4_GLOBAL_ADDR,
        IpAddr::V6(_) => msg_id::NOTIFY_IPV6_GLOBAL_ADDR,
    };
    let octets = ip_octets(address);

    let mut w = WireWriter::with_capacity(8 + octets.len() + IF_NAME_LEN);
    w.encode_u8(cid as u8);
    w.pad(3);
    w.encode_i32(network_id);
    w.encode_bytes(&octets);
    w.encode_string(interface_name, IF_NAME_LEN);
    finish(message_id, w)
}
