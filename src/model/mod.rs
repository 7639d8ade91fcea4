//! Bearer data model and its fixed-layout codecs.
//!
//! Every structure has a `decode(&mut WireReader)` and an
//! `encode(&self, &mut WireWriter)` matching one C struct on the peer,
//! padding included. Fixed arrays are always written at full length and
//! unused entries are zeroed (or, for bearer contexts, filled with
//! placeholder contexts whose ids are `-1`).

pub mod address;
mod bearer;
mod pcscf;
mod qos;
mod tft;

pub use bearer::{
    ConcatenatedMsgType, DedicateBearerProperties, PdpAddrType, DEDICATED_BEARER_SIZE, MAX_CONCATENATED,
    PDN_CONTEXT_SIZE,
};
pub use pcscf::{AcquireMethod, PcscfAddr, PcscfInfo, MAX_PCSCF, PCSCF_LIST_SIZE};
pub use qos::{QosStatus, QOS_SIZE};
pub use tft::{
    PacketFilterInfo, TftAuthToken, TftParameter, TftStatus, BMP_V4_ADDR, BMP_V6_ADDR, MAX_PACKET_FILTERS,
    PACKET_FILTER_SIZE, TFT_SIZE,
};
