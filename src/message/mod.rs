//! Request decoding and reply construction.
//!
//! - [`Request`]: typed view of the five inbound requests
//! - [`reply`]: builders for every outbound response, reject and notify

pub mod reply;
mod request;

pub use reply::DedicatedOp;
pub use request::{
    DeactivationRequest, DedicatedActivationRequest, DefaultActivationRequest, ModificationRequest,
    PcscfDiscoveryRequest, Request, DEACTIVATION_SIZE, DEDICATED_ACTIVATION_SIZE, DEFAULT_ACTIVATION_SIZE,
    IF_NAME_LEN, MODIFICATION_SIZE, PCSCF_DISCOVERY_SIZE,
};

/// Cause used when the engine itself gives up. Written as a single byte, so
/// it reaches the peer as `0`.
pub const FAILCAUSE_UNKNOWN: i32 = 65536;

/// Generic failure cause for deactivation and P-CSCF rejects.
pub const CAUSE_FAILURE: i32 = 1;
