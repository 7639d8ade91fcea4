//! Inbound request payloads.
//!
//! Context ids in requests are unsigned bytes (0..=255). Bearer contexts in
//! the data model sign-extend instead, so `0xFF` there reads as `-1`.

use crate::codec::WireReader;
use crate::error::{EngineError, Result};
use crate::model::{QosStatus, TftStatus};
use crate::protocol::{msg_id, Frame};

pub const DEFAULT_ACTIVATION_SIZE: usize = 28;
pub const DEACTIVATION_SIZE: usize = 4;
pub const DEDICATED_ACTIVATION_SIZE: usize = 1236;
pub const MODIFICATION_SIZE: usize = 1240;
pub const PCSCF_DISCOVERY_SIZE: usize = 105;

/// Length of the fixed interface-name field.
pub const IF_NAME_LEN: usize = 100;

/// Default bearer (PDN) activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultActivationRequest {
    pub transaction_id: u8,
    pub qos: QosStatus,
    /// 1 = general, 2 = emergency, anything else is invalid.
    pub emergency_ind: u8,
    pub pcscf_discovery: u8,
    /// Normalised to 0 or 1.
    pub signaling_flag: u8,
}

impl DefaultActivationRequest {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let transaction_id = r.decode_u8()?;
        r.skip(3)?;
        let qos = QosStatus::decode(r)?;
        let emergency_ind = r.decode_u8()?;
        let pcscf_discovery = r.decode_u8()?;
        let signaling_flag = (r.decode_u8()? > 0) as u8;
        r.skip(1)?;
        Ok(Self {
            transaction_id,
            qos,
            emergency_ind,
            pcscf_discovery,
            signaling_flag,
        })
    }
}

/// Bearer deactivation, by cid or by aborting a pending activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivationRequest {
    pub transaction_id: u8,
    pub abort_transaction_id: u8,
    pub cid_valid: bool,
    /// Read as an unsigned byte, so it is never `-1`.
    pub cid: i32,
}

impl DeactivationRequest {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: r.decode_u8()?,
            abort_transaction_id: r.decode_u8()?,
            cid_valid: r.decode_u8()? == 1,
            cid: r.decode_u8()? as i32,
        })
    }
}

/// Dedicated bearer activation on top of a primary context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicatedActivationRequest {
    pub transaction_id: u8,
    /// Unsigned context-id byte.
    pub primary_cid: i32,
    pub signaling: bool,
    pub qos: QosStatus,
    pub tft: TftStatus,
}

impl DedicatedActivationRequest {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let transaction_id = r.decode_u8()?;
        let primary_cid = r.decode_u8()? as i32;
        let signaling = r.decode_u8()? > 0;
        r.skip(1)?;
        Ok(Self {
            transaction_id,
            primary_cid,
            signaling,
            qos: QosStatus::decode(r)?,
            tft: TftStatus::decode(r)?,
        })
    }
}

/// Dedicated bearer modification. Absent parts are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationRequest {
    pub transaction_id: u8,
    /// Unsigned context-id byte.
    pub cid: i32,
    pub qos: Option<QosStatus>,
    pub tft: Option<TftStatus>,
}

impl ModificationRequest {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let transaction_id = r.decode_u8()?;
        let cid = r.decode_u8()? as i32;
        let qos_mod = r.decode_u8()? == 1;
        r.skip(1)?;
        let qos = QosStatus::decode(r)?;
        let tft_mod = r.decode_u8()? == 1;
        r.skip(3)?;
        let tft = TftStatus::decode(r)?;
        Ok(Self {
            transaction_id,
            cid,
            qos: qos_mod.then_some(qos),
            tft: tft_mod.then_some(tft),
        })
    }
}

/// P-CSCF discovery. The method byte is kept raw so unknown values can be
/// rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscfDiscoveryRequest {
    pub transaction_id: u8,
    /// Unsigned context-id byte.
    pub cid: i32,
    pub interface_name: String,
    pub method: u8,
}

impl PcscfDiscoveryRequest {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let transaction_id = r.decode_u8()?;
        let cid = r.decode_u8()? as i32;
        r.skip(2)?;
        let interface_name = r.decode_string(IF_NAME_LEN)?;
        let method = r.decode_u8()?;
        Ok(Self {
            transaction_id,
            cid,
            interface_name,
            method,
        })
    }
}

/// A decoded inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    DefaultActivation(DefaultActivationRequest),
    Deactivation(DeactivationRequest),
    DedicatedActivation(DedicatedActivationRequest),
    Modification(ModificationRequest),
    PcscfDiscovery(PcscfDiscoveryRequest),
}

impl Request {
    /// Decode a request frame according to its message id.
    ///
    /// # Errors
    ///
    /// `Protocol` for a non-request message id, `TruncatedFrame` for a short
    /// payload.
    pub fn decode(frame: &Frame) -> Result<Self> {
        let mut r = WireReader::new(frame.payload());
        let request = match frame.message_id() {
            msg_id::REQUEST_BEARER_ACTIVATION => Self::DefaultActivation(DefaultActivationRequest::decode(&mut r)?),
            msg_id::REQUEST_BEARER_DEACTIVATION => Self::Deactivation(DeactivationRequest::decode(&mut r)?),
            msg_id::REQUEST_DEDICATE_BEARER_ACTIVATION => {
                Self::DedicatedActivation(DedicatedActivationRequest::decode(&mut r)?)
            }
            msg_id::REQUEST_BEARER_MODIFICATION => Self::Modification(ModificationRequest::decode(&mut r)?),
            msg_id::REQUEST_PCSCF_DISCOVERY => Self::PcscfDiscovery(PcscfDiscoveryRequest::decode(&mut r)?),
            other => {
                return Err(EngineError::Protocol(format!("unexpected message id {other}")));
            }
        };
        if r.remaining() > 0 {
            tracing::debug!(
                message_id = frame.message_id(),
                trailing = r.remaining(),
                "Ignoring trailing request bytes"
            );
        }
        Ok(request)
    }

    pub fn transaction_id(&self) -> u8 {
        match self {
            Self::DefaultActivation(req) => req.transaction_id,
            Self::Deactivation(req) => req.transaction_id,
            Self::DedicatedActivation(req) => req.transaction_id,
            Self::Modification(req) => req.transaction_id,
            Self::PcscfDiscovery(req) => req.transaction_id,
        }
    }
}
