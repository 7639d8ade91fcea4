//! Collaborator interfaces the engine drives.
//!
//! The engine never talks to the radio, the connectivity service, netd or
//! the SIM directly. It calls these traits from its dispatch task, and the
//! implementations report asynchronous outcomes back through an
//! [`EventSender`](crate::event::EventSender).
//!
//! All methods are synchronous and must not block for long. Anything slow
//! should return immediately and post a [`BackendEvent`](crate::event::BackendEvent)
//! later.

use std::net::IpAddr;

use crate::error::Result;
use crate::event::PcoCompletion;
use crate::model::{DedicateBearerProperties, QosStatus, TftStatus};

/// APN type of the IMS default bearer.
pub const IMS_APN: &str = "ims";
/// APN type of the emergency default bearer.
pub const EMERGENCY_APN: &str = "emergency";

pub const REASON_BEARER_ACTIVATION: &str = "activation";
pub const REASON_BEARER_DEACTIVATION: &str = "deactivation";
pub const REASON_BEARER_MODIFICATION: &str = "modification";
pub const REASON_BEARER_ABORT: &str = "abort";
/// Default-bearer disconnect reason that falls back to the stored cid list.
pub const REASON_LOST_CONNECTION: &str = "LOST_CONNECTION";

/// Backend handle of a dedicated bearer workflow. Negative means refused.
pub type BearerHandle = i32;

/// The two network features a default bearer can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFeature {
    Ims,
    Emergency,
}

impl NetworkFeature {
    pub fn for_emergency(is_emergency: bool) -> Self {
        if is_emergency {
            Self::Emergency
        } else {
            Self::Ims
        }
    }

    pub fn apn(self) -> &'static str {
        match self {
            Self::Ims => IMS_APN,
            Self::Emergency => EMERGENCY_APN,
        }
    }

    pub fn from_apn(apn_type: &str) -> Option<Self> {
        match apn_type {
            IMS_APN => Some(Self::Ims),
            EMERGENCY_APN => Some(Self::Emergency),
            _ => None,
        }
    }
}

/// Result of asking the network backend for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStartResult {
    /// The connection is already up; link properties are available now.
    AlreadyActive,
    /// Setup started; a state-change event will follow.
    RequestStarted,
    /// Setup refused with a backend-specific code.
    Failed(i32),
}

/// Coarse connection state reported by the network backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Connecting,
    Connected,
    Suspended,
    Disconnecting,
    Disconnected,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub state: NetworkState,
    /// Id used to bind sockets to this network.
    pub network_id: i32,
}

/// Default bearer state carried by a state-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    Connected,
    Connecting,
    Disconnected,
    Suspended,
}

/// Dedicated bearer state carried by a state-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedicatedState {
    Idle,
    Connecting,
    Scanning,
    Connected,
    Disconnecting,
    Failed,
    Retrying,
}

/// Link properties of an established default bearer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkProperties {
    pub interface_name: String,
    pub addresses: Vec<IpAddr>,
}

/// Configuration pushed to the bearer backend before a default activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBearerConfig {
    pub valid: bool,
    pub qos: QosStatus,
    pub is_emergency: bool,
    pub pcscf_discovery: u8,
    pub signaling_flag: u8,
}

/// Radio-layer bearer control.
pub trait BearerControlBackend: Send + Sync {
    fn enable_dedicated_bearer(
        &self,
        apn: &str,
        signaling: bool,
        qos: &QosStatus,
        tft: &TftStatus,
    ) -> Result<BearerHandle>;

    fn disable_dedicated_bearer(&self, reason: &str, cid: i32) -> Result<BearerHandle>;

    fn abort_enable_dedicated_bearer(&self, reason: &str, ddc_id: BearerHandle) -> Result<BearerHandle>;

    fn modify_dedicated_bearer(
        &self,
        cid: i32,
        qos: Option<&QosStatus>,
        tft: Option<&TftStatus>,
    ) -> Result<BearerHandle>;

    fn set_default_bearer_config(&self, apn: &str, config: &DefaultBearerConfig) -> Result<()>;

    fn get_default_bearer_properties(&self, apn: &str) -> Option<DedicateBearerProperties>;

    fn get_last_fail_cause(&self, apn: &str) -> i32;

    fn get_deactivated_cids(&self, apn: &str) -> Option<Vec<i32>>;

    fn get_link_properties(&self, apn: &str) -> Option<LinkProperties>;

    /// Start P-CSCF discovery from protocol configuration options. The
    /// outcome is reported through `completion`.
    fn discover_pcscf_via_pco(&self, apn: &str, cid: i32, completion: PcoCompletion) -> Result<()>;

    fn is_dedicated_bearer(&self, cid: i32) -> bool;
}

/// Connectivity service.
pub trait NetworkBackend: Send + Sync {
    fn start_feature(&self, feature: NetworkFeature) -> FeatureStartResult;

    /// Release a feature. Negative values mean failure.
    fn stop_feature(&self, feature: NetworkFeature) -> i32;

    fn get_network_info(&self, feature: NetworkFeature) -> Option<NetworkInfo>;
}

/// IP family of a DHCP SIP-server query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4 => "v4",
            Self::V6 => "v6",
        }
    }
}

/// A SIP server returned by DHCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipServer {
    pub host: String,
    pub port: u16,
}

/// DHCP SIP-server discovery. Called from a blocking worker thread.
pub trait SipDiscovery: Send + Sync {
    /// Issue the DHCP request. `false` means the request could not be sent.
    fn do_sip_dhcp_request(&self, interface: &str) -> bool;

    fn get_sip_info(&self, interface: &str, service: &str, family: IpFamily) -> Option<SipServer>;

    fn clear_sip_info(&self, interface: &str);
}

/// P-CSCF addresses provisioned on the ISIM.
pub trait IsimSource: Send + Sync {
    fn isim_pcscf(&self) -> Option<Vec<String>>;
}
