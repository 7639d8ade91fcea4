//! One DHCP SIP-server discovery pass.
//!
//! Runs on a blocking thread. The three SIP service types are queried in a
//! fixed order and every resolvable answer is accumulated into one
//! [`PcscfInfo`]. The cancel flag is checked after the DHCP request and
//! around each query so an interrupt stops the pass before the next call.

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{IpFamily, SipDiscovery, SipServer};
use crate::model::{AcquireMethod, PcscfInfo};

/// SIP service types in query order.
pub const SIP_SERVICE_TYPES: [&str; 3] = ["SIP+D2T", "SIPS+D2T", "SIP+D2U"];

/// Why a discovery pass produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpFailure {
    /// The DHCP request could not be issued.
    RequestFailed,
    /// The pass was cancelled; `after` names the last completed step.
    Interrupted { after: &'static str },
    /// No service type yielded a usable server.
    NoServers,
}

pub type DhcpOutcome = std::result::Result<PcscfInfo, DhcpFailure>;

/// Run a full discovery pass on `interface`.
///
/// `method` selects the address family and becomes the result's source.
pub fn run_dhcp_discovery(
    sip: &dyn SipDiscovery,
    interface: &str,
    method: AcquireMethod,
    cancel: &AtomicBool,
) -> DhcpOutcome {
    let family = match method {
        AcquireMethod::DhcpV6 => IpFamily::V6,
        _ => IpFamily::V4,
    };
    let interrupted = |after: &'static str| -> Result<(), DhcpFailure> {
        if cancel.load(Ordering::Acquire) {
            tracing::warn!(interface, after, "DHCP P-CSCF discovery interrupted");
            Err(DhcpFailure::Interrupted { after })
        } else {
            Ok(())
        }
    };

    if !sip.do_sip_dhcp_request(interface) {
        tracing::error!(interface, "SIP DHCP request failed");
        return Err(DhcpFailure::RequestFailed);
    }
    interrupted("request")?;

    let mut info = PcscfInfo::new(method);
    for service in SIP_SERVICE_TYPES {
        let server = sip.get_sip_info(interface, service, family);
        interrupted(service)?;

        let Some(server) = server else {
            tracing::debug!(interface, service, "No SIP server returned");
            continue;
        };
        let resolved = resolve(&server);
        interrupted(service)?;

        match resolved {
            Some(addr) => {
                tracing::debug!(interface, service, %addr, port = server.port, "SIP server discovered");
                info.add(&addr.to_string(), server.port);
            }
            None => tracing::warn!(interface, service, host = %server.host, "SIP server host did not resolve"),
        }
    }

    if info.is_empty() {
        Err(DhcpFailure::NoServers)
    } else {
        Ok(info)
    }
}

/// Resolve a server host. Literal addresses skip the resolver.
fn resolve(server: &SipServer) -> Option<IpAddr> {
    let host = server.host.trim();
    if host.is_empty() {
        return None;
    }
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Some(addr);
    }
    (host, server.port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|sa| sa.ip())
}
