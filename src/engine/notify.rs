//! Unsolicited notifications: bearer loss, network-initiated dedicated
//! bearers and global addresses of the IMS interface.

use std::net::IpAddr;

use crate::backend::{LinkProperties, NetworkFeature, NetworkState, REASON_LOST_CONNECTION};
use crate::message::{reply, DedicatedOp, CAUSE_FAILURE};
use crate::model::DedicateBearerProperties;
use crate::transaction::RequestKind;

use super::{Engine, INVALID_CID};

/// Link-local, loopback and unspecified addresses are never announced.
fn is_global(addr: &IpAddr) -> bool {
    if addr.is_unspecified() || addr.is_loopback() {
        return false;
    }
    match addr {
        IpAddr::V4(v4) => !v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

impl Engine {
    /// Tell the peer a bearer is gone and fail P-CSCF discoveries running on it.
    pub(super) fn notify_bearer_deactivated(&mut self, cid: i32, cause: i32) {
        self.emit(reply::bearer_deactivated_notify(cid, cause));

        for tid in self.transactions.snapshot_ids() {
            let Some(param) = self.transactions.get(tid) else {
                continue;
            };
            if param.kind == RequestKind::PcscfDiscovery && param.cid == cid {
                tracing::info!(transaction_id = tid, cid, "Bearer lost during P-CSCF discovery");
                self.complete(tid, |p| reply::pcscf_reject(p.transaction_id, CAUSE_FAILURE));
            }
        }
    }

    pub(super) fn notify_default_deactivated(&mut self, cid: i32, cause: i32) {
        self.interfaces.remove(&cid);
        self.notify_bearer_deactivated(cid, cause);
    }

    /// A default bearer went down without a pending request.
    pub(super) fn notify_default_disconnected(&mut self, feature: NetworkFeature, reason: Option<&str>) {
        let apn = feature.apn();
        let cause = self.bearer.get_last_fail_cause(apn);
        let cids = match self.bearer.get_deactivated_cids(apn) {
            Some(cids) => Some(cids),
            None if reason == Some(REASON_LOST_CONNECTION) => Some(std::mem::take(&mut self.deactivated_cids)),
            None => None,
        };

        match cids {
            Some(cids) => {
                tracing::info!(apn, ?cids, cause, "Default bearer released by network");
                for cid in cids {
                    self.notify_default_deactivated(cid, cause);
                }
                self.dhcp.interrupt_all();
            }
            None => tracing::error!(apn, reason, "Default bearer released but no cids are known"),
        }

        self.deactivated_cids.clear();
        if feature == NetworkFeature::Emergency {
            self.set_emergency_cid(INVALID_CID);
        }
    }

    /// Announce a network-initiated dedicated bearer. Bearers whose default
    /// bearer is unknown to the peer are dropped.
    pub(super) fn notify_dedicated(&mut self, op: DedicatedOp, property: &DedicateBearerProperties) {
        if !self.interfaces.contains_key(&property.default_cid) {
            tracing::warn!(
                cid = property.cid,
                default_cid = property.default_cid,
                ?op,
                "Dedicated bearer on an unknown default bearer, not notifying"
            );
            return;
        }
        self.emit(reply::dedicated_notify(op, property));
    }

    /// Announce the global addresses of a freshly connected default bearer.
    pub(super) fn notify_link_global_addresses(&mut self, feature: NetworkFeature, link: &LinkProperties) {
        for addr in &link.addresses {
            self.notify_global_ip(feature, &link.interface_name, *addr);
        }
    }

    pub(super) fn on_global_ip_address(&mut self, apn: &str, interface: &str, addr: IpAddr) {
        match NetworkFeature::from_apn(apn) {
            Some(feature) => self.notify_global_ip(feature, interface, addr),
            None => tracing::trace!(apn, %addr, "Ignoring address of unrelated apn"),
        }
    }

    fn notify_global_ip(&mut self, feature: NetworkFeature, interface: &str, addr: IpAddr) {
        if interface.is_empty() || !is_global(&addr) {
            tracing::trace!(interface, %addr, "Skipping address");
            return;
        }
        let apn = feature.apn();
        let Some(info) = self.network.get_network_info(feature) else {
            tracing::debug!(apn, "No network info, skipping global address");
            return;
        };
        if info.state != NetworkState::Connected {
            tracing::debug!(apn, state = ?info.state, "Network not connected, skipping global address");
            return;
        }
        let Some(bearer) = self.bearer.get_default_bearer_properties(apn) else {
            tracing::debug!(apn, "No default bearer, skipping global address");
            return;
        };
        let cid = bearer.default_cid;
        if !self.interfaces.contains_key(&cid) {
            tracing::debug!(apn, cid, "Default bearer not established with the peer, skipping global address");
            return;
        }

        tracing::info!(cid, network_id = info.network_id, %addr, interface, "Global address acquired");
        self.emit(reply::global_ip_notify(cid, info.network_id, &addr, interface));
    }
}
