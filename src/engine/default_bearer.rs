//! Default (PDN) bearer activation and deactivation.

use crate::backend::{
    DataState, DefaultBearerConfig, FeatureStartResult, LinkProperties, NetworkFeature, NetworkState,
};
use crate::error::{EngineError, Result};
use crate::event::InternalEvent;
use crate::message::{reply, DeactivationRequest, DefaultActivationRequest, FAILCAUSE_UNKNOWN};
use crate::model::PdpAddrType;
use crate::transaction::{RequestKind, TransactionParam};

use super::{Engine, INVALID_CID};

const EMERGENCY_IND_GENERAL: u8 = 1;
const EMERGENCY_IND_EMERGENCY: u8 = 2;

fn emergency_flag(emergency_ind: u8) -> Result<bool> {
    match emergency_ind {
        EMERGENCY_IND_GENERAL => Ok(false),
        EMERGENCY_IND_EMERGENCY => Ok(true),
        other => Err(EngineError::InvalidRequest(format!("emergency indication {other}"))),
    }
}

impl Engine {
    pub(super) fn handle_default_activation(&mut self, req: DefaultActivationRequest) {
        let tid = req.transaction_id;
        self.transactions.put(TransactionParam::new(tid, RequestKind::DefaultActivation));

        let is_emergency = match emergency_flag(req.emergency_ind) {
            Ok(flag) => flag,
            Err(e) => {
                tracing::error!(transaction_id = tid, "{}", e);
                self.reject_default_activation(tid, FAILCAUSE_UNKNOWN);
                return;
            }
        };
        self.transactions.update(tid, |p| p.is_emergency = is_emergency);

        let feature = NetworkFeature::for_emergency(is_emergency);
        let config = DefaultBearerConfig {
            valid: true,
            qos: req.qos,
            is_emergency,
            pcscf_discovery: req.pcscf_discovery,
            signaling_flag: req.signaling_flag,
        };
        if let Err(e) = self.bearer.set_default_bearer_config(feature.apn(), &config) {
            tracing::warn!(transaction_id = tid, "Failed to push default bearer config: {}", e);
        }

        match self.network.start_feature(feature) {
            FeatureStartResult::RequestStarted => {
                tracing::debug!(transaction_id = tid, ?feature, "Default bearer setup started");
            }
            FeatureStartResult::AlreadyActive => {
                let link = self.bearer.get_link_properties(feature.apn());
                self.respond_default_activation(tid, feature, link.as_ref());
            }
            FeatureStartResult::Failed(code) => {
                tracing::error!(transaction_id = tid, ?feature, code, "Network feature refused");
                self.reject_default_activation(tid, FAILCAUSE_UNKNOWN);
            }
        }
    }

    /// Answer a pending default activation from the bearer backend's view
    /// of the default bearer. Returns `true` if a response went out.
    pub(super) fn respond_default_activation(
        &mut self,
        tid: u8,
        feature: NetworkFeature,
        link: Option<&LinkProperties>,
    ) -> bool {
        let Some(param) = self.completable(tid) else {
            return false;
        };

        let bearer = match self.bearer.get_default_bearer_properties(feature.apn()) {
            Some(bearer) if !bearer.is_placeholder() => bearer,
            found => {
                tracing::error!(
                    transaction_id = tid,
                    ?feature,
                    placeholder = found.is_some(),
                    "No usable default bearer properties"
                );
                self.reject_default_activation(tid, FAILCAUSE_UNKNOWN);
                if param.is_emergency {
                    self.set_emergency_cid(INVALID_CID);
                }
                return false;
            }
        };

        let siblings = bearer
            .concatenated
            .iter()
            .filter(|c| c.default_cid != bearer.default_cid)
            .count();
        let pdn_count = (1 + siblings).min(u8::MAX as usize) as u8;
        let pdp_type = link.map_or(PdpAddrType::None, |l| PdpAddrType::from_addresses(&l.addresses));

        match link {
            Some(link) => {
                self.interfaces.insert(bearer.cid, link.interface_name.clone());
            }
            None => tracing::error!(transaction_id = tid, cid = bearer.cid, "Default bearer has no link properties"),
        }

        self.transactions.remove(tid);
        self.emit(reply::default_activation_response(tid, pdn_count, pdp_type, &bearer));
        if param.is_emergency {
            self.set_emergency_cid(bearer.cid);
        }
        true
    }

    /// Release the feature and schedule the reject after the debounce delay.
    /// The transaction stays pending, flagged terminating, until then.
    pub(super) fn reject_default_activation(&mut self, tid: u8, cause: i32) {
        let Some(param) = self.transactions.get(tid) else {
            tracing::warn!(transaction_id = tid, "Reject for a default activation that is not pending");
            return;
        };
        if let Err(e) = self.transactions.mark_terminating(tid) {
            tracing::debug!(transaction_id = tid, "Deferred reject already scheduled: {}", e);
            return;
        }

        let feature = NetworkFeature::for_emergency(param.is_emergency);
        let result = self.network.stop_feature(feature);
        let delay = self.config.reject_debounce();
        tracing::info!(transaction_id = tid, ?feature, result, cause, ?delay, "Rejecting default activation");

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.post_internal(InternalEvent::DebouncedReject {
                transaction_id: tid,
                cause,
            });
        });
    }

    pub(super) fn on_debounced_reject(&mut self, tid: u8, cause: i32) {
        match self.transactions.get(tid) {
            Some(param) if param.terminating && param.kind == RequestKind::DefaultActivation => {
                self.transactions.remove(tid);
                self.emit(reply::default_activation_reject(tid, cause));
            }
            Some(param) => {
                tracing::warn!(transaction_id = tid, kind = ?param.kind, "Transaction id reused before deferred reject, dropping it");
            }
            None => tracing::debug!(transaction_id = tid, "Deferred reject for a cleared transaction"),
        }
    }

    /// Reject every pending default activation. Returns how many were found,
    /// including ones already awaiting a reject.
    pub(super) fn reject_pending_default_activations(&mut self, cause: i32) -> usize {
        let mut found = 0;
        for tid in self.transactions.snapshot_ids() {
            let Some(param) = self.transactions.get(tid) else {
                continue;
            };
            if param.kind == RequestKind::DefaultActivation {
                found += 1;
                self.reject_default_activation(tid, cause);
            }
        }
        found
    }

    pub(super) fn handle_default_deactivation(&mut self, req: DeactivationRequest) {
        let tid = req.transaction_id;
        let mut is_emergency = req.cid_valid && self.emergency_cid != INVALID_CID && self.emergency_cid == req.cid;
        if !req.cid_valid {
            match self.transactions.get(req.abort_transaction_id) {
                Some(aborted) => is_emergency = aborted.is_emergency,
                None => tracing::warn!(
                    transaction_id = tid,
                    abort_transaction_id = req.abort_transaction_id,
                    "Aborted transaction is not pending"
                ),
            }
        }

        let feature = NetworkFeature::for_emergency(is_emergency);
        let result = self.network.stop_feature(feature);
        let cid = if req.cid_valid { req.cid } else { 0 };
        self.transactions.put(
            TransactionParam::new(tid, RequestKind::DefaultDeactivation)
                .with_cid(cid)
                .with_emergency(is_emergency),
        );
        tracing::debug!(transaction_id = tid, ?feature, result, cid, "Default bearer release requested");

        if result < 0 {
            self.complete(tid, |p| reply::default_deactivation_reject(p.transaction_id, 1));
            return;
        }

        let state = self.network.get_network_info(feature).map(|info| info.state);
        if matches!(state, Some(NetworkState::Disconnected | NetworkState::Connecting)) {
            if !req.cid_valid {
                let rejected = self.reject_pending_default_activations(FAILCAUSE_UNKNOWN);
                tracing::debug!(transaction_id = tid, rejected, "Aborted pending default activations");
            }
            self.respond_default_deactivation(tid);
        }
        if is_emergency {
            self.set_emergency_cid(INVALID_CID);
        }
    }

    fn respond_default_deactivation(&mut self, tid: u8) -> bool {
        let Some(param) = self.completable(tid) else {
            return false;
        };
        self.interfaces.remove(&param.cid);
        self.complete(tid, |p| reply::deactivation_response(p.transaction_id, p.cid))
    }

    pub(super) fn on_default_state_changed(
        &mut self,
        apn: &str,
        state: DataState,
        reason: Option<&str>,
        link: Option<&LinkProperties>,
        ims_changed: bool,
    ) {
        let Some(feature) = NetworkFeature::from_apn(apn) else {
            tracing::trace!(apn, ?state, "Ignoring state change of unrelated apn");
            return;
        };
        if !ims_changed {
            tracing::trace!(apn, ?state, "Ignoring state change without IMS impact");
            return;
        }
        tracing::debug!(apn, ?state, reason, "Default bearer state changed");

        let is_emergency = feature == NetworkFeature::Emergency;
        let mut matched = false;
        for tid in self.transactions.snapshot_ids() {
            let Some(param) = self.transactions.get(tid) else {
                continue;
            };
            if param.is_emergency != is_emergency {
                continue;
            }
            match (param.kind, state) {
                (RequestKind::DefaultActivation, _) if param.terminating => {
                    tracing::debug!(transaction_id = tid, ?state, "State change absorbed by pending reject");
                    matched = true;
                }
                (RequestKind::DefaultActivation, DataState::Connected) => {
                    matched = true;
                    if self.respond_default_activation(tid, feature, link) {
                        if let Some(link) = link {
                            self.notify_link_global_addresses(feature, link);
                        }
                    }
                }
                (RequestKind::DefaultActivation, DataState::Disconnected) => {
                    self.reject_default_activation(tid, FAILCAUSE_UNKNOWN);
                }
                (RequestKind::DefaultDeactivation, DataState::Disconnected) => {
                    matched = true;
                    match self.bearer.get_deactivated_cids(apn) {
                        Some(cids) if cids.first() == Some(&param.cid) => {
                            self.respond_default_deactivation(tid);
                            self.dhcp.interrupt_all();
                        }
                        Some(cids) => {
                            tracing::warn!(transaction_id = tid, cid = param.cid, ?cids, "Released cids do not match request");
                        }
                        None => {
                            self.respond_default_deactivation(tid);
                        }
                    }
                    if param.is_emergency {
                        self.set_emergency_cid(INVALID_CID);
                    }
                }
                _ => {}
            }
        }

        if !matched {
            match state {
                DataState::Disconnected => self.notify_default_disconnected(feature, reason),
                DataState::Connected => tracing::debug!(apn, "Default bearer connected without a pending request"),
                _ => {}
            }
        }
    }

    pub(super) fn on_default_connection_failed(&mut self, apn: &str, reason: Option<&str>) {
        let cause = self.bearer.get_last_fail_cause(apn);
        let found = self.reject_pending_default_activations(cause);
        if found == 0 {
            tracing::warn!(apn, reason, cause, "Default bearer setup failed with no pending activation");
        } else {
            tracing::info!(apn, reason, cause, found, "Default bearer setup failed");
        }
    }

    pub(super) fn on_deactivated_cids(&mut self, cids: Option<Vec<i32>>) {
        self.deactivated_cids = cids.unwrap_or_default();
        tracing::debug!(cids = ?self.deactivated_cids, "Stored released cids");
    }
}
