//! Dedicated bearer activation, deactivation and modification, plus the
//! routing of deactivation requests between default and dedicated bearers.
//!
//! Dedicated workflows are correlated with backend state events by the
//! handle (`ddc_id`) the backend returned when the workflow was started.

use crate::backend::{
    DedicatedState, IMS_APN, REASON_BEARER_ABORT, REASON_BEARER_DEACTIVATION, REASON_BEARER_MODIFICATION,
};
use crate::error::Result;
use crate::message::{
    reply, DeactivationRequest, DedicatedActivationRequest, DedicatedOp, ModificationRequest, CAUSE_FAILURE,
    FAILCAUSE_UNKNOWN,
};
use crate::model::DedicateBearerProperties;
use crate::transaction::{RequestKind, TransactionParam};

use super::{Engine, INVALID_CID};

/// A handle, or `-1` when the backend call itself failed.
fn handle_or_refused(what: &'static str, result: Result<i32>) -> i32 {
    result.unwrap_or_else(|e| {
        tracing::error!(what, "Bearer backend call failed: {}", e);
        -1
    })
}

impl Engine {
    pub(super) fn handle_deactivation(&mut self, req: DeactivationRequest) {
        let tid = req.transaction_id;
        let dedicated = if self.bearer.is_dedicated_bearer(req.cid) {
            true
        } else if !req.cid_valid {
            match self.transactions.get(req.abort_transaction_id) {
                Some(aborted) => aborted.kind != RequestKind::DefaultActivation,
                None => {
                    tracing::warn!(
                        transaction_id = tid,
                        abort_transaction_id = req.abort_transaction_id,
                        "Nothing to abort, rejecting deactivation"
                    );
                    self.transactions.remove(tid);
                    self.emit(reply::deactivation_reject(tid, CAUSE_FAILURE));
                    return;
                }
            }
        } else {
            false
        };

        if dedicated {
            self.handle_dedicated_deactivation(req);
        } else {
            self.handle_default_deactivation(req);
        }
    }

    fn handle_dedicated_deactivation(&mut self, req: DeactivationRequest) {
        let tid = req.transaction_id;
        let (cid, ddc_id) = if req.cid_valid {
            let result = self.bearer.disable_dedicated_bearer(REASON_BEARER_DEACTIVATION, req.cid);
            (req.cid, handle_or_refused("disable", result))
        } else {
            match self.transactions.get(req.abort_transaction_id) {
                Some(aborted) => {
                    let result = self.bearer.abort_enable_dedicated_bearer(REASON_BEARER_ABORT, aborted.ddc_id);
                    (INVALID_CID, handle_or_refused("abort", result))
                }
                None => {
                    tracing::warn!(transaction_id = tid, "Aborted dedicated transaction is gone");
                    (INVALID_CID, -1)
                }
            }
        };

        self.transactions.put(
            TransactionParam::new(tid, RequestKind::DedicatedDeactivation)
                .with_cid(cid)
                .with_ddc_id(ddc_id),
        );
        tracing::debug!(transaction_id = tid, cid, ddc_id, "Dedicated bearer release requested");
        if ddc_id < 0 {
            self.complete(tid, |p| reply::deactivation_reject(p.transaction_id, CAUSE_FAILURE));
        }
    }

    pub(super) fn handle_dedicated_activation(&mut self, req: DedicatedActivationRequest) {
        let tid = req.transaction_id;
        let result = self
            .bearer
            .enable_dedicated_bearer(IMS_APN, req.signaling, &req.qos, &req.tft);
        let ddc_id = handle_or_refused("enable", result);

        self.transactions
            .put(TransactionParam::new(tid, RequestKind::DedicatedActivation).with_ddc_id(ddc_id));
        tracing::debug!(transaction_id = tid, primary_cid = req.primary_cid, ddc_id, "Dedicated bearer requested");
        if ddc_id < 0 {
            self.complete(tid, |p| {
                reply::dedicated_reject(p.transaction_id, FAILCAUSE_UNKNOWN, DedicatedOp::Activation, None)
            });
        }
    }

    pub(super) fn handle_modification(&mut self, req: ModificationRequest) {
        let tid = req.transaction_id;
        let result = self
            .bearer
            .modify_dedicated_bearer(req.cid, req.qos.as_ref(), req.tft.as_ref());
        let ddc_id = handle_or_refused("modify", result);

        self.transactions.put(
            TransactionParam::new(tid, RequestKind::DedicatedModification)
                .with_cid(req.cid)
                .with_ddc_id(ddc_id),
        );
        if ddc_id < 0 {
            self.complete(tid, |p| {
                reply::dedicated_reject(p.transaction_id, FAILCAUSE_UNKNOWN, DedicatedOp::Modification, None)
            });
        }
    }

    pub(super) fn on_dedicated_state_changed(
        &mut self,
        ddc_id: i32,
        state: DedicatedState,
        property: &DedicateBearerProperties,
        fail_cause: i32,
        reason: Option<&str>,
    ) {
        tracing::debug!(ddc_id, ?state, cid = property.cid, fail_cause, reason, "Dedicated bearer state changed");

        let mut matched = false;
        for tid in self.transactions.snapshot_ids() {
            let Some(param) = self.transactions.get(tid) else {
                continue;
            };
            if !param.kind.is_dedicated() || param.ddc_id != ddc_id {
                continue;
            }
            matched = true;
            match param.kind {
                RequestKind::DedicatedActivation => match state {
                    DedicatedState::Connected if fail_cause == 0 => {
                        self.complete(tid, |p| {
                            reply::dedicated_response(p.transaction_id, DedicatedOp::Activation, property)
                        });
                    }
                    DedicatedState::Connected | DedicatedState::Failed | DedicatedState::Idle => {
                        self.complete(tid, |p| {
                            reply::dedicated_reject(p.transaction_id, fail_cause, DedicatedOp::Activation, Some(property))
                        });
                    }
                    _ => {}
                },
                RequestKind::DedicatedDeactivation => {
                    self.on_dedicated_release_state(&param, state, property, fail_cause, reason);
                }
                RequestKind::DedicatedModification => {
                    if param.cid != property.cid {
                        tracing::error!(transaction_id = tid, cid = param.cid, event_cid = property.cid, "Modified bearer mismatch");
                    } else if state == DedicatedState::Connected {
                        self.complete(tid, |p| {
                            reply::dedicated_response(p.transaction_id, DedicatedOp::Modification, property)
                        });
                    } else {
                        self.complete(tid, |p| {
                            reply::dedicated_reject(
                                p.transaction_id,
                                FAILCAUSE_UNKNOWN,
                                DedicatedOp::Modification,
                                Some(property),
                            )
                        });
                    }
                }
                _ => {}
            }
        }

        if !matched {
            self.on_network_dedicated_state(state, property, fail_cause, reason);
        }
    }

    fn on_dedicated_release_state(
        &mut self,
        param: &TransactionParam,
        state: DedicatedState,
        property: &DedicateBearerProperties,
        fail_cause: i32,
        reason: Option<&str>,
    ) {
        let tid = param.transaction_id;
        let released = if param.cid == property.cid {
            if reason == Some(REASON_BEARER_ABORT) {
                fail_cause == 0
            } else {
                state == DedicatedState::Idle
            }
        } else if property.cid == INVALID_CID {
            true
        } else {
            tracing::error!(transaction_id = tid, cid = param.cid, event_cid = property.cid, "Released bearer mismatch");
            return;
        };

        if released {
            self.complete(tid, |p| reply::deactivation_response(p.transaction_id, p.cid));
        } else {
            self.complete(tid, |p| reply::deactivation_reject(p.transaction_id, fail_cause));
        }
    }

    /// A state change the peer did not ask for.
    fn on_network_dedicated_state(
        &mut self,
        state: DedicatedState,
        property: &DedicateBearerProperties,
        fail_cause: i32,
        reason: Option<&str>,
    ) {
        match state {
            DedicatedState::Idle => self.notify_bearer_deactivated(property.cid, fail_cause),
            DedicatedState::Connected => {
                let op = if reason == Some(REASON_BEARER_MODIFICATION) {
                    DedicatedOp::Modification
                } else {
                    DedicatedOp::Activation
                };
                self.notify_dedicated(op, property);
            }
            DedicatedState::Failed => {
                tracing::warn!(cid = property.cid, fail_cause, "Network dedicated bearer failed");
            }
            other => tracing::debug!(cid = property.cid, state = ?other, "Ignoring dedicated bearer state"),
        }
    }
}
