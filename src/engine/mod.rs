//! The bearer protocol engine.
//!
//! [`Engine`] owns every piece of mutable state: the transaction table, the
//! cid to interface-name table, the emergency context id, the stored list of
//! deactivated cids and the DHCP workers. It is driven by exactly one task
//! (see [`runtime`]) that feeds it [`Dispatch`] messages in arrival order.
//! Handlers never write to the socket; they queue frames in an outbox that
//! the runtime drains after each message.
//!
//! Workflows live in their own files:
//! - `default_bearer`: default (PDN) activation and deactivation
//! - `dedicated_bearer`: dedicated activation, deactivation and modification
//! - `pcscf`: P-CSCF discovery
//! - `notify`: unsolicited notifications and global addresses

mod dedicated_bearer;
mod default_bearer;
mod notify;
mod pcscf;
pub mod runtime;

#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BearerControlBackend, IsimSource, NetworkBackend, NetworkFeature, SipDiscovery};
use crate::config::EngineConfig;
use crate::event::{BackendEvent, Dispatch, EventSender, InternalEvent};
use crate::message::{reply, DedicatedOp, Request, CAUSE_FAILURE};
use crate::pcscf::DhcpWorkers;
use crate::protocol::Frame;
use crate::transaction::{TransactionParam, TransactionTable};

pub use runtime::{EngineBuilder, EngineHandle};

/// Context id meaning "none".
pub const INVALID_CID: i32 = -1;

/// Collaborators an engine is built with.
#[derive(Clone)]
pub struct Backends {
    pub bearer: Arc<dyn BearerControlBackend>,
    pub network: Arc<dyn NetworkBackend>,
    pub sip: Option<Arc<dyn SipDiscovery>>,
    pub isim: Option<Arc<dyn IsimSource>>,
}

impl Backends {
    pub fn new(bearer: Arc<dyn BearerControlBackend>, network: Arc<dyn NetworkBackend>) -> Self {
        Self {
            bearer,
            network,
            sip: None,
            isim: None,
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("sip", &self.sip.is_some())
            .field("isim", &self.isim.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) struct Engine {
    bearer: Arc<dyn BearerControlBackend>,
    network: Arc<dyn NetworkBackend>,
    isim: Option<Arc<dyn IsimSource>>,
    config: EngineConfig,
    events: EventSender,
    transactions: TransactionTable,
    /// Interface name of each established default bearer, by cid.
    interfaces: HashMap<i32, String>,
    emergency_cid: i32,
    deactivated_cids: Vec<i32>,
    dhcp: DhcpWorkers,
    outbox: Vec<Frame>,
    enabled: bool,
}

impl Engine {
    pub(crate) fn new(backends: Backends, config: EngineConfig, events: EventSender) -> Self {
        Self {
            bearer: backends.bearer,
            network: backends.network,
            isim: backends.isim,
            config,
            events,
            transactions: TransactionTable::new(),
            interfaces: HashMap::new(),
            emergency_cid: INVALID_CID,
            deactivated_cids: Vec::new(),
            dhcp: DhcpWorkers::new(backends.sip),
            outbox: Vec::new(),
            enabled: false,
        }
    }

    /// Handle one queued message.
    pub(crate) fn dispatch(&mut self, message: Dispatch) {
        match message {
            Dispatch::Enable => self.enable(),
            Dispatch::Disable => self.disable(),
            Dispatch::Shutdown => {}
            // Results of work started while enabled are always consumed.
            Dispatch::Internal(event) => self.on_internal_event(event),
            Dispatch::Frame(frame) if !self.enabled => {
                tracing::warn!(message_id = frame.message_id(), "Engine disabled, dropping frame");
            }
            Dispatch::Backend(event) if !self.enabled => {
                tracing::debug!(?event, "Engine disabled, dropping backend event");
            }
            Dispatch::Frame(frame) => self.on_frame(&frame),
            Dispatch::Backend(event) => self.on_backend_event(event),
        }
    }

    /// Frames produced since the last call.
    pub(crate) fn take_outbox(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.outbox)
    }

    fn enable(&mut self) {
        tracing::info!("Engine enabled");
        self.enabled = true;
    }

    fn disable(&mut self) {
        tracing::info!(
            pending = self.transactions.len(),
            interfaces = self.interfaces.len(),
            "Engine disabled, clearing state"
        );
        self.enabled = false;
        self.interfaces.clear();
        self.transactions.clear();
        self.dhcp.interrupt_all();
        for feature in [NetworkFeature::Ims, NetworkFeature::Emergency] {
            let result = self.network.stop_feature(feature);
            tracing::debug!(?feature, result, "Stopped network feature");
        }
    }

    fn on_frame(&mut self, frame: &Frame) {
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(message_id = frame.message_id(), len = frame.payload_len(), "Dropping frame: {}", e);
                return;
            }
        };
        let tid = request.transaction_id();
        tracing::debug!(transaction_id = tid, message_id = frame.message_id(), "Request received");

        if let Some(pending) = self.transactions.get(tid) {
            tracing::error!(
                transaction_id = tid,
                message_id = frame.message_id(),
                pending_kind = ?pending.kind,
                "Transaction id already pending, rejecting the new request"
            );
            self.emit(duplicate_reject(&request));
            return;
        }

        match request {
            Request::DefaultActivation(req) => self.handle_default_activation(req),
            Request::Deactivation(req) => self.handle_deactivation(req),
            Request::DedicatedActivation(req) => self.handle_dedicated_activation(req),
            Request::Modification(req) => self.handle_modification(req),
            Request::PcscfDiscovery(req) => self.handle_pcscf_discovery(req),
        }
    }

    fn on_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::DedicatedStateChanged {
                ddc_id,
                state,
                property,
                fail_cause,
                reason,
            } => self.on_dedicated_state_changed(ddc_id, state, &property, fail_cause, reason.as_deref()),
            BackendEvent::DefaultStateChanged {
                apn_type,
                state,
                reason,
                link_properties,
                ims_changed,
            } => self.on_default_state_changed(&apn_type, state, reason.as_deref(), link_properties.as_ref(), ims_changed),
            BackendEvent::DefaultConnectionFailed { apn_type, reason } => {
                self.on_default_connection_failed(&apn_type, reason.as_deref())
            }
            BackendEvent::PcoDiscoveryDone { transaction_id, outcome } => self.on_pco_done(transaction_id, outcome),
            BackendEvent::GlobalIpAddress {
                apn_type,
                interface_name,
                address,
            } => self.on_global_ip_address(&apn_type, &interface_name, address),
            BackendEvent::DeactivatedCids { cids } => self.on_deactivated_cids(cids),
        }
    }

    fn on_internal_event(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::DebouncedReject { transaction_id, cause } => self.on_debounced_reject(transaction_id, cause),
            InternalEvent::DhcpCompleted {
                transaction_id,
                worker_id,
                outcome,
            } => self.on_dhcp_completed(transaction_id, worker_id, outcome),
        }
    }

    fn emit(&mut self, frame: Frame) {
        tracing::debug!(message_id = frame.message_id(), len = frame.payload_len(), "Queueing frame");
        self.outbox.push(frame);
    }

    /// A transaction that can still be completed.
    fn completable(&self, transaction_id: u8) -> Option<TransactionParam> {
        match self.transactions.get(transaction_id) {
            Some(param) if param.terminating => {
                tracing::debug!(transaction_id, "Transaction awaiting deferred reject, ignoring completion");
                None
            }
            Some(param) => Some(param),
            None => {
                tracing::warn!(transaction_id, "Completion for a transaction that is not pending, ignoring");
                None
            }
        }
    }

    /// Remove a pending transaction and emit its terminal frame. Returns
    /// `false` if nothing was sent.
    fn complete<F>(&mut self, transaction_id: u8, build: F) -> bool
    where
        F: FnOnce(&TransactionParam) -> Frame,
    {
        let Some(param) = self.completable(transaction_id) else {
            return false;
        };
        self.transactions.remove(transaction_id);
        let frame = build(&param);
        self.emit(frame);
        true
    }

    fn set_emergency_cid(&mut self, cid: i32) {
        tracing::debug!(cid, "Emergency cid updated");
        self.emergency_cid = cid;
    }
}

/// Reject for a request whose transaction id is still pending. The pending
/// transaction is left untouched.
fn duplicate_reject(request: &Request) -> Frame {
    let tid = request.transaction_id();
    match request {
        Request::DefaultActivation(_) => reply::default_activation_reject(tid, CAUSE_FAILURE),
        Request::Deactivation(_) => reply::deactivation_reject(tid, CAUSE_FAILURE),
        Request::DedicatedActivation(_) => reply::dedicated_reject(tid, CAUSE_FAILURE, DedicatedOp::Activation, None),
        Request::Modification(_) => reply::dedicated_reject(tid, CAUSE_FAILURE, DedicatedOp::Modification, None),
        Request::PcscfDiscovery(_) => reply::pcscf_reject(tid, CAUSE_FAILURE),
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("enabled", &self.enabled)
            .field("transactions", &self.transactions)
            .field("interfaces", &self.interfaces)
            .field("emergency_cid", &self.emergency_cid)
            .field("dhcp", &self.dhcp)
            .finish_non_exhaustive()
    }
}
