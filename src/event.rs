//! Messages funnelled into the engine's dispatch queue.
//!
//! Inbound frames, backend callbacks and results of background work all
//! travel through one unbounded channel and are handled in arrival order by
//! a single task.

use std::net::IpAddr;

use tokio::sync::mpsc;

use crate::backend::{DataState, DedicatedState, LinkProperties};
use crate::error::{EngineError, Result};
use crate::model::{DedicateBearerProperties, PcscfInfo};
use crate::pcscf::DhcpOutcome;
use crate::protocol::Frame;

/// Outcome of a PCO-based P-CSCF discovery.
pub type PcoResult = std::result::Result<Option<PcscfInfo>, String>;

/// Asynchronous notifications from the backends.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A dedicated bearer changed state.
    DedicatedStateChanged {
        ddc_id: i32,
        state: DedicatedState,
        property: DedicateBearerProperties,
        fail_cause: i32,
        reason: Option<String>,
    },
    /// A default bearer changed state.
    DefaultStateChanged {
        apn_type: String,
        state: DataState,
        reason: Option<String>,
        link_properties: Option<LinkProperties>,
        ims_changed: bool,
    },
    /// A default bearer setup failed.
    DefaultConnectionFailed { apn_type: String, reason: Option<String> },
    /// PCO discovery finished.
    PcoDiscoveryDone { transaction_id: u8, outcome: PcoResult },
    /// A global address became available on a default bearer.
    GlobalIpAddress {
        apn_type: String,
        interface_name: String,
        address: IpAddr,
    },
    /// Context ids that were torn down with the default bearer.
    DeactivatedCids { cids: Option<Vec<i32>> },
}

/// Results the engine posts to itself.
#[derive(Debug)]
pub(crate) enum InternalEvent {
    /// Deferred default-activation reject is due.
    DebouncedReject { transaction_id: u8, cause: i32 },
    /// A DHCP discovery worker finished.
    DhcpCompleted {
        transaction_id: u8,
        worker_id: u64,
        outcome: DhcpOutcome,
    },
}

#[derive(Debug)]
pub(crate) enum Dispatch {
    Frame(Frame),
    Backend(BackendEvent),
    Internal(InternalEvent),
    Enable,
    Disable,
    Shutdown,
}

/// Cloneable handle for posting backend events into a running engine.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Dispatch>) -> Self {
        Self { tx }
    }

    /// Post a backend event.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` once the engine has shut down.
    pub fn send(&self, event: BackendEvent) -> Result<()> {
        self.post(Dispatch::Backend(event))
    }

    pub(crate) fn post(&self, dispatch: Dispatch) -> Result<()> {
        self.tx.send(dispatch).map_err(|_| EngineError::ConnectionClosed)
    }

    pub(crate) fn post_internal(&self, event: InternalEvent) {
        if self.post(Dispatch::Internal(event)).is_err() {
            tracing::debug!("Engine stopped, dropping internal event");
        }
    }

    /// Completion callback for a PCO discovery of `transaction_id`.
    pub fn pco_completion(&self, transaction_id: u8) -> PcoCompletion {
        PcoCompletion {
            transaction_id,
            sender: self.clone(),
        }
    }
}

/// One-shot completion handed to
/// [`BearerControlBackend::discover_pcscf_via_pco`](crate::backend::BearerControlBackend::discover_pcscf_via_pco).
#[derive(Debug)]
pub struct PcoCompletion {
    transaction_id: u8,
    sender: EventSender,
}

impl PcoCompletion {
    pub fn transaction_id(&self) -> u8 {
        self.transaction_id
    }

    /// Report the discovery outcome.
    pub fn complete(self, outcome: PcoResult) -> Result<()> {
        self.sender.send(BackendEvent::PcoDiscoveryDone {
            transaction_id: self.transaction_id,
            outcome,
        })
    }
}
