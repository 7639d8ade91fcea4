//! DHCP-based P-CSCF discovery workers.
//!
//! Each DHCP discovery runs [`run_dhcp_discovery`] on a blocking thread and
//! posts its outcome back into the dispatch queue. Workers are serialized
//! by a shared lock, so at most one pass talks to the SIP backend at a time.

mod dhcp;

pub use dhcp::{run_dhcp_discovery, DhcpFailure, DhcpOutcome, SIP_SERVICE_TYPES};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::SipDiscovery;
use crate::error::{EngineError, Result};
use crate::event::{EventSender, InternalEvent};
use crate::model::AcquireMethod;

#[derive(Debug)]
struct LiveWorker {
    transaction_id: u8,
    interface: String,
    cancel: Arc<AtomicBool>,
}

/// Tracks the DHCP workers of one engine.
pub(crate) struct DhcpWorkers {
    sip: Option<Arc<dyn SipDiscovery>>,
    serial: Arc<Mutex<()>>,
    live: HashMap<u64, LiveWorker>,
    next_id: u64,
}

impl DhcpWorkers {
    pub(crate) fn new(sip: Option<Arc<dyn SipDiscovery>>) -> Self {
        Self {
            sip,
            serial: Arc::new(Mutex::new(())),
            live: HashMap::new(),
            next_id: 0,
        }
    }

    /// Start a discovery pass for `transaction_id`. Returns the worker id
    /// carried by the completion event.
    pub(crate) fn spawn(
        &mut self,
        transaction_id: u8,
        interface: &str,
        method: AcquireMethod,
        events: EventSender,
    ) -> Result<u64> {
        let sip = self
            .sip
            .clone()
            .ok_or_else(|| EngineError::BackendUnavailable("no SIP discovery backend".into()))?;

        self.next_id += 1;
        let worker_id = self.next_id;
        let cancel = Arc::new(AtomicBool::new(false));
        self.live.insert(
            worker_id,
            LiveWorker {
                transaction_id,
                interface: interface.to_string(),
                cancel: Arc::clone(&cancel),
            },
        );

        let serial = Arc::clone(&self.serial);
        let interface = interface.to_string();
        tokio::task::spawn_blocking(move || {
            let _guard = serial.lock().unwrap_or_else(PoisonError::into_inner);
            tracing::debug!(transaction_id, worker_id, %interface, ?method, "DHCP P-CSCF worker started");

            let outcome = if cancel.load(Ordering::Acquire) {
                Err(DhcpFailure::Interrupted { after: "start" })
            } else {
                sip.clear_sip_info(&interface);
                run_dhcp_discovery(sip.as_ref(), &interface, method, &cancel)
            };

            tracing::debug!(transaction_id, worker_id, ok = outcome.is_ok(), "DHCP P-CSCF worker finished");
            events.post_internal(InternalEvent::DhcpCompleted {
                transaction_id,
                worker_id,
                outcome,
            });
        });
        Ok(worker_id)
    }

    /// Forget a finished worker. Returns `false` for an unknown id.
    pub(crate) fn finish(&mut self, worker_id: u64) -> bool {
        self.live.remove(&worker_id).is_some()
    }

    /// Cancel every live worker and clear its interface's SIP state.
    pub(crate) fn interrupt_all(&mut self) {
        for (worker_id, worker) in &self.live {
            if worker.cancel.swap(true, Ordering::AcqRel) {
                continue;
            }
            tracing::info!(
                worker_id,
                transaction_id = worker.transaction_id,
                interface = %worker.interface,
                "Interrupting DHCP P-CSCF discovery"
            );
            if let Some(sip) = &self.sip {
                sip.clear_sip_info(&worker.interface);
            }
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl std::fmt::Debug for DhcpWorkers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhcpWorkers")
            .field("has_backend", &self.sip.is_some())
            .field("live", &self.live)
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IpFamily, SipServer};
    use crate::event::Dispatch;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct OneServer {
        clears: Mutex<Vec<String>>,
    }

    impl SipDiscovery for OneServer {
        fn do_sip_dhcp_request(&self, _interface: &str) -> bool {
            true
        }

        fn get_sip_info(&self, _interface: &str, service: &str, _family: IpFamily) -> Option<SipServer> {
            (service == "SIP+D2U").then(|| SipServer {
                host: "10.1.1.1".into(),
                port: 5060,
            })
        }

        fn clear_sip_info(&self, interface: &str) {
            self.clears.lock().unwrap().push(interface.to_string());
        }
    }

    #[tokio::test]
    async fn test_worker_posts_completion() {
        let sip = Arc::new(OneServer::default());
        let mut workers = DhcpWorkers::new(Some(sip.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = workers
            .spawn(4, "ccmni1", AcquireMethod::DhcpV4, EventSender::new(tx))
            .unwrap();
        assert_eq!(workers.live_count(), 1);

        match rx.recv().await {
            Some(Dispatch::Internal(InternalEvent::DhcpCompleted {
                transaction_id,
                worker_id,
                outcome,
            })) => {
                assert_eq!(transaction_id, 4);
                assert_eq!(worker_id, id);
                assert_eq!(outcome.unwrap().v4_addrs[0].address, "10.1.1.1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(workers.finish(id));
        assert!(!workers.finish(id));
        assert_eq!(sip.clears.lock().unwrap().as_slice(), ["ccmni1"]);
    }

    #[test]
    fn test_spawn_without_backend_fails() {
        let mut workers = DhcpWorkers::new(None);
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = workers
            .spawn(1, "ccmni0", AcquireMethod::DhcpV6, EventSender::new(tx))
            .unwrap_err();
        assert!(matches!(err, EngineError::BackendUnavailable(_)));
        assert_eq!(workers.live_count(), 0);
    }
}
