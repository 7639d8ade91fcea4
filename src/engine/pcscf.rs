//! P-CSCF discovery requests.

use crate::backend::IMS_APN;
use crate::event::PcoResult;
use crate::message::{reply, PcscfDiscoveryRequest, CAUSE_FAILURE};
use crate::model::{AcquireMethod, PcscfInfo};
use crate::pcscf::DhcpOutcome;
use crate::transaction::{RequestKind, TransactionParam};

use super::Engine;

impl Engine {
    pub(super) fn handle_pcscf_discovery(&mut self, req: PcscfDiscoveryRequest) {
        let tid = req.transaction_id;
        self.transactions
            .put(TransactionParam::new(tid, RequestKind::PcscfDiscovery).with_cid(req.cid));

        let method = match AcquireMethod::try_from(req.method) {
            Ok(method) => method,
            Err(raw) => {
                tracing::warn!(transaction_id = tid, method = raw, "Unknown P-CSCF discovery method");
                self.reject_pcscf(tid);
                return;
            }
        };
        tracing::debug!(transaction_id = tid, cid = req.cid, interface = %req.interface_name, ?method, "P-CSCF discovery requested");

        match method {
            AcquireMethod::None | AcquireMethod::Mo => {
                tracing::info!(transaction_id = tid, ?method, "P-CSCF discovery method not supported");
                self.reject_pcscf(tid);
            }
            AcquireMethod::Sim => {
                let addresses = self.isim.as_ref().and_then(|isim| isim.isim_pcscf()).unwrap_or_default();
                let info = PcscfInfo::from_addresses(AcquireMethod::Sim, addresses.as_slice());
                self.respond_pcscf(tid, info);
            }
            AcquireMethod::Pco => {
                let completion = self.events.pco_completion(tid);
                if let Err(e) = self.bearer.discover_pcscf_via_pco(IMS_APN, req.cid, completion) {
                    tracing::error!(transaction_id = tid, cid = req.cid, "PCO discovery not started: {}", e);
                    self.reject_pcscf(tid);
                }
            }
            AcquireMethod::DhcpV4 | AcquireMethod::DhcpV6 => {
                let events = self.events.clone();
                match self.dhcp.spawn(tid, &req.interface_name, method, events) {
                    Ok(worker_id) => tracing::debug!(transaction_id = tid, worker_id, "DHCP discovery started"),
                    Err(e) => {
                        tracing::error!(transaction_id = tid, "DHCP discovery not started: {}", e);
                        self.reject_pcscf(tid);
                    }
                }
            }
            AcquireMethod::Manual => {
                let info = self.config.manual_pcscf().map(|(address, port)| {
                    let mut info = PcscfInfo::new(AcquireMethod::Manual);
                    info.add(address, port);
                    info
                });
                self.respond_pcscf(tid, info.unwrap_or_else(|| PcscfInfo::new(AcquireMethod::Manual)));
            }
        }
    }

    pub(super) fn on_pco_done(&mut self, tid: u8, outcome: PcoResult) {
        if !self.is_pending_pcscf(tid) {
            return;
        }
        match outcome {
            Ok(Some(info)) => self.respond_pcscf(tid, info),
            Ok(None) => {
                tracing::info!(transaction_id = tid, "PCO carried no P-CSCF");
                self.reject_pcscf(tid);
            }
            Err(e) => {
                tracing::warn!(transaction_id = tid, "PCO discovery failed: {}", e);
                self.reject_pcscf(tid);
            }
        }
    }

    pub(super) fn on_dhcp_completed(&mut self, tid: u8, worker_id: u64, outcome: DhcpOutcome) {
        if !self.dhcp.finish(worker_id) {
            tracing::debug!(transaction_id = tid, worker_id, "Completion from an untracked DHCP worker");
        }
        if !self.is_pending_pcscf(tid) {
            return;
        }
        match outcome {
            Ok(info) => self.respond_pcscf(tid, info),
            Err(failure) => {
                tracing::info!(transaction_id = tid, worker_id, ?failure, "DHCP P-CSCF discovery failed");
                self.reject_pcscf(tid);
            }
        }
    }

    /// Responds with `info`, or rejects when it holds no address.
    fn respond_pcscf(&mut self, tid: u8, info: PcscfInfo) {
        if info.is_empty() {
            tracing::info!(transaction_id = tid, source = ?info.source, "No P-CSCF address found");
            self.reject_pcscf(tid);
            return;
        }
        self.complete(tid, |p| reply::pcscf_response(p.transaction_id, &info));
    }

    fn reject_pcscf(&mut self, tid: u8) {
        self.complete(tid, |p| reply::pcscf_reject(p.transaction_id, CAUSE_FAILURE));
    }

    fn is_pending_pcscf(&self, tid: u8) -> bool {
        match self.transactions.get(tid) {
            Some(param) if param.kind == RequestKind::PcscfDiscovery => true,
            Some(param) => {
                tracing::warn!(transaction_id = tid, kind = ?param.kind, "Discovery result for a reused transaction id, dropping it");
                false
            }
            None => {
                tracing::debug!(transaction_id = tid, "Discovery result for a finished transaction");
                false
            }
        }
    }
}
