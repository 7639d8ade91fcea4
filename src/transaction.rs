//! Pending peer transactions keyed by the peer-assigned transaction id.
//!
//! Every inbound request creates one [`TransactionParam`]. It stays in the
//! table until exactly one response or reject is emitted for it. Backend
//! callbacks are correlated by scanning a [`TransactionTable::snapshot_ids`]
//! copy and re-fetching each entry, so a handler that completes one
//! transaction while the scan runs cannot invalidate the iteration.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{EngineError, Result};

/// Which workflow a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    DefaultActivation,
    DefaultDeactivation,
    DedicatedActivation,
    DedicatedDeactivation,
    DedicatedModification,
    PcscfDiscovery,
}

impl RequestKind {
    /// Dedicated workflows are correlated by backend handle.
    pub fn is_dedicated(self) -> bool {
        matches!(
            self,
            Self::DedicatedActivation | Self::DedicatedDeactivation | Self::DedicatedModification
        )
    }
}

/// State kept for one pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParam {
    pub transaction_id: u8,
    pub kind: RequestKind,
    pub cid: i32,
    /// Dedicated bearer handle assigned by the backend.
    pub ddc_id: i32,
    pub is_emergency: bool,
    /// Set while a deferred reject is pending. Such a transaction still
    /// matches backend events but can no longer be completed by them.
    pub terminating: bool,
}

impl TransactionParam {
    pub fn new(transaction_id: u8, kind: RequestKind) -> Self {
        Self {
            transaction_id,
            kind,
            cid: -1,
            ddc_id: -1,
            is_emergency: false,
            terminating: false,
        }
    }

    pub fn with_cid(mut self, cid: i32) -> Self {
        self.cid = cid;
        self
    }

    pub fn with_ddc_id(mut self, ddc_id: i32) -> Self {
        self.ddc_id = ddc_id;
        self
    }

    pub fn with_emergency(mut self, is_emergency: bool) -> Self {
        self.is_emergency = is_emergency;
        self
    }
}

/// Table of pending transactions. All operations take a single table-wide lock.
#[derive(Debug, Default)]
pub struct TransactionTable {
    entries: Mutex<HashMap<u8, TransactionParam>>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u8, TransactionParam>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a transaction. A live entry with the same id is replaced and
    /// returned; the engine rejects a reused id before it gets here.
    pub fn put(&self, param: TransactionParam) -> Option<TransactionParam> {
        let id = param.transaction_id;
        let previous = self.lock().insert(id, param);
        if let Some(prev) = &previous {
            tracing::warn!(
                transaction_id = id,
                previous_kind = ?prev.kind,
                "Transaction id reused while still pending, replacing"
            );
        }
        previous
    }

    pub fn get(&self, id: u8) -> Option<TransactionParam> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.lock().contains_key(&id)
    }

    /// Remove a transaction. Removing an absent id is a no-op.
    pub fn remove(&self, id: u8) -> Option<TransactionParam> {
        self.lock().remove(&id)
    }

    /// Remove a transaction that must be pending.
    ///
    /// # Errors
    ///
    /// `UnknownTransaction` when the id is absent.
    pub fn take(&self, id: u8) -> Result<TransactionParam> {
        self.remove(id).ok_or(EngineError::UnknownTransaction(id))
    }

    /// Apply `f` to a pending transaction. Returns `false` when absent.
    pub fn update<F>(&self, id: u8, f: F) -> bool
    where
        F: FnOnce(&mut TransactionParam),
    {
        match self.lock().get_mut(&id) {
            Some(param) => {
                f(param);
                true
            }
            None => false,
        }
    }

    /// Flag a transaction as awaiting a deferred reject.
    ///
    /// # Errors
    ///
    /// `UnknownTransaction` when absent, `AlreadyTerminal` when already flagged.
    pub fn mark_terminating(&self, id: u8) -> Result<()> {
        let mut entries = self.lock();
        let param = entries.get_mut(&id).ok_or(EngineError::UnknownTransaction(id))?;
        if param.terminating {
            return Err(EngineError::AlreadyTerminal(id));
        }
        param.terminating = true;
        Ok(())
    }

    /// Point-in-time copy of the pending ids, in ascending order.
    pub fn snapshot_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let table = TransactionTable::new();
        let param = TransactionParam::new(5, RequestKind::DedicatedActivation).with_ddc_id(12);
        assert!(table.put(param.clone()).is_none());
        assert_eq!(table.get(5), Some(param));
        assert!(table.contains(5));
    }

    #[test]
    fn test_defaults() {
        let param = TransactionParam::new(1, RequestKind::PcscfDiscovery);
        assert_eq!(param.cid, -1);
        assert_eq!(param.ddc_id, -1);
        assert!(!param.is_emergency);
        assert!(!param.terminating);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let table = TransactionTable::new();
        table.put(TransactionParam::new(2, RequestKind::DefaultActivation));

        assert!(table.remove(2).is_some());
        assert!(table.get(2).is_none());
        assert!(table.remove(2).is_none());
        assert!(matches!(table.take(2), Err(EngineError::UnknownTransaction(2))));
    }

    #[test]
    fn test_put_replaces_live_entry() {
        let table = TransactionTable::new();
        table.put(TransactionParam::new(3, RequestKind::DefaultActivation));
        let previous = table.put(TransactionParam::new(3, RequestKind::PcscfDiscovery));

        assert_eq!(previous.map(|p| p.kind), Some(RequestKind::DefaultActivation));
        assert_eq!(table.get(3).map(|p| p.kind), Some(RequestKind::PcscfDiscovery));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let table = TransactionTable::new();
        for id in [9, 1, 4] {
            table.put(TransactionParam::new(id, RequestKind::DefaultActivation));
        }

        let ids = table.snapshot_ids();
        assert_eq!(ids, vec![1, 4, 9]);

        let mut visited = Vec::new();
        for id in ids {
            let Some(param) = table.get(id) else { continue };
            // Completing the first entry also removes a sibling mid-scan.
            if param.transaction_id == 1 {
                table.remove(4);
            }
            visited.push(id);
        }
        assert_eq!(visited, vec![1, 9]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_mark_terminating_once() {
        let table = TransactionTable::new();
        table.put(TransactionParam::new(7, RequestKind::DefaultActivation));

        table.mark_terminating(7).unwrap();
        assert!(table.get(7).unwrap().terminating);
        assert!(matches!(table.mark_terminating(7), Err(EngineError::AlreadyTerminal(7))));
        assert!(matches!(table.mark_terminating(8), Err(EngineError::UnknownTransaction(8))));
    }

    #[test]
    fn test_update_and_clear() {
        let table = TransactionTable::new();
        table.put(TransactionParam::new(1, RequestKind::DefaultDeactivation));
        assert!(table.update(1, |p| p.cid = 4));
        assert!(!table.update(2, |p| p.cid = 4));
        assert_eq!(table.get(1).unwrap().cid, 4);

        table.clear();
        assert!(table.is_empty());
    }
}
