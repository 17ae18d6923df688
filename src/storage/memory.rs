//! In-Memory Storage Implementation
//!
//! Keyed maps with secondary indexes by owner and by Bitcoin address.
//! Snapshots can be taken to and restored from JSON.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::traits::{PodStore, PodWrite, StorageError, StorageResult};
use crate::pod::Pod;
use crate::types::{AccountId, DepositRequest, PodId, WithdrawalContext};

/// In-memory pod store
///
/// Not internally synchronized; the manager owning it serializes access.
#[derive(Debug, Clone, Default)]
pub struct MemoryPodStore {
    /// Pods indexed by ID
    pods: HashMap<PodId, Pod>,
    /// Index: owner -> pod ID
    by_owner: HashMap<AccountId, PodId>,
    /// Index: bitcoin address -> pod ID
    by_address: HashMap<String, PodId>,
    delegations: HashMap<PodId, AccountId>,
    deposit_requests: HashMap<PodId, DepositRequest>,
    withdrawal_contexts: HashMap<PodId, WithdrawalContext>,
}

/// Serialized form of the store; secondary indexes are rebuilt on load
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    pods: Vec<Pod>,
    delegations: BTreeMap<PodId, AccountId>,
    deposit_requests: BTreeMap<PodId, DepositRequest>,
    withdrawal_contexts: BTreeMap<PodId, WithdrawalContext>,
}

impl MemoryPodStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_pod(&self, pod: &PodId) -> StorageResult<()> {
        if !self.pods.contains_key(pod) {
            return Err(StorageError::NotFound(pod.to_string()));
        }
        Ok(())
    }

    /// Owner and address are immutable, so the indexes stay valid
    fn check_immutable_fields(&self, pod: &Pod) -> StorageResult<()> {
        let existing = self
            .pods
            .get(pod.id())
            .ok_or_else(|| StorageError::NotFound(pod.id().to_string()))?;

        if existing.owner() != pod.owner() || existing.bitcoin_address() != pod.bitcoin_address() {
            return Err(StorageError::InvalidData(format!(
                "immutable fields changed on {}",
                pod.id()
            )));
        }
        Ok(())
    }

    /// Only pending deposit requests are stored
    fn check_pending(request: Option<&DepositRequest>) -> StorageResult<()> {
        match request {
            Some(request) if !request.is_pending => Err(StorageError::InvalidData(format!(
                "settled deposit request {}",
                request.tx_id_hex()
            ))),
            _ => Ok(()),
        }
    }

    /// Serialize the whole store
    pub fn to_json(&self) -> StorageResult<String> {
        let mut pods: Vec<Pod> = self.pods.values().cloned().collect();
        pods.sort_by(|a, b| a.id().cmp(b.id()));

        let snapshot = Snapshot {
            pods,
            delegations: self.delegations.clone().into_iter().collect(),
            deposit_requests: self.deposit_requests.clone().into_iter().collect(),
            withdrawal_contexts: self.withdrawal_contexts.clone().into_iter().collect(),
        };

        serde_json::to_string_pretty(&snapshot).map_err(|e| StorageError::InvalidData(e.to_string()))
    }

    /// Restore a store from `to_json` output
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| StorageError::InvalidData(e.to_string()))?;

        let mut store = Self::new();
        for pod in snapshot.pods {
            store.insert_pod(pod)?;
        }
        for (pod, app) in snapshot.delegations {
            store.set_delegated_app(&pod, Some(app))?;
        }
        for (pod, request) in snapshot.deposit_requests {
            store.set_deposit_request(&pod, Some(request))?;
        }
        for (pod, context) in snapshot.withdrawal_contexts {
            store.set_withdrawal_context(&pod, Some(context))?;
        }

        Ok(store)
    }
}

impl PodStore for MemoryPodStore {
    fn insert_pod(&mut self, pod: Pod) -> StorageResult<()> {
        if self.pods.contains_key(pod.id()) {
            return Err(StorageError::Duplicate(format!("ID: {}", pod.id())));
        }
        if self.by_owner.contains_key(pod.owner()) {
            return Err(StorageError::Duplicate(format!("owner: {}", pod.owner())));
        }
        if self.by_address.contains_key(pod.bitcoin_address()) {
            return Err(StorageError::Duplicate(format!(
                "BTC address: {}",
                pod.bitcoin_address()
            )));
        }

        self.by_owner.insert(pod.owner().clone(), pod.id().clone());
        self.by_address
            .insert(pod.bitcoin_address().to_string(), pod.id().clone());
        self.pods.insert(pod.id().clone(), pod);

        Ok(())
    }

    fn update_pod(&mut self, pod: Pod) -> StorageResult<()> {
        self.check_immutable_fields(&pod)?;
        self.pods.insert(pod.id().clone(), pod);
        Ok(())
    }

    fn get_pod(&self, id: &PodId) -> StorageResult<Option<Pod>> {
        Ok(self.pods.get(id).cloned())
    }

    fn pod_of_owner(&self, owner: &AccountId) -> StorageResult<Option<PodId>> {
        Ok(self.by_owner.get(owner).cloned())
    }

    fn pod_by_address(&self, bitcoin_address: &str) -> StorageResult<Option<PodId>> {
        Ok(self.by_address.get(bitcoin_address).cloned())
    }

    fn delegated_app(&self, pod: &PodId) -> StorageResult<Option<AccountId>> {
        Ok(self.delegations.get(pod).cloned())
    }

    fn set_delegated_app(&mut self, pod: &PodId, app: Option<AccountId>) -> StorageResult<()> {
        self.require_pod(pod)?;
        match app {
            Some(app) => self.delegations.insert(pod.clone(), app),
            None => self.delegations.remove(pod),
        };
        Ok(())
    }

    fn deposit_request(&self, pod: &PodId) -> StorageResult<Option<DepositRequest>> {
        Ok(self.deposit_requests.get(pod).cloned())
    }

    fn set_deposit_request(
        &mut self,
        pod: &PodId,
        request: Option<DepositRequest>,
    ) -> StorageResult<()> {
        self.require_pod(pod)?;
        Self::check_pending(request.as_ref())?;
        match request {
            Some(request) => self.deposit_requests.insert(pod.clone(), request),
            None => self.deposit_requests.remove(pod),
        };
        Ok(())
    }

    fn withdrawal_context(&self, pod: &PodId) -> StorageResult<Option<WithdrawalContext>> {
        Ok(self.withdrawal_contexts.get(pod).cloned())
    }

    fn set_withdrawal_context(
        &mut self,
        pod: &PodId,
        context: Option<WithdrawalContext>,
    ) -> StorageResult<()> {
        self.require_pod(pod)?;
        match context {
            Some(context) => self.withdrawal_contexts.insert(pod.clone(), context),
            None => self.withdrawal_contexts.remove(pod),
        };
        Ok(())
    }

    fn apply(&mut self, pod: &PodId, write: PodWrite) -> StorageResult<()> {
        // validate everything before the first mutation
        self.require_pod(pod)?;
        if let Some(updated) = &write.pod {
            if updated.id() != pod {
                return Err(StorageError::InvalidData(format!(
                    "write for {} carries pod {}",
                    pod,
                    updated.id()
                )));
            }
            self.check_immutable_fields(updated)?;
        }
        if let Some(request) = &write.deposit {
            Self::check_pending(request.as_ref())?;
        }

        let PodWrite {
            pod: updated,
            delegation,
            deposit,
            withdrawal,
        } = write;

        if let Some(updated) = updated {
            self.pods.insert(pod.clone(), updated);
        }
        if let Some(app) = delegation {
            self.set_delegated_app(pod, app)?;
        }
        if let Some(request) = deposit {
            self.set_deposit_request(pod, request)?;
        }
        if let Some(context) = withdrawal {
            self.set_withdrawal_context(pod, context)?;
        }
        Ok(())
    }

    fn pods(&self) -> StorageResult<Vec<Pod>> {
        Ok(self.pods.values().cloned().collect())
    }

    fn pod_count(&self) -> StorageResult<usize> {
        Ok(self.pods.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(id: &str, owner: &str, address: &str) -> Pod {
        Pod::new(
            PodId::from(id),
            AccountId::from("manager"),
            AccountId::from(owner),
            AccountId::from("operator"),
            vec![0x02; 33],
            address.to_string(),
        )
    }

    #[test]
    fn test_insert_and_indexes() {
        let mut store = MemoryPodStore::new();
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();

        assert!(store.get_pod(&PodId::from("pod_1")).unwrap().is_some());
        assert_eq!(
            store.pod_of_owner(&AccountId::from("alice")).unwrap(),
            Some(PodId::from("pod_1"))
        );
        assert_eq!(store.pod_by_address("addr1").unwrap(), Some(PodId::from("pod_1")));
        assert_eq!(store.pod_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut store = MemoryPodStore::new();
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();

        assert!(matches!(
            store.insert_pod(pod("pod_1", "bob", "addr2")),
            Err(StorageError::Duplicate(_))
        ));
        assert!(matches!(
            store.insert_pod(pod("pod_2", "alice", "addr2")),
            Err(StorageError::Duplicate(_))
        ));
        assert!(matches!(
            store.insert_pod(pod("pod_2", "bob", "addr1")),
            Err(StorageError::Duplicate(_))
        ));
        assert_eq!(store.pod_count().unwrap(), 1);
    }

    #[test]
    fn test_update_unknown_pod() {
        let mut store = MemoryPodStore::new();
        assert!(matches!(
            store.update_pod(pod("pod_1", "alice", "addr1")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_cannot_change_address() {
        let mut store = MemoryPodStore::new();
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();
        assert!(matches!(
            store.update_pod(pod("pod_1", "alice", "addr2")),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[test]
    fn test_mappings_require_pod() {
        let mut store = MemoryPodStore::new();
        let missing = PodId::from("pod_x");
        assert!(store
            .set_delegated_app(&missing, Some(AccountId::from("app")))
            .is_err());
        assert!(store
            .set_deposit_request(&missing, Some(DepositRequest::new([1; 32], 5)))
            .is_err());
    }

    #[test]
    fn test_set_and_clear_mappings() {
        let mut store = MemoryPodStore::new();
        let id = PodId::from("pod_1");
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();

        store.set_delegated_app(&id, Some(AccountId::from("app"))).unwrap();
        assert_eq!(store.delegated_app(&id).unwrap(), Some(AccountId::from("app")));
        store.set_delegated_app(&id, None).unwrap();
        assert_eq!(store.delegated_app(&id).unwrap(), None);

        store
            .set_deposit_request(&id, Some(DepositRequest::new([7; 32], 1_000)))
            .unwrap();
        assert_eq!(store.deposit_request(&id).unwrap().map(|r| r.amount), Some(1_000));
        store.set_deposit_request(&id, None).unwrap();
        assert!(store.deposit_request(&id).unwrap().is_none());
    }

    #[test]
    fn test_apply_writes_everything() {
        let mut store = MemoryPodStore::new();
        let id = PodId::from("pod_1");
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();
        store
            .set_deposit_request(&id, Some(DepositRequest::new([7; 32], 1_000)))
            .unwrap();

        let write = PodWrite {
            pod: Some(pod("pod_1", "alice", "addr1")),
            delegation: Some(Some(AccountId::from("app"))),
            deposit: Some(None),
            withdrawal: None,
        };
        store.apply(&id, write).unwrap();

        assert_eq!(store.delegated_app(&id).unwrap(), Some(AccountId::from("app")));
        assert!(store.deposit_request(&id).unwrap().is_none());
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut store = MemoryPodStore::new();
        let id = PodId::from("pod_1");
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();
        let request = DepositRequest::new([7; 32], 1_000);
        store.set_deposit_request(&id, Some(request.clone())).unwrap();

        // the pod update is rejected, so the mapping writes must not land
        let write = PodWrite {
            pod: Some(pod("pod_1", "alice", "addr2")),
            delegation: Some(Some(AccountId::from("app"))),
            deposit: Some(None),
            withdrawal: None,
        };
        assert!(matches!(store.apply(&id, write), Err(StorageError::InvalidData(_))));

        assert_eq!(store.delegated_app(&id).unwrap(), None);
        assert_eq!(store.deposit_request(&id).unwrap(), Some(request));
        assert_eq!(store.pod_by_address("addr1").unwrap(), Some(id.clone()));

        let foreign = PodWrite {
            pod: Some(pod("pod_2", "bob", "addr2")),
            ..PodWrite::default()
        };
        assert!(store.apply(&id, foreign).is_err());
        assert!(matches!(
            store.apply(&PodId::from("pod_x"), PodWrite::default()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_settled_deposit_request_not_stored() {
        let mut store = MemoryPodStore::new();
        let id = PodId::from("pod_1");
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();

        let settled = DepositRequest {
            is_pending: false,
            ..DepositRequest::new([7; 32], 1_000)
        };
        assert!(matches!(
            store.set_deposit_request(&id, Some(settled.clone())),
            Err(StorageError::InvalidData(_))
        ));
        let write = PodWrite {
            deposit: Some(Some(settled)),
            ..PodWrite::default()
        };
        assert!(store.apply(&id, write).is_err());
        assert!(store.deposit_request(&id).unwrap().is_none());
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let mut store = MemoryPodStore::new();
        let id = PodId::from("pod_1");
        store.insert_pod(pod("pod_1", "alice", "addr1")).unwrap();
        store.insert_pod(pod("pod_2", "bob", "addr2")).unwrap();
        store.set_delegated_app(&id, Some(AccountId::from("app"))).unwrap();
        store
            .set_withdrawal_context(
                &id,
                Some(WithdrawalContext::new("addr9".into(), vec![0x00, 0x14], 42, None)),
            )
            .unwrap();

        let json = store.to_json().unwrap();
        let restored = MemoryPodStore::from_json(&json).unwrap();

        assert_eq!(restored.pod_count().unwrap(), 2);
        assert_eq!(restored.pod_by_address("addr2").unwrap(), Some(PodId::from("pod_2")));
        assert_eq!(restored.delegated_app(&id).unwrap(), Some(AccountId::from("app")));
        assert_eq!(
            restored.withdrawal_context(&id).unwrap().map(|c| c.amount),
            Some(42)
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            MemoryPodStore::from_json("{not json"),
            Err(StorageError::InvalidData(_))
        ));
    }
}
