//! Storage Trait Definitions
//!
//! The manager's mappings (owner → pod, pod → delegated application,
//! pod → deposit request, pod → withdrawal context) plus the pods themselves.

use thiserror::Error;

use crate::pod::Pod;
use crate::types::{AccountId, DepositRequest, PodId, WithdrawalContext};

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Writes to one pod and its mappings, applied together by [`PodStore::apply`]
///
/// `None` leaves an entry untouched; `Some(None)` clears a mapping.
#[derive(Debug, Clone, Default)]
pub struct PodWrite {
    pub pod: Option<Pod>,
    pub delegation: Option<Option<AccountId>>,
    pub deposit: Option<Option<DepositRequest>>,
    pub withdrawal: Option<Option<WithdrawalContext>>,
}

impl PodWrite {
    pub fn is_empty(&self) -> bool {
        self.pod.is_none()
            && self.delegation.is_none()
            && self.deposit.is_none()
            && self.withdrawal.is_none()
    }
}

/// Pod storage interface
///
/// Implementations:
/// - `MemoryPodStore` - In-memory keyed store
pub trait PodStore: Send + Sync {
    /// Insert a new pod; fails on a duplicate id, owner or address
    fn insert_pod(&mut self, pod: Pod) -> StorageResult<()>;

    /// Replace an existing pod
    fn update_pod(&mut self, pod: Pod) -> StorageResult<()>;

    fn get_pod(&self, id: &PodId) -> StorageResult<Option<Pod>>;

    /// Pod owned by `owner`, if any
    fn pod_of_owner(&self, owner: &AccountId) -> StorageResult<Option<PodId>>;

    /// Pod using `bitcoin_address`, if any
    fn pod_by_address(&self, bitcoin_address: &str) -> StorageResult<Option<PodId>>;

    fn delegated_app(&self, pod: &PodId) -> StorageResult<Option<AccountId>>;

    /// `None` removes the delegation
    fn set_delegated_app(&mut self, pod: &PodId, app: Option<AccountId>) -> StorageResult<()>;

    fn deposit_request(&self, pod: &PodId) -> StorageResult<Option<DepositRequest>>;

    /// `None` clears the request
    fn set_deposit_request(
        &mut self,
        pod: &PodId,
        request: Option<DepositRequest>,
    ) -> StorageResult<()>;

    fn withdrawal_context(&self, pod: &PodId) -> StorageResult<Option<WithdrawalContext>>;

    /// `None` clears the context
    fn set_withdrawal_context(
        &mut self,
        pod: &PodId,
        context: Option<WithdrawalContext>,
    ) -> StorageResult<()>;

    /// Apply every part of `write` to `pod`, or none of it
    ///
    /// The manager commits each operation through this call, so a failure
    /// must leave the store exactly as it was.
    fn apply(&mut self, pod: &PodId, write: PodWrite) -> StorageResult<()>;

    /// All pods
    fn pods(&self) -> StorageResult<Vec<Pod>>;

    fn pod_count(&self) -> StorageResult<usize>;
}
