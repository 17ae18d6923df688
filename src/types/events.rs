//! Pod Events
//!
//! Everything observable about the protocol is published as a `PodEvent`.
//! The value-accounting collaborator subscribes to these to mint or burn
//! its own unit of account.

use serde::{Deserialize, Serialize};

use super::identity::{AccountId, PodId};
use crate::pod::PodState;

/// Event published after a state change has been committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PodEvent {
    PodCreated {
        owner: AccountId,
        pod: PodId,
        operator: AccountId,
    },
    PodDelegated {
        pod: PodId,
        app: AccountId,
    },
    PodUndelegated {
        pod: PodId,
    },
    PodLocked {
        pod: PodId,
    },
    PodUnlocked {
        pod: PodId,
    },
    PodStateChanged {
        pod: PodId,
        from: PodState,
        to: PodState,
    },
    BalanceChanged {
        pod: PodId,
        previous: u64,
        current: u64,
    },
    DepositRequested {
        pod: PodId,
        tx_id: String,
        amount: u64,
    },
    DepositConfirmed {
        pod: PodId,
        amount: u64,
    },
    WithdrawalRequested {
        pod: PodId,
        withdraw_address: String,
    },
    WithdrawalTransactionSet {
        pod: PodId,
        bytes: Vec<u8>,
    },
    WithdrawalSettled {
        pod: PodId,
    },
    WithdrawalCancelled {
        pod: PodId,
    },
    Paused {
        by: AccountId,
    },
    Unpaused {
        by: AccountId,
    },
}

impl PodEvent {
    /// Stable event name, matching the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::PodCreated { .. } => "pod_created",
            Self::PodDelegated { .. } => "pod_delegated",
            Self::PodUndelegated { .. } => "pod_undelegated",
            Self::PodLocked { .. } => "pod_locked",
            Self::PodUnlocked { .. } => "pod_unlocked",
            Self::PodStateChanged { .. } => "pod_state_changed",
            Self::BalanceChanged { .. } => "balance_changed",
            Self::DepositRequested { .. } => "deposit_requested",
            Self::DepositConfirmed { .. } => "deposit_confirmed",
            Self::WithdrawalRequested { .. } => "withdrawal_requested",
            Self::WithdrawalTransactionSet { .. } => "withdrawal_transaction_set",
            Self::WithdrawalSettled { .. } => "withdrawal_settled",
            Self::WithdrawalCancelled { .. } => "withdrawal_cancelled",
            Self::Paused { .. } => "paused",
            Self::Unpaused { .. } => "unpaused",
        }
    }

    /// Pod the event refers to, if any
    pub fn pod(&self) -> Option<&PodId> {
        match self {
            Self::PodCreated { pod, .. }
            | Self::PodDelegated { pod, .. }
            | Self::PodUndelegated { pod }
            | Self::PodLocked { pod }
            | Self::PodUnlocked { pod }
            | Self::PodStateChanged { pod, .. }
            | Self::BalanceChanged { pod, .. }
            | Self::DepositRequested { pod, .. }
            | Self::DepositConfirmed { pod, .. }
            | Self::WithdrawalRequested { pod, .. }
            | Self::WithdrawalTransactionSet { pod, .. }
            | Self::WithdrawalSettled { pod }
            | Self::WithdrawalCancelled { pod } => Some(pod),
            Self::Paused { .. } | Self::Unpaused { .. } => None,
        }
    }
}
