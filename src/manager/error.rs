//! Manager Errors
//!
//! Every failure leaves the manager, its pods and its mappings untouched.

use thiserror::Error;

use crate::codec::CodecError;
use crate::pod::PodError;
use crate::storage::StorageError;
use crate::types::{AccountId, PodId, WithdrawalKind};

/// Broad failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller lacks the role the operation requires
    Authorization,
    /// The pod or manager is not in a state that permits the operation
    StatePrecondition,
    /// Bytes, addresses or amounts handed in are unusable
    MalformedInput,
    /// A settlement payload disagrees with the pending request it claims to
    /// settle, or internal bookkeeping would be violated
    Consistency,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Authorization => "authorization",
            Self::StatePrecondition => "state_precondition",
            Self::MalformedInput => "malformed_input",
            Self::Consistency => "consistency",
        };
        write!(f, "{}", s)
    }
}

/// Pod manager errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    // Authorization
    #[error("caller {caller} is not {role}")]
    Unauthorized { role: String, caller: AccountId },

    #[error("operator {operator} is not the operator of pod {pod}")]
    OperatorMismatch { pod: PodId, operator: AccountId },

    // State preconditions
    #[error("pod not found: {0}")]
    PodNotFound(PodId),

    #[error("{0} already has a pod")]
    AlreadyHasPod(AccountId),

    #[error("operator {0} is not registered")]
    UnknownOperator(AccountId),

    #[error("application {0} is not registered")]
    ApplicationNotRegistered(AccountId),

    #[error("pod {0} is already delegated")]
    AlreadyDelegated(PodId),

    #[error("pod {0} is not delegated")]
    NotDelegated(PodId),

    #[error("pod {0} is delegated to an application")]
    PodDelegated(PodId),

    #[error("pod {0} is locked")]
    PodLocked(PodId),

    #[error("pod {0} is inactive")]
    PodInactive(PodId),

    #[error("a deposit request is already pending for pod {0}")]
    DepositAlreadyPending(PodId),

    #[error("no pending deposit matches for pod {0}")]
    NoPendingDeposit(PodId),

    #[error("a deposit is pending for pod {0}")]
    DepositPending(PodId),

    #[error("a withdrawal request is already pending for pod {0}")]
    WithdrawalAlreadyPending(PodId),

    #[error("no pending withdrawal for pod {0}")]
    NoPendingWithdrawal(PodId),

    #[error("a withdrawal is pending for pod {0}")]
    WithdrawalPending(PodId),

    #[error("withdrawal for pod {0} already has a signed transaction")]
    WithdrawalAlreadyInProgress(PodId),

    #[error("withdrawal is a {actual} withdrawal, not {expected}")]
    WrongWithdrawalKind {
        expected: WithdrawalKind,
        actual: WithdrawalKind,
    },

    #[error("pod {0} has no balance to withdraw")]
    NothingToWithdraw(PodId),

    #[error("manager is paused")]
    Paused,

    #[error("manager is not paused")]
    NotPaused,

    // Malformed input
    #[error("operator public key is not one of the script keys")]
    OperatorKeyNotInScript,

    #[error("address does not commit to the supplied script")]
    AddressScriptMismatch,

    #[error("bitcoin address already used by pod {0}")]
    AddressInUse(PodId),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("withdraw address is empty")]
    EmptyWithdrawAddress,

    #[error("pre-signed transaction is empty")]
    EmptyPresignedTransaction,

    #[error("outputs do not pay {expected} sats to the withdraw address ({matching} matching outputs, {paid} sats)")]
    OutputMismatch {
        expected: u64,
        matching: usize,
        paid: u64,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    // Consistency
    #[error("total value locked would overflow")]
    TvlOverflow,

    #[error("total value locked would underflow")]
    TvlUnderflow,

    #[error("pod error: {0}")]
    Pod(#[from] PodError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ManagerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthorized { .. } | Self::OperatorMismatch { .. } => ErrorClass::Authorization,

            Self::PodNotFound(_)
            | Self::AlreadyHasPod(_)
            | Self::UnknownOperator(_)
            | Self::ApplicationNotRegistered(_)
            | Self::AlreadyDelegated(_)
            | Self::NotDelegated(_)
            | Self::PodDelegated(_)
            | Self::PodLocked(_)
            | Self::PodInactive(_)
            | Self::DepositAlreadyPending(_)
            | Self::DepositPending(_)
            | Self::WithdrawalAlreadyPending(_)
            | Self::NoPendingWithdrawal(_)
            | Self::WithdrawalPending(_)
            | Self::WithdrawalAlreadyInProgress(_)
            | Self::WrongWithdrawalKind { .. }
            | Self::NothingToWithdraw(_)
            | Self::Paused
            | Self::NotPaused => ErrorClass::StatePrecondition,

            Self::OperatorKeyNotInScript
            | Self::AddressScriptMismatch
            | Self::AddressInUse(_)
            | Self::ZeroAmount
            | Self::EmptyWithdrawAddress
            | Self::EmptyPresignedTransaction
            | Self::Codec(_) => ErrorClass::MalformedInput,

            Self::NoPendingDeposit(_) | Self::OutputMismatch { .. } => ErrorClass::Consistency,

            Self::Pod(err) => match err {
                PodError::InvalidStateTransition { .. }
                | PodError::AlreadyLocked
                | PodError::NotLocked
                | PodError::PodInactive
                | PodError::PodLocked => ErrorClass::StatePrecondition,
                PodError::ZeroAmount => ErrorClass::MalformedInput,
                PodError::NotManager { .. }
                | PodError::InsufficientBalance { .. }
                | PodError::BalanceOverflow => ErrorClass::Consistency,
            },

            Self::TvlOverflow | Self::TvlUnderflow | Self::Storage(_) => ErrorClass::Consistency,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::OperatorMismatch { .. } => "OPERATOR_MISMATCH",
            Self::PodNotFound(_) => "POD_NOT_FOUND",
            Self::AlreadyHasPod(_) => "ALREADY_HAS_POD",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::ApplicationNotRegistered(_) => "APPLICATION_NOT_REGISTERED",
            Self::AlreadyDelegated(_) => "ALREADY_DELEGATED",
            Self::NotDelegated(_) => "NOT_DELEGATED",
            Self::PodDelegated(_) => "POD_DELEGATED",
            Self::PodLocked(_) => "POD_LOCKED",
            Self::PodInactive(_) => "POD_INACTIVE",
            Self::DepositAlreadyPending(_) => "DEPOSIT_ALREADY_PENDING",
            Self::NoPendingDeposit(_) => "NO_PENDING_DEPOSIT",
            Self::DepositPending(_) => "DEPOSIT_PENDING",
            Self::WithdrawalAlreadyPending(_) => "WITHDRAWAL_ALREADY_PENDING",
            Self::NoPendingWithdrawal(_) => "NO_PENDING_WITHDRAWAL",
            Self::WithdrawalPending(_) => "WITHDRAWAL_PENDING",
            Self::WithdrawalAlreadyInProgress(_) => "WITHDRAWAL_ALREADY_IN_PROGRESS",
            Self::WrongWithdrawalKind { .. } => "WRONG_WITHDRAWAL_KIND",
            Self::NothingToWithdraw(_) => "NOTHING_TO_WITHDRAW",
            Self::Paused => "PAUSED",
            Self::NotPaused => "NOT_PAUSED",
            Self::OperatorKeyNotInScript => "OPERATOR_KEY_NOT_IN_SCRIPT",
            Self::AddressScriptMismatch => "ADDRESS_SCRIPT_MISMATCH",
            Self::AddressInUse(_) => "ADDRESS_IN_USE",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::EmptyWithdrawAddress => "EMPTY_WITHDRAW_ADDRESS",
            Self::EmptyPresignedTransaction => "EMPTY_PRESIGNED_TRANSACTION",
            Self::OutputMismatch { .. } => "OUTPUT_MISMATCH",
            Self::Codec(_) => "MALFORMED_BITCOIN_DATA",
            Self::TvlOverflow => "TVL_OVERFLOW",
            Self::TvlUnderflow => "TVL_UNDERFLOW",
            Self::Pod(_) => "POD_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}
