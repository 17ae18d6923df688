//! Pod State Machine
//!
//! One pod per custody relationship. The pod records and validates; it has
//! no policy of its own beyond the arcs below and only ever obeys the manager
//! that created it.
//!
//! ```text
//!            set_state(Inactive)
//!   Active ───────────────────────▶ Inactive
//!     ▲                                 │
//!     └─────────────────────────────────┘
//!            set_state(Active)
//! ```
//!
//! `locked` is orthogonal to `state`, but a pod can only be locked while
//! Active.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{unix_now, AccountId, PodId};

/// Lifecycle state of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodState {
    /// Deposits, locking and withdrawal requests allowed
    Active,
    /// A withdrawal is in flight
    Inactive,
}

impl Default for PodState {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for PodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PodState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("unknown pod state: {}", s)),
        }
    }
}

/// A committed state change, returned for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: PodState,
    pub to: PodState,
}

/// Pod errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PodError {
    #[error("caller {caller} is not the pod manager")]
    NotManager { caller: AccountId },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: PodState, to: PodState },

    #[error("pod is already locked")]
    AlreadyLocked,

    #[error("pod is not locked")]
    NotLocked,

    #[error("pod is inactive")]
    PodInactive,

    #[error("pod is locked")]
    PodLocked,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("balance overflow")]
    BalanceOverflow,
}

/// Custody pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Pod identity
    id: PodId,
    /// The only identity allowed to mutate the pod
    manager: AccountId,
    /// Pod owner, fixed at creation
    owner: AccountId,
    /// Operator bound at creation
    operator: AccountId,
    /// Operator's compressed public key in the custody multisig
    operator_btc_pubkey: Vec<u8>,
    /// Deposit address of the custody multisig
    bitcoin_address: String,
    /// Satoshis attributed to the pod
    balance: u64,
    locked: bool,
    state: PodState,
    /// Operator-produced signed withdrawal bytes awaiting retrieval
    signed_withdraw_tx: Option<Vec<u8>>,
    /// Timestamp when the pod was created
    created_at: u64,
}

impl Pod {
    /// Create an Active, unlocked pod with zero balance
    pub fn new(
        id: PodId,
        manager: AccountId,
        owner: AccountId,
        operator: AccountId,
        operator_btc_pubkey: Vec<u8>,
        bitcoin_address: String,
    ) -> Self {
        Self {
            id,
            manager,
            owner,
            operator,
            operator_btc_pubkey,
            bitcoin_address,
            balance: 0,
            locked: false,
            state: PodState::Active,
            signed_withdraw_tx: None,
            created_at: unix_now(),
        }
    }

    pub fn id(&self) -> &PodId {
        &self.id
    }

    pub fn manager(&self) -> &AccountId {
        &self.manager
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn operator(&self) -> &AccountId {
        &self.operator
    }

    pub fn operator_btc_pubkey(&self) -> &[u8] {
        &self.operator_btc_pubkey
    }

    pub fn bitcoin_address(&self) -> &str {
        &self.bitcoin_address
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn state(&self) -> PodState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PodState::Active
    }

    pub fn has_signed_withdraw_transaction(&self) -> bool {
        self.signed_withdraw_tx.is_some()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    fn only_manager(&self, caller: &AccountId) -> Result<(), PodError> {
        if caller != &self.manager {
            return Err(PodError::NotManager {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Move to `new_state`; requesting the current state fails
    pub fn set_state(
        &mut self,
        caller: &AccountId,
        new_state: PodState,
    ) -> Result<StateTransition, PodError> {
        self.only_manager(caller)?;

        if self.state == new_state {
            return Err(PodError::InvalidStateTransition {
                from: self.state,
                to: new_state,
            });
        }

        let transition = StateTransition {
            from: self.state,
            to: new_state,
        };
        self.state = new_state;
        Ok(transition)
    }

    pub fn lock(&mut self, caller: &AccountId) -> Result<(), PodError> {
        self.only_manager(caller)?;

        if !self.is_active() {
            return Err(PodError::PodInactive);
        }
        if self.locked {
            return Err(PodError::AlreadyLocked);
        }

        self.locked = true;
        Ok(())
    }

    /// Unlocking an unlocked pod is a no-op
    pub fn unlock(&mut self, caller: &AccountId) -> Result<(), PodError> {
        self.only_manager(caller)?;
        self.locked = false;
        Ok(())
    }

    /// Credit a confirmed deposit; returns the new balance
    pub fn mint(&mut self, caller: &AccountId, amount: u64) -> Result<u64, PodError> {
        self.only_manager(caller)?;

        if amount == 0 {
            return Err(PodError::ZeroAmount);
        }
        if !self.is_active() {
            return Err(PodError::PodInactive);
        }
        if self.locked {
            return Err(PodError::PodLocked);
        }

        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(PodError::BalanceOverflow)?;
        Ok(self.balance)
    }

    /// Debit a settled withdrawal; the pod must be locked. Returns the new balance.
    pub fn burn(&mut self, caller: &AccountId, amount: u64) -> Result<u64, PodError> {
        self.only_manager(caller)?;

        if amount == 0 {
            return Err(PodError::ZeroAmount);
        }
        if !self.locked {
            return Err(PodError::NotLocked);
        }
        if amount > self.balance {
            return Err(PodError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        Ok(self.balance)
    }

    pub fn set_signed_withdraw_transaction(
        &mut self,
        caller: &AccountId,
        bytes: Vec<u8>,
    ) -> Result<(), PodError> {
        self.only_manager(caller)?;
        self.signed_withdraw_tx = Some(bytes);
        Ok(())
    }

    pub fn clear_signed_withdraw_transaction(&mut self, caller: &AccountId) -> Result<(), PodError> {
        self.only_manager(caller)?;
        self.signed_withdraw_tx = None;
        Ok(())
    }

    /// Signed withdrawal bytes, if the operator has produced them
    pub fn signed_withdraw_transaction(&self) -> Option<&[u8]> {
        self.signed_withdraw_tx.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AccountId {
        AccountId::from("manager")
    }

    fn test_pod() -> Pod {
        Pod::new(
            PodId::from("pod_1"),
            manager(),
            AccountId::from("alice"),
            AccountId::from("operator"),
            vec![0x02; 33],
            "bcrt1qexample".to_string(),
        )
    }

    fn funded_pod(balance: u64) -> Pod {
        let mut pod = test_pod();
        pod.mint(&manager(), balance).unwrap();
        pod
    }

    #[test]
    fn test_new_pod_defaults() {
        let pod = test_pod();
        assert_eq!(pod.state(), PodState::Active);
        assert_eq!(pod.balance(), 0);
        assert!(!pod.is_locked());
        assert!(pod.signed_withdraw_transaction().is_none());
    }

    #[test]
    fn test_only_manager_may_mutate() {
        let mut pod = test_pod();
        let stranger = AccountId::from("alice");

        let err = pod.lock(&stranger).unwrap_err();
        assert_eq!(err, PodError::NotManager { caller: stranger.clone() });
        assert!(pod.mint(&stranger, 1).is_err());
        assert!(pod.set_state(&stranger, PodState::Inactive).is_err());
        assert!(pod.set_signed_withdraw_transaction(&stranger, vec![1]).is_err());
        assert!(!pod.is_locked());
        assert_eq!(pod.balance(), 0);
    }

    #[test]
    fn test_state_transitions() {
        let mut pod = test_pod();

        let t = pod.set_state(&manager(), PodState::Inactive).unwrap();
        assert_eq!(t, StateTransition { from: PodState::Active, to: PodState::Inactive });

        assert_eq!(
            pod.set_state(&manager(), PodState::Inactive),
            Err(PodError::InvalidStateTransition {
                from: PodState::Inactive,
                to: PodState::Inactive
            })
        );

        pod.set_state(&manager(), PodState::Active).unwrap();
        assert!(pod.is_active());
    }

    #[test]
    fn test_lock_unlock_and_state_never_touch_balance() {
        let mut pod = funded_pod(500_000);

        pod.lock(&manager()).unwrap();
        assert_eq!(pod.balance(), 500_000);
        pod.set_state(&manager(), PodState::Inactive).unwrap();
        assert_eq!(pod.balance(), 500_000);
        pod.unlock(&manager()).unwrap();
        assert_eq!(pod.balance(), 500_000);
        pod.set_state(&manager(), PodState::Active).unwrap();
        assert_eq!(pod.balance(), 500_000);
    }

    #[test]
    fn test_second_lock_fails() {
        let mut pod = test_pod();
        pod.lock(&manager()).unwrap();
        assert_eq!(pod.lock(&manager()), Err(PodError::AlreadyLocked));

        pod.unlock(&manager()).unwrap();
        assert!(pod.lock(&manager()).is_ok());
    }

    #[test]
    fn test_cannot_lock_inactive_pod() {
        let mut pod = test_pod();
        pod.set_state(&manager(), PodState::Inactive).unwrap();
        assert_eq!(pod.lock(&manager()), Err(PodError::PodInactive));
    }

    #[test]
    fn test_mint_preconditions() {
        let mut pod = test_pod();
        assert_eq!(pod.mint(&manager(), 0), Err(PodError::ZeroAmount));

        pod.lock(&manager()).unwrap();
        assert_eq!(pod.mint(&manager(), 10), Err(PodError::PodLocked));
        pod.unlock(&manager()).unwrap();

        pod.set_state(&manager(), PodState::Inactive).unwrap();
        assert_eq!(pod.mint(&manager(), 10), Err(PodError::PodInactive));
    }

    #[test]
    fn test_mint_overflow() {
        let mut pod = funded_pod(u64::MAX);
        assert_eq!(pod.mint(&manager(), 1), Err(PodError::BalanceOverflow));
        assert_eq!(pod.balance(), u64::MAX);
    }

    #[test]
    fn test_burn_requires_lock() {
        let mut pod = funded_pod(100);
        assert_eq!(pod.burn(&manager(), 100), Err(PodError::NotLocked));
    }

    #[test]
    fn test_burn_more_than_balance() {
        let mut pod = funded_pod(100);
        pod.lock(&manager()).unwrap();

        assert_eq!(
            pod.burn(&manager(), 101),
            Err(PodError::InsufficientBalance { requested: 101, available: 100 })
        );
        assert_eq!(pod.burn(&manager(), 0), Err(PodError::ZeroAmount));
        assert_eq!(pod.burn(&manager(), 100), Ok(0));
    }

    #[test]
    fn test_signed_withdraw_transaction() {
        let mut pod = test_pod();
        pod.set_signed_withdraw_transaction(&manager(), vec![0xAB, 0xCD]).unwrap();
        assert_eq!(pod.signed_withdraw_transaction(), Some(&[0xAB, 0xCD][..]));
        assert!(pod.has_signed_withdraw_transaction());

        pod.clear_signed_withdraw_transaction(&manager()).unwrap();
        assert!(pod.signed_withdraw_transaction().is_none());
    }

    #[test]
    fn test_pod_state_parse() {
        assert_eq!("active".parse::<PodState>(), Ok(PodState::Active));
        assert_eq!(PodState::Inactive.to_string(), "inactive");
        assert!("frozen".parse::<PodState>().is_err());
    }
}
