//! Pod Manager Service
//!
//! Creates pods and mediates every change to them:
//!
//! ```text
//! create_pod ─▶ Active/unlocked
//!   ├─ delegate_pod ─▶ lock_pod / unlock_pod (delegated app) ─▶ undelegate_pod
//!   ├─ verify_bitcoin_deposit_request ─▶ confirm_bitcoin_deposit (mint)
//!   └─ withdraw_*_request (lock + Inactive)
//!        ├─ withdraw_bitcoin_psbt / withdraw_bitcoin_complete_tx (signed bytes)
//!        ├─ withdraw_bitcoin_as_tokens (burn, Active + unlocked)
//!        └─ cancel_withdrawal_request (Active + unlocked)
//! ```
//!
//! Every operation validates against a working copy of the pod and commits
//! the pod, the mappings and TVL together only once all checks pass. Events
//! are published after the commit.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::auth::{authorize, ensure_not_paused, Principals, Role};
use super::error::ManagerError;
use super::events::EventBus;
use crate::codec::{
    address_to_script_pubkey, bech32_to_script_pubkey, extract_two_public_keys, parse_psbt_outputs,
    parse_transaction_outputs, script_to_script_pubkey, validate_compressed_public_key, TxOutput,
};
use crate::common::config::PodConfig;
use crate::common::logging::{
    log_deposit_event, log_pod_event, log_security_event, log_withdrawal_event,
};
use crate::pod::{Pod, PodState, StateTransition};
use crate::registry::{AppRegistry, OperatorRegistry};
use crate::storage::{MemoryPodStore, PodStore, PodWrite};
use crate::types::{
    AccountId, DepositRequest, PodEvent, PodId, TxId, WithdrawalContext, WithdrawalKind,
};

/// Changes staged by one operation, applied together on commit
#[derive(Default)]
struct Changes {
    write: PodWrite,
    tvl: Option<u64>,
    events: Vec<PodEvent>,
}

impl Changes {
    fn new() -> Self {
        Self::default()
    }

    fn pod(mut self, pod: Pod) -> Self {
        self.write.pod = Some(pod);
        self
    }

    fn delegation(mut self, app: Option<AccountId>) -> Self {
        self.write.delegation = Some(app);
        self
    }

    fn deposit(mut self, request: Option<DepositRequest>) -> Self {
        self.write.deposit = Some(request);
        self
    }

    fn withdrawal(mut self, context: Option<WithdrawalContext>) -> Self {
        self.write.withdrawal = Some(context);
        self
    }

    fn tvl(mut self, tvl: u64) -> Self {
        self.tvl = Some(tvl);
        self
    }

    fn event(mut self, event: PodEvent) -> Self {
        self.events.push(event);
        self
    }

    fn state_change(self, pod: &PodId, transition: StateTransition) -> Self {
        self.event(PodEvent::PodStateChanged {
            pod: pod.clone(),
            from: transition.from,
            to: transition.to,
        })
    }
}

/// Registry and orchestrator for custody pods
pub struct PodManager {
    config: PodConfig,
    store: Box<dyn PodStore>,
    operators: Arc<dyn OperatorRegistry>,
    apps: Arc<dyn AppRegistry>,
    events: EventBus,
    paused: bool,
    /// Running sum of all pod balances
    total_tvl: u64,
}

impl PodManager {
    /// Create a manager over an existing store; TVL is recomputed from it
    pub fn new(
        config: PodConfig,
        store: Box<dyn PodStore>,
        operators: Arc<dyn OperatorRegistry>,
        apps: Arc<dyn AppRegistry>,
    ) -> Result<Self, ManagerError> {
        let total_tvl = store
            .pods()?
            .iter()
            .try_fold(0u64, |acc, pod| acc.checked_add(pod.balance()))
            .ok_or(ManagerError::TvlOverflow)?;

        let events = EventBus::new(config.event_capacity);

        tracing::info!(
            target: "btcpod::manager",
            network = %config.network,
            manager = %config.manager_id,
            total_tvl,
            "Pod manager initialized"
        );

        Ok(Self {
            config,
            store,
            operators,
            apps,
            events,
            paused: false,
            total_tvl,
        })
    }

    /// Create a manager with an empty in-memory store
    pub fn in_memory(
        config: PodConfig,
        operators: Arc<dyn OperatorRegistry>,
        apps: Arc<dyn AppRegistry>,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            store: Box::new(MemoryPodStore::new()),
            operators,
            apps,
            events,
            paused: false,
            total_tvl: 0,
        }
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn principals(&self) -> Principals<'_> {
        Principals::new(&self.config.admin, &self.config.service_manager)
    }

    fn load_pod(&self, id: &PodId) -> Result<Pod, ManagerError> {
        self.store
            .get_pod(id)?
            .ok_or_else(|| ManagerError::PodNotFound(id.clone()))
    }

    fn manager_id(&self) -> &AccountId {
        &self.config.manager_id
    }

    fn hrp(&self) -> &'static str {
        self.config.network.bech32_hrp()
    }

    /// Service manager relaying for the pod's own operator
    fn authorize_operator_call(
        &self,
        operation: &str,
        caller: &AccountId,
        operator: &AccountId,
        pod: &Pod,
    ) -> Result<(), ManagerError> {
        authorize(operation, caller, &[Role::ServiceManager], &self.principals())?;

        if operator != pod.operator() {
            log_security_event(
                "operator_mismatch",
                false,
                serde_json::json!({
                    "operation": operation,
                    "operator": operator.as_str(),
                    "pod_operator": pod.operator().as_str(),
                }),
                Some(pod.id().as_str()),
            );
            return Err(ManagerError::OperatorMismatch {
                pod: pod.id().clone(),
                operator: operator.clone(),
            });
        }
        Ok(())
    }

    /// Store writes land in one all-or-nothing call; TVL and events follow
    /// only once it succeeds
    fn commit(&mut self, pod_id: &PodId, changes: Changes) -> Result<(), ManagerError> {
        let Changes { write, tvl, events } = changes;

        if !write.is_empty() {
            self.store.apply(pod_id, write)?;
        }
        if let Some(tvl) = tvl {
            self.total_tvl = tvl;
        }

        for event in events {
            self.events.publish(event);
        }
        Ok(())
    }

    /// Exactly one output must pay `amount` to `script_pubkey`
    fn check_withdrawal_outputs(
        outputs: &[TxOutput],
        script_pubkey: &[u8],
        amount: u64,
    ) -> Result<(), ManagerError> {
        let matching: Vec<&TxOutput> = outputs
            .iter()
            .filter(|o| o.script_pubkey == script_pubkey)
            .collect();
        let paid = matching
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.value));

        if matching.len() != 1 || paid != amount {
            return Err(ManagerError::OutputMismatch {
                expected: amount,
                matching: matching.len(),
                paid,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Pod creation and delegation
    // =========================================================================

    /// Create a pod for `caller`, custodied by a 2-of-2 between the caller
    /// and `operator` at `btc_address`
    pub fn create_pod(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        btc_address: &str,
        script: &[u8],
    ) -> Result<PodId, ManagerError> {
        ensure_not_paused("create_pod", self.paused)?;

        if self.store.pod_of_owner(caller)?.is_some() {
            return Err(ManagerError::AlreadyHasPod(caller.clone()));
        }

        if !self.operators.is_operator_registered(operator) {
            return Err(ManagerError::UnknownOperator(operator.clone()));
        }
        let operator_key = self
            .operators
            .operator_public_key(operator)
            .ok_or_else(|| ManagerError::UnknownOperator(operator.clone()))?;
        validate_compressed_public_key(&operator_key)?;

        let (first, second) = extract_two_public_keys(script)?;
        if operator_key != first && operator_key != second {
            return Err(ManagerError::OperatorKeyNotInScript);
        }
        validate_compressed_public_key(&first)?;
        validate_compressed_public_key(&second)?;

        let script_pubkey = bech32_to_script_pubkey(btc_address, self.hrp())?;
        if script_pubkey[..] != script_to_script_pubkey(script)[..] {
            return Err(ManagerError::AddressScriptMismatch);
        }

        let address = btc_address.to_ascii_lowercase();
        if let Some(existing) = self.store.pod_by_address(&address)? {
            return Err(ManagerError::AddressInUse(existing));
        }

        let id = PodId::derive(caller, &address);
        let pod = Pod::new(
            id.clone(),
            self.manager_id().clone(),
            caller.clone(),
            operator.clone(),
            operator_key,
            address.clone(),
        );
        self.store.insert_pod(pod)?;

        log_pod_event(
            "pod_created",
            id.as_str(),
            serde_json::json!({
                "owner": caller.as_str(),
                "operator": operator.as_str(),
                "bitcoin_address": address,
            }),
        );

        self.events.publish(PodEvent::PodCreated {
            owner: caller.clone(),
            pod: id.clone(),
            operator: operator.clone(),
        });

        Ok(id)
    }

    /// Grant `app` authority to lock and unlock the pod
    pub fn delegate_pod(
        &mut self,
        caller: &AccountId,
        pod_id: &PodId,
        app: &AccountId,
    ) -> Result<(), ManagerError> {
        ensure_not_paused("delegate_pod", self.paused)?;
        let pod = self.load_pod(pod_id)?;
        authorize(
            "delegate_pod",
            caller,
            &[Role::Owner],
            &self.principals().with_owner(pod.owner()),
        )?;

        if !self.apps.is_application_registered(app) {
            return Err(ManagerError::ApplicationNotRegistered(app.clone()));
        }
        if self.store.delegated_app(pod_id)?.is_some() {
            return Err(ManagerError::AlreadyDelegated(pod_id.clone()));
        }
        if self.store.withdrawal_context(pod_id)?.is_some() {
            return Err(ManagerError::WithdrawalPending(pod_id.clone()));
        }

        self.commit(
            pod_id,
            Changes::new()
                .delegation(Some(app.clone()))
                .event(PodEvent::PodDelegated {
                    pod: pod_id.clone(),
                    app: app.clone(),
                }),
        )?;

        log_pod_event("pod_delegated", pod_id.as_str(), serde_json::json!({ "app": app.as_str() }));
        Ok(())
    }

    /// Revoke the pod's delegation; refused while the app holds it locked
    pub fn undelegate_pod(&mut self, caller: &AccountId, pod_id: &PodId) -> Result<(), ManagerError> {
        ensure_not_paused("undelegate_pod", self.paused)?;
        let pod = self.load_pod(pod_id)?;
        authorize(
            "undelegate_pod",
            caller,
            &[Role::Owner],
            &self.principals().with_owner(pod.owner()),
        )?;

        let app = self
            .store
            .delegated_app(pod_id)?
            .ok_or_else(|| ManagerError::NotDelegated(pod_id.clone()))?;
        if pod.is_locked() {
            return Err(ManagerError::PodLocked(pod_id.clone()));
        }

        self.commit(
            pod_id,
            Changes::new().delegation(None).event(PodEvent::PodUndelegated {
                pod: pod_id.clone(),
            }),
        )?;

        log_pod_event("pod_undelegated", pod_id.as_str(), serde_json::json!({ "app": app.as_str() }));
        Ok(())
    }

    pub fn lock_pod(&mut self, caller: &AccountId, pod_id: &PodId) -> Result<(), ManagerError> {
        ensure_not_paused("lock_pod", self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        let app = self.store.delegated_app(pod_id)?;
        authorize(
            "lock_pod",
            caller,
            &[Role::DelegatedApp],
            &self.principals().with_delegated_app(app.as_ref()),
        )?;

        pod.lock(self.manager_id())?;

        self.commit(
            pod_id,
            Changes::new().pod(pod).event(PodEvent::PodLocked {
                pod: pod_id.clone(),
            }),
        )?;

        log_pod_event("pod_locked", pod_id.as_str(), serde_json::json!({ "by": caller.as_str() }));
        Ok(())
    }

    pub fn unlock_pod(&mut self, caller: &AccountId, pod_id: &PodId) -> Result<(), ManagerError> {
        ensure_not_paused("unlock_pod", self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        let app = self.store.delegated_app(pod_id)?;
        authorize(
            "unlock_pod",
            caller,
            &[Role::DelegatedApp],
            &self.principals().with_delegated_app(app.as_ref()),
        )?;

        pod.unlock(self.manager_id())?;

        self.commit(
            pod_id,
            Changes::new().pod(pod).event(PodEvent::PodUnlocked {
                pod: pod_id.clone(),
            }),
        )?;

        log_pod_event("pod_unlocked", pod_id.as_str(), serde_json::json!({ "by": caller.as_str() }));
        Ok(())
    }

    // =========================================================================
    // Deposits
    // =========================================================================

    /// Owner announces a Bitcoin deposit to the pod's address
    pub fn verify_bitcoin_deposit_request(
        &mut self,
        caller: &AccountId,
        pod_id: &PodId,
        tx_id: TxId,
        amount: u64,
    ) -> Result<(), ManagerError> {
        ensure_not_paused("verify_bitcoin_deposit_request", self.paused)?;
        let pod = self.load_pod(pod_id)?;
        authorize(
            "verify_bitcoin_deposit_request",
            caller,
            &[Role::Owner],
            &self.principals().with_owner(pod.owner()),
        )?;

        if self.store.deposit_request(pod_id)?.is_some() {
            return Err(ManagerError::DepositAlreadyPending(pod_id.clone()));
        }
        if amount == 0 {
            return Err(ManagerError::ZeroAmount);
        }
        if !pod.is_active() {
            return Err(ManagerError::PodInactive(pod_id.clone()));
        }

        let request = DepositRequest::new(tx_id, amount);
        let tx_id_hex = request.tx_id_hex();

        self.commit(
            pod_id,
            Changes::new()
                .deposit(Some(request))
                .event(PodEvent::DepositRequested {
                    pod: pod_id.clone(),
                    tx_id: tx_id_hex.clone(),
                    amount,
                }),
        )?;

        log_deposit_event("deposit_requested", pod_id.as_str(), &tx_id_hex, amount, true, None);
        Ok(())
    }

    /// Operator-confirmed settlement of the pending deposit
    pub fn confirm_bitcoin_deposit(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        pod_id: &PodId,
        tx_id: TxId,
        amount: u64,
    ) -> Result<(), ManagerError> {
        ensure_not_paused("confirm_bitcoin_deposit", self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        self.authorize_operator_call("confirm_bitcoin_deposit", caller, operator, &pod)?;

        let request = self
            .store
            .deposit_request(pod_id)?
            .filter(|r| r.matches(&tx_id, amount))
            .ok_or_else(|| ManagerError::NoPendingDeposit(pod_id.clone()))?;

        let previous = pod.balance();
        let current = pod.mint(self.manager_id(), amount)?;
        let tvl = self
            .total_tvl
            .checked_add(amount)
            .ok_or(ManagerError::TvlOverflow)?;

        self.commit(
            pod_id,
            Changes::new()
                .pod(pod)
                .deposit(None)
                .tvl(tvl)
                .event(PodEvent::DepositConfirmed {
                    pod: pod_id.clone(),
                    amount,
                })
                .event(PodEvent::BalanceChanged {
                    pod: pod_id.clone(),
                    previous,
                    current,
                }),
        )?;

        log_deposit_event(
            "deposit_confirmed",
            pod_id.as_str(),
            &request.tx_id_hex(),
            amount,
            true,
            None,
        );
        Ok(())
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    /// Owner asks the operator to co-sign a withdrawal PSBT of the full balance
    pub fn withdraw_bitcoin_psbt_request(
        &mut self,
        caller: &AccountId,
        pod_id: &PodId,
        withdraw_address: &str,
    ) -> Result<(), ManagerError> {
        self.request_withdrawal("withdraw_bitcoin_psbt_request", caller, pod_id, withdraw_address, None)
    }

    /// Owner supplies a pre-signed PSBT of the full balance for the operator
    /// to complete
    pub fn withdraw_bitcoin_complete_tx_request(
        &mut self,
        caller: &AccountId,
        pod_id: &PodId,
        presigned_tx: Vec<u8>,
        withdraw_address: &str,
    ) -> Result<(), ManagerError> {
        self.request_withdrawal(
            "withdraw_bitcoin_complete_tx_request",
            caller,
            pod_id,
            withdraw_address,
            Some(presigned_tx),
        )
    }

    fn request_withdrawal(
        &mut self,
        operation: &str,
        caller: &AccountId,
        pod_id: &PodId,
        withdraw_address: &str,
        presigned_tx: Option<Vec<u8>>,
    ) -> Result<(), ManagerError> {
        ensure_not_paused(operation, self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        authorize(
            operation,
            caller,
            &[Role::Owner],
            &self.principals().with_owner(pod.owner()),
        )?;

        if self.store.withdrawal_context(pod_id)?.is_some() {
            return Err(ManagerError::WithdrawalAlreadyPending(pod_id.clone()));
        }
        if pod.is_locked() {
            return Err(ManagerError::PodLocked(pod_id.clone()));
        }
        if self.store.delegated_app(pod_id)?.is_some() {
            return Err(ManagerError::PodDelegated(pod_id.clone()));
        }
        if self.store.deposit_request(pod_id)?.is_some() {
            return Err(ManagerError::DepositPending(pod_id.clone()));
        }
        if !pod.is_active() {
            return Err(ManagerError::PodInactive(pod_id.clone()));
        }

        let withdraw_address = withdraw_address.trim();
        if withdraw_address.is_empty() {
            return Err(ManagerError::EmptyWithdrawAddress);
        }
        let script_pubkey =
            address_to_script_pubkey(withdraw_address, self.config.network.bitcoin_network())?;

        let amount = pod.balance();
        if amount == 0 {
            return Err(ManagerError::NothingToWithdraw(pod_id.clone()));
        }

        if let Some(psbt) = &presigned_tx {
            if psbt.is_empty() {
                return Err(ManagerError::EmptyPresignedTransaction);
            }
            let outputs = parse_psbt_outputs(psbt)?;
            Self::check_withdrawal_outputs(&outputs, &script_pubkey, amount)?;
        }

        let manager = self.manager_id().clone();
        pod.clear_signed_withdraw_transaction(&manager)?;
        pod.lock(&manager)?;
        let transition = pod.set_state(&manager, PodState::Inactive)?;

        let context = WithdrawalContext::new(
            withdraw_address.to_string(),
            script_pubkey,
            amount,
            presigned_tx,
        );
        let kind = context.kind();

        self.commit(
            pod_id,
            Changes::new()
                .pod(pod)
                .withdrawal(Some(context))
                .event(PodEvent::WithdrawalRequested {
                    pod: pod_id.clone(),
                    withdraw_address: withdraw_address.to_string(),
                })
                .event(PodEvent::PodLocked {
                    pod: pod_id.clone(),
                })
                .state_change(pod_id, transition),
        )?;

        tracing::info!(target: "btcpod::withdrawal", pod = %pod_id, %kind, amount, "Withdrawal requested");
        log_withdrawal_event("withdrawal_requested", pod_id.as_str(), amount, withdraw_address, true, None);
        Ok(())
    }

    /// Operator returns the co-signed PSBT
    pub fn withdraw_bitcoin_psbt(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        pod_id: &PodId,
        psbt: Vec<u8>,
    ) -> Result<(), ManagerError> {
        self.set_withdrawal_transaction(
            "withdraw_bitcoin_psbt",
            caller,
            operator,
            pod_id,
            WithdrawalKind::Psbt,
            psbt,
        )
    }

    /// Operator returns the fully signed raw transaction
    pub fn withdraw_bitcoin_complete_tx(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        pod_id: &PodId,
        raw_tx: Vec<u8>,
    ) -> Result<(), ManagerError> {
        self.set_withdrawal_transaction(
            "withdraw_bitcoin_complete_tx",
            caller,
            operator,
            pod_id,
            WithdrawalKind::CompleteTx,
            raw_tx,
        )
    }

    fn set_withdrawal_transaction(
        &mut self,
        operation: &str,
        caller: &AccountId,
        operator: &AccountId,
        pod_id: &PodId,
        kind: WithdrawalKind,
        bytes: Vec<u8>,
    ) -> Result<(), ManagerError> {
        ensure_not_paused(operation, self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        self.authorize_operator_call(operation, caller, operator, &pod)?;

        let context = self
            .store
            .withdrawal_context(pod_id)?
            .ok_or_else(|| ManagerError::NoPendingWithdrawal(pod_id.clone()))?;
        if context.kind() != kind {
            return Err(ManagerError::WrongWithdrawalKind {
                expected: kind,
                actual: context.kind(),
            });
        }
        if pod.has_signed_withdraw_transaction() {
            return Err(ManagerError::WithdrawalAlreadyInProgress(pod_id.clone()));
        }

        let outputs = match kind {
            WithdrawalKind::Psbt => parse_psbt_outputs(&bytes)?,
            WithdrawalKind::CompleteTx => parse_transaction_outputs(&bytes)?,
        };
        Self::check_withdrawal_outputs(&outputs, &context.script_pubkey, context.amount)?;

        pod.set_signed_withdraw_transaction(self.manager_id(), bytes.clone())?;

        let len = bytes.len();
        self.commit(
            pod_id,
            Changes::new()
                .pod(pod)
                .event(PodEvent::WithdrawalTransactionSet {
                    pod: pod_id.clone(),
                    bytes,
                }),
        )?;

        tracing::info!(target: "btcpod::withdrawal", pod = %pod_id, %kind, bytes = len, "Signed withdrawal stored");
        log_withdrawal_event(
            "withdrawal_transaction_set",
            pod_id.as_str(),
            context.amount,
            &context.withdraw_address,
            true,
            None,
        );
        Ok(())
    }

    /// Settle the pending withdrawal against the pod balance
    ///
    /// Burns the whole balance, clears the request and returns the pod to
    /// Active and unlocked.
    pub fn withdraw_bitcoin_as_tokens(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        pod_id: &PodId,
    ) -> Result<(), ManagerError> {
        ensure_not_paused("withdraw_bitcoin_as_tokens", self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        self.authorize_operator_call("withdraw_bitcoin_as_tokens", caller, operator, &pod)?;

        let context = self
            .store
            .withdrawal_context(pod_id)?
            .ok_or_else(|| ManagerError::NoPendingWithdrawal(pod_id.clone()))?;

        let manager = self.manager_id().clone();
        let previous = pod.balance();
        let current = pod.burn(&manager, previous)?;
        let tvl = self
            .total_tvl
            .checked_sub(previous)
            .ok_or(ManagerError::TvlUnderflow)?;

        pod.clear_signed_withdraw_transaction(&manager)?;
        let transition = pod.set_state(&manager, PodState::Active)?;
        pod.unlock(&manager)?;

        self.commit(
            pod_id,
            Changes::new()
                .pod(pod)
                .withdrawal(None)
                .tvl(tvl)
                .event(PodEvent::BalanceChanged {
                    pod: pod_id.clone(),
                    previous,
                    current,
                })
                .event(PodEvent::WithdrawalSettled {
                    pod: pod_id.clone(),
                })
                .state_change(pod_id, transition)
                .event(PodEvent::PodUnlocked {
                    pod: pod_id.clone(),
                }),
        )?;

        log_withdrawal_event(
            "withdrawal_settled",
            pod_id.as_str(),
            previous,
            &context.withdraw_address,
            true,
            None,
        );
        Ok(())
    }

    /// Owner abandons a withdrawal the operator has not signed yet
    pub fn cancel_withdrawal_request(
        &mut self,
        caller: &AccountId,
        pod_id: &PodId,
    ) -> Result<(), ManagerError> {
        ensure_not_paused("cancel_withdrawal_request", self.paused)?;
        let mut pod = self.load_pod(pod_id)?;
        authorize(
            "cancel_withdrawal_request",
            caller,
            &[Role::Owner],
            &self.principals().with_owner(pod.owner()),
        )?;

        let context = self
            .store
            .withdrawal_context(pod_id)?
            .ok_or_else(|| ManagerError::NoPendingWithdrawal(pod_id.clone()))?;
        if pod.has_signed_withdraw_transaction() {
            return Err(ManagerError::WithdrawalAlreadyInProgress(pod_id.clone()));
        }

        let manager = self.manager_id().clone();
        let transition = pod.set_state(&manager, PodState::Active)?;
        pod.unlock(&manager)?;

        self.commit(
            pod_id,
            Changes::new()
                .pod(pod)
                .withdrawal(None)
                .event(PodEvent::WithdrawalCancelled {
                    pod: pod_id.clone(),
                })
                .state_change(pod_id, transition)
                .event(PodEvent::PodUnlocked {
                    pod: pod_id.clone(),
                }),
        )?;

        log_withdrawal_event(
            "withdrawal_cancelled",
            pod_id.as_str(),
            context.amount,
            &context.withdraw_address,
            true,
            None,
        );
        Ok(())
    }

    // =========================================================================
    // Pause switch
    // =========================================================================

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), ManagerError> {
        authorize("pause", caller, &[Role::Admin], &self.principals())?;
        if self.paused {
            return Err(ManagerError::Paused);
        }

        self.paused = true;
        self.events.publish(PodEvent::Paused { by: caller.clone() });
        log_security_event("paused", true, serde_json::json!({ "by": caller.as_str() }), None);
        Ok(())
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), ManagerError> {
        authorize("unpause", caller, &[Role::Admin], &self.principals())?;
        if !self.paused {
            return Err(ManagerError::NotPaused);
        }

        self.paused = false;
        self.events.publish(PodEvent::Unpaused { by: caller.clone() });
        log_security_event("unpaused", true, serde_json::json!({ "by": caller.as_str() }), None);
        Ok(())
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn pod(&self, id: &PodId) -> Result<Pod, ManagerError> {
        self.load_pod(id)
    }

    /// Pod owned by `owner`
    pub fn user_pod(&self, owner: &AccountId) -> Result<Option<PodId>, ManagerError> {
        Ok(self.store.pod_of_owner(owner)?)
    }

    /// Application the pod is delegated to
    pub fn pod_app(&self, pod: &PodId) -> Result<Option<AccountId>, ManagerError> {
        Ok(self.store.delegated_app(pod)?)
    }

    pub fn deposit_request(&self, pod: &PodId) -> Result<Option<DepositRequest>, ManagerError> {
        Ok(self.store.deposit_request(pod)?)
    }

    pub fn withdrawal_context(
        &self,
        pod: &PodId,
    ) -> Result<Option<WithdrawalContext>, ManagerError> {
        Ok(self.store.withdrawal_context(pod)?)
    }

    pub fn withdrawal_address(&self, pod: &PodId) -> Result<Option<String>, ManagerError> {
        Ok(self
            .store
            .withdrawal_context(pod)?
            .map(|c| c.withdraw_address))
    }

    pub fn signed_withdraw_transaction(&self, pod: &PodId) -> Result<Option<Vec<u8>>, ManagerError> {
        Ok(self
            .load_pod(pod)?
            .signed_withdraw_transaction()
            .map(|b| b.to_vec()))
    }

    pub fn total_tvl(&self) -> u64 {
        self.total_tvl
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pod_count(&self) -> Result<usize, ManagerError> {
        Ok(self.store.pod_count()?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PodEvent> {
        self.events.subscribe()
    }
}

/// Shared manager type; the write lock serializes mutating calls
pub type SharedPodManager = Arc<RwLock<PodManager>>;

/// Wrap a manager for use across tasks
pub fn create_shared_manager(manager: PodManager) -> SharedPodManager {
    Arc::new(RwLock::new(manager))
}
