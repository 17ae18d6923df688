//! End-to-end pod lifecycle through the public API

use std::sync::Arc;

use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{
    absolute::LockTime, consensus::encode::serialize, transaction::Version, Address, Amount,
    KnownHrp, Network, OutPoint, Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};

use btcpod::codec::CodecError;
use btcpod::{
    bech32_to_script_pubkey, build_multisig_script, parse_psbt_outputs, script_pubkey_to_bech32,
    script_to_script_pubkey, AccountId, ErrorClass, ManagerError, PodConfig, PodEvent, PodId,
    PodManager, PodState, StaticAppRegistry, StaticOperatorRegistry, WithdrawalKind,
};

const DEPOSIT: u64 = 500_000;

fn key(seed: u8) -> [u8; 33] {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
    PublicKey::from_secret_key(&secp, &secret).serialize()
}

fn p2wsh(first: u8, second: u8) -> (Vec<u8>, Vec<u8>, String) {
    let script = build_multisig_script(&key(first), &key(second));
    let spk = script_to_script_pubkey(&script).to_vec();
    let address = script_pubkey_to_bech32(&spk, "bcrt").unwrap();
    (script, spk, address)
}

fn unsigned_tx(outputs: &[(u64, &[u8])]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs
            .iter()
            .map(|(value, spk)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: ScriptBuf::from_bytes(spk.to_vec()),
            })
            .collect(),
    }
}

fn psbt(outputs: &[(u64, &[u8])]) -> Vec<u8> {
    Psbt::from_unsigned_tx(unsigned_tx(outputs)).unwrap().serialize()
}

fn raw_tx(outputs: &[(u64, &[u8])]) -> Vec<u8> {
    serialize(&unsigned_tx(outputs))
}

struct Harness {
    manager: PodManager,
    owner: AccountId,
    operator: AccountId,
    service: AccountId,
    app: AccountId,
}

impl Harness {
    fn new() -> Self {
        let config = PodConfig::default();
        let service = config.service_manager.clone();
        let operator = AccountId::from("operator");
        let app = AccountId::from("app");

        let operators = StaticOperatorRegistry::new().with_operator(operator.clone(), key(2).to_vec());
        let apps = StaticAppRegistry::new().with_app(app.clone());

        Self {
            manager: PodManager::in_memory(config, Arc::new(operators), Arc::new(apps)),
            owner: AccountId::from("alice"),
            operator,
            service,
            app,
        }
    }

    fn create(&mut self) -> PodId {
        let (script, _, address) = p2wsh(1, 2);
        self.manager
            .create_pod(&self.owner, &self.operator, &address, &script)
            .unwrap()
    }

    fn funded(&mut self) -> PodId {
        let pod = self.create();
        let tx_id = [0xab; 32];
        self.manager
            .verify_bitcoin_deposit_request(&self.owner, &pod, tx_id, DEPOSIT)
            .unwrap();
        self.manager
            .confirm_bitcoin_deposit(&self.service, &self.operator, &pod, tx_id, DEPOSIT)
            .unwrap();
        pod
    }
}

#[test]
fn test_address_round_trip() {
    let (script, spk, address) = p2wsh(1, 2);
    assert!(address.starts_with("bcrt1q"));
    assert_eq!(bech32_to_script_pubkey(&address, "bcrt").unwrap(), spk);
    assert_eq!(
        bech32_to_script_pubkey(&address.to_uppercase(), "bcrt").unwrap(),
        spk
    );
    assert_eq!(spk[..], script_to_script_pubkey(&script)[..]);

    let err = bech32_to_script_pubkey(&address, "bc").unwrap_err();
    assert!(matches!(err, CodecError::InvalidAddress(_)));
}

#[test]
fn test_create_pod_requires_matching_address() {
    let mut h = Harness::new();
    let (script, _, _) = p2wsh(1, 2);
    let (_, _, other_address) = p2wsh(3, 4);

    let err = h
        .manager
        .create_pod(&h.owner, &h.operator, &other_address, &script)
        .unwrap_err();
    assert!(matches!(err, ManagerError::AddressScriptMismatch));
    assert_eq!(h.manager.pod_count().unwrap(), 0);

    let pod_id = h.create();
    let pod = h.manager.pod(&pod_id).unwrap();
    assert_eq!(pod.owner(), &h.owner);
    assert_eq!(pod.balance(), 0);
    assert_eq!(pod.state(), PodState::Active);
    assert!(!pod.is_locked());
    assert_eq!(h.manager.user_pod(&h.owner).unwrap(), Some(pod_id));
}

#[test]
fn test_deposit_flow() {
    let mut h = Harness::new();
    let pod = h.create();
    let tx_id = [0x11; 32];

    h.manager
        .verify_bitcoin_deposit_request(&h.owner, &pod, tx_id, DEPOSIT)
        .unwrap();
    let pending = h.manager.deposit_request(&pod).unwrap().unwrap();
    assert!(pending.is_pending);
    assert_eq!(pending.amount, DEPOSIT);

    let err = h
        .manager
        .confirm_bitcoin_deposit(&h.service, &h.operator, &pod, [0x22; 32], DEPOSIT)
        .unwrap_err();
    assert!(matches!(err, ManagerError::NoPendingDeposit(_)));
    assert_eq!(err.class(), ErrorClass::Consistency);
    assert_eq!(h.manager.pod(&pod).unwrap().balance(), 0);

    let err = h
        .manager
        .confirm_bitcoin_deposit(&h.owner, &h.operator, &pod, tx_id, DEPOSIT)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authorization);

    h.manager
        .confirm_bitcoin_deposit(&h.service, &h.operator, &pod, tx_id, DEPOSIT)
        .unwrap();
    assert_eq!(h.manager.pod(&pod).unwrap().balance(), DEPOSIT);
    assert_eq!(h.manager.total_tvl(), DEPOSIT);
    assert!(h.manager.deposit_request(&pod).unwrap().is_none());
}

#[test]
fn test_psbt_withdrawal_checks_outputs() {
    let mut h = Harness::new();
    let pod = h.funded();
    let (_, withdraw_spk, withdraw_address) = p2wsh(5, 6);
    let (_, other_spk, _) = p2wsh(7, 8);

    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &withdraw_address)
        .unwrap();
    let state = h.manager.pod(&pod).unwrap();
    assert!(state.is_locked());
    assert_eq!(state.state(), PodState::Inactive);
    assert_eq!(
        h.manager.withdrawal_address(&pod).unwrap().as_deref(),
        Some(withdraw_address.as_str())
    );

    for bad in [
        psbt(&[(DEPOSIT - 1, withdraw_spk.as_slice())]),
        psbt(&[(DEPOSIT, other_spk.as_slice())]),
    ] {
        let err = h
            .manager
            .withdraw_bitcoin_psbt(&h.service, &h.operator, &pod, bad)
            .unwrap_err();
        assert!(matches!(err, ManagerError::OutputMismatch { .. }));
        assert_eq!(err.class(), ErrorClass::Consistency);
    }
    assert!(h.manager.signed_withdraw_transaction(&pod).unwrap().is_none());

    let good = psbt(&[
        (DEPOSIT, withdraw_spk.as_slice()),
        (1_000, other_spk.as_slice()),
    ]);
    h.manager
        .withdraw_bitcoin_psbt(&h.service, &h.operator, &pod, good.clone())
        .unwrap();
    assert_eq!(h.manager.signed_withdraw_transaction(&pod).unwrap(), Some(good));

    h.manager
        .withdraw_bitcoin_as_tokens(&h.service, &h.operator, &pod)
        .unwrap();
    let settled = h.manager.pod(&pod).unwrap();
    assert_eq!(settled.balance(), 0);
    assert_eq!(settled.state(), PodState::Active);
    assert!(!settled.is_locked());
    assert_eq!(h.manager.total_tvl(), 0);
    assert!(h.manager.withdrawal_context(&pod).unwrap().is_none());
}

#[test]
fn test_withdrawal_to_taproot_address() {
    let mut h = Harness::new();
    let pod = h.funded();

    let secp = Secp256k1::new();
    let internal = SecretKey::from_slice(&[9; 32])
        .unwrap()
        .x_only_public_key(&secp)
        .0;
    let taproot = Address::p2tr(&secp, internal, None, KnownHrp::Regtest);
    let taproot_spk = taproot.script_pubkey().into_bytes();
    let (_, custody_spk, _) = p2wsh(1, 2);

    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &taproot.to_string())
        .unwrap();

    let err = h
        .manager
        .withdraw_bitcoin_psbt(
            &h.service,
            &h.operator,
            &pod,
            psbt(&[(DEPOSIT, custody_spk.as_slice())]),
        )
        .unwrap_err();
    assert!(matches!(err, ManagerError::OutputMismatch { matching: 0, .. }));

    h.manager
        .withdraw_bitcoin_psbt(
            &h.service,
            &h.operator,
            &pod,
            psbt(&[(DEPOSIT, taproot_spk.as_slice())]),
        )
        .unwrap();
    h.manager
        .withdraw_bitcoin_as_tokens(&h.service, &h.operator, &pod)
        .unwrap();
    assert_eq!(h.manager.total_tvl(), 0);
}

#[test]
fn test_withdrawal_to_legacy_address() {
    let mut h = Harness::new();
    let pod = h.funded();

    let legacy_key = bitcoin::PublicKey::new(PublicKey::from_slice(&key(11)).unwrap());
    let legacy = Address::p2pkh(legacy_key.pubkey_hash(), Network::Regtest);
    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &legacy.to_string())
        .unwrap();
    assert_eq!(
        h.manager.withdrawal_context(&pod).unwrap().map(|c| c.script_pubkey),
        Some(legacy.script_pubkey().into_bytes())
    );
}

#[test]
fn test_complete_tx_withdrawal() {
    let mut h = Harness::new();
    let pod = h.funded();
    let (_, withdraw_spk, withdraw_address) = p2wsh(5, 6);

    let presigned = psbt(&[(DEPOSIT, withdraw_spk.as_slice())]);
    h.manager
        .withdraw_bitcoin_complete_tx_request(&h.owner, &pod, presigned, &withdraw_address)
        .unwrap();
    assert_eq!(
        h.manager.withdrawal_context(&pod).unwrap().map(|c| c.kind()),
        Some(WithdrawalKind::CompleteTx)
    );

    let err = h
        .manager
        .withdraw_bitcoin_psbt(
            &h.service,
            &h.operator,
            &pod,
            psbt(&[(DEPOSIT, withdraw_spk.as_slice())]),
        )
        .unwrap_err();
    assert!(matches!(err, ManagerError::WrongWithdrawalKind { .. }));

    h.manager
        .withdraw_bitcoin_complete_tx(
            &h.service,
            &h.operator,
            &pod,
            raw_tx(&[(DEPOSIT, withdraw_spk.as_slice())]),
        )
        .unwrap();
    h.manager
        .withdraw_bitcoin_as_tokens(&h.service, &h.operator, &pod)
        .unwrap();
    assert_eq!(h.manager.pod(&pod).unwrap().balance(), 0);
}

#[test]
fn test_cancel_only_before_signing() {
    let mut h = Harness::new();
    let pod = h.funded();
    let (_, withdraw_spk, withdraw_address) = p2wsh(5, 6);

    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &withdraw_address)
        .unwrap();
    h.manager.cancel_withdrawal_request(&h.owner, &pod).unwrap();

    let pod_state = h.manager.pod(&pod).unwrap();
    assert!(!pod_state.is_locked());
    assert_eq!(pod_state.state(), PodState::Active);
    assert_eq!(pod_state.balance(), DEPOSIT);

    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &withdraw_address)
        .unwrap();
    h.manager
        .withdraw_bitcoin_psbt(
            &h.service,
            &h.operator,
            &pod,
            psbt(&[(DEPOSIT, withdraw_spk.as_slice())]),
        )
        .unwrap();

    let err = h.manager.cancel_withdrawal_request(&h.owner, &pod).unwrap_err();
    assert!(matches!(err, ManagerError::WithdrawalAlreadyInProgress(_)));
    assert!(h.manager.withdrawal_context(&pod).unwrap().is_some());
}

#[test]
fn test_delegated_pod_lock_cycle() {
    let mut h = Harness::new();
    let pod = h.funded();
    let (_, _, withdraw_address) = p2wsh(5, 6);

    h.manager.delegate_pod(&h.owner, &pod, &h.app).unwrap();
    assert_eq!(h.manager.pod_app(&pod).unwrap(), Some(h.app.clone()));

    let err = h.manager.lock_pod(&h.owner, &pod).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authorization);

    h.manager.lock_pod(&h.app, &pod).unwrap();
    let err = h.manager.undelegate_pod(&h.owner, &pod).unwrap_err();
    assert!(matches!(err, ManagerError::PodLocked(_)));

    let err = h
        .manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &withdraw_address)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::StatePrecondition);

    h.manager.unlock_pod(&h.app, &pod).unwrap();
    h.manager.undelegate_pod(&h.owner, &pod).unwrap();
    assert_eq!(h.manager.pod_app(&pod).unwrap(), None);
}

#[test]
fn test_malformed_psbt_rejected() {
    assert!(matches!(
        parse_psbt_outputs(b"psbt\xff\x00"),
        Err(CodecError::PsbtTooShort(6))
    ));

    // global version 2 ahead of the unsigned transaction
    let mut v2 = b"psbt\xff".to_vec();
    v2.extend_from_slice(&[0x01, 0xfb, 0x04, 0x02, 0x00, 0x00, 0x00]);
    v2.extend_from_slice(&[0x01, 0x00, 0x0a, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    v2.push(0x00);
    assert!(matches!(
        parse_psbt_outputs(&v2),
        Err(CodecError::UnsupportedPsbtVersion(2))
    ));

    let mut h = Harness::new();
    let pod = h.funded();
    let (_, _, withdraw_address) = p2wsh(5, 6);
    h.manager
        .withdraw_bitcoin_psbt_request(&h.owner, &pod, &withdraw_address)
        .unwrap();
    let err = h
        .manager
        .withdraw_bitcoin_psbt(&h.service, &h.operator, &pod, v2)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::MalformedInput);
}

#[test]
fn test_pause_blocks_mutations_not_views() {
    let mut h = Harness::new();
    let pod = h.funded();
    let admin = h.manager.config().admin.clone();

    assert!(h.manager.pause(&h.owner).is_err());
    h.manager.pause(&admin).unwrap();

    let err = h
        .manager
        .verify_bitcoin_deposit_request(&h.owner, &pod, [0x33; 32], 1)
        .unwrap_err();
    assert!(matches!(err, ManagerError::Paused));
    assert_eq!(h.manager.pod(&pod).unwrap().balance(), DEPOSIT);

    h.manager.unpause(&admin).unwrap();
    h.manager
        .verify_bitcoin_deposit_request(&h.owner, &pod, [0x33; 32], 1)
        .unwrap();
}

#[tokio::test]
async fn test_events_follow_committed_changes() {
    let mut h = Harness::new();
    let mut rx = h.manager.subscribe();
    let pod = h.funded();

    let names: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|event| event.name())
        .collect();
    assert_eq!(
        names,
        vec![
            "pod_created",
            "deposit_requested",
            "deposit_confirmed",
            "balance_changed",
        ]
    );

    let err = h
        .manager
        .confirm_bitcoin_deposit(&h.service, &h.operator, &pod, [0x44; 32], 1)
        .unwrap_err();
    assert!(matches!(err, ManagerError::NoPendingDeposit(_)));
    assert!(rx.try_recv().is_err());

    h.manager.delegate_pod(&h.owner, &pod, &h.app).unwrap();
    assert_eq!(
        rx.recv().await.unwrap(),
        PodEvent::PodDelegated {
            pod: pod.clone(),
            app: h.app.clone(),
        }
    );
}
