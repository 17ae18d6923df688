//! Bitcoin Custody Pod Protocol
//!
//! Bookkeeping and authorization for Bitcoin held in per-user 2-of-2
//! custody (owner + operator) instead of a bridge contract.
//!
//! ## Layers
//!
//! 1. **Codec** - P2WSH scripts, bech32 addresses, PSBT and transaction parsing
//! 2. **Pod** - per-user custody state machine (balance, lock, Active/Inactive)
//! 3. **Manager** - creates pods, mediates delegation, and drives the deposit
//!    and withdrawal settlement protocols
//!
//! The operator registry, the application registry and the value-accounting
//! token are collaborators: the first two are traits in [`registry`], the
//! last subscribes to [`PodEvent`]s.

pub mod codec;
pub mod common;
pub mod manager;
pub mod pod;
pub mod registry;
pub mod storage;
pub mod types;

// Re-exports: codec
pub use codec::{
    bech32_to_script_pubkey, build_multisig_script, extract_two_public_keys, parse_psbt_outputs,
    parse_transaction_outputs, script_pubkey_to_bech32, script_to_script_pubkey,
    script_to_witness_program, verify_script_matches_witness_program, CodecError, TxOutput,
};

// Re-exports: config, logging, errors
pub use common::{Network, PodConfig, PodProtocolError};

// Re-exports: pod and manager
pub use manager::{
    create_shared_manager, ErrorClass, ManagerError, PodManager, Role, SharedPodManager,
};
pub use pod::{Pod, PodError, PodState, StateTransition};

// Re-exports: collaborators and storage
pub use registry::{AppRegistry, OperatorRegistry, StaticAppRegistry, StaticOperatorRegistry};
pub use storage::{MemoryPodStore, PodStore, PodWrite, StorageError};

// Re-exports: shared types
pub use types::{
    AccountId, DepositRequest, PodEvent, PodId, TxId, WithdrawalContext, WithdrawalKind,
};
