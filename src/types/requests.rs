//! Pending Request Types
//!
//! The two asynchronous settlement protocols are modelled as explicit
//! pending state: one deposit request and one withdrawal context per pod.

use serde::{Deserialize, Serialize};

/// A Bitcoin transaction id as raw bytes
pub type TxId = [u8; 32];

/// Owner-declared deposit awaiting operator confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Bitcoin transaction that funds the deposit
    pub tx_id: TxId,
    /// Amount in satoshis
    pub amount: u64,
    /// Always true while stored: a confirmed request is removed, not kept
    /// as settled
    pub is_pending: bool,
    /// Timestamp when the request was created
    pub requested_at: u64,
}

impl DepositRequest {
    pub fn new(tx_id: TxId, amount: u64) -> Self {
        Self {
            tx_id,
            amount,
            is_pending: true,
            requested_at: super::unix_now(),
        }
    }

    /// Whether a confirmation payload settles this request
    ///
    /// A request built outside the store with `is_pending` cleared never
    /// matches.
    pub fn matches(&self, tx_id: &TxId, amount: u64) -> bool {
        self.is_pending && &self.tx_id == tx_id && self.amount == amount
    }

    pub fn tx_id_hex(&self) -> String {
        hex::encode(self.tx_id)
    }
}

/// Which withdrawal path the owner chose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    /// Operator returns a PSBT carrying its signature
    Psbt,
    /// Owner supplied a pre-signed PSBT, operator returns the complete transaction
    CompleteTx,
}

impl std::fmt::Display for WithdrawalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Psbt => write!(f, "psbt"),
            Self::CompleteTx => write!(f, "complete_tx"),
        }
    }
}

/// Owner-initiated withdrawal awaiting operator action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalContext {
    /// Destination bech32 address
    pub withdraw_address: String,
    /// scriptPubKey the address decodes to
    pub script_pubkey: Vec<u8>,
    /// Pod balance at request time; the pod is locked so it cannot drift
    pub amount: u64,
    /// Owner's pre-signed PSBT (complete transaction path only)
    pub presigned_tx: Option<Vec<u8>>,
    /// Timestamp when the request was created
    pub requested_at: u64,
}

impl WithdrawalContext {
    pub fn new(
        withdraw_address: String,
        script_pubkey: Vec<u8>,
        amount: u64,
        presigned_tx: Option<Vec<u8>>,
    ) -> Self {
        Self {
            withdraw_address,
            script_pubkey,
            amount,
            presigned_tx,
            requested_at: super::unix_now(),
        }
    }

    pub fn kind(&self) -> WithdrawalKind {
        if self.presigned_tx.is_some() {
            WithdrawalKind::CompleteTx
        } else {
            WithdrawalKind::Psbt
        }
    }
}
