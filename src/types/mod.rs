//! Shared Types Module
//!
//! Data types shared across the pod protocol.

pub mod events;
pub mod identity;
pub mod requests;
pub mod units;

// Re-exports for convenience
pub use events::PodEvent;
pub use identity::{AccountId, PodId};
pub use requests::{DepositRequest, TxId, WithdrawalContext, WithdrawalKind};
pub use units::{parse_sats, sats_to_btc_string, sats_to_display, SATS_PER_BTC};

/// Current unix time in seconds
pub(crate) fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
