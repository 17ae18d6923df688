//! Pod Manager
//!
//! Registry and orchestrator for custody pods. Owns the owner → pod,
//! pod → application, pod → deposit request and pod → withdrawal context
//! mappings and the running TVL, and is the only identity a pod obeys.
//!
//! # Flow:
//! 1. Owner creates a pod bound to an operator and a P2WSH custody address
//! 2. Owner announces a deposit; the operator confirms it through the
//!    service manager and the pod balance is minted
//! 3. Owner requests a withdrawal; the pod is locked and deactivated
//! 4. The operator returns signed bytes, then settles (burn) or the owner
//!    cancels before signing

pub mod auth;
pub mod error;
pub mod events;
pub mod service;

pub use auth::{authorize, Principals, Role};
pub use error::{ErrorClass, ManagerError};
pub use events::EventBus;
pub use service::{create_shared_manager, PodManager, SharedPodManager};
