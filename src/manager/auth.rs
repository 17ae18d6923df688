//! Authorization predicates
//!
//! Each manager operation starts by naming the roles allowed to call it.
//! Roles are resolved against the principals of the pod being acted on.

use super::error::ManagerError;
use crate::common::logging::log_security_event;
use crate::types::AccountId;

/// Caller roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Configured administrator
    Admin,
    /// Owner of the pod
    Owner,
    /// Application the pod is currently delegated to
    DelegatedApp,
    /// Signature-verification service relaying operator actions
    ServiceManager,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Owner => "pod owner",
            Role::DelegatedApp => "delegated application",
            Role::ServiceManager => "service manager",
        };
        write!(f, "{}", s)
    }
}

/// Identities the roles resolve to for one call
#[derive(Debug, Clone, Copy)]
pub struct Principals<'a> {
    pub admin: &'a AccountId,
    pub service_manager: &'a AccountId,
    pub owner: Option<&'a AccountId>,
    pub delegated_app: Option<&'a AccountId>,
}

impl<'a> Principals<'a> {
    pub fn new(admin: &'a AccountId, service_manager: &'a AccountId) -> Self {
        Self {
            admin,
            service_manager,
            owner: None,
            delegated_app: None,
        }
    }

    pub fn with_owner(mut self, owner: &'a AccountId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_delegated_app(mut self, app: Option<&'a AccountId>) -> Self {
        self.delegated_app = app;
        self
    }
}

impl Role {
    pub fn is_held_by(&self, caller: &AccountId, principals: &Principals<'_>) -> bool {
        match self {
            Role::Admin => caller == principals.admin,
            Role::ServiceManager => caller == principals.service_manager,
            Role::Owner => principals.owner == Some(caller),
            Role::DelegatedApp => principals.delegated_app == Some(caller),
        }
    }
}

/// Succeeds with the first of `allowed` the caller holds
pub fn authorize(
    operation: &str,
    caller: &AccountId,
    allowed: &[Role],
    principals: &Principals<'_>,
) -> Result<Role, ManagerError> {
    if let Some(role) = allowed.iter().find(|r| r.is_held_by(caller, principals)) {
        return Ok(*role);
    }

    let role = allowed
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" or ");

    log_security_event(
        "unauthorized_call",
        false,
        serde_json::json!({
            "operation": operation,
            "caller": caller.as_str(),
            "required": role,
        }),
        None,
    );

    Err(ManagerError::Unauthorized {
        role,
        caller: caller.clone(),
    })
}

/// Refuse mutating calls while paused
pub fn ensure_not_paused(operation: &str, paused: bool) -> Result<(), ManagerError> {
    if paused {
        tracing::warn!(target: "btcpod::security", operation, "Refused while paused");
        return Err(ManagerError::Paused);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AccountId, AccountId, AccountId, AccountId) {
        (
            AccountId::from("admin"),
            AccountId::from("svc"),
            AccountId::from("alice"),
            AccountId::from("app"),
        )
    }

    #[test]
    fn test_single_role() {
        let (admin, svc, alice, app) = ids();
        let principals = Principals::new(&admin, &svc).with_owner(&alice);

        assert_eq!(
            authorize("delegate_pod", &alice, &[Role::Owner], &principals),
            Ok(Role::Owner)
        );
        let err = authorize("delegate_pod", &app, &[Role::Owner], &principals).unwrap_err();
        assert_eq!(
            err,
            ManagerError::Unauthorized {
                role: "pod owner".into(),
                caller: app.clone()
            }
        );
    }

    #[test]
    fn test_composed_roles() {
        let (admin, svc, alice, app) = ids();
        let principals = Principals::new(&admin, &svc)
            .with_owner(&alice)
            .with_delegated_app(Some(&app));
        let allowed = [Role::Owner, Role::DelegatedApp];

        assert_eq!(authorize("op", &app, &allowed, &principals), Ok(Role::DelegatedApp));
        assert_eq!(authorize("op", &alice, &allowed, &principals), Ok(Role::Owner));

        let err = authorize("op", &svc, &allowed, &principals).unwrap_err();
        assert!(err.to_string().contains("pod owner or delegated application"));
    }

    #[test]
    fn test_missing_principal_never_matches() {
        let (admin, svc, _, app) = ids();
        let principals = Principals::new(&admin, &svc);
        assert!(authorize("lock_pod", &app, &[Role::DelegatedApp], &principals).is_err());
    }

    #[test]
    fn test_pause_gate() {
        assert!(ensure_not_paused("create_pod", false).is_ok());
        assert_eq!(ensure_not_paused("create_pod", true), Err(ManagerError::Paused));
    }
}
