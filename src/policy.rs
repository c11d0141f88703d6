use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Closed set of account roles. Stored as a Postgres enum and embedded in
/// session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standard,
    Servicedesk,
    Admin,
}

/// Everything a client can ask the API to do that is subject to a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTicket,
    ViewTicket,
    UpdateStatus,
    Assign,
    DeleteTicket,
    ShareTicket,
    ManageUsers,
    ManageOffices,
}

/// Ownership metadata of the ticket a resource-scoped action targets.
#[derive(Debug, Clone, Copy)]
pub struct TicketAccess {
    pub creator: Uuid,
    pub assignee: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Denials distinguish a missing resource from an existing one the actor may
/// not touch, so the API surface can answer 404 vs 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Forbidden,
    NotFound,
}

impl Decision {
    /// Convert a denial into the matching `ApiError`, naming the resource in
    /// the 404 case.
    pub fn check(self, resource: &'static str) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::NotFound) => Err(ApiError::NotFound(resource)),
            Decision::Deny(DenyReason::Forbidden) => {
                Err(ApiError::Forbidden("access denied".into()))
            }
        }
    }
}

fn targets_ticket(action: Action) -> bool {
    matches!(
        action,
        Action::ViewTicket
            | Action::UpdateStatus
            | Action::Assign
            | Action::DeleteTicket
            | Action::ShareTicket
    )
}

/// Pure access decision: (role, ownership) -> allow | deny.
///
/// A resource-scoped action on an absent ticket denies with `NotFound` for
/// every role; this runs before any grant so even admins get a plain 404.
pub fn can_perform(
    actor: Uuid,
    role: Role,
    action: Action,
    resource: Option<&TicketAccess>,
) -> Decision {
    if targets_ticket(action) && resource.is_none() {
        return Decision::Deny(DenyReason::NotFound);
    }

    match role {
        Role::Admin => Decision::Allow,
        Role::Servicedesk => match action {
            Action::CreateTicket
            | Action::ViewTicket
            | Action::UpdateStatus
            | Action::Assign
            | Action::ShareTicket => Decision::Allow,
            Action::DeleteTicket | Action::ManageUsers | Action::ManageOffices => {
                Decision::Deny(DenyReason::Forbidden)
            }
        },
        Role::Standard => match action {
            Action::CreateTicket => Decision::Allow,
            Action::ViewTicket | Action::ShareTicket => {
                match resource {
                    Some(r) if r.creator == actor => Decision::Allow,
                    _ => Decision::Deny(DenyReason::Forbidden),
                }
            }
            _ => Decision::Deny(DenyReason::Forbidden),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_by(creator: Uuid) -> TicketAccess {
        TicketAccess {
            creator,
            assignee: None,
        }
    }

    #[test]
    fn admin_is_allowed_everything_on_existing_resources() {
        let admin = Uuid::new_v4();
        let foreign = owned_by(Uuid::new_v4());
        for action in [
            Action::CreateTicket,
            Action::ViewTicket,
            Action::UpdateStatus,
            Action::Assign,
            Action::DeleteTicket,
            Action::ShareTicket,
            Action::ManageUsers,
            Action::ManageOffices,
        ] {
            assert_eq!(
                can_perform(admin, Role::Admin, action, Some(&foreign)),
                Decision::Allow,
                "admin denied {action:?}"
            );
        }
    }

    #[test]
    fn missing_resource_is_not_found_for_every_role() {
        let actor = Uuid::new_v4();
        for role in [Role::Standard, Role::Servicedesk, Role::Admin] {
            assert_eq!(
                can_perform(actor, role, Action::ViewTicket, None),
                Decision::Deny(DenyReason::NotFound)
            );
            assert_eq!(
                can_perform(actor, role, Action::DeleteTicket, None),
                Decision::Deny(DenyReason::NotFound)
            );
        }
    }

    #[test]
    fn servicedesk_triage_grants_and_limits() {
        let agent = Uuid::new_v4();
        let foreign = owned_by(Uuid::new_v4());
        for action in [
            Action::ViewTicket,
            Action::UpdateStatus,
            Action::Assign,
            Action::ShareTicket,
        ] {
            assert_eq!(
                can_perform(agent, Role::Servicedesk, action, Some(&foreign)),
                Decision::Allow
            );
        }
        assert_eq!(
            can_perform(agent, Role::Servicedesk, Action::DeleteTicket, Some(&foreign)),
            Decision::Deny(DenyReason::Forbidden)
        );
        assert_eq!(
            can_perform(agent, Role::Servicedesk, Action::ManageUsers, None),
            Decision::Deny(DenyReason::Forbidden)
        );
        assert_eq!(
            can_perform(agent, Role::Servicedesk, Action::ManageOffices, None),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn standard_user_only_sees_own_tickets() {
        let user = Uuid::new_v4();
        let own = owned_by(user);
        let foreign = owned_by(Uuid::new_v4());

        assert_eq!(
            can_perform(user, Role::Standard, Action::ViewTicket, Some(&own)),
            Decision::Allow
        );
        assert_eq!(
            can_perform(user, Role::Standard, Action::ShareTicket, Some(&own)),
            Decision::Allow
        );
        // A foreign ticket is never viewable, even when the user is the assignee.
        let assigned_foreign = TicketAccess {
            creator: Uuid::new_v4(),
            assignee: Some(user),
        };
        assert_eq!(
            can_perform(user, Role::Standard, Action::ViewTicket, Some(&foreign)),
            Decision::Deny(DenyReason::Forbidden)
        );
        assert_eq!(
            can_perform(
                user,
                Role::Standard,
                Action::ViewTicket,
                Some(&assigned_foreign)
            ),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn standard_user_cannot_triage_or_administer() {
        let user = Uuid::new_v4();
        let own = owned_by(user);
        for action in [Action::UpdateStatus, Action::Assign, Action::DeleteTicket] {
            assert_eq!(
                can_perform(user, Role::Standard, action, Some(&own)),
                Decision::Deny(DenyReason::Forbidden),
                "standard allowed {action:?} on own ticket"
            );
        }
        assert_eq!(
            can_perform(user, Role::Standard, Action::ManageUsers, None),
            Decision::Deny(DenyReason::Forbidden)
        );
        assert_eq!(
            can_perform(user, Role::Standard, Action::ManageOffices, None),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn every_role_may_create_tickets() {
        let actor = Uuid::new_v4();
        for role in [Role::Standard, Role::Servicedesk, Role::Admin] {
            assert_eq!(
                can_perform(actor, role, Action::CreateTicket, None),
                Decision::Allow
            );
        }
    }

    #[test]
    fn role_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::Servicedesk).unwrap(),
            "\"servicedesk\""
        );
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }
}
