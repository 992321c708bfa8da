//! # Access Module
//!
//! Which roles may perform which operation.
//!
//! ```text
//! ┌──────────────────────────┬───────┬─────────┬─────────────────────────┐
//! │ Operation                │ owner │ cashier │ waiter                  │
//! ├──────────────────────────┼───────┼─────────┼─────────────────────────┤
//! │ create / view orders     │   ✓   │    ✓    │   ✓                     │
//! │ advance order            │   ✓   │    ✓    │   only if assigned      │
//! │ accept order             │       │         │   ✓                     │
//! │ assign / cancel order    │   ✓   │    ✓    │                         │
//! │ record payment           │   ✓   │    ✓    │                         │
//! │ open / close drawer      │   ✓   │    ✓    │                         │
//! │ manage products & stock  │   ✓   │    ✓    │                         │
//! │ dashboard                │   ✓   │    ✓    │                         │
//! │ edit bar, members, code  │   ✓   │         │                         │
//! └──────────────────────────┴───────┴─────────┴─────────────────────────┘
//! ```
//!
//! Roles are resolved by the engine from ownership and membership records.
//! Nothing here trusts a role supplied by a client.

use crate::error::{CoreError, CoreResult};
use crate::types::Role;

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateOrder,
    ViewOrders,
    AcceptOrder,
    AssignOrder,
    CancelOrder,
    RecordPayment,
    OpenRegister,
    CloseRegister,
    ManageProducts,
    RecordMovement,
    ViewDashboard,
    ManageBar,
    ManageMembers,
    RotateInvitationCode,
}

impl Operation {
    /// Roles allowed to perform the operation.
    pub const fn allowed_roles(&self) -> &'static [Role] {
        use Operation::*;
        match self {
            CreateOrder | ViewOrders => &[Role::Owner, Role::Cashier, Role::Waiter],
            AcceptOrder => &[Role::Waiter],
            AssignOrder | CancelOrder | RecordPayment | OpenRegister | CloseRegister
            | ManageProducts | RecordMovement | ViewDashboard => &[Role::Owner, Role::Cashier],
            ManageBar | ManageMembers | RotateInvitationCode => &[Role::Owner],
        }
    }

    pub const fn as_str(&self) -> &'static str {
        use Operation::*;
        match self {
            CreateOrder => "create orders",
            ViewOrders => "view orders",
            AcceptOrder => "accept orders",
            AssignOrder => "assign orders",
            CancelOrder => "cancel orders",
            RecordPayment => "record payments",
            OpenRegister => "open a cash register",
            CloseRegister => "close a cash register",
            ManageProducts => "manage products",
            RecordMovement => "record stock movements",
            ViewDashboard => "view the dashboard",
            ManageBar => "edit the bar",
            ManageMembers => "manage members",
            RotateInvitationCode => "regenerate the invitation code",
        }
    }

    pub fn is_allowed(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    /// Fails with `PermissionDenied` when `role` is not allowed.
    pub fn ensure_allowed(&self, role: Role) -> CoreResult<()> {
        if self.is_allowed(role) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                role: role.as_str().to_string(),
                action: self.as_str().to_string(),
            })
        }
    }
}

/// Whether `actor_id` holding `role` may advance an order assigned to
/// `assignee`.
///
/// Owners and cashiers always may. A waiter may only move their own orders.
pub fn can_advance(role: Role, actor_id: &str, assignee: Option<&str>) -> bool {
    match role {
        Role::Owner | Role::Cashier => true,
        Role::Waiter => assignee == Some(actor_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_gates() {
        assert!(Operation::CreateOrder.is_allowed(Role::Waiter));
        assert!(Operation::AcceptOrder.is_allowed(Role::Waiter));
        assert!(!Operation::RecordPayment.is_allowed(Role::Waiter));
        assert!(!Operation::OpenRegister.is_allowed(Role::Waiter));
    }

    #[test]
    fn test_owner_only_operations() {
        assert!(Operation::ManageMembers.ensure_allowed(Role::Owner).is_ok());
        let err = Operation::ManageMembers
            .ensure_allowed(Role::Cashier)
            .unwrap_err();
        assert_eq!(err.to_string(), "A cashier is not allowed to manage members");
    }

    #[test]
    fn test_can_advance() {
        assert!(can_advance(Role::Owner, "u1", None));
        assert!(can_advance(Role::Cashier, "u1", Some("u2")));
        assert!(can_advance(Role::Waiter, "u1", Some("u1")));
        assert!(!can_advance(Role::Waiter, "u1", Some("u2")));
        assert!(!can_advance(Role::Waiter, "u1", None));
    }
}
