//! # Role Resolution
//!
//! Roles are looked up on every call, never taken from the caller.
//!
//! ```text
//! actor_id, bar_id
//!      │
//!      ├── bar.owner_id == actor_id ─────────────► Owner
//!      ├── active membership ────────────────────► membership.role
//!      └── none / deactivated ───────────────────► FORBIDDEN
//! ```
//!
//! Lookups run on the pool, before any transaction is opened.

use maquis_core::{Bar, Operation, Role};
use maquis_db::Database;

use crate::error::{EngineError, EngineResult};

/// Who the actor is inside one bar.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub bar: Bar,
    pub role: Role,
}

impl ActorContext {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

/// Resolves the role of `actor_id` in `bar_id`.
pub async fn resolve(db: &Database, bar_id: &str, actor_id: &str) -> EngineResult<ActorContext> {
    let bar = db
        .bars()
        .find_by_id(db.pool(), bar_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Bar", bar_id))?;

    if bar.owner_id == actor_id {
        return Ok(ActorContext {
            bar,
            role: Role::Owner,
        });
    }

    match db.members().find(db.pool(), bar_id, actor_id).await? {
        Some(member) if member.is_active => Ok(ActorContext {
            bar,
            role: member.role,
        }),
        Some(_) => Err(EngineError::forbidden(format!(
            "Your access to {} has been deactivated",
            bar.name
        ))),
        None => Err(EngineError::forbidden(format!(
            "You are not a member of {}",
            bar.name
        ))),
    }
}

/// Resolves the actor's role and checks it against `operation`.
pub async fn authorize(
    db: &Database,
    bar_id: &str,
    actor_id: &str,
    operation: Operation,
) -> EngineResult<ActorContext> {
    let ctx = resolve(db, bar_id, actor_id).await?;
    operation.ensure_allowed(ctx.role)?;
    Ok(ctx)
}
