//! # Invitation Codes
//!
//! ## Allocation Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for attempt in 1..=max_attempts (default 8):                          │
//! │      candidate = CodeSource::next_code()                               │
//! │      taken already?          ──► next attempt                          │
//! │      write with candidate                                              │
//! │        UNIQUE(invitation_code) violated ──► next attempt               │
//! │        ok                              ──► done                        │
//! │  all attempts used ──► CONFLICT                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pre-check skips known codes without opening a transaction; the unique
//! index still settles races between two bars picking the same candidate.

use chrono::Utc;
use std::future::Future;
use tracing::{debug, info, warn};
use uuid::Uuid;

use maquis_core::invitation::{normalize_code, parse_code};
use maquis_core::{Bar, CoreError, Membership, Operation, Role};
use maquis_db::{DbError, DbResult};

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

pub struct InvitationService<'a> {
    engine: &'a Engine,
}

impl<'a> InvitationService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        InvitationService { engine }
    }

    /// Gives a bar a new invitation code. The previous code stops working.
    pub async fn generate(&self, bar_id: &str, actor_id: &str) -> EngineResult<Bar> {
        self.engine
            .retry
            .run("generate_invitation_code", move || self.generate_once(bar_id, actor_id))
            .await
    }

    async fn generate_once(&self, bar_id: &str, actor_id: &str) -> EngineResult<Bar> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::RotateInvitationCode)
            .await?;

        let db = &self.engine.db;
        let bar = self
            .with_fresh_code(move |code| async move {
                db.bars()
                    .update_invitation_code(db.pool(), bar_id, &code, Utc::now())
                    .await
            })
            .await?
            .ok_or_else(|| EngineError::not_found("Bar", bar_id))?;

        info!(bar_id = %bar.id, "Invitation code regenerated");
        Ok(bar)
    }

    /// Enrolls `actor_id` in the bar holding `code`.
    ///
    /// New members join as waiters. Redeeming again while already an active
    /// member returns the existing membership unchanged.
    pub async fn redeem(&self, code: &str, actor_id: &str) -> EngineResult<Membership> {
        self.engine
            .retry
            .run("redeem_invitation_code", move || self.redeem_once(code, actor_id))
            .await
    }

    async fn redeem_once(&self, code: &str, actor_id: &str) -> EngineResult<Membership> {
        let db = &self.engine.db;
        let code = parse_code(code, self.engine.config.invitations.code_length)?;

        let bar = db
            .bars()
            .find_by_code(db.pool(), &code)
            .await?
            .ok_or_else(|| CoreError::InvalidCode(code.clone()))?;

        if bar.owner_id == actor_id {
            return Err(EngineError::conflict(format!("You already own {}", bar.name)));
        }

        if let Some(existing) = db.members().find(db.pool(), &bar.id, actor_id).await? {
            if existing.is_active {
                debug!(bar_id = %bar.id, user_id = %actor_id, "Already a member");
                return Ok(existing);
            }
            return Err(EngineError::conflict(format!(
                "Your access to {} was deactivated; ask the owner to restore it",
                bar.name
            )));
        }

        let member = Membership {
            id: Uuid::new_v4().to_string(),
            bar_id: bar.id.clone(),
            user_id: actor_id.to_string(),
            role: Role::default(),
            is_active: true,
            joined_at: Utc::now(),
        };

        match db.members().insert(db.pool(), &member).await {
            Ok(()) => {
                info!(bar_id = %bar.id, user_id = %actor_id, "Employee joined through invitation code");
                Ok(member)
            }
            // A concurrent redeem by the same user got there first.
            Err(err) if err.is_unique_violation() => db
                .members()
                .find(db.pool(), &bar.id, actor_id)
                .await?
                .filter(|m| m.is_active)
                .ok_or_else(move || EngineError::from(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Runs `write` with fresh code candidates until one sticks.
    pub(crate) async fn with_fresh_code<T, F, Fut>(&self, mut write: F) -> EngineResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let db = &self.engine.db;
        let max_attempts = self.engine.config.invitations.max_attempts;

        for attempt in 1..=max_attempts {
            let code = normalize_code(&self.engine.codes.next_code());

            if db.bars().code_exists(db.pool(), &code).await? {
                debug!(attempt, "Invitation code candidate already taken");
                continue;
            }

            match write(code).await {
                Ok(value) => return Ok(value),
                Err(err) if is_code_collision(&err) => {
                    debug!(attempt, "Invitation code taken concurrently");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(max_attempts, "Could not allocate a unique invitation code");
        Err(EngineError::conflict(format!(
            "Could not allocate a unique invitation code after {} attempts; try again",
            max_attempts
        )))
    }
}

fn is_code_collision(err: &DbError) -> bool {
    matches!(err, DbError::UniqueViolation { field, .. } if field.contains("invitation_code"))
}
