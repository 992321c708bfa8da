//! # Tenant Directory
//!
//! Which bars an actor can work in, which one they are working in right now,
//! and who works where.
//!
//! ```text
//! list_accessible(actor)  =  bars owned  ∪  bars with an active membership
//!                            (one row per bar, ordered by name)
//!
//! select(actor, bar)      →  remembered in memory for this process only
//! current(actor)          →  the selection, or the first accessible bar
//! ```

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use maquis_core::validation::{validate_name, validate_optional_text};
use maquis_core::{Bar, Membership, Operation, Role, ValidationError};
use maquis_db::DbError;

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

/// Input for [`TenantService::create`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBar {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Owner edits of a bar. `None` keeps a field; a blank string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BarUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

pub struct TenantService<'a> {
    engine: &'a Engine,
}

impl<'a> TenantService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        TenantService { engine }
    }

    // =========================================================================
    // Access & Selection
    // =========================================================================

    pub async fn list_accessible(&self, actor_id: &str) -> EngineResult<Vec<Bar>> {
        Ok(self.engine.db.bars().list_accessible(actor_id).await?)
    }

    /// Makes `bar_id` the actor's current bar.
    ///
    /// ## Errors
    /// `NOT_FOUND` when the bar does not exist or is not accessible to the
    /// actor; the two cases are not told apart.
    pub async fn select(&self, actor_id: &str, bar_id: &str) -> EngineResult<Bar> {
        let bar = self
            .list_accessible(actor_id)
            .await?
            .into_iter()
            .find(|b| b.id == bar_id)
            .ok_or_else(|| EngineError::not_found("Bar", bar_id))?;

        self.engine
            .selections
            .write()
            .await
            .insert(actor_id.to_string(), bar.id.clone());

        debug!(user_id = %actor_id, bar_id = %bar.id, "Current bar selected");
        Ok(bar)
    }

    /// The actor's current bar.
    ///
    /// Falls back to the first accessible bar when nothing is selected or the
    /// selection is no longer accessible. `None` when the actor has no bar.
    pub async fn current(&self, actor_id: &str) -> EngineResult<Option<Bar>> {
        let accessible = self.list_accessible(actor_id).await?;
        let selected = self.engine.selections.read().await.get(actor_id).cloned();

        if let Some(bar_id) = selected {
            if let Some(bar) = accessible.iter().find(|b| b.id == bar_id) {
                return Ok(Some(bar.clone()));
            }
        }

        let Some(first) = accessible.into_iter().next() else {
            self.engine.selections.write().await.remove(actor_id);
            return Ok(None);
        };

        self.engine
            .selections
            .write()
            .await
            .insert(actor_id.to_string(), first.id.clone());
        Ok(Some(first))
    }

    /// The actor's role in a bar.
    pub async fn role_of(&self, actor_id: &str, bar_id: &str) -> EngineResult<Role> {
        Ok(access::resolve(&self.engine.db, bar_id, actor_id).await?.role)
    }

    // =========================================================================
    // Bars
    // =========================================================================

    /// Creates a bar owned by `owner_id`.
    ///
    /// The bar, its invitation code and the owner's membership are written
    /// together.
    pub async fn create(&self, owner_id: &str, input: NewBar) -> EngineResult<Bar> {
        if owner_id.trim().is_empty() {
            return Err(ValidationError::required("owner_id").into());
        }

        let now = Utc::now();
        let template = Bar {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: validate_name("name", &input.name)?,
            description: validate_optional_text("description", input.description.as_deref())?,
            address: validate_optional_text("address", input.address.as_deref())?,
            phone: validate_optional_text("phone", input.phone.as_deref())?,
            invitation_code: String::new(),
            created_at: now,
            updated_at: now,
        };
        let template = &template;
        let db = &self.engine.db;

        let bar = self
            .engine
            .retry
            .run("create_bar", move || async move {
                self.engine
                    .invitations()
                    .with_fresh_code(move |code| async move {
                        let bar = Bar {
                            invitation_code: code,
                            ..template.clone()
                        };
                        let owner = Membership {
                            id: Uuid::new_v4().to_string(),
                            bar_id: bar.id.clone(),
                            user_id: bar.owner_id.clone(),
                            role: Role::Owner,
                            is_active: true,
                            joined_at: bar.created_at,
                        };

                        let mut tx = db.begin().await?;
                        db.bars().insert(&mut *tx, &bar).await?;
                        db.members().insert(&mut *tx, &owner).await?;
                        tx.commit().await?;

                        Ok::<_, DbError>(bar)
                    })
                    .await
            })
            .await?;

        info!(bar_id = %bar.id, owner_id = %owner_id, name = %bar.name, "Bar created");
        Ok(bar)
    }

    /// Owner edits of name and contact details.
    pub async fn update(&self, bar_id: &str, actor_id: &str, changes: BarUpdate) -> EngineResult<Bar> {
        let ctx = access::authorize(&self.engine.db, bar_id, actor_id, Operation::ManageBar).await?;
        let mut bar = ctx.bar;

        if let Some(name) = &changes.name {
            bar.name = validate_name("name", name)?;
        }
        if let Some(description) = &changes.description {
            bar.description = validate_optional_text("description", Some(description.as_str()))?;
        }
        if let Some(address) = &changes.address {
            bar.address = validate_optional_text("address", Some(address.as_str()))?;
        }
        if let Some(phone) = &changes.phone {
            bar.phone = validate_optional_text("phone", Some(phone.as_str()))?;
        }
        bar.updated_at = Utc::now();

        let db = &self.engine.db;
        let updated = db
            .bars()
            .update_details(db.pool(), &bar)
            .await?
            .ok_or_else(|| EngineError::not_found("Bar", bar_id))?;

        info!(bar_id = %updated.id, "Bar details updated");
        Ok(updated)
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub async fn list_members(&self, bar_id: &str, actor_id: &str) -> EngineResult<Vec<Membership>> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ManageMembers).await?;
        Ok(self.engine.db.members().list_for_bar(bar_id).await?)
    }

    /// Revokes an employee's access. The membership row is kept.
    pub async fn deactivate_member(
        &self,
        bar_id: &str,
        actor_id: &str,
        user_id: &str,
    ) -> EngineResult<Membership> {
        let ctx = access::authorize(&self.engine.db, bar_id, actor_id, Operation::ManageMembers)
            .await?;
        if ctx.bar.owner_id == user_id {
            return Err(EngineError::validation("The owner of a bar cannot be deactivated"));
        }

        let db = &self.engine.db;
        let member = db
            .members()
            .set_active(db.pool(), bar_id, user_id, false)
            .await?
            .ok_or_else(|| EngineError::not_found("Member", user_id))?;

        info!(bar_id = %bar_id, user_id = %user_id, "Member deactivated");
        Ok(member)
    }

    /// Moves an employee between the cashier and waiter roles.
    pub async fn change_member_role(
        &self,
        bar_id: &str,
        actor_id: &str,
        user_id: &str,
        role: Role,
    ) -> EngineResult<Membership> {
        let ctx = access::authorize(&self.engine.db, bar_id, actor_id, Operation::ManageMembers)
            .await?;
        if role == Role::Owner {
            return Err(EngineError::validation("A bar has exactly one owner"));
        }
        if ctx.bar.owner_id == user_id {
            return Err(EngineError::validation("The owner's role cannot be changed"));
        }

        let db = &self.engine.db;
        let member = db
            .members()
            .set_role(db.pool(), bar_id, user_id, role)
            .await?
            .ok_or_else(|| EngineError::not_found("Member", user_id))?;

        info!(bar_id = %bar_id, user_id = %user_id, role = %role, "Member role changed");
        Ok(member)
    }
}
