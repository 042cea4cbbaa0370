use super::{RegistryError, normalize_email};
use crate::entity::user;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Persistent user store backed by the `users` table.
#[derive(Clone, Debug)]
pub struct UserRegistry {
    db: Arc<DatabaseConnection>,
}

fn live() -> sea_orm::sea_query::SimpleExpr {
    user::Column::DeletedAt.is_null()
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl UserRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Round trip to the database without touching any rows.
    pub async fn ping(&self) -> Result<(), RegistryError> {
        Ok(self.db.ping().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, RegistryError> {
        Ok(user::Entity::find_by_id(id)
            .filter(live())
            .one(self.db.as_ref())
            .await?)
    }

    /// Look up a live user by email. The address is normalized first, so an
    /// unparseable address simply matches nobody.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, RegistryError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .filter(live())
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<user::Model>, RegistryError> {
        Ok(user::Entity::find()
            .filter(live())
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Provision a new user. Only provisioned users may log in.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, email: &str) -> Result<user::Model, RegistryError> {
        let email = normalize_email(email)?;
        if self.find_by_email(&email).await?.is_some() {
            return Err(RegistryError::UserAlreadyExists(email));
        }

        let now = OffsetDateTime::now_utc();
        let model = user::ActiveModel {
            email: Set(email.clone()),
            name: Set(None),
            picture: Set(None),
            last_login_sub: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };

        let created = model.insert(self.db.as_ref()).await.map_err(|e| {
            if is_unique_violation(&e) {
                RegistryError::UserAlreadyExists(email.clone())
            } else {
                RegistryError::Db(e)
            }
        })?;
        tracing::info!(user_id = created.id, "user provisioned");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_email(&self, id: i32, email: &str) -> Result<user::Model, RegistryError> {
        let email = normalize_email(email)?;
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::UserNotFound(id))?;
        if existing.email == email {
            return Ok(existing);
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(RegistryError::EmailAlreadyInUse(email));
        }

        let mut active: user::ActiveModel = existing.into();
        active.email = Set(email.clone());
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(self.db.as_ref()).await.map_err(|e| {
            if is_unique_violation(&e) {
                RegistryError::EmailAlreadyInUse(email)
            } else {
                RegistryError::Db(e)
            }
        })
    }

    /// Mark a user deleted. Their email becomes free for a new registration.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete(&self, id: i32) -> Result<(), RegistryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::UserNotFound(id))?;

        let now = OffsetDateTime::now_utc();
        let mut active: user::ActiveModel = existing.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db.as_ref()).await?;
        tracing::info!(user_id = id, "user soft-deleted");
        Ok(())
    }

    /// Store the profile the broker reported at the latest successful login.
    #[tracing::instrument(skip(self, name, picture))]
    pub async fn record_login(
        &self,
        id: i32,
        name: &str,
        picture: &str,
        subject: &str,
    ) -> Result<user::Model, RegistryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::UserNotFound(id))?;

        let now = OffsetDateTime::now_utc();
        let mut active: user::ActiveModel = existing.into();
        active.name = Set(Some(name.to_string()));
        active.picture = Set(Some(picture.to_string()));
        active.last_login_sub = Set(Some(subject.to_string()));
        active.last_login_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(active.update(self.db.as_ref()).await?)
    }
}
