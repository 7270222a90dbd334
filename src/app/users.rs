//! User account operations.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, CreateUserRequest, DatabaseError, EntityId, NewUser, Page, Resource,
    UpdateUserRequest, User, UserListQuery, UserRepository,
};

/// Orchestrates user validation, uniqueness checks, and persistence.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Creates a user after normalizing and validating the payload.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for malformed fields and
    /// `AppError::DuplicateEmail` when the email is already taken.
    #[instrument(skip(self, payload), fields(email = %payload.email))]
    pub async fn create(&self, mut payload: CreateUserRequest) -> Result<User, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid create user request");
            AppError::from(err)
        })?;

        if self.users.find_by_email(&payload.email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let new_user = NewUser {
            name: payload.name,
            email: payload.email,
            role: payload.role.unwrap_or_default(),
            image: payload.image,
        };
        let user = self
            .users
            .create(&new_user)
            .await
            .map_err(map_unique_violation)?;
        info!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: EntityId) -> Result<User, AppError> {
        self.users
            .get(id)
            .await?
            .ok_or(AppError::NotFound(Resource::User))
    }

    /// Lists users matching the query's role/search filters, newest first.
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: UserListQuery) -> Result<Page<User>, AppError> {
        let window = query.window();
        let filter = query.filter();
        let (users, total) = self.users.list(&filter, window.limit(), window.offset()).await?;
        Ok(Page::new(users, window.pagination(total)))
    }

    /// Applies a partial update. Changing the email re-runs the uniqueness
    /// check, excluding the user's own row.
    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        id: EntityId,
        mut payload: UpdateUserRequest,
    ) -> Result<User, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid update user request");
            AppError::from(err)
        })?;
        if payload.is_empty() {
            return Err(AppError::invalid_field("body", "No fields to update"));
        }

        if let Some(email) = &payload.email {
            if let Some(existing) = self.users.find_by_email(email).await? {
                if existing.id != id {
                    return Err(AppError::DuplicateEmail);
                }
            }
        }

        let user = self
            .users
            .update(id, &payload)
            .await
            .map_err(map_unique_violation)?
            .ok_or(AppError::NotFound(Resource::User))?;
        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<User, AppError> {
        let user = self
            .users
            .delete(id)
            .await?
            .ok_or(AppError::NotFound(Resource::User))?;
        info!(user_id = user.id, "user deleted");
        Ok(user)
    }
}

/// The unique index on email is the authoritative duplicate signal; a
/// violation surfacing from the store maps to the same conflict code as
/// the pre-check.
fn map_unique_violation(err: AppError) -> AppError {
    match err {
        AppError::Database(DatabaseError::Duplicate(_)) => AppError::DuplicateEmail,
        other => other,
    }
}
