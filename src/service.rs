use validator::Validate;

use crate::{
    error::ApiError,
    models::{NewUser, SuperuserCreate, User, UserChanges, UserUpdate},
    password,
    repository::UserSession,
};

/// UserService
///
/// CRUD operations for the user entity over one open session. The caller owns
/// acquisition and release of the session; the service only borrows it.
pub struct UserService<'s, S: UserSession + ?Sized> {
    session: &'s mut S,
}

impl<'s, S: UserSession + ?Sized> UserService<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self { session }
    }

    /// Users in ascending id order, skipping `offset`, at most `limit` of them.
    pub async fn get_users_paginated(&mut self, offset: u32, limit: u32) -> Result<Vec<User>, ApiError> {
        let rows = self
            .session
            .list_users(i64::from(offset), i64::from(limit))
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn find_user(&mut self, id: i64) -> Result<User, ApiError> {
        self.session
            .fetch_user(id)
            .await?
            .map(User::from)
            .ok_or(ApiError::NotFound)
    }

    /// Merges the present fields of `update` into the stored record. A new
    /// password is hashed before it is written.
    pub async fn update_user(&mut self, id: i64, update: UserUpdate) -> Result<User, ApiError> {
        update.validate()?;

        let hashed_password = match update.password {
            Some(plain) => Some(hash_off_thread(plain).await?),
            None => None,
        };
        let changes = UserChanges {
            username: update.username,
            email: update.email,
            full_name: update.full_name,
            hashed_password,
            is_active: update.is_active,
            is_superuser: update.is_superuser,
        };

        let row = self
            .session
            .update_user(id, &changes)
            .await?
            .ok_or(ApiError::NotFound)?;
        tracing::debug!(user_id = row.id, "user updated");
        Ok(row.into())
    }

    pub async fn delete_user(&mut self, id: i64) -> Result<(), ApiError> {
        if self.session.delete_user(id).await? {
            tracing::debug!(user_id = id, "user deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }

    /// Creates an active superuser account. A duplicate username surfaces as
    /// `Conflict` from the storage layer.
    pub async fn create_user(&mut self, payload: SuperuserCreate) -> Result<User, ApiError> {
        payload.validate()?;

        let new_user = NewUser {
            username: payload.username,
            email: payload.email,
            full_name: payload.full_name,
            hashed_password: hash_off_thread(payload.password).await?,
            is_active: true,
            is_superuser: true,
        };
        let row = self.session.insert_user(&new_user).await?;
        tracing::info!(user_id = row.id, username = %row.username, "superuser created");
        Ok(row.into())
    }
}

// Hashing runs on the blocking pool, never on an async worker.
async fn hash_off_thread(plain: String) -> Result<String, ApiError> {
    let hashed = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ApiError::Storage(format!("password hashing task failed: {e}")))??;
    Ok(hashed)
}
