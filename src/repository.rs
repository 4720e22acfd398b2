use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::{PgPool, Postgres, pool::PoolConnection, query_builder::QueryBuilder};

use crate::{
    error::ApiError,
    models::{NewUser, UserChanges, UserRow},
};

const USER_COLUMNS: &str =
    "id, username, email, full_name, hashed_password, is_active, is_superuser, created_at, updated_at";

/// UserSession Trait
///
/// A scoped handle to storage, valid for the duration of one request. Every
/// operation re-reads or re-writes through the handle; nothing is cached.
/// Dropping the handle returns its connection to the pool.
#[async_trait]
pub trait UserSession: Send {
    /// Users in primary-key order, skipping `offset`, at most `limit` rows.
    async fn list_users(&mut self, offset: i64, limit: i64) -> Result<Vec<UserRow>, ApiError>;
    async fn fetch_user(&mut self, id: i64) -> Result<Option<UserRow>, ApiError>;
    /// Merges only the present fields. `None` when the id does not exist.
    async fn update_user(
        &mut self,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<UserRow>, ApiError>;
    /// Returns true if a row was removed.
    async fn delete_user(&mut self, id: i64) -> Result<bool, ApiError>;
    async fn insert_user(&mut self, user: &NewUser) -> Result<UserRow, ApiError>;
}

/// Repository Trait
///
/// The process-wide storage resource. It hands out per-request sessions and
/// is disposed exactly once at shutdown.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn session(&self) -> Result<Box<dyn UserSession>, ApiError>;
    /// Releases the underlying pool. Calling it again is a no-op.
    async fn dispose(&self);
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

/// PostgresRepository
///
/// `Repository` backed by a sqlx `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
    disposed: AtomicBool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            disposed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn session(&self) -> Result<Box<dyn UserSession>, ApiError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!("session acquire error: {:?}", e);
            ApiError::from(e)
        })?;
        Ok(Box::new(PgSession { conn }))
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

/// PgSession
///
/// One pooled connection held for the lifetime of a request.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl UserSession for PgSession {
    async fn list_users(&mut self, offset: i64, limit: i64) -> Result<Vec<UserRow>, ApiError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| {
                tracing::error!("list_users error: {:?}", e);
                ApiError::from(e)
            })
    }

    async fn fetch_user(&mut self, id: i64) -> Result<Option<UserRow>, ApiError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| {
                tracing::error!("fetch_user error: {:?}", e);
                ApiError::from(e)
            })
    }

    /// Builds `SET` only for the present fields.
    async fn update_user(
        &mut self,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<UserRow>, ApiError> {
        if changes.is_empty() {
            return self.fetch_user(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut set = builder.separated(", ");
        if let Some(username) = &changes.username {
            set.push("username = ").push_bind_unseparated(username.clone());
        }
        if let Some(email) = &changes.email {
            // An explicit clear binds NULL.
            set.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(full_name) = &changes.full_name {
            set.push("full_name = ").push_bind_unseparated(full_name.clone());
        }
        if let Some(hash) = &changes.hashed_password {
            set.push("hashed_password = ").push_bind_unseparated(hash.clone());
        }
        if let Some(is_active) = changes.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        if let Some(is_superuser) = changes.is_superuser {
            set.push("is_superuser = ").push_bind_unseparated(is_superuser);
        }
        set.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {USER_COLUMNS}"));

        builder
            .build_query_as::<UserRow>()
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| {
                tracing::error!("update_user error: {:?}", e);
                ApiError::from(e)
            })
    }

    async fn delete_user(&mut self, id: i64) -> Result<bool, ApiError> {
        match sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await
        {
            Ok(res) => Ok(res.rows_affected() > 0),
            Err(e) => {
                tracing::error!("delete_user error: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<UserRow, ApiError> {
        let query = format!(
            "INSERT INTO users (username, email, full_name, hashed_password, is_active, is_superuser) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.hashed_password)
            .bind(user.is_active)
            .bind(user.is_superuser)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| {
                // Unique violations are expected traffic, everything else is logged.
                let err = ApiError::from(e);
                if matches!(err, ApiError::Storage(_)) {
                    tracing::error!("insert_user error: {:?}", err);
                }
                err
            })
    }
}

// --- In-memory ---

#[cfg(feature = "test-support")]
mod memory;
#[cfg(feature = "test-support")]
pub use memory::MemoryRepository;

// --- Request extractor ---

/// DbSession
///
/// Acquires one session at the start of a request. The handle is dropped when
/// the handler returns, on success and error paths alike.
pub struct DbSession(pub Box<dyn UserSession>);

impl<S> FromRequestParts<S> for DbSession
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        repo.session().await.map(DbSession)
    }
}
