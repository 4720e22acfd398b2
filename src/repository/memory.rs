//! In-process `Repository` for integration tests, behind the `test-support`
//! feature.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use super::{Repository, UserSession};
use crate::{
    error::ApiError,
    models::{NewUser, UserChanges, UserRow},
};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, UserRow>,
    // Last id handed out. Ids are never reused, even after deletion.
    last_id: i64,
}

/// MemoryRepository
///
/// In-process `Repository` with the same observable semantics as the Postgres
/// one: id order, monotonic never-reused ids, and username uniqueness. Backs
/// the test suites.
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    available: bool,
    disposed: AtomicBool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            available: true,
            disposed: AtomicBool::new(false),
        }
    }

    /// A repository whose every session request fails, simulating an outage.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Inserts a row directly, bypassing any session.
    pub fn seed(&self, user: NewUser) -> Result<UserRow, ApiError> {
        let mut state = lock(&self.state)?;
        insert_row(&mut state, &user)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).map(|s| s.users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn session(&self) -> Result<Box<dyn UserSession>, ApiError> {
        if !self.available {
            return Err(ApiError::Storage("storage unavailable".into()));
        }
        if self.is_disposed() {
            return Err(ApiError::Storage("repository disposed".into()));
        }
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }

    async fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::info!("memory repository disposed");
        }
    }
}

struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, ApiError> {
    state
        .lock()
        .map_err(|_| ApiError::Storage("memory store lock poisoned".into()))
}

fn username_taken(state: &MemoryState, username: &str, except: Option<i64>) -> bool {
    state
        .users
        .values()
        .any(|u| u.username == username && Some(u.id) != except)
}

fn insert_row(state: &mut MemoryState, user: &NewUser) -> Result<UserRow, ApiError> {
    if username_taken(state, &user.username, None) {
        return Err(ApiError::Conflict(format!(
            "username '{}' is already registered",
            user.username
        )));
    }
    state.last_id += 1;
    let now = Utc::now();
    let row = UserRow {
        id: state.last_id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        hashed_password: user.hashed_password.clone(),
        is_active: user.is_active,
        is_superuser: user.is_superuser,
        created_at: now,
        updated_at: now,
    };
    state.users.insert(row.id, row.clone());
    Ok(row)
}

#[async_trait]
impl UserSession for MemorySession {
    async fn list_users(&mut self, offset: i64, limit: i64) -> Result<Vec<UserRow>, ApiError> {
        let state = lock(&self.state)?;
        Ok(state
            .users
            .values()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn fetch_user(&mut self, id: i64) -> Result<Option<UserRow>, ApiError> {
        Ok(lock(&self.state)?.users.get(&id).cloned())
    }

    async fn update_user(
        &mut self,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<UserRow>, ApiError> {
        let mut state = lock(&self.state)?;
        if !state.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(username) = &changes.username {
            if username_taken(&state, username, Some(id)) {
                return Err(ApiError::Conflict(format!(
                    "username '{username}' is already registered"
                )));
            }
        }
        let Some(row) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(row.clone()));
        }
        if let Some(username) = &changes.username {
            row.username = username.clone();
        }
        if let Some(email) = &changes.email {
            row.email = email.clone();
        }
        if let Some(full_name) = &changes.full_name {
            row.full_name = full_name.clone();
        }
        if let Some(hash) = &changes.hashed_password {
            row.hashed_password = hash.clone();
        }
        if let Some(is_active) = changes.is_active {
            row.is_active = is_active;
        }
        if let Some(is_superuser) = changes.is_superuser {
            row.is_superuser = is_superuser;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_user(&mut self, id: i64) -> Result<bool, ApiError> {
        Ok(lock(&self.state)?.users.remove(&id).is_some())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<UserRow, ApiError> {
        let mut state = lock(&self.state)?;
        insert_row(&mut state, user)
    }
}
