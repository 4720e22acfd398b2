use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// --- Core Schemas ---

/// User
///
/// The public read model of a user account. This is what every endpoint returns;
/// it deliberately has no credential fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// UserRow
///
/// Raw database row for the `users` table, including the Argon2 hash.
/// Only the storage layer and the authorization gate ever see this struct.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            is_active: row.is_active,
            is_superuser: row.is_superuser,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// --- Request Payloads ---

/// SuperuserCreate
///
/// Input payload for POST /users/superuser. The created account is always
/// active and always a superuser; neither flag is accepted from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SuperuserCreate {
    #[validate(length(min = 1, max = 150))]
    #[schema(example = "root")]
    pub username: String,

    /// Plain-text password, hashed before it reaches storage.
    #[validate(length(min = 1, max = 1024))]
    pub password: String,

    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,

    #[validate(length(max = 255))]
    #[serde(default)]
    pub full_name: Option<String>,
}

/// UserUpdate
///
/// Partial update payload for PUT /users/{id}. Absent fields are left untouched
/// in storage; only `Some` values are merged.
///
/// `email` and `full_name` are nullable columns, so they track presence
/// separately from value: absent is `None`, an explicit `null` is `Some(None)`
/// and clears the column.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default, PartialEq)]
#[ts(export)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(email)]
    #[ts(optional)]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(max = 255))]
    #[ts(optional)]
    #[schema(value_type = Option<String>)]
    pub full_name: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 1024))]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
}

// A field that appears in the payload is `Some`, even when its value is null.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UserUpdate {
    /// True when the patch touches account status flags rather than profile data.
    pub fn changes_privileges(&self) -> bool {
        self.is_active.is_some() || self.is_superuser.is_some()
    }
}

/// UserChanges
///
/// The storage-facing form of a `UserUpdate`: identical field presence, but the
/// password has already been replaced by its hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    /// `Some(None)` writes NULL.
    pub email: Option<Option<String>>,
    pub full_name: Option<Option<String>>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.hashed_password.is_none()
            && self.is_active.is_none()
            && self.is_superuser.is_none()
    }
}

/// NewUser
///
/// Fully resolved insert for the `users` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Pagination
///
/// Query parameters for GET /users. Unsigned types reject negative values at
/// extraction time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, IntoParams, PartialEq)]
pub struct Pagination {
    /// The number of items to skip before starting to collect the result set.
    #[serde(default)]
    pub offset: u32,
    /// The maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
        }
    }
}

// --- Response Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DeleteResponse {
    pub message: String,
}

impl DeleteResponse {
    pub fn deleted() -> Self {
        Self {
            message: "User deleted successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}
