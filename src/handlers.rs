use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};

use crate::{
    auth::{ActiveUser, AdminUser, ensure_self_or_admin},
    error::{ApiError, ErrorResponse},
    models::{DeleteResponse, HealthResponse, Pagination, SuperuserCreate, User, UserUpdate},
    repository::DbSession,
    service::UserService,
};

/// healthcheck
///
/// [Public Route] Liveness probe. Never touches storage.
#[utoipa::path(
    get,
    path = "/healthcheck",
    responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// get_multiple_users
///
/// [Admin Route] Lists users in id order, one page at a time.
///
/// *Authorization*: the `AdminUser` extractor runs before anything else, so a
/// non-admin is rejected regardless of the query parameters.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(Pagination),
    responses(
        (status = 200, description = "A page of users", body = [User]),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 422, description = "Invalid pagination", body = ErrorResponse)
    )
)]
pub async fn get_multiple_users(
    AdminUser(_admin): AdminUser,
    pagination: Result<Query<Pagination>, QueryRejection>,
    DbSession(mut session): DbSession,
) -> Result<Json<Vec<User>>, ApiError> {
    let Query(Pagination { offset, limit }) = pagination?;
    let mut service = UserService::new(session.as_mut());
    let users = service.get_users_paginated(offset, limit).await?;
    Ok(Json(users))
}

/// get_user
///
/// [Authenticated Route] Fetches one user. Self-or-admin.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Neither self nor admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_user(
    ActiveUser(caller): ActiveUser,
    path: Result<Path<i64>, PathRejection>,
    DbSession(mut session): DbSession,
) -> Result<Json<User>, ApiError> {
    let Path(user_id) = path?;
    ensure_self_or_admin(&caller, user_id)?;

    let mut service = UserService::new(session.as_mut());
    Ok(Json(service.find_user(user_id).await?))
}

/// update_user
///
/// [Authenticated Route] Partially updates one user. Self-or-admin.
///
/// *Privileges*: only an admin may change `is_active` or `is_superuser`,
/// including on their own account.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 403, description = "Neither self nor admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
        (status = 422, description = "Invalid fields", body = ErrorResponse)
    )
)]
pub async fn update_user(
    ActiveUser(caller): ActiveUser,
    path: Result<Path<i64>, PathRejection>,
    DbSession(mut session): DbSession,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(user_id) = path?;
    ensure_self_or_admin(&caller, user_id)?;
    let Json(update) = payload?;

    if update.changes_privileges() && !caller.is_superuser {
        return Err(ApiError::Forbidden(
            "only an admin may change account status flags".into(),
        ));
    }

    let mut service = UserService::new(session.as_mut());
    let user = service.update_user(user_id, update).await?;
    tracing::info!(caller_id = caller.id, user_id, "user updated");
    Ok(Json(user))
}

/// delete_user
///
/// [Authenticated Route] Removes one user. Self-or-admin.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 403, description = "Neither self nor admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    ActiveUser(caller): ActiveUser,
    path: Result<Path<i64>, PathRejection>,
    DbSession(mut session): DbSession,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Path(user_id) = path?;
    ensure_self_or_admin(&caller, user_id)?;

    let mut service = UserService::new(session.as_mut());
    service.delete_user(user_id).await?;
    tracing::info!(caller_id = caller.id, user_id, "user deleted");
    Ok(Json(DeleteResponse::deleted()))
}

/// create_superuser
///
/// [Admin Route] Mints a new superuser account.
#[utoipa::path(
    post,
    path = "/api/v1/users/superuser",
    request_body = SuperuserCreate,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
        (status = 422, description = "Invalid fields", body = ErrorResponse)
    )
)]
pub async fn create_superuser(
    AdminUser(admin): AdminUser,
    DbSession(mut session): DbSession,
    payload: Result<Json<SuperuserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(create) = payload?;

    let mut service = UserService::new(session.as_mut());
    let user = service.create_user(create).await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, "superuser minted");
    Ok((StatusCode::CREATED, Json(user)))
}
