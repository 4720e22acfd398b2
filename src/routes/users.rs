use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// User Router Module
///
/// Mounts the user-management endpoints under `prefix` (e.g. `/api/v1`).
///
/// Access Control:
/// - `GET /users` and `POST /users/superuser` take the `AdminUser` extractor.
/// - `GET|PUT|DELETE /users/{id}` take `ActiveUser` and apply the
///   self-or-admin policy before touching storage.
pub fn user_routes(prefix: &str) -> Router<AppState> {
    Router::new()
        // GET /users?offset=&limit=
        .route(&format!("{prefix}/users"), get(handlers::get_multiple_users))
        // POST /users/superuser
        // The static segment wins over `{id}` during matching.
        .route(
            &format!("{prefix}/users/superuser"),
            post(handlers::create_superuser),
        )
        // GET/PUT/DELETE /users/{id}
        .route(
            &format!("{prefix}/users/{{id}}"),
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
