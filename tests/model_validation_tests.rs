use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use serde_json::json;
use user_admin_api::{
    ApiError,
    error::ErrorResponse,
    models::{Pagination, SuperuserCreate, User, UserRow, UserUpdate},
};
use validator::Validate;

// --- Test Utilities ---

fn sample_row() -> UserRow {
    let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    UserRow {
        id: 7,
        username: "alice".to_string(),
        email: Some("alice@example.com".to_string()),
        full_name: None,
        hashed_password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        is_active: true,
        is_superuser: false,
        created_at: created,
        updated_at: created,
    }
}

// --- Tests ---

#[test]
fn test_user_row_conversion_drops_the_hash() {
    let row = sample_row();
    let user = User::from(row.clone());

    assert_eq!(user.id, row.id);
    assert_eq!(user.username, row.username);
    assert_eq!(user.created_at, row.created_at);

    let value = serde_json::to_value(&user).unwrap();
    assert!(value.get("hashed_password").is_none());
    assert!(value.get("password").is_none());
    assert_eq!(value["email"], "alice@example.com");
    assert_eq!(value["full_name"], serde_json::Value::Null);
}

#[test]
fn test_user_update_deserializes_partial_json() {
    let update: UserUpdate = serde_json::from_value(json!({"full_name": "Alice L"})).unwrap();

    assert_eq!(
        update,
        UserUpdate {
            full_name: Some(Some("Alice L".to_string())),
            ..UserUpdate::default()
        }
    );
    assert!(!update.changes_privileges());

    let empty: UserUpdate = serde_json::from_value(json!({})).unwrap();
    assert_eq!(empty, UserUpdate::default());
}

#[test]
fn test_user_update_tells_null_from_absent() {
    let cleared: UserUpdate = serde_json::from_value(json!({"email": null})).unwrap();
    assert_eq!(cleared.email, Some(None));
    assert_eq!(cleared.full_name, None);
    assert!(cleared.validate().is_ok());

    // Explicit null survives a round trip; absent fields stay absent.
    assert_eq!(serde_json::to_value(&cleared).unwrap(), json!({"email": null}));
}

#[test]
fn test_user_update_serialization_omits_absent_fields() {
    let update = UserUpdate {
        is_active: Some(false),
        ..UserUpdate::default()
    };

    assert_eq!(serde_json::to_value(&update).unwrap(), json!({"is_active": false}));
    assert!(update.changes_privileges());
}

#[test]
fn test_user_update_validation() {
    let ok = UserUpdate {
        email: Some(Some("a@b.io".to_string())),
        ..UserUpdate::default()
    };
    assert!(ok.validate().is_ok());

    for bad in [
        UserUpdate {
            email: Some(Some("no-at-sign".to_string())),
            ..UserUpdate::default()
        },
        UserUpdate {
            username: Some(String::new()),
            ..UserUpdate::default()
        },
        UserUpdate {
            password: Some(String::new()),
            ..UserUpdate::default()
        },
        UserUpdate {
            full_name: Some(Some("x".repeat(256))),
            ..UserUpdate::default()
        },
    ] {
        assert!(bad.validate().is_err(), "{bad:?}");
    }
}

#[test]
fn test_superuser_create_requires_credentials() {
    let missing_password = serde_json::from_value::<SuperuserCreate>(json!({"username": "root"}));
    assert!(missing_password.is_err());

    let payload: SuperuserCreate =
        serde_json::from_value(json!({"username": "root", "password": "x"})).unwrap();
    assert!(payload.email.is_none());
    assert!(payload.validate().is_ok());

    let long_name = SuperuserCreate {
        username: "r".repeat(151),
        ..payload
    };
    assert!(long_name.validate().is_err());
}

#[test]
fn test_pagination_defaults() {
    assert_eq!(
        Pagination::default(),
        Pagination {
            offset: 0,
            limit: 10
        }
    );

    let partial: Pagination = serde_json::from_value(json!({"offset": 5})).unwrap();
    assert_eq!(partial.offset, 5);
    assert_eq!(partial.limit, 10);

    assert!(serde_json::from_value::<Pagination>(json!({"offset": -1})).is_err());
}

#[test]
fn test_error_status_table() {
    let cases = [
        (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        (ApiError::AccountInactive, StatusCode::UNAUTHORIZED, "ACCOUNT_INACTIVE"),
        (ApiError::Forbidden("no".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
        (ApiError::Unauthorized, StatusCode::FORBIDDEN, "UNAUTHORIZED"),
        (ApiError::NotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
        (
            ApiError::Validation("bad".into()),
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
        ),
        (ApiError::Conflict("dup".into()), StatusCode::CONFLICT, "CONFLICT"),
        (
            ApiError::Storage("boom".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
        ),
    ];

    for (error, status, code) in cases {
        assert_eq!(error.status_code(), status, "{error:?}");
        assert_eq!(error.error_code(), code, "{error:?}");
        assert_eq!(error.to_response().status, status.as_u16());
    }
}

#[test]
fn test_storage_error_details_are_redacted() {
    let body = ApiError::Storage("connection refused at 10.0.0.3:5432".into()).to_response();

    assert_eq!(
        body,
        ErrorResponse {
            status: 500,
            code: "INTERNAL_ERROR".to_string(),
            message: "Internal server error".to_string(),
        }
    );
}

#[test]
fn test_row_not_found_maps_to_not_found() {
    assert_eq!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound);
    assert!(matches!(
        ApiError::from(sqlx::Error::PoolTimedOut),
        ApiError::Storage(_)
    ));
}
