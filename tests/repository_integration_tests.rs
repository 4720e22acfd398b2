//! Runs against a live Postgres. Start one, export DATABASE_URL and run
//! `cargo test -- --ignored`.

use serial_test::serial;
use sqlx::PgPool;
use user_admin_api::{
    ApiError, PostgresRepository,
    models::{NewUser, SuperuserCreate, UserChanges},
    password::verify_password,
    repository::{Repository, UserSession},
    service::UserService,
};

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Usernames are unique per run so tests can share one database.
fn unique_name(label: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{label}_{nanos}")
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        full_name: Some("Integration Test".to_string()),
        hashed_password: "not-a-real-hash".to_string(),
        is_active: true,
        is_superuser: false,
    }
}

async fn open(repo: &PostgresRepository) -> Box<dyn UserSession> {
    repo.session().await.expect("Failed to open session")
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_insert_and_fetch_roundtrip() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    let name = unique_name("fetch");
    let inserted = session.insert_user(&new_user(&name)).await.unwrap();
    assert!(inserted.id > 0);
    assert!(inserted.is_active);
    assert!(!inserted.is_superuser);

    let fetched = session.fetch_user(inserted.id).await.unwrap().unwrap();
    assert_eq!(fetched, inserted);

    assert!(session.fetch_user(-1).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_duplicate_username_is_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    let name = unique_name("dup");
    session.insert_user(&new_user(&name)).await.unwrap();
    let again = session.insert_user(&new_user(&name)).await;

    assert!(matches!(again.unwrap_err(), ApiError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_partial_update_sets_only_present_fields() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    let before = session
        .insert_user(&new_user(&unique_name("partial")))
        .await
        .unwrap();

    let changes = UserChanges {
        full_name: Some(Some("Changed Name".to_string())),
        ..UserChanges::default()
    };
    let after = session
        .update_user(before.id, &changes)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(after.full_name.as_deref(), Some("Changed Name"));
    assert_eq!(after.username, before.username);
    assert_eq!(after.email, before.email);
    assert_eq!(after.hashed_password, before.hashed_password);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);

    let missing = session.update_user(-1, &changes).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_list_is_ordered_by_id() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    for n in 0..3 {
        session
            .insert_user(&new_user(&unique_name(&format!("list{n}"))))
            .await
            .unwrap();
    }

    let page = session.list_users(0, 1000).await.unwrap();
    assert!(page.len() >= 3);
    assert!(page.windows(2).all(|pair| pair[0].id < pair[1].id));

    let shifted = session.list_users(1, 2).await.unwrap();
    assert_eq!(shifted.len(), 2);
    assert_eq!(shifted[0].id, page[1].id);
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_delete_removes_row_once() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    let user = session
        .insert_user(&new_user(&unique_name("delete")))
        .await
        .unwrap();

    assert!(session.delete_user(user.id).await.unwrap());
    assert!(!session.delete_user(user.id).await.unwrap());
    assert!(session.fetch_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_service_creates_superuser_with_hashed_password() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let mut session = open(&repo).await;

    let name = unique_name("root");
    let created = UserService::new(session.as_mut())
        .create_user(SuperuserCreate {
            username: name.clone(),
            password: "s3cret".to_string(),
            email: None,
            full_name: None,
        })
        .await
        .unwrap();
    assert!(created.is_superuser);
    assert!(created.is_active);

    let row = session.fetch_user(created.id).await.unwrap().unwrap();
    assert!(verify_password("s3cret", &row.hashed_password).unwrap());
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
#[serial]
async fn test_dispose_is_idempotent_and_closes_the_pool() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    repo.dispose().await;
    repo.dispose().await;

    assert!(ctx.pool.is_closed());
    assert!(matches!(repo.session().await.err(), Some(ApiError::Storage(_))));
}
