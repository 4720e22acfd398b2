//! Bootstrap a superuser directly against the database.
//!
//! The HTTP API only lets an existing admin mint superusers, so the first one
//! has to come from an operator with database access.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::{env, io, time::Duration};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use user_admin_api::{
    AppConfig,
    auth::issue_token,
    models::SuperuserCreate,
    repository::{PostgresRepository, Repository},
    service::UserService,
};

/// `create-superuser` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "create-superuser",
    about = "Create an active superuser account without going through the API",
    version
)]
struct CliArgs {
    #[arg(long, value_name = "name")]
    username: String,
    #[arg(long, value_name = "password")]
    password: String,
    #[arg(long, value_name = "address")]
    email: Option<String>,
    #[arg(long = "full-name", value_name = "name")]
    full_name: Option<String>,
    /// Database connection URL. Falls back to `DATABASE_URL` when omitted.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Also print a bearer token for the new account, valid this many hours.
    /// Requires `JWT_SECRET`.
    #[arg(long = "token-ttl-hours", value_name = "hours")]
    token_ttl_hours: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    let args = CliArgs::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => env::var("DATABASE_URL").map_err(|_| {
            io::Error::other("provide --database-url or set DATABASE_URL")
        })?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .map_err(|e| io::Error::other(format!("connect to database: {e}")))?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::other(format!("apply migrations: {e}")))?;

    let repo = PostgresRepository::new(pool);
    let created = {
        let mut session = repo.session().await.map_err(io::Error::other)?;
        let mut service = UserService::new(session.as_mut());
        service
            .create_user(SuperuserCreate {
                username: args.username,
                password: args.password,
                email: args.email,
                full_name: args.full_name,
            })
            .await
    };
    repo.dispose().await;
    let user = created.map_err(io::Error::other)?;

    println!("created superuser '{}' with id {}", user.username, user.id);

    if let Some(hours) = args.token_ttl_hours {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| io::Error::other("JWT_SECRET must be set to issue a token"))?;
        let config = AppConfig {
            jwt_secret,
            ..AppConfig::default()
        };
        let token = issue_token(&config, user.id, Duration::from_secs(hours * 3600))
            .map_err(io::Error::other)?;
        println!("{token}");
    }
    Ok(())
}
