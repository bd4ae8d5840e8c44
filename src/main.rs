// src/main.rs

use bloggit::config::Config;
use bloggit::models::user::{NewUser, Role};
use bloggit::routes;
use bloggit::state::AppState;
use bloggit::store::{Repositories, UserRepository};
use bloggit::utils::hash::hash_password;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let repos = match &config.database_url {
        Some(database_url) => {
            let pool = connect_with_retry(database_url).await?;

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied successfully.");

            Repositories::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is not persisted)");
            Repositories::memory()
        }
    };

    // Seed SuperAdmin User
    if let Err(e) = seed_super_admin(&repos, &config).await {
        tracing::error!("Failed to seed SuperAdmin user: {}", e);
    }

    let state = AppState::new(repos, config.clone());

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize Database Pool with Retry
async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return Ok(pool);
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn seed_super_admin(repos: &Repositories, config: &Config) -> Result<(), BoxError> {
    let Some(seed) = &config.superadmin else {
        return Ok(());
    };

    if repos.users.find_by_email(&seed.email).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding SuperAdmin user: {}", seed.username);
    let password_hash = hash_password(&seed.password)?;

    repos
        .users
        .create(NewUser {
            email: seed.email.clone(),
            username: seed.username.clone(),
            first_name: "Super".to_string(),
            last_name: Some("Admin".to_string()),
            photo: None,
            date_of_birth: None,
            password_hash,
            role: Role::Admin,
            super_admin: true,
        })
        .await?;

    tracing::info!("SuperAdmin user created successfully.");
    Ok(())
}
