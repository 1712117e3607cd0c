//! Marketplace backend server

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace::{
    api::{self, AppState},
    auth::TokenService,
    config::Config,
    events::EventPublisher,
    notify::Dispatcher,
    otp::MemoryOtpStore,
    store::Repositories,
    upload::LocalStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let config = Config::from_env()?;

    let repos = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await
                .context("connecting to DATABASE_URL")?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Repositories::postgres(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Repositories::in_memory()
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will only be logged");
                None
            }
        },
        None => None,
    };

    let otps = Arc::new(MemoryOtpStore::new(config.otp_ttl));
    otps.clone().spawn_sweeper(Duration::from_secs(60));

    let notifier = Dispatcher::connect(config.email.as_ref(), config.sms.as_ref()).await;

    let state = AppState::new(
        repos,
        TokenService::new(config.tokens.clone()),
        EventPublisher::new(nats),
        Arc::new(notifier),
        otps,
        Arc::new(LocalStorage::new(&config.upload_dir, config.public_base_url.clone())),
    );
    let app = api::router(state, &config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("marketplace listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
