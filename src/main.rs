mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;
mod scheduling;
mod store;
mod validation;

use std::sync::Arc;

use crate::{
    auth::{JwtKeys, hash_password},
    config::{Config, DevUser},
    models::{AppState, NewUser},
    scheduling::SchedulingRules,
    store::{ClinicStore, MemoryStore, PgStore},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use anyhow::anyhow;
use axum::http::header;
use tracing_subscriber::EnvFilter;

async fn memory_store(dev_user: Option<&DevUser>) -> anyhow::Result<Arc<dyn ClinicStore>> {
    let store = MemoryStore::new();

    if let Some(dev) = dev_user {
        let password_hash = hash_password(&dev.password).map_err(|e| anyhow!(e))?;
        let user = store
            .create_user(NewUser {
                name: "Dev User".into(),
                email: dev.email.clone(),
                password_hash,
                role: "admin".into(),
                tenant_id: None,
            })
            .await?;
        tracing::info!(user_id = user.id, email = %user.email, "seeded dev user");
    }

    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn ClinicStore> = match cfg.database_url.as_deref() {
        Some(url) => Arc::new(PgStore::new(db::connect_pg(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, data lives in memory only");
            memory_store(cfg.dev_user.as_ref()).await?
        }
    };

    let double_booking_window = cfg
        .double_booking_window_minutes
        .map(|m| chrono::Duration::try_minutes(m).ok_or_else(|| anyhow!("double booking window out of range: {m}")))
        .transpose()?;
    let scheduling = SchedulingRules {
        transitions: cfg.transition_policy,
        double_booking_window,
    };
    tracing::info!(
        transitions = ?scheduling.transitions,
        double_booking_window_minutes = ?cfg.double_booking_window_minutes,
        "scheduling rules"
    );

    let state = AppState {
        store,
        jwt: JwtKeys::from_secret(cfg.jwt_secret.as_bytes()),
        token_ttl_hours: cfg.token_ttl_hours,
        scheduling,
    };

    // Browser front-ends call the API cross-origin, including the OPTIONS preflight.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
