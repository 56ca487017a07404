use crudbase::{app_router, AppConfig, AppState};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db.url())
        .await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        app = %config.app.name,
        env = %config.app.env,
        %addr,
        "listening"
    );

    let app = app_router(AppState::new(pool, config));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
