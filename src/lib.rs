pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Request, ServiceExt};

use crate::core::rate_limit::{self, RateLimiters};
use crate::core::{config::Settings, shutdown, state::AppState, telemetry};
use crate::db::{ProcedureExecutor, ProcedureGateway};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let gateway = Arc::new(ProcedureGateway::new(settings.database().clone()));
    if let Err(err) = gateway.check_connection().await {
        tracing::error!(error = %err, "Database connection failed");
        return Err(err.into());
    }
    tracing::info!("Database connected successfully");

    let limiters = RateLimiters::from_settings(settings.rate_limit());
    rate_limit::spawn_cleanup(limiters.clone(), settings.rate_limit().window);

    let grace_period = settings.shutdown().grace_period;
    let state = AppState::new(settings, gateway.clone(), limiters);
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Exam portal API listening"
    );

    let app = api::router::app(state);
    let result = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown::shutdown_with_deadline(grace_period))
    .await;

    gateway.close().await;
    tracing::info!("Database pool closed");

    result?;

    Ok(())
}
