//! Here we expose prometheus metrics about the relay
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

use crate::settings::Settings;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl TelemetryEndpointSettings {
    pub fn global() -> &'static Self {
        &Settings::global().telemetry_endpoint
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

async fn metrics_handler() -> impl IntoResponse {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {}", err);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(([(CONTENT_TYPE, encoder.format_type().to_string())], buffer))
}

pub async fn run_telemetry_endpoint() -> Result<()> {
    let addr = TelemetryEndpointSettings::global().to_socket_addr();
    let app = Router::new().route("/metrics", get(metrics_handler));

    tracing::info!("serving metrics on {}/metrics", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("telemetry endpoint crashed")?;

    Ok(())
}
