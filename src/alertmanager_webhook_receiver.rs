use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Extension, Query,
    },
    http::StatusCode,
    routing::post,
    Router,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::{alert, dingtalk::Dispatcher, settings::Settings};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
    /// url path alertmanager posts to
    pub path: String,
}

impl AlertReceiverSettings {
    pub fn global() -> &'static Self {
        &Settings::global().receiver
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// where and how to deliver an alert group, taken from the query string
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeliveryParameters {
    webhook: String,
    at_mobiles: Vec<String>,
    is_at_all: bool,
}

impl DeliveryParameters {
    /// Returns the name of the first missing required parameter on failure.
    fn from_query(query: Vec<(String, String)>) -> Result<Self, &'static str> {
        let mut webhook = None;
        let mut is_at_all = None;
        let mut at_mobiles = Vec::new();

        for (key, value) in query {
            match key.as_str() {
                "webhook" if webhook.is_none() => webhook = Some(value),
                "isatall" if is_at_all.is_none() => is_at_all = Some(value),
                "atmobiles" => at_mobiles.push(value),
                _ => {}
            }
        }

        let webhook = webhook.ok_or("webhook")?;
        let is_at_all = is_at_all.ok_or("isatall")?;

        Ok(Self {
            webhook,
            at_mobiles,
            is_at_all: parse_bool(&is_at_all).unwrap_or(false),
        })
    }
}

/// textual booleans as commonly accepted on the command line and in urls
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

async fn dingtalk_receiver(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, String) {
    let body = match body {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("failed to read request body: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let alert = alert::Data::from_slice_or_default(&body);

    let Query(query) = match query {
        Ok(query) => query,
        Err(err) => {
            tracing::error!("failed to parse url arguments: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    // alertmanager ignores the response body, a bad receiver url only shows up in our logs
    let params = match DeliveryParameters::from_query(query) {
        Ok(params) => params,
        Err(missing) => {
            tracing::error!("url argument {:?} is missing", missing);
            return (StatusCode::OK, String::new());
        }
    };

    let DeliveryParameters {
        webhook,
        at_mobiles,
        is_at_all,
    } = params;

    match dispatcher
        .dispatch(&alert, &webhook, at_mobiles, is_at_all)
        .await
    {
        Ok(()) => (StatusCode::OK, "Alert sent successfully".to_string()),
        Err(err) => {
            tracing::error!("failed to dispatch alert group: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub fn router(path: &str, dispatcher: Dispatcher) -> Router {
    Router::new()
        .route(path, post(dingtalk_receiver))
        .layer(Extension(Arc::new(dispatcher)))
}

pub async fn run_alert_receiver(dispatcher: Dispatcher) -> Result<()> {
    let settings = AlertReceiverSettings::global();
    let addr = settings.to_socket_addr();

    let app = router(&settings.path, dispatcher);

    tracing::info!("receiving alerts on {}{}", addr, settings.path);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("alertmanager webhook receiver crashed")?;

    Ok(())
}
