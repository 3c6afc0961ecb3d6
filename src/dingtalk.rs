//! Posts rendered alert groups to dingtalk robot webhooks.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    alert,
    alert_renderer::{self, LabelSource},
    rendered_alert::{At, DingTalkMessage},
    settings::Settings,
};

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchSettings {
    /// skip tls certificate verification of the dingtalk webhook.
    /// the webhooks we post to are usually internal relays with self signed certificates
    pub accept_invalid_certs: bool,
}

impl DispatchSettings {
    pub fn global() -> &'static Self {
        &Settings::global().dispatch
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{key} is missing in {}", .labels.as_str())]
    MissingField {
        key: &'static str,
        labels: LabelSource,
    },
    #[error("invalid alert type {0:?}")]
    UnrecognizedAlertType(String),
    #[error("failed to encode dingtalk message: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("failed to send alert to dingtalk webhook: {0}")]
    Transport(#[source] reqwest::Error),
}

impl DispatchError {
    /// short name used as metric label
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::MissingField { .. } => "missing_field",
            DispatchError::UnrecognizedAlertType(_) => "unrecognized_alert_type",
            DispatchError::Encoding(_) => "encoding",
            DispatchError::Transport(_) => "transport",
        }
    }
}

struct Metrics {
    sent_alerts: IntCounterVec,
    dispatch_failures: IntCounterVec,
    non_ok_responses: IntCounter,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        use prometheus::{opts, register_int_counter, register_int_counter_vec};

        let sent_alerts = register_int_counter_vec!(
            opts!("received_alerts_total", "total number of alert groups passed to dingtalk")
                .namespace("dingtalk_relay"),
            &["alert_type"]
        )?;

        let dispatch_failures = register_int_counter_vec!(
            opts!("dispatch_failures_total", "number of alert groups that failed to dispatch")
                .namespace("dingtalk_relay"),
            &["kind"]
        )?;

        let non_ok_responses = register_int_counter!(opts!(
            "destination_non_ok_total",
            "number of webhook responses with a status other than 200"
        )
        .namespace("dingtalk_relay"))?;

        Ok(Self {
            sent_alerts,
            dispatch_failures,
            non_ok_responses,
        })
    }
}

#[allow(clippy::expect_used)]
static METRICS: Lazy<Metrics> =
    Lazy::new(|| Metrics::new().expect("failed to register dingtalk metrics"));

#[derive(Debug, Clone)]
/// Validates, renders and posts alert groups. Cheap to clone, all clones share one connection pool.
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(settings: &DispatchSettings) -> Result<Self, reqwest::Error> {
        if settings.accept_invalid_certs {
            tracing::warn!("tls certificates of dingtalk webhooks are not verified");
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }

    /// Renders an alert group and posts it to a dingtalk webhook.
    ///
    /// A webhook answering with something other than 200 is logged but still counts as sent.
    ///
    /// # Arguments
    ///
    /// * `alert` - the alert group received from alertmanager
    ///
    /// * `webhook` - url of the dingtalk robot
    ///
    /// * `at_mobiles` - phone numbers of the group members to mention
    ///
    /// * `is_at_all` - whether to mention the whole group
    pub async fn dispatch(
        &self,
        alert: &alert::Data,
        webhook: &str,
        at_mobiles: Vec<String>,
        is_at_all: bool,
    ) -> Result<(), DispatchError> {
        let at = At {
            at_mobiles,
            is_at_all,
        };

        let result = self.try_dispatch(alert, webhook, at).await;

        if let Err(err) = &result {
            METRICS
                .dispatch_failures
                .with_label_values(&[err.kind()])
                .inc();
        }

        result
    }

    async fn try_dispatch(
        &self,
        alert: &alert::Data,
        webhook: &str,
        at: At,
    ) -> Result<(), DispatchError> {
        let rendered = alert_renderer::render(alert)?;

        METRICS
            .sent_alerts
            .with_label_values(&[rendered.alert_type.as_str()])
            .inc();

        let message = DingTalkMessage::new(rendered, at);
        let body = serde_json::to_vec(&message).map_err(DispatchError::Encoding)?;

        let response = self
            .client
            .post(webhook)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DispatchError::Transport)?;

        if response.status() != StatusCode::OK {
            METRICS.non_ok_responses.inc();
            tracing::warn!(
                "dingtalk webhook answered with {}: {:?}",
                response.status(),
                response.headers()
            );
        }

        tracing::info!("alert group sent to {}", webhook);

        Ok(())
    }
}
