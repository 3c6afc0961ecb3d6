//! helpers shared by the unit tests
use std::{
    collections::HashMap,
    net::TcpListener,
    sync::{Arc, Mutex},
};

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;
use chrono::{TimeZone, Utc};

use crate::{alert, alert_renderer::LabelSource};

type Requests = Arc<Mutex<Vec<(HeaderMap, Bytes)>>>;

/// fake dingtalk robot that records what is posted to it
pub struct Destination {
    pub url: String,
    requests: Requests,
}

impl Destination {
    pub fn requests(&self) -> Vec<(HeaderMap, Bytes)> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a fake dingtalk robot on a random local port answering every post with `status`.
pub async fn spawn_destination(status: StatusCode) -> Destination {
    let requests = Requests::default();
    let recorded = Arc::clone(&requests);

    let app = Router::new().route(
        "/robot/send",
        post(move |headers: HeaderMap, body: Bytes| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push((headers, body));
                status
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    Destination {
        url: format!("http://{addr}/robot/send"),
        requests,
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// valid metric alert group with one firing alert
pub fn metric_alert() -> alert::Data {
    alert::Data {
        version: "4".to_string(),
        group_key: "group-1".to_string(),
        status: "firing".to_string(),
        receiver: "dingtalk".to_string(),
        common_labels: labels(&[
            ("alert_type", "metric"),
            ("alert_name", "cpu_spike"),
            ("group_id", "group-1"),
        ]),
        alerts: vec![alert::Alert {
            status: "firing".to_string(),
            labels: labels(&[("severity", "critical")]),
            starts_at: Utc.with_ymd_and_hms(2022, 5, 30, 8, 4, 0).unwrap().into(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// firing alert group without alerts
pub fn alert_group(group_labels: &[(&str, &str)], common_labels: &[(&str, &str)]) -> alert::Data {
    alert::Data {
        group_key: "group-1".to_string(),
        status: "firing".to_string(),
        group_labels: labels(group_labels),
        common_labels: labels(common_labels),
        ..Default::default()
    }
}

/// every alert type with all of its required labels and the expected description
pub fn complete_alert_groups() -> Vec<(alert::Data, &'static str)> {
    vec![
        (
            alert_group(
                &[("resource_kind", "Deployment")],
                &[("alert_type", "event"), ("event_type", "Warning")],
            ),
            "Warning event of Deployment occurred",
        ),
        (
            alert_group(
                &[("component_name", "etcd"), ("event_type", "kube-etcd")],
                &[("alert_type", "systemService")],
            ),
            "The system component kube-etcd is not running",
        ),
        (
            alert_group(&[("node_name", "node-a")], &[("alert_type", "nodeHealthy")]),
            "The kubelet on the node node-a is not healthy",
        ),
        (
            alert_group(
                &[("node_name", "node-a")],
                &[("alert_type", "nodeCPU"), ("cpu_threshold", "80")],
            ),
            "The CPU usage on the node node-a is over 80%",
        ),
        (
            alert_group(
                &[("node_name", "node-a")],
                &[("alert_type", "nodeMemory"), ("mem_threshold", "75")],
            ),
            "The memory usage on the node node-a is over 75%",
        ),
        (
            alert_group(&[("pod_name", "api-0")], &[("alert_type", "podNotScheduled")]),
            "The Pod api-0 is not scheduled",
        ),
        (
            alert_group(
                &[("pod_name", "api-0"), ("namespace", "prod")],
                &[("alert_type", "podNotRunning")],
            ),
            "The Pod prodapi-0 is not running",
        ),
        (
            alert_group(
                &[("pod_name", "api-0")],
                &[
                    ("alert_type", "podRestarts"),
                    ("restart_times", "5"),
                    ("restart_interval", "600"),
                ],
            ),
            "The Pod api-0 restarts 5 times in 600 sec",
        ),
        (
            alert_group(
                &[("workload_name", "web"), ("workload_namespace", "shop")],
                &[("alert_type", "workload"), ("available_percentage", "50")],
            ),
            "The workload shopweb has available replicas less than 50%",
        ),
        (
            alert_group(&[], &[("alert_type", "metric"), ("alert_name", "cpu_spike")]),
            "The metric cpu_spike crossed the threshold",
        ),
    ]
}

/// labels of a complete alert group whose removal must fail rendering
pub fn required_labels(data: &alert::Data) -> Vec<(LabelSource, String)> {
    data.group_labels
        .keys()
        .map(|k| (LabelSource::GroupLabels, k.clone()))
        .chain(
            data.common_labels
                .keys()
                .map(|k| (LabelSource::CommonLabels, k.clone())),
        )
        // optional prefixes and the label shown for systemService
        .filter(|(source, k)| {
            *source == LabelSource::CommonLabels
                || !matches!(k.as_str(), "namespace" | "workload_namespace" | "event_type")
        })
        .collect()
}
