//! Renders alert groups into the markdown text posted to dingtalk.
//!
//! Which labels an alert group has to carry depends on its `alert_type` common label.
//! Every known type checks its labels and produces a one line description, the firing
//! alerts of the group are listed below it.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, FixedOffset};

use crate::{alert, dingtalk::DispatchError};

/// chrono equivalent of `Jan 2, 2006 at 3:04pm`, the zone is appended by [format_start_time]
const START_TIME_FORMAT: &str = "%b %-d, %Y at %-I:%M%P";

/// `May 30, 2022 at 3:04pm (UTC)`, or `(+0800)` style for any other offset
fn format_start_time(time: &DateTime<FixedOffset>) -> String {
    let zone = match time.offset().local_minus_utc() {
        0 => "UTC".to_string(),
        _ => time.format("%z").to_string(),
    };

    format!("{} ({zone})", time.format(START_TIME_FORMAT))
}

/// label map a required key is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    GroupLabels,
    CommonLabels,
}

impl LabelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSource::GroupLabels => "groupLabels",
            LabelSource::CommonLabels => "commonLabels",
        }
    }
}

/// the alert types we know how to describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    Event,
    SystemService,
    NodeHealthy,
    NodeCpu,
    NodeMemory,
    PodNotScheduled,
    PodNotRunning,
    PodRestarts,
    Workload,
    Metric,
}

impl FromStr for AlertType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "event" => AlertType::Event,
            "systemService" => AlertType::SystemService,
            "nodeHealthy" => AlertType::NodeHealthy,
            "nodeCPU" => AlertType::NodeCpu,
            "nodeMemory" => AlertType::NodeMemory,
            "podNotScheduled" => AlertType::PodNotScheduled,
            "podNotRunning" => AlertType::PodNotRunning,
            "podRestarts" => AlertType::PodRestarts,
            "workload" => AlertType::Workload,
            "metric" => AlertType::Metric,
            other => return Err(DispatchError::UnrecognizedAlertType(other.to_string())),
        })
    }
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Event => "event",
            AlertType::SystemService => "systemService",
            AlertType::NodeHealthy => "nodeHealthy",
            AlertType::NodeCpu => "nodeCPU",
            AlertType::NodeMemory => "nodeMemory",
            AlertType::PodNotScheduled => "podNotScheduled",
            AlertType::PodNotRunning => "podNotRunning",
            AlertType::PodRestarts => "podRestarts",
            AlertType::Workload => "workload",
            AlertType::Metric => "metric",
        }
    }

    /// Checks the labels required by this alert type and returns the description line.
    fn describe(&self, labels: &Labels<'_>) -> Result<String, DispatchError> {
        use LabelSource::*;

        Ok(match self {
            AlertType::Event => {
                let event_type = labels.get(CommonLabels, "event_type")?;
                let resource_kind = labels.get(GroupLabels, "resource_kind")?;
                format!("{event_type} event of {resource_kind} occurred")
            }
            AlertType::SystemService => {
                labels.get(GroupLabels, "component_name")?;
                // presence is checked on component_name but the name shown is event_type
                let component = labels.get_or_empty(GroupLabels, "event_type");
                format!("The system component {component} is not running")
            }
            AlertType::NodeHealthy => {
                let node = labels.get(GroupLabels, "node_name")?;
                format!("The kubelet on the node {node} is not healthy")
            }
            AlertType::NodeCpu => {
                let node = labels.get(GroupLabels, "node_name")?;
                let threshold = labels.get(CommonLabels, "cpu_threshold")?;
                format!("The CPU usage on the node {node} is over {threshold}%")
            }
            AlertType::NodeMemory => {
                let node = labels.get(GroupLabels, "node_name")?;
                let threshold = labels.get(CommonLabels, "mem_threshold")?;
                format!("The memory usage on the node {node} is over {threshold}%")
            }
            AlertType::PodNotScheduled => {
                let pod = labels.namespaced("namespace", "pod_name")?;
                format!("The Pod {pod} is not scheduled")
            }
            AlertType::PodNotRunning => {
                let pod = labels.namespaced("namespace", "pod_name")?;
                format!("The Pod {pod} is not running")
            }
            AlertType::PodRestarts => {
                let pod = labels.namespaced("namespace", "pod_name")?;
                let times = labels.get(CommonLabels, "restart_times")?;
                let interval = labels.get(CommonLabels, "restart_interval")?;
                format!("The Pod {pod} restarts {times} times in {interval} sec")
            }
            AlertType::Workload => {
                let workload = labels.namespaced("workload_namespace", "workload_name")?;
                let percentage = labels.get(CommonLabels, "available_percentage")?;
                format!("The workload {workload} has available replicas less than {percentage}%")
            }
            AlertType::Metric => {
                let name = labels.get(CommonLabels, "alert_name")?;
                format!("The metric {name} crossed the threshold")
            }
        })
    }
}

/// group and common labels of an alert group
struct Labels<'a> {
    group: &'a HashMap<String, String>,
    common: &'a HashMap<String, String>,
}

impl<'a> Labels<'a> {
    fn map(&self, source: LabelSource) -> &'a HashMap<String, String> {
        match source {
            LabelSource::GroupLabels => self.group,
            LabelSource::CommonLabels => self.common,
        }
    }

    fn get(&self, source: LabelSource, key: &'static str) -> Result<&'a str, DispatchError> {
        self.map(source)
            .get(key)
            .map(String::as_str)
            .ok_or(DispatchError::MissingField { key, labels: source })
    }

    fn get_or_empty(&self, source: LabelSource, key: &str) -> &'a str {
        self.map(source).get(key).map(String::as_str).unwrap_or_default()
    }

    /// `name` group label, directly prefixed with the `namespace` group label if present
    fn namespaced(&self, namespace: &str, name: &'static str) -> Result<String, DispatchError> {
        let name = self.get(LabelSource::GroupLabels, name)?;

        Ok(match self.group.get(namespace) {
            Some(namespace) => format!("{namespace}{name}"),
            None => name.to_string(),
        })
    }
}

/// title and markdown text of a rendered alert group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAlert {
    pub alert_type: AlertType,
    pub title: String,
    pub text: String,
}

/// Renders an alert group.
///
/// Fails if `alert_type` is missing or unknown, or if a label required by the alert type is missing.
pub fn render(alert: &alert::Data) -> Result<RenderedAlert, DispatchError> {
    let labels = Labels {
        group: &alert.group_labels,
        common: &alert.common_labels,
    };

    let alert_type: AlertType = labels
        .get(LabelSource::CommonLabels, "alert_type")?
        .parse()?;
    let description = alert_type.describe(&labels)?;

    // operators group their alerts with the group_id label, alertmanager's groupKey is opaque
    let group_id = labels.get_or_empty(LabelSource::CommonLabels, "group_id");
    let title = format!("Alert group: {group_id} (status: {})", alert.status);

    let mut text = format!("### {title}\n\n\n > {description}\n\n");

    for alert in alert.alerts.iter().filter(|alert| alert.is_firing()) {
        text.push_str("-----\n");

        let mut labels: Vec<_> = alert.labels.iter().collect();
        labels.sort();
        for (key, value) in labels {
            text.push_str(&format!("- {key} : {value}\n"));
        }

        text.push_str(&format!(
            "- Starts at: {}\n",
            format_start_time(&alert.starts_at)
        ));
    }

    Ok(RenderedAlert {
        alert_type,
        title,
        text,
    })
}
